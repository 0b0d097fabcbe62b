//! Aggregate roots for the Influencers context.

use std::collections::BTreeMap;

use alpes_core::aggregate::{AggregateBase, AggregateRoot};
use alpes_core::clock::Clock;
use alpes_core::error::DomainError;
use alpes_core::repository::SnapshotAggregate;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::events::{
    InfluencerActivated, InfluencerAudienceUpdated, InfluencerDeactivated,
    InfluencerDemographicsUpdated, InfluencerEvent, InfluencerEventKind, InfluencerMetricsUpdated,
    InfluencerProfileUpdated, InfluencerRegistered, InfluencerSuspended,
};
use super::values::{
    AudienceData, Demographics, Email, InfluencerMetrics, InfluencerStatus, InfluencerTier, Phone,
    Platform, Profile,
};

/// An influencer who can be matched with campaigns.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Influencer {
    #[serde(flatten)]
    base: AggregateBase<InfluencerEvent>,
    name: String,
    email: Email,
    phone: Option<Phone>,
    profile: Profile,
    status: InfluencerStatus,
    audience: BTreeMap<Platform, AudienceData>,
    demographics: Option<Demographics>,
    metrics: InfluencerMetrics,
    registered_at: DateTime<Utc>,
    activated_at: Option<DateTime<Utc>>,
    deactivated_at: Option<DateTime<Utc>>,
}

impl Influencer {
    /// Registers a new influencer in `PENDING` and records
    /// `InfluencerRegistered`.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Validation` if the name is blank.
    pub fn register(
        id: Uuid,
        name: &str,
        email: Email,
        phone: Option<Phone>,
        profile: Profile,
        correlation_id: Uuid,
        clock: &dyn Clock,
    ) -> Result<Self, DomainError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(DomainError::Validation(
                "influencer name must not be empty".into(),
            ));
        }

        let now = clock.now();
        let mut influencer = Self {
            base: AggregateBase::new(id),
            name: name.to_owned(),
            email,
            phone,
            profile,
            status: InfluencerStatus::Pending,
            audience: BTreeMap::new(),
            demographics: None,
            metrics: InfluencerMetrics::default(),
            registered_at: now,
            activated_at: None,
            deactivated_at: None,
        };
        influencer.record(
            InfluencerEventKind::InfluencerRegistered(InfluencerRegistered {
                influencer_id: id,
                name: influencer.name.clone(),
                email: influencer.email.as_str().to_owned(),
                categories: influencer.profile.categories().to_vec(),
                platforms: influencer.platform_names(),
                registered_at: now,
            }),
            correlation_id,
            now,
        );
        Ok(influencer)
    }

    /// Activates the influencer.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::InvalidState` if the influencer is already
    /// active or is suspended.
    pub fn activate(&mut self, correlation_id: Uuid, clock: &dyn Clock) -> Result<(), DomainError> {
        match self.status {
            InfluencerStatus::Active => {
                return Err(DomainError::InvalidState(
                    "influencer is already active".into(),
                ));
            }
            InfluencerStatus::Suspended => {
                return Err(DomainError::InvalidState(
                    "a suspended influencer cannot be activated".into(),
                ));
            }
            InfluencerStatus::Pending | InfluencerStatus::Inactive => {}
        }

        let now = clock.now();
        self.status = InfluencerStatus::Active;
        self.activated_at = Some(now);
        self.base.bump_version();
        self.record(
            InfluencerEventKind::InfluencerActivated(InfluencerActivated {
                influencer_id: self.base.id(),
                name: self.name.clone(),
                email: self.email.as_str().to_owned(),
                platforms: self.platform_names(),
                activated_at: now,
            }),
            correlation_id,
            now,
        );
        Ok(())
    }

    /// Deactivates the influencer.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::InvalidState` if the influencer is already
    /// inactive or is suspended, `DomainError::BusinessRule` if `reason` is
    /// blank.
    pub fn deactivate(
        &mut self,
        reason: &str,
        correlation_id: Uuid,
        clock: &dyn Clock,
    ) -> Result<(), DomainError> {
        match self.status {
            InfluencerStatus::Inactive => {
                return Err(DomainError::InvalidState(
                    "influencer is already inactive".into(),
                ));
            }
            InfluencerStatus::Suspended => {
                return Err(DomainError::InvalidState(
                    "a suspended influencer cannot be deactivated".into(),
                ));
            }
            InfluencerStatus::Pending | InfluencerStatus::Active => {}
        }
        let reason = required_reason(reason, "deactivation")?;

        let now = clock.now();
        self.status = InfluencerStatus::Inactive;
        self.deactivated_at = Some(now);
        self.base.bump_version();
        self.record(
            InfluencerEventKind::InfluencerDeactivated(InfluencerDeactivated {
                influencer_id: self.base.id(),
                name: self.name.clone(),
                email: self.email.as_str().to_owned(),
                reason,
                deactivated_at: now,
            }),
            correlation_id,
            now,
        );
        Ok(())
    }

    /// Suspends the influencer. There is no transition out of `SUSPENDED`.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::InvalidState` if already suspended,
    /// `DomainError::BusinessRule` if `reason` is blank.
    pub fn suspend(
        &mut self,
        reason: &str,
        correlation_id: Uuid,
        clock: &dyn Clock,
    ) -> Result<(), DomainError> {
        if self.status == InfluencerStatus::Suspended {
            return Err(DomainError::InvalidState(
                "influencer is already suspended".into(),
            ));
        }
        let reason = required_reason(reason, "suspension")?;

        let now = clock.now();
        self.status = InfluencerStatus::Suspended;
        self.base.bump_version();
        self.record(
            InfluencerEventKind::InfluencerSuspended(InfluencerSuspended {
                influencer_id: self.base.id(),
                reason,
                suspended_at: now,
            }),
            correlation_id,
            now,
        );
        Ok(())
    }

    /// Updates profile fields. Nothing is recorded when no field changes.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Validation` if the website is malformed.
    pub fn update_profile(
        &mut self,
        description: Option<&str>,
        bio: Option<&str>,
        website: Option<&str>,
        correlation_id: Uuid,
        clock: &dyn Clock,
    ) -> Result<(), DomainError> {
        let (profile, changes) = self.profile.with_changes(description, bio, website)?;
        if changes.is_empty() {
            return Ok(());
        }

        let now = clock.now();
        self.profile = profile;
        self.base.bump_version();
        self.record(
            InfluencerEventKind::InfluencerProfileUpdated(InfluencerProfileUpdated {
                influencer_id: self.base.id(),
                changes,
                updated_at: now,
            }),
            correlation_id,
            now,
        );
        Ok(())
    }

    /// Adds or replaces the audience data of one platform.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Validation` if the platform already has more
    /// followers than `audience` reports, or if the total across platforms
    /// no longer fits a `u64`.
    pub fn add_platform(
        &mut self,
        audience: AudienceData,
        correlation_id: Uuid,
        clock: &dyn Clock,
    ) -> Result<(), DomainError> {
        if let Some(previous) = self.audience.get(&audience.platform()) {
            if audience.followers() < previous.followers() {
                return Err(DomainError::Validation(format!(
                    "{} followers cannot drop from {} to {}",
                    audience.platform(),
                    previous.followers(),
                    audience.followers()
                )));
            }
        }

        let platform = audience.platform();
        let followers = audience.followers();
        let total_followers = self
            .audience
            .values()
            .filter(|existing| existing.platform() != platform)
            .try_fold(followers, |total, existing| {
                total.checked_add(existing.followers())
            })
            .ok_or_else(|| {
                DomainError::Validation("total follower count is out of range".into())
            })?;

        let now = clock.now();
        let engagement_rate = audience.engagement_rate();
        self.audience.insert(platform, audience);
        self.base.bump_version();
        self.record(
            InfluencerEventKind::InfluencerAudienceUpdated(InfluencerAudienceUpdated {
                influencer_id: self.base.id(),
                platform: platform.as_str().to_owned(),
                followers,
                engagement_rate,
                total_followers,
                average_engagement: self.average_engagement(),
                updated_at: now,
            }),
            correlation_id,
            now,
        );
        Ok(())
    }

    /// Replaces the audience demographics.
    pub fn update_demographics(
        &mut self,
        demographics: Demographics,
        correlation_id: Uuid,
        clock: &dyn Clock,
    ) {
        let now = clock.now();
        let top_countries = demographics.top_countries().to_vec();
        self.demographics = Some(demographics);
        self.base.bump_version();
        self.record(
            InfluencerEventKind::InfluencerDemographicsUpdated(InfluencerDemographicsUpdated {
                influencer_id: self.base.id(),
                top_countries,
                updated_at: now,
            }),
            correlation_id,
            now,
        );
    }

    /// Folds campaign results into the accumulated metrics.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Validation` if any figure is negative.
    pub fn record_results(
        &mut self,
        completed_campaigns: u32,
        average_engagement: f64,
        average_cpm: f64,
        revenue: f64,
        correlation_id: Uuid,
        clock: &dyn Clock,
    ) -> Result<(), DomainError> {
        if [average_engagement, average_cpm, revenue]
            .iter()
            .any(|v| !v.is_finite() || *v < 0.0)
        {
            return Err(DomainError::Validation(
                "campaign results must be non-negative numbers".into(),
            ));
        }

        let now = clock.now();
        self.metrics = self.metrics.accumulate(
            completed_campaigns,
            average_engagement,
            average_cpm,
            revenue,
        );
        self.base.bump_version();
        self.record(
            InfluencerEventKind::InfluencerMetricsUpdated(InfluencerMetricsUpdated {
                influencer_id: self.base.id(),
                completed_campaigns: self.metrics.completed_campaigns,
                revenue: self.metrics.revenue,
                updated_at: now,
            }),
            correlation_id,
            now,
        );
        Ok(())
    }

    /// Active with at least one platform.
    #[must_use]
    pub fn can_join_campaigns(&self) -> bool {
        self.status == InfluencerStatus::Active && !self.audience.is_empty()
    }

    /// Whether the profile lists `category`.
    #[must_use]
    pub fn handles_category(&self, category: &str) -> bool {
        self.profile.has_category(category)
    }

    /// Tier of the platform with the most followers.
    #[must_use]
    pub fn primary_tier(&self) -> Option<InfluencerTier> {
        self.audience
            .values()
            .max_by_key(|audience| audience.followers())
            .map(AudienceData::tier)
    }

    /// Mean engagement rate across platforms, 0 without platforms.
    #[must_use]
    pub fn average_engagement(&self) -> f64 {
        if self.audience.is_empty() {
            return 0.0;
        }
        let total: f64 = self.audience.values().map(AudienceData::engagement_rate).sum();
        #[allow(clippy::cast_precision_loss)]
        let count = self.audience.len() as f64;
        total / count
    }

    /// Followers across all platforms.
    #[must_use]
    pub fn total_followers(&self) -> u64 {
        self.audience
            .values()
            .map(AudienceData::followers)
            .fold(0, u64::saturating_add)
    }

    /// Display name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Normalized email.
    #[must_use]
    pub fn email(&self) -> &Email {
        &self.email
    }

    /// Phone number, if given.
    #[must_use]
    pub fn phone(&self) -> Option<&Phone> {
        self.phone.as_ref()
    }

    /// Public profile.
    #[must_use]
    pub fn profile(&self) -> &Profile {
        &self.profile
    }

    /// Lifecycle status.
    #[must_use]
    pub fn status(&self) -> InfluencerStatus {
        self.status
    }

    /// Audience per platform.
    #[must_use]
    pub fn audience(&self) -> &BTreeMap<Platform, AudienceData> {
        &self.audience
    }

    /// Audience demographics.
    #[must_use]
    pub fn demographics(&self) -> Option<&Demographics> {
        self.demographics.as_ref()
    }

    /// Accumulated campaign results.
    #[must_use]
    pub fn metrics(&self) -> &InfluencerMetrics {
        &self.metrics
    }

    /// Registration time.
    #[must_use]
    pub fn registered_at(&self) -> DateTime<Utc> {
        self.registered_at
    }

    /// Last activation time.
    #[must_use]
    pub fn activated_at(&self) -> Option<DateTime<Utc>> {
        self.activated_at
    }

    /// Last deactivation time.
    #[must_use]
    pub fn deactivated_at(&self) -> Option<DateTime<Utc>> {
        self.deactivated_at
    }

    fn platform_names(&self) -> Vec<String> {
        self.audience.keys().map(|p| p.as_str().to_owned()).collect()
    }

    fn record(&mut self, kind: InfluencerEventKind, correlation_id: Uuid, occurred_at: DateTime<Utc>) {
        let metadata = self.base.event_metadata(
            Self::AGGREGATE_TYPE,
            kind.event_type(),
            correlation_id,
            occurred_at,
        );
        self.base.record_event(InfluencerEvent { metadata, kind });
    }
}

fn required_reason(reason: &str, what: &str) -> Result<String, DomainError> {
    let reason = reason.trim();
    if reason.is_empty() {
        return Err(DomainError::BusinessRule(format!(
            "a {what} reason is required"
        )));
    }
    Ok(reason.to_owned())
}

impl AggregateRoot for Influencer {
    type Event = InfluencerEvent;
    const AGGREGATE_TYPE: &'static str = "influencer";

    fn base(&self) -> &AggregateBase<InfluencerEvent> {
        &self.base
    }

    fn base_mut(&mut self) -> &mut AggregateBase<InfluencerEvent> {
        &mut self.base
    }
}

impl SnapshotAggregate for Influencer {
    fn unique_key(&self) -> Option<String> {
        Some(self.email.as_str().to_owned())
    }
}
