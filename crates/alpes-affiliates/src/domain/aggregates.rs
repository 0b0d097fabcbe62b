//! Aggregate roots for the Affiliates context.

use std::collections::BTreeMap;

use alpes_core::aggregate::{AggregateBase, AggregateRoot};
use alpes_core::clock::Clock;
use alpes_core::error::DomainError;
use alpes_core::repository::SnapshotAggregate;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::events::{
    AffiliateActivated, AffiliateDeactivated, AffiliateEvent, AffiliateEventKind,
    AffiliateMetricsUpdated, AffiliateProfileUpdated, AffiliateRegistered, AffiliateSuspended,
};
use super::values::{AffiliateMetrics, AffiliateProfile, AffiliateStatus, Email, Phone};

/// A partner that promotes campaigns in exchange for commission.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Affiliate {
    #[serde(flatten)]
    base: AggregateBase<AffiliateEvent>,
    name: String,
    email: Email,
    phone: Option<Phone>,
    profile: AffiliateProfile,
    status: AffiliateStatus,
    metrics: AffiliateMetrics,
    registered_at: DateTime<Utc>,
    activated_at: Option<DateTime<Utc>>,
    deactivated_at: Option<DateTime<Utc>>,
}

impl Affiliate {
    /// Registers a new affiliate in `PENDING` and records
    /// `AffiliateRegistered`.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Validation` if the name is blank.
    pub fn register(
        id: Uuid,
        name: &str,
        email: Email,
        phone: Option<Phone>,
        profile: AffiliateProfile,
        correlation_id: Uuid,
        clock: &dyn Clock,
    ) -> Result<Self, DomainError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(DomainError::Validation(
                "affiliate name must not be empty".into(),
            ));
        }

        let now = clock.now();
        let mut affiliate = Self {
            base: AggregateBase::new(id),
            name: name.to_owned(),
            email,
            phone,
            profile,
            status: AffiliateStatus::Pending,
            metrics: AffiliateMetrics::default(),
            registered_at: now,
            activated_at: None,
            deactivated_at: None,
        };
        affiliate.record(
            AffiliateEventKind::AffiliateRegistered(AffiliateRegistered {
                affiliate_id: id,
                name: affiliate.name.clone(),
                email: affiliate.email.as_str().to_owned(),
                affiliate_type: affiliate.profile.affiliate_type(),
                categories: affiliate.profile.categories().to_vec(),
                registered_at: now,
            }),
            correlation_id,
            now,
        );
        Ok(affiliate)
    }

    /// Activates the affiliate.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::InvalidState` if the affiliate is already
    /// active or is suspended.
    pub fn activate(&mut self, correlation_id: Uuid, clock: &dyn Clock) -> Result<(), DomainError> {
        match self.status {
            AffiliateStatus::Active => {
                return Err(DomainError::InvalidState("affiliate is already active".into()));
            }
            AffiliateStatus::Suspended => {
                return Err(DomainError::InvalidState(
                    "a suspended affiliate cannot be activated".into(),
                ));
            }
            AffiliateStatus::Pending | AffiliateStatus::Inactive => {}
        }

        let now = clock.now();
        self.status = AffiliateStatus::Active;
        self.activated_at = Some(now);
        self.base.bump_version();
        self.record(
            AffiliateEventKind::AffiliateActivated(AffiliateActivated {
                affiliate_id: self.base.id(),
                name: self.name.clone(),
                affiliate_type: self.profile.affiliate_type(),
                activated_at: now,
            }),
            correlation_id,
            now,
        );
        Ok(())
    }

    /// Deactivates the affiliate.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::InvalidState` if the affiliate is already
    /// inactive or is suspended, `DomainError::BusinessRule` if `reason` is
    /// blank.
    pub fn deactivate(
        &mut self,
        reason: &str,
        correlation_id: Uuid,
        clock: &dyn Clock,
    ) -> Result<(), DomainError> {
        match self.status {
            AffiliateStatus::Inactive => {
                return Err(DomainError::InvalidState(
                    "affiliate is already inactive".into(),
                ));
            }
            AffiliateStatus::Suspended => {
                return Err(DomainError::InvalidState(
                    "a suspended affiliate cannot be deactivated".into(),
                ));
            }
            AffiliateStatus::Pending | AffiliateStatus::Active => {}
        }
        let reason = required_reason(reason, "deactivation")?;

        let now = clock.now();
        self.status = AffiliateStatus::Inactive;
        self.deactivated_at = Some(now);
        self.base.bump_version();
        self.record(
            AffiliateEventKind::AffiliateDeactivated(AffiliateDeactivated {
                affiliate_id: self.base.id(),
                name: self.name.clone(),
                reason,
                deactivated_at: now,
            }),
            correlation_id,
            now,
        );
        Ok(())
    }

    /// Suspends the affiliate. There is no transition out of `SUSPENDED`.
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
        if self.status == AffiliateStatus::Suspended {
            return Err(DomainError::InvalidState(
                "affiliate is already suspended".into(),
            ));
        }
        let reason = required_reason(reason, "suspension")?;

        let now = clock.now();
        self.status = AffiliateStatus::Suspended;
        self.base.bump_version();
        self.record(
            AffiliateEventKind::AffiliateSuspended(AffiliateSuspended {
                affiliate_id: self.base.id(),
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
        website: Option<&str>,
        social_links: Option<&BTreeMap<String, String>>,
        correlation_id: Uuid,
        clock: &dyn Clock,
    ) -> Result<(), DomainError> {
        let (profile, changes) = self
            .profile
            .with_changes(description, website, social_links)?;
        if changes.is_empty() {
            return Ok(());
        }

        let now = clock.now();
        self.profile = profile;
        self.base.bump_version();
        self.record(
            AffiliateEventKind::AffiliateProfileUpdated(AffiliateProfileUpdated {
                affiliate_id: self.base.id(),
                changes,
                updated_at: now,
            }),
            correlation_id,
            now,
        );
        Ok(())
    }

    /// Adds clicks, conversions and revenue to the totals. An all-zero
    /// report records nothing.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Validation` for negative revenue or totals out
    /// of range.
    pub fn record_metrics(
        &mut self,
        clicks: u64,
        conversions: u64,
        revenue: f64,
        correlation_id: Uuid,
        clock: &dyn Clock,
    ) -> Result<(), DomainError> {
        let metrics = self.metrics.accumulate(clicks, conversions, revenue)?;
        if metrics == self.metrics {
            return Ok(());
        }

        let now = clock.now();
        self.base.bump_version();
        self.record(
            AffiliateEventKind::AffiliateMetricsUpdated(AffiliateMetricsUpdated {
                affiliate_id: self.base.id(),
                clicks: metrics.clicks,
                conversions: metrics.conversions,
                revenue: metrics.revenue,
                updated_at: now,
            }),
            correlation_id,
            now,
        );
        self.metrics = metrics;
        Ok(())
    }

    /// Whether the affiliate may promote campaigns.
    #[must_use]
    pub fn can_join_campaigns(&self) -> bool {
        self.status == AffiliateStatus::Active
    }

    /// Whether the affiliate covers `category` (case-insensitive).
    #[must_use]
    pub fn handles_category(&self, category: &str) -> bool {
        self.profile.has_category(category)
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

    /// Contact phone.
    #[must_use]
    pub fn phone(&self) -> Option<&Phone> {
        self.phone.as_ref()
    }

    /// Public profile.
    #[must_use]
    pub fn profile(&self) -> &AffiliateProfile {
        &self.profile
    }

    /// Lifecycle status.
    #[must_use]
    pub fn status(&self) -> AffiliateStatus {
        self.status
    }

    /// Accumulated performance.
    #[must_use]
    pub fn metrics(&self) -> &AffiliateMetrics {
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

    fn record(&mut self, kind: AffiliateEventKind, correlation_id: Uuid, occurred_at: DateTime<Utc>) {
        let metadata = self.base.event_metadata(
            Self::AGGREGATE_TYPE,
            kind.event_type(),
            correlation_id,
            occurred_at,
        );
        self.base.record_event(AffiliateEvent { metadata, kind });
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

impl AggregateRoot for Affiliate {
    type Event = AffiliateEvent;
    const AGGREGATE_TYPE: &'static str = "affiliate";

    fn base(&self) -> &AggregateBase<AffiliateEvent> {
        &self.base
    }

    fn base_mut(&mut self) -> &mut AggregateBase<AffiliateEvent> {
        &mut self.base
    }
}

impl SnapshotAggregate for Affiliate {
    fn unique_key(&self) -> Option<String> {
        Some(self.email.as_str().to_owned())
    }
}
