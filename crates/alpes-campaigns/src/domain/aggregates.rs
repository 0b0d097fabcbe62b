//! Aggregate roots for the Campaigns context.

use std::collections::{BTreeMap, BTreeSet};

use alpes_core::aggregate::{AggregateBase, AggregateRoot};
use alpes_core::clock::Clock;
use alpes_core::error::DomainError;
use alpes_core::repository::SnapshotAggregate;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::events::{
    AffiliateAssignedToCampaign, AffiliateRemovedFromCampaign, CampaignActivated,
    CampaignCancelled, CampaignCreated, CampaignEvent, CampaignEventKind, CampaignFinished,
    CampaignPaused, CampaignPerformanceRecorded, CampaignResumed, CampaignTermsUpdated,
};
use super::values::{
    AffiliateCriteria, CampaignMetrics, CampaignPeriod, CampaignStatus, CommissionTerms,
    OriginReference, PromotionalMaterial,
};

/// Everything needed to create a campaign.
#[derive(Debug, Clone)]
pub struct CampaignDraft {
    /// Campaign name; unique within the context.
    pub name: String,
    /// Campaign description.
    pub description: String,
    /// Commission paid to affiliates.
    pub terms: CommissionTerms,
    /// When the campaign may run.
    pub period: CampaignPeriod,
    /// Material handed to affiliates.
    pub material: PromotionalMaterial,
    /// Who may be assigned.
    pub criteria: AffiliateCriteria,
    /// Influencer and category the campaign was generated from.
    pub origin: Option<OriginReference>,
}

/// A commission-based promotion that affiliates can be assigned to.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Campaign {
    #[serde(flatten)]
    base: AggregateBase<CampaignEvent>,
    name: String,
    description: String,
    terms: CommissionTerms,
    period: CampaignPeriod,
    material: PromotionalMaterial,
    criteria: AffiliateCriteria,
    status: CampaignStatus,
    affiliates: BTreeSet<String>,
    metrics: CampaignMetrics,
    origin: Option<OriginReference>,
    created_at: DateTime<Utc>,
    activated_at: Option<DateTime<Utc>>,
    finished_at: Option<DateTime<Utc>>,
}

impl Campaign {
    /// Normalized form of a campaign name, used as its uniqueness key.
    #[must_use]
    pub fn name_key(name: &str) -> String {
        name.trim().to_lowercase()
    }

    /// Creates a campaign in `DRAFT` and records `CampaignCreated`.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Validation` if the name or description is blank.
    pub fn create(
        id: Uuid,
        draft: CampaignDraft,
        correlation_id: Uuid,
        clock: &dyn Clock,
    ) -> Result<Self, DomainError> {
        let name = draft.name.trim();
        if name.is_empty() {
            return Err(DomainError::Validation(
                "campaign name must not be empty".into(),
            ));
        }
        let description = draft.description.trim();
        if description.is_empty() {
            return Err(DomainError::Validation(
                "campaign description must not be empty".into(),
            ));
        }

        let now = clock.now();
        let mut campaign = Self {
            base: AggregateBase::new(id),
            name: name.to_owned(),
            description: description.to_owned(),
            terms: draft.terms,
            period: draft.period,
            material: draft.material,
            criteria: draft.criteria,
            status: CampaignStatus::Draft,
            affiliates: BTreeSet::new(),
            metrics: CampaignMetrics::default(),
            origin: draft.origin,
            created_at: now,
            activated_at: None,
            finished_at: None,
        };
        campaign.record(
            CampaignEventKind::CampaignCreated(CampaignCreated {
                campaign_id: id,
                name: campaign.name.clone(),
                commission_type: campaign.terms.commission_type().as_str().to_owned(),
                amount: campaign.terms.amount(),
                currency: campaign.terms.currency().to_owned(),
                target_categories: campaign.criteria.required_categories().to_vec(),
                start: campaign.period.start(),
                end: campaign.period.end(),
                origin_influencer_id: campaign.origin.as_ref().map(|o| o.influencer_id),
                origin_category: campaign.origin.as_ref().map(|o| o.category.clone()),
            }),
            correlation_id,
            now,
        );
        Ok(campaign)
    }

    /// Starts the campaign.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::InvalidState` if the campaign is already active
    /// or terminal, `DomainError::BusinessRule` if now is outside its period.
    pub fn activate(&mut self, correlation_id: Uuid, clock: &dyn Clock) -> Result<(), DomainError> {
        match self.status {
            CampaignStatus::Active => {
                return Err(DomainError::InvalidState("campaign is already active".into()));
            }
            CampaignStatus::Finished | CampaignStatus::Cancelled => {
                return Err(DomainError::InvalidState(format!(
                    "a {} campaign cannot be activated",
                    self.status
                )));
            }
            CampaignStatus::Draft | CampaignStatus::Paused => {}
        }
        let now = clock.now();
        self.ensure_within_period(now)?;

        self.status = CampaignStatus::Active;
        self.activated_at = Some(now);
        self.base.bump_version();
        self.record(
            CampaignEventKind::CampaignActivated(CampaignActivated {
                campaign_id: self.base.id(),
                name: self.name.clone(),
                activated_at: now,
            }),
            correlation_id,
            now,
        );
        Ok(())
    }

    /// Pauses a running campaign. The reason is checked before the state.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::BusinessRule` if `reason` is blank,
    /// `DomainError::InvalidState` if the campaign is not active.
    pub fn pause(
        &mut self,
        reason: &str,
        correlation_id: Uuid,
        clock: &dyn Clock,
    ) -> Result<(), DomainError> {
        let reason = required_reason(reason, "pause")?;
        if self.status != CampaignStatus::Active {
            return Err(DomainError::InvalidState(format!(
                "only an active campaign can be paused, campaign is {}",
                self.status
            )));
        }

        let now = clock.now();
        self.status = CampaignStatus::Paused;
        self.base.bump_version();
        self.record(
            CampaignEventKind::CampaignPaused(CampaignPaused {
                campaign_id: self.base.id(),
                reason,
                paused_at: now,
            }),
            correlation_id,
            now,
        );
        Ok(())
    }

    /// Resumes a paused campaign.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::InvalidState` if the campaign is not paused,
    /// `DomainError::BusinessRule` if now is outside its period.
    pub fn resume(&mut self, correlation_id: Uuid, clock: &dyn Clock) -> Result<(), DomainError> {
        if self.status != CampaignStatus::Paused {
            return Err(DomainError::InvalidState(format!(
                "only a paused campaign can be resumed, campaign is {}",
                self.status
            )));
        }
        let now = clock.now();
        self.ensure_within_period(now)?;

        self.status = CampaignStatus::Active;
        self.base.bump_version();
        self.record(
            CampaignEventKind::CampaignResumed(CampaignResumed {
                campaign_id: self.base.id(),
                resumed_at: now,
            }),
            correlation_id,
            now,
        );
        Ok(())
    }

    /// Finishes the campaign.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::InvalidState` if the campaign is already
    /// finished or cancelled.
    pub fn finish(&mut self, correlation_id: Uuid, clock: &dyn Clock) -> Result<(), DomainError> {
        self.ensure_not_terminal("finished")?;

        let now = clock.now();
        self.status = CampaignStatus::Finished;
        self.finished_at = Some(now);
        self.base.bump_version();
        self.record(
            CampaignEventKind::CampaignFinished(CampaignFinished {
                campaign_id: self.base.id(),
                finished_at: now,
            }),
            correlation_id,
            now,
        );
        Ok(())
    }

    /// Cancels the campaign.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::BusinessRule` if `reason` is blank,
    /// `DomainError::InvalidState` if the campaign is already terminal.
    pub fn cancel(
        &mut self,
        reason: &str,
        correlation_id: Uuid,
        clock: &dyn Clock,
    ) -> Result<(), DomainError> {
        let reason = required_reason(reason, "cancellation")?;
        self.ensure_not_terminal("cancelled")?;

        let now = clock.now();
        self.status = CampaignStatus::Cancelled;
        self.finished_at = Some(now);
        self.base.bump_version();
        self.record(
            CampaignEventKind::CampaignCancelled(CampaignCancelled {
                campaign_id: self.base.id(),
                reason,
                cancelled_at: now,
            }),
            correlation_id,
            now,
        );
        Ok(())
    }

    /// Assigns an affiliate to a running campaign.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Validation` if the affiliate id is blank,
    /// `DomainError::InvalidState` if the campaign is not active,
    /// `DomainError::BusinessRule` if the affiliate is already assigned.
    pub fn assign_affiliate(
        &mut self,
        affiliate_id: &str,
        affiliate_name: &str,
        correlation_id: Uuid,
        clock: &dyn Clock,
    ) -> Result<(), DomainError> {
        let affiliate_id = affiliate_id.trim();
        if affiliate_id.is_empty() {
            return Err(DomainError::Validation(
                "affiliate id must not be empty".into(),
            ));
        }
        if self.status != CampaignStatus::Active {
            return Err(DomainError::InvalidState(format!(
                "affiliates can only join an active campaign, campaign is {}",
                self.status
            )));
        }
        if self.affiliates.contains(affiliate_id) {
            return Err(DomainError::BusinessRule(format!(
                "affiliate '{affiliate_id}' is already assigned to this campaign"
            )));
        }

        let now = clock.now();
        self.affiliates.insert(affiliate_id.to_owned());
        self.recount_affiliates();
        self.base.bump_version();
        self.record(
            CampaignEventKind::AffiliateAssignedToCampaign(AffiliateAssignedToCampaign {
                campaign_id: self.base.id(),
                affiliate_id: affiliate_id.to_owned(),
                campaign_name: self.name.clone(),
                affiliate_name: affiliate_name.trim().to_owned(),
                assigned_at: now,
            }),
            correlation_id,
            now,
        );
        Ok(())
    }

    /// Removes an assigned affiliate.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::BusinessRule` if the affiliate is not assigned.
    pub fn remove_affiliate(
        &mut self,
        affiliate_id: &str,
        correlation_id: Uuid,
        clock: &dyn Clock,
    ) -> Result<(), DomainError> {
        let affiliate_id = affiliate_id.trim();
        if !self.affiliates.remove(affiliate_id) {
            return Err(DomainError::BusinessRule(format!(
                "affiliate '{affiliate_id}' is not assigned to this campaign"
            )));
        }

        let now = clock.now();
        self.recount_affiliates();
        self.base.bump_version();
        self.record(
            CampaignEventKind::AffiliateRemovedFromCampaign(AffiliateRemovedFromCampaign {
                campaign_id: self.base.id(),
                affiliate_id: affiliate_id.to_owned(),
                removed_at: now,
            }),
            correlation_id,
            now,
        );
        Ok(())
    }

    /// Changes the commission amount or description. Nothing is recorded
    /// when neither changes.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::InvalidState` for a finished campaign,
    /// `DomainError::Validation` if the amount is not positive.
    pub fn update_terms(
        &mut self,
        amount: Option<f64>,
        description: Option<&str>,
        correlation_id: Uuid,
        clock: &dyn Clock,
    ) -> Result<(), DomainError> {
        if self.status == CampaignStatus::Finished {
            return Err(DomainError::InvalidState(
                "terms of a finished campaign cannot change".into(),
            ));
        }

        let new_amount = amount.unwrap_or(self.terms.amount());
        let new_description = match description {
            Some(d) => Some(d),
            None => self.terms.description(),
        };
        let terms = CommissionTerms::new(
            self.terms.commission_type(),
            new_amount,
            self.terms.currency(),
            new_description,
        )?;

        let mut changes = BTreeMap::new();
        if (terms.amount() - self.terms.amount()).abs() > f64::EPSILON {
            changes.insert("amount".to_owned(), terms.amount().to_string());
        }
        if terms.description() != self.terms.description() {
            changes.insert(
                "description".to_owned(),
                terms.description().unwrap_or_default().to_owned(),
            );
        }
        if changes.is_empty() {
            return Ok(());
        }

        let now = clock.now();
        self.terms = terms;
        self.base.bump_version();
        self.record(
            CampaignEventKind::CampaignTermsUpdated(CampaignTermsUpdated {
                campaign_id: self.base.id(),
                changes,
                updated_at: now,
            }),
            correlation_id,
            now,
        );
        Ok(())
    }

    /// Adds reported figures to the running performance totals.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::InvalidState` for a cancelled campaign,
    /// `DomainError::Validation` if spend or revenue is negative or a
    /// counter would overflow.
    pub fn record_performance(
        &mut self,
        clicks: u64,
        conversions: u64,
        spend: f64,
        revenue: f64,
        correlation_id: Uuid,
        clock: &dyn Clock,
    ) -> Result<(), DomainError> {
        if self.status == CampaignStatus::Cancelled {
            return Err(DomainError::InvalidState(
                "a cancelled campaign does not record performance".into(),
            ));
        }
        if [spend, revenue].iter().any(|v| !v.is_finite() || *v < 0.0) {
            return Err(DomainError::Validation(
                "spend and revenue must be non-negative numbers".into(),
            ));
        }

        let (Some(total_clicks), Some(total_conversions)) = (
            self.metrics.clicks.checked_add(clicks),
            self.metrics.conversions.checked_add(conversions),
        ) else {
            return Err(DomainError::Validation(
                "click and conversion totals are out of range".into(),
            ));
        };

        let now = clock.now();
        self.metrics.clicks = total_clicks;
        self.metrics.conversions = total_conversions;
        self.metrics.spend += spend;
        self.metrics.revenue += revenue;
        self.base.bump_version();
        self.record(
            CampaignEventKind::CampaignPerformanceRecorded(CampaignPerformanceRecorded {
                campaign_id: self.base.id(),
                clicks: self.metrics.clicks,
                conversions: self.metrics.conversions,
                spend: self.metrics.spend,
                revenue: self.metrics.revenue,
                recorded_at: now,
            }),
            correlation_id,
            now,
        );
        Ok(())
    }

    /// Whether an affiliate of `affiliate_type` covering `categories` may
    /// join right now.
    #[must_use]
    pub fn can_accept_affiliate(&self, categories: &[String], affiliate_type: &str) -> bool {
        self.status == CampaignStatus::Active && self.criteria.accepts(categories, affiliate_type)
    }

    /// Whether `affiliate_id` is assigned.
    #[must_use]
    pub fn has_affiliate(&self, affiliate_id: &str) -> bool {
        self.affiliates.contains(affiliate_id.trim())
    }

    /// Campaign name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Campaign description.
    #[must_use]
    pub fn description(&self) -> &str {
        &self.description
    }

    /// Commission terms.
    #[must_use]
    pub fn terms(&self) -> &CommissionTerms {
        &self.terms
    }

    /// Running period.
    #[must_use]
    pub fn period(&self) -> &CampaignPeriod {
        &self.period
    }

    /// Promotional material.
    #[must_use]
    pub fn material(&self) -> &PromotionalMaterial {
        &self.material
    }

    /// Affiliate criteria.
    #[must_use]
    pub fn criteria(&self) -> &AffiliateCriteria {
        &self.criteria
    }

    /// Lifecycle status.
    #[must_use]
    pub fn status(&self) -> CampaignStatus {
        self.status
    }

    /// Assigned affiliate ids, sorted.
    #[must_use]
    pub fn affiliates(&self) -> &BTreeSet<String> {
        &self.affiliates
    }

    /// Performance totals.
    #[must_use]
    pub fn metrics(&self) -> &CampaignMetrics {
        &self.metrics
    }

    /// Generation origin, if the campaign came from a blueprint.
    #[must_use]
    pub fn origin(&self) -> Option<&OriginReference> {
        self.origin.as_ref()
    }

    /// Creation time.
    #[must_use]
    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Last activation time.
    #[must_use]
    pub fn activated_at(&self) -> Option<DateTime<Utc>> {
        self.activated_at
    }

    /// When the campaign finished or was cancelled.
    #[must_use]
    pub fn finished_at(&self) -> Option<DateTime<Utc>> {
        self.finished_at
    }

    fn ensure_within_period(&self, now: DateTime<Utc>) -> Result<(), DomainError> {
        if self.period.contains(now) {
            Ok(())
        } else {
            Err(DomainError::BusinessRule(format!(
                "campaign '{}' is outside its running period",
                self.name
            )))
        }
    }

    fn ensure_not_terminal(&self, target: &str) -> Result<(), DomainError> {
        if self.status.is_terminal() {
            return Err(DomainError::InvalidState(format!(
                "a {} campaign cannot be {target}",
                self.status
            )));
        }
        Ok(())
    }

    fn recount_affiliates(&mut self) {
        self.metrics.assigned_affiliates =
            u32::try_from(self.affiliates.len()).unwrap_or(u32::MAX);
    }

    fn record(&mut self, kind: CampaignEventKind, correlation_id: Uuid, occurred_at: DateTime<Utc>) {
        let metadata = self.base.event_metadata(
            Self::AGGREGATE_TYPE,
            kind.event_type(),
            correlation_id,
            occurred_at,
        );
        self.base.record_event(CampaignEvent { metadata, kind });
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

impl AggregateRoot for Campaign {
    type Event = CampaignEvent;
    const AGGREGATE_TYPE: &'static str = "campaign";

    fn base(&self) -> &AggregateBase<CampaignEvent> {
        &self.base
    }

    fn base_mut(&mut self) -> &mut AggregateBase<CampaignEvent> {
        &mut self.base
    }
}

impl SnapshotAggregate for Campaign {
    fn unique_key(&self) -> Option<String> {
        Some(Self::name_key(&self.name))
    }
}

#[cfg(test)]
mod tests {
    use alpes_core::event::{DomainEvent, EventScope};
    use alpes_test_support::{FixedClock, fixed_clock};
    use chrono::Duration;

    use super::*;
    use crate::domain::events::{
        AFFILIATE_ASSIGNED_EVENT_TYPE, CAMPAIGN_ACTIVATED_EVENT_TYPE, CAMPAIGN_CREATED_EVENT_TYPE,
    };
    use crate::domain::values::CommissionType;

    fn draft(clock: &FixedClock) -> CampaignDraft {
        CampaignDraft {
            name: "Fitness Revolution - Ana".to_owned(),
            description: "Train with Ana".to_owned(),
            terms: CommissionTerms::new(CommissionType::Cpa, 40.0, "USD", None).unwrap(),
            period: CampaignPeriod::new(clock.0, Some(clock.0 + Duration::days(90))).unwrap(),
            material: PromotionalMaterial::default(),
            criteria: AffiliateCriteria::new(
                &["influencer".to_owned()],
                &["fitness".to_owned()],
                &[],
                None,
                None,
            ),
            origin: None,
        }
    }

    fn active_campaign(clock: &FixedClock) -> Campaign {
        let mut campaign = Campaign::create(Uuid::new_v4(), draft(clock), Uuid::new_v4(), clock)
            .unwrap();
        campaign.activate(Uuid::new_v4(), clock).unwrap();
        campaign.clear_events();
        campaign
    }

    #[test]
    fn test_create_starts_in_draft_with_created_event() {
        // Arrange
        let clock = fixed_clock();

        // Act
        let campaign =
            Campaign::create(Uuid::new_v4(), draft(&clock), Uuid::new_v4(), &clock).unwrap();

        // Assert
        assert_eq!(campaign.status(), CampaignStatus::Draft);
        assert_eq!(campaign.version(), 1);
        assert_eq!(campaign.pending_events().len(), 1);
        let event = &campaign.pending_events()[0];
        assert_eq!(event.event_type(), CAMPAIGN_CREATED_EVENT_TYPE);
        assert_eq!(event.scope(), EventScope::Integration);
        assert_eq!(event.to_payload()["commission_type"], "CPA");
        assert_eq!(event.to_payload()["target_categories"][0], "fitness");
    }

    #[test]
    fn test_create_rejects_blank_description() {
        let clock = fixed_clock();
        let mut draft = draft(&clock);
        draft.description = " ".to_owned();

        let result = Campaign::create(Uuid::new_v4(), draft, Uuid::new_v4(), &clock);

        assert!(matches!(result, Err(DomainError::Validation(_))));
    }

    #[test]
    fn test_activate_outside_period_is_a_business_rule_violation() {
        // Arrange
        let clock = fixed_clock();
        let mut campaign =
            Campaign::create(Uuid::new_v4(), draft(&clock), Uuid::new_v4(), &clock).unwrap();
        let later = FixedClock(clock.0 + Duration::days(91));

        // Act
        let result = campaign.activate(Uuid::new_v4(), &later);

        // Assert
        assert!(matches!(result, Err(DomainError::BusinessRule(_))));
        assert_eq!(campaign.status(), CampaignStatus::Draft);
        assert_eq!(campaign.version(), 1);
    }

    #[test]
    fn test_activate_records_event_and_bumps_version() {
        let clock = fixed_clock();
        let mut campaign =
            Campaign::create(Uuid::new_v4(), draft(&clock), Uuid::new_v4(), &clock).unwrap();

        campaign.activate(Uuid::new_v4(), &clock).unwrap();

        assert_eq!(campaign.status(), CampaignStatus::Active);
        assert_eq!(campaign.version(), 2);
        assert_eq!(
            campaign.pending_events()[1].event_type(),
            CAMPAIGN_ACTIVATED_EVENT_TYPE
        );
    }

    #[test]
    fn test_pause_with_blank_reason_fails_in_any_state() {
        // Arrange
        let clock = fixed_clock();
        let draft_campaign =
            Campaign::create(Uuid::new_v4(), draft(&clock), Uuid::new_v4(), &clock).unwrap();
        let mut finished = active_campaign(&clock);
        finished.finish(Uuid::new_v4(), &clock).unwrap();

        // Act / Assert
        for mut campaign in [draft_campaign, active_campaign(&clock), finished] {
            let version = campaign.version();
            let result = campaign.pause("", Uuid::new_v4(), &clock);
            assert!(matches!(result, Err(DomainError::BusinessRule(_))));
            assert_eq!(campaign.version(), version);
        }
    }

    #[test]
    fn test_pause_requires_active_campaign() {
        let clock = fixed_clock();
        let mut campaign =
            Campaign::create(Uuid::new_v4(), draft(&clock), Uuid::new_v4(), &clock).unwrap();

        let result = campaign.pause("budget review", Uuid::new_v4(), &clock);

        assert!(matches!(result, Err(DomainError::InvalidState(_))));
    }

    #[test]
    fn test_pause_and_resume_round_trip_through_paused() {
        // Arrange
        let clock = fixed_clock();
        let mut campaign = active_campaign(&clock);

        // Act
        campaign.pause("budget review", Uuid::new_v4(), &clock).unwrap();
        let paused = campaign.status();
        campaign.resume(Uuid::new_v4(), &clock).unwrap();

        // Assert
        assert_eq!(paused, CampaignStatus::Paused);
        assert_eq!(campaign.status(), CampaignStatus::Active);
        assert_eq!(campaign.version(), 4);
        assert_eq!(campaign.pending_events().len(), 2);
    }

    #[test]
    fn test_assigning_same_affiliate_twice_fails() {
        // Arrange
        let clock = fixed_clock();
        let mut campaign = active_campaign(&clock);
        campaign
            .assign_affiliate("aff-1", "Bob", Uuid::new_v4(), &clock)
            .unwrap();

        // Act
        let result = campaign.assign_affiliate(" aff-1 ", "Bob", Uuid::new_v4(), &clock);

        // Assert
        assert!(matches!(result, Err(DomainError::BusinessRule(_))));
        assert_eq!(campaign.metrics().assigned_affiliates, 1);
        assert_eq!(campaign.pending_events().len(), 1);
        assert_eq!(
            campaign.pending_events()[0].event_type(),
            AFFILIATE_ASSIGNED_EVENT_TYPE
        );
    }

    #[test]
    fn test_draft_campaign_rejects_affiliates() {
        let clock = fixed_clock();
        let mut campaign =
            Campaign::create(Uuid::new_v4(), draft(&clock), Uuid::new_v4(), &clock).unwrap();

        let result = campaign.assign_affiliate("aff-1", "Bob", Uuid::new_v4(), &clock);

        assert!(matches!(result, Err(DomainError::InvalidState(_))));
        assert!(campaign.affiliates().is_empty());
    }

    #[test]
    fn test_remove_unknown_affiliate_fails() {
        let clock = fixed_clock();
        let mut campaign = active_campaign(&clock);

        let result = campaign.remove_affiliate("ghost", Uuid::new_v4(), &clock);

        assert!(matches!(result, Err(DomainError::BusinessRule(_))));
    }

    #[test]
    fn test_remove_affiliate_updates_count() {
        let clock = fixed_clock();
        let mut campaign = active_campaign(&clock);
        campaign.assign_affiliate("aff-1", "Bob", Uuid::new_v4(), &clock).unwrap();
        campaign.assign_affiliate("aff-2", "Eve", Uuid::new_v4(), &clock).unwrap();

        campaign.remove_affiliate("aff-1", Uuid::new_v4(), &clock).unwrap();

        assert_eq!(campaign.metrics().assigned_affiliates, 1);
        assert!(campaign.has_affiliate("aff-2"));
        assert!(!campaign.has_affiliate("aff-1"));
    }

    #[test]
    fn test_terminal_states_reject_lifecycle_changes() {
        // Arrange
        let clock = fixed_clock();
        let mut campaign = active_campaign(&clock);
        campaign.cancel("brand withdrew", Uuid::new_v4(), &clock).unwrap();
        let version = campaign.version();

        // Act
        let activate = campaign.activate(Uuid::new_v4(), &clock);
        let finish = campaign.finish(Uuid::new_v4(), &clock);
        let cancel = campaign.cancel("again", Uuid::new_v4(), &clock);
        let record = campaign.record_performance(1, 0, 0.0, 0.0, Uuid::new_v4(), &clock);

        // Assert
        assert!(matches!(activate, Err(DomainError::InvalidState(_))));
        assert!(matches!(finish, Err(DomainError::InvalidState(_))));
        assert!(matches!(cancel, Err(DomainError::InvalidState(_))));
        assert!(matches!(record, Err(DomainError::InvalidState(_))));
        assert_eq!(campaign.version(), version);
    }

    #[test]
    fn test_update_terms_records_only_changes() {
        // Arrange
        let clock = fixed_clock();
        let mut campaign = active_campaign(&clock);

        // Act
        campaign
            .update_terms(Some(40.0), None, Uuid::new_v4(), &clock)
            .unwrap();
        let after_noop = campaign.version();
        campaign
            .update_terms(Some(55.5), Some("per signup"), Uuid::new_v4(), &clock)
            .unwrap();

        // Assert
        assert_eq!(after_noop, 2);
        assert_eq!(campaign.version(), 3);
        assert!((campaign.terms().amount() - 55.5).abs() < f64::EPSILON);
        let payload = campaign.pending_events()[0].to_payload();
        assert_eq!(payload["changes"]["amount"], "55.5");
        assert_eq!(payload["changes"]["description"], "per signup");
    }

    #[test]
    fn test_update_terms_rejects_non_positive_amount_and_finished_campaigns() {
        let clock = fixed_clock();
        let mut campaign = active_campaign(&clock);

        let zero = campaign.update_terms(Some(0.0), None, Uuid::new_v4(), &clock);
        campaign.finish(Uuid::new_v4(), &clock).unwrap();
        let finished = campaign.update_terms(Some(10.0), None, Uuid::new_v4(), &clock);

        assert!(matches!(zero, Err(DomainError::Validation(_))));
        assert!(matches!(finished, Err(DomainError::InvalidState(_))));
    }

    #[test]
    fn test_record_performance_accumulates_totals() {
        let clock = fixed_clock();
        let mut campaign = active_campaign(&clock);

        campaign.record_performance(100, 4, 20.0, 160.0, Uuid::new_v4(), &clock).unwrap();
        campaign.record_performance(50, 1, 5.0, 40.0, Uuid::new_v4(), &clock).unwrap();

        assert_eq!(campaign.metrics().clicks, 150);
        assert_eq!(campaign.metrics().conversions, 5);
        assert!((campaign.metrics().revenue - 200.0).abs() < f64::EPSILON);
        assert_eq!(campaign.pending_events()[1].to_payload()["clicks"], 150);
    }

    #[test]
    fn test_record_performance_rejects_counter_overflow() {
        // Arrange
        let clock = fixed_clock();
        let mut campaign = active_campaign(&clock);
        campaign
            .record_performance(u64::MAX, u64::MAX - 1, 0.0, 0.0, Uuid::new_v4(), &clock)
            .unwrap();
        let version = campaign.version();

        // Act
        let clicks = campaign.record_performance(1, 0, 0.0, 0.0, Uuid::new_v4(), &clock);
        let conversions = campaign.record_performance(0, 2, 0.0, 0.0, Uuid::new_v4(), &clock);
        let last = campaign.record_performance(0, 1, 0.0, 0.0, Uuid::new_v4(), &clock);

        // Assert
        assert!(matches!(clicks, Err(DomainError::Validation(_))));
        assert!(matches!(conversions, Err(DomainError::Validation(_))));
        assert!(last.is_ok());
        assert_eq!(campaign.metrics().clicks, u64::MAX);
        assert_eq!(campaign.metrics().conversions, u64::MAX);
        assert_eq!(campaign.version(), version + 1);
    }

    #[test]
    fn test_can_accept_affiliate_requires_active_status_and_matching_criteria() {
        let clock = fixed_clock();
        let draft_campaign =
            Campaign::create(Uuid::new_v4(), draft(&clock), Uuid::new_v4(), &clock).unwrap();
        let active = active_campaign(&clock);
        let fitness = vec!["fitness".to_owned()];

        assert!(!draft_campaign.can_accept_affiliate(&fitness, "influencer"));
        assert!(active.can_accept_affiliate(&fitness, "influencer"));
        assert!(!active.can_accept_affiliate(&fitness, "gamer"));
        assert!(!active.can_accept_affiliate(&["moda".to_owned()], "influencer"));
    }

    #[test]
    fn test_unique_key_is_normalized_name() {
        let clock = fixed_clock();
        let campaign =
            Campaign::create(Uuid::new_v4(), draft(&clock), Uuid::new_v4(), &clock).unwrap();

        assert_eq!(
            campaign.unique_key().as_deref(),
            Some("fitness revolution - ana")
        );
    }
}
