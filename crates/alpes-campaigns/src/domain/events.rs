//! Domain events for the Campaigns context.

use std::collections::BTreeMap;

use alpes_core::event::{DomainEvent, EventMetadata, EventScope};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Event type for [`CampaignCreated`].
pub const CAMPAIGN_CREATED_EVENT_TYPE: &str = "CampaignCreated";
/// Event type for [`CampaignActivated`].
pub const CAMPAIGN_ACTIVATED_EVENT_TYPE: &str = "CampaignActivated";
/// Event type for [`AffiliateAssignedToCampaign`].
pub const AFFILIATE_ASSIGNED_EVENT_TYPE: &str = "AffiliateAssignedToCampaign";
/// Event type for [`CampaignPaused`].
pub const CAMPAIGN_PAUSED_EVENT_TYPE: &str = "CampaignPaused";
/// Event type for [`CampaignResumed`].
pub const CAMPAIGN_RESUMED_EVENT_TYPE: &str = "CampaignResumed";
/// Event type for [`CampaignFinished`].
pub const CAMPAIGN_FINISHED_EVENT_TYPE: &str = "CampaignFinished";
/// Event type for [`CampaignCancelled`].
pub const CAMPAIGN_CANCELLED_EVENT_TYPE: &str = "CampaignCancelled";
/// Event type for [`AffiliateRemovedFromCampaign`].
pub const AFFILIATE_REMOVED_EVENT_TYPE: &str = "AffiliateRemovedFromCampaign";
/// Event type for [`CampaignTermsUpdated`].
pub const CAMPAIGN_TERMS_UPDATED_EVENT_TYPE: &str = "CampaignTermsUpdated";
/// Event type for [`CampaignPerformanceRecorded`].
pub const CAMPAIGN_PERFORMANCE_RECORDED_EVENT_TYPE: &str = "CampaignPerformanceRecorded";

/// Emitted when a campaign is created.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CampaignCreated {
    /// The campaign identifier.
    pub campaign_id: Uuid,
    /// Campaign name.
    pub name: String,
    /// Commission type wire name.
    pub commission_type: String,
    /// Commission amount.
    pub amount: f64,
    /// Commission currency.
    pub currency: String,
    /// Categories the campaign targets.
    pub target_categories: Vec<String>,
    /// Period start.
    pub start: DateTime<Utc>,
    /// Period end, if bounded.
    pub end: Option<DateTime<Utc>>,
    /// Influencer the campaign was generated for.
    pub origin_influencer_id: Option<Uuid>,
    /// Category the campaign was generated from.
    pub origin_category: Option<String>,
}

/// Emitted when a campaign starts running.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CampaignActivated {
    /// The campaign identifier.
    pub campaign_id: Uuid,
    /// Campaign name.
    pub name: String,
    /// Activation time.
    pub activated_at: DateTime<Utc>,
}

/// Emitted when an affiliate joins a campaign.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AffiliateAssignedToCampaign {
    /// The campaign identifier.
    pub campaign_id: Uuid,
    /// The affiliate identifier.
    pub affiliate_id: String,
    /// Campaign name.
    pub campaign_name: String,
    /// Affiliate display name.
    pub affiliate_name: String,
    /// Assignment time.
    pub assigned_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CampaignPaused {
    pub campaign_id: Uuid,
    pub reason: String,
    pub paused_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CampaignResumed {
    pub campaign_id: Uuid,
    pub resumed_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CampaignFinished {
    pub campaign_id: Uuid,
    pub finished_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CampaignCancelled {
    pub campaign_id: Uuid,
    pub reason: String,
    pub cancelled_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AffiliateRemovedFromCampaign {
    pub campaign_id: Uuid,
    pub affiliate_id: String,
    pub removed_at: DateTime<Utc>,
}

/// Emitted when commission terms change. `changes` maps field names to
/// their new values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CampaignTermsUpdated {
    pub campaign_id: Uuid,
    pub changes: BTreeMap<String, String>,
    pub updated_at: DateTime<Utc>,
}

/// Emitted when performance is reported. Figures are running totals.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CampaignPerformanceRecorded {
    pub campaign_id: Uuid,
    pub clicks: u64,
    pub conversions: u64,
    pub spend: f64,
    pub revenue: f64,
    pub recorded_at: DateTime<Utc>,
}

/// Event payload variants for the Campaigns context.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum CampaignEventKind {
    /// A campaign has been created.
    CampaignCreated(CampaignCreated),
    /// A campaign has been activated.
    CampaignActivated(CampaignActivated),
    /// An affiliate joined a campaign.
    AffiliateAssignedToCampaign(AffiliateAssignedToCampaign),
    /// A campaign has been paused.
    CampaignPaused(CampaignPaused),
    /// A paused campaign has been resumed.
    CampaignResumed(CampaignResumed),
    /// A campaign has finished.
    CampaignFinished(CampaignFinished),
    /// A campaign has been cancelled.
    CampaignCancelled(CampaignCancelled),
    /// An affiliate left a campaign.
    AffiliateRemovedFromCampaign(AffiliateRemovedFromCampaign),
    /// Commission terms changed.
    CampaignTermsUpdated(CampaignTermsUpdated),
    /// Performance figures were reported.
    CampaignPerformanceRecorded(CampaignPerformanceRecorded),
}

impl CampaignEventKind {
    /// Event type discriminator.
    #[must_use]
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::CampaignCreated(_) => CAMPAIGN_CREATED_EVENT_TYPE,
            Self::CampaignActivated(_) => CAMPAIGN_ACTIVATED_EVENT_TYPE,
            Self::AffiliateAssignedToCampaign(_) => AFFILIATE_ASSIGNED_EVENT_TYPE,
            Self::CampaignPaused(_) => CAMPAIGN_PAUSED_EVENT_TYPE,
            Self::CampaignResumed(_) => CAMPAIGN_RESUMED_EVENT_TYPE,
            Self::CampaignFinished(_) => CAMPAIGN_FINISHED_EVENT_TYPE,
            Self::CampaignCancelled(_) => CAMPAIGN_CANCELLED_EVENT_TYPE,
            Self::AffiliateRemovedFromCampaign(_) => AFFILIATE_REMOVED_EVENT_TYPE,
            Self::CampaignTermsUpdated(_) => CAMPAIGN_TERMS_UPDATED_EVENT_TYPE,
            Self::CampaignPerformanceRecorded(_) => CAMPAIGN_PERFORMANCE_RECORDED_EVENT_TYPE,
        }
    }

    /// Whether the event crosses the context boundary.
    #[must_use]
    pub fn scope(&self) -> EventScope {
        match self {
            Self::CampaignCreated(_)
            | Self::CampaignActivated(_)
            | Self::AffiliateAssignedToCampaign(_) => EventScope::Integration,
            Self::CampaignPaused(_)
            | Self::CampaignResumed(_)
            | Self::CampaignFinished(_)
            | Self::CampaignCancelled(_)
            | Self::AffiliateRemovedFromCampaign(_)
            | Self::CampaignTermsUpdated(_)
            | Self::CampaignPerformanceRecorded(_) => EventScope::Domain,
        }
    }
}

/// Domain event envelope for the Campaigns context.
#[derive(Debug, Clone)]
pub struct CampaignEvent {
    /// Event metadata.
    pub metadata: EventMetadata,
    /// Event-specific payload.
    pub kind: CampaignEventKind,
}

impl DomainEvent for CampaignEvent {
    fn event_type(&self) -> &'static str {
        self.kind.event_type()
    }

    fn scope(&self) -> EventScope {
        self.kind.scope()
    }

    fn to_payload(&self) -> serde_json::Value {
        // Serialization of derived Serialize types to Value is infallible.
        let payload = match &self.kind {
            CampaignEventKind::CampaignCreated(e) => serde_json::to_value(e),
            CampaignEventKind::CampaignActivated(e) => serde_json::to_value(e),
            CampaignEventKind::AffiliateAssignedToCampaign(e) => serde_json::to_value(e),
            CampaignEventKind::CampaignPaused(e) => serde_json::to_value(e),
            CampaignEventKind::CampaignResumed(e) => serde_json::to_value(e),
            CampaignEventKind::CampaignFinished(e) => serde_json::to_value(e),
            CampaignEventKind::CampaignCancelled(e) => serde_json::to_value(e),
            CampaignEventKind::AffiliateRemovedFromCampaign(e) => serde_json::to_value(e),
            CampaignEventKind::CampaignTermsUpdated(e) => serde_json::to_value(e),
            CampaignEventKind::CampaignPerformanceRecorded(e) => serde_json::to_value(e),
        };
        payload.expect("CampaignEventKind serialization is infallible")
    }

    fn metadata(&self) -> &EventMetadata {
        &self.metadata
    }
}
