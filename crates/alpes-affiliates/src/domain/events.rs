//! Domain events for the Affiliates context.
//!
//! As in every context, the payload of an event is the flat inner struct.

use std::collections::BTreeMap;

use alpes_core::event::{DomainEvent, EventMetadata, EventScope};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::values::AffiliateType;

/// Event type for [`AffiliateRegistered`].
pub const AFFILIATE_REGISTERED_EVENT_TYPE: &str = "AffiliateRegistered";
/// Event type for [`AffiliateActivated`].
pub const AFFILIATE_ACTIVATED_EVENT_TYPE: &str = "AffiliateActivated";
/// Event type for [`AffiliateDeactivated`].
pub const AFFILIATE_DEACTIVATED_EVENT_TYPE: &str = "AffiliateDeactivated";
/// Event type for [`AffiliateSuspended`].
pub const AFFILIATE_SUSPENDED_EVENT_TYPE: &str = "AffiliateSuspended";
/// Event type for [`AffiliateProfileUpdated`].
pub const AFFILIATE_PROFILE_UPDATED_EVENT_TYPE: &str = "AffiliateProfileUpdated";
/// Event type for [`AffiliateMetricsUpdated`].
pub const AFFILIATE_METRICS_UPDATED_EVENT_TYPE: &str = "AffiliateMetricsUpdated";

/// Emitted when an affiliate registers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AffiliateRegistered {
    /// The affiliate identifier.
    pub affiliate_id: Uuid,
    /// Display name.
    pub name: String,
    /// Normalized email.
    pub email: String,
    /// Kind of partner.
    pub affiliate_type: AffiliateType,
    /// Profile categories.
    pub categories: Vec<String>,
    /// Registration time.
    pub registered_at: DateTime<Utc>,
}

/// Emitted when an affiliate is activated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AffiliateActivated {
    /// The affiliate identifier.
    pub affiliate_id: Uuid,
    /// Display name.
    pub name: String,
    /// Kind of partner.
    pub affiliate_type: AffiliateType,
    /// Activation time.
    pub activated_at: DateTime<Utc>,
}

/// Emitted when an affiliate is deactivated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AffiliateDeactivated {
    /// The affiliate identifier.
    pub affiliate_id: Uuid,
    /// Display name.
    pub name: String,
    /// Why the affiliate was deactivated.
    pub reason: String,
    /// Deactivation time.
    pub deactivated_at: DateTime<Utc>,
}

/// Emitted when an affiliate is suspended.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AffiliateSuspended {
    /// The affiliate identifier.
    pub affiliate_id: Uuid,
    /// Why the affiliate was suspended.
    pub reason: String,
    /// Suspension time.
    pub suspended_at: DateTime<Utc>,
}

/// Emitted when profile fields change.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AffiliateProfileUpdated {
    /// The affiliate identifier.
    pub affiliate_id: Uuid,
    /// Changed field names mapped to their new values.
    pub changes: BTreeMap<String, String>,
    /// Update time.
    pub updated_at: DateTime<Utc>,
}

/// Emitted when performance figures are recorded. Carries the new totals.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AffiliateMetricsUpdated {
    /// The affiliate identifier.
    pub affiliate_id: Uuid,
    /// Total clicks.
    pub clicks: u64,
    /// Total conversions.
    pub conversions: u64,
    /// Total revenue.
    pub revenue: f64,
    /// Update time.
    pub updated_at: DateTime<Utc>,
}

/// Event payload variants for the Affiliates context.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum AffiliateEventKind {
    /// An affiliate has registered.
    AffiliateRegistered(AffiliateRegistered),
    /// An affiliate has been activated.
    AffiliateActivated(AffiliateActivated),
    /// An affiliate has been deactivated.
    AffiliateDeactivated(AffiliateDeactivated),
    /// An affiliate has been suspended.
    AffiliateSuspended(AffiliateSuspended),
    /// Profile fields changed.
    AffiliateProfileUpdated(AffiliateProfileUpdated),
    /// Performance figures were recorded.
    AffiliateMetricsUpdated(AffiliateMetricsUpdated),
}

impl AffiliateEventKind {
    /// Event type discriminator.
    #[must_use]
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::AffiliateRegistered(_) => AFFILIATE_REGISTERED_EVENT_TYPE,
            Self::AffiliateActivated(_) => AFFILIATE_ACTIVATED_EVENT_TYPE,
            Self::AffiliateDeactivated(_) => AFFILIATE_DEACTIVATED_EVENT_TYPE,
            Self::AffiliateSuspended(_) => AFFILIATE_SUSPENDED_EVENT_TYPE,
            Self::AffiliateProfileUpdated(_) => AFFILIATE_PROFILE_UPDATED_EVENT_TYPE,
            Self::AffiliateMetricsUpdated(_) => AFFILIATE_METRICS_UPDATED_EVENT_TYPE,
        }
    }

    /// Whether the event crosses the context boundary.
    #[must_use]
    pub fn scope(&self) -> EventScope {
        match self {
            Self::AffiliateRegistered(_)
            | Self::AffiliateActivated(_)
            | Self::AffiliateDeactivated(_) => EventScope::Integration,
            Self::AffiliateSuspended(_)
            | Self::AffiliateProfileUpdated(_)
            | Self::AffiliateMetricsUpdated(_) => EventScope::Domain,
        }
    }
}

/// Domain event envelope for the Affiliates context.
#[derive(Debug, Clone)]
pub struct AffiliateEvent {
    /// Event metadata.
    pub metadata: EventMetadata,
    /// Event-specific payload.
    pub kind: AffiliateEventKind,
}

impl DomainEvent for AffiliateEvent {
    fn event_type(&self) -> &'static str {
        self.kind.event_type()
    }

    fn scope(&self) -> EventScope {
        self.kind.scope()
    }

    fn to_payload(&self) -> serde_json::Value {
        // Serialization of derived Serialize types to Value is infallible.
        let payload = match &self.kind {
            AffiliateEventKind::AffiliateRegistered(e) => serde_json::to_value(e),
            AffiliateEventKind::AffiliateActivated(e) => serde_json::to_value(e),
            AffiliateEventKind::AffiliateDeactivated(e) => serde_json::to_value(e),
            AffiliateEventKind::AffiliateSuspended(e) => serde_json::to_value(e),
            AffiliateEventKind::AffiliateProfileUpdated(e) => serde_json::to_value(e),
            AffiliateEventKind::AffiliateMetricsUpdated(e) => serde_json::to_value(e),
        };
        payload.expect("AffiliateEventKind serialization is infallible")
    }

    fn metadata(&self) -> &EventMetadata {
        &self.metadata
    }
}
