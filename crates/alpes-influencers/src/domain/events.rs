//! Domain events for the Influencers context.
//!
//! The payload of every event is the flat inner struct, so the wire `data`
//! of an integration event carries exactly the fields below.

use std::collections::BTreeMap;

use alpes_core::event::{DomainEvent, EventMetadata, EventScope};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Event type for [`InfluencerRegistered`].
pub const INFLUENCER_REGISTERED_EVENT_TYPE: &str = "InfluencerRegistered";
/// Event type for [`InfluencerActivated`].
pub const INFLUENCER_ACTIVATED_EVENT_TYPE: &str = "InfluencerActivated";
/// Event type for [`InfluencerDeactivated`].
pub const INFLUENCER_DEACTIVATED_EVENT_TYPE: &str = "InfluencerDeactivated";
/// Event type for [`InfluencerAudienceUpdated`].
pub const INFLUENCER_AUDIENCE_UPDATED_EVENT_TYPE: &str = "InfluencerAudienceUpdated";
/// Event type for [`InfluencerSuspended`].
pub const INFLUENCER_SUSPENDED_EVENT_TYPE: &str = "InfluencerSuspended";
/// Event type for [`InfluencerProfileUpdated`].
pub const INFLUENCER_PROFILE_UPDATED_EVENT_TYPE: &str = "InfluencerProfileUpdated";
/// Event type for [`InfluencerDemographicsUpdated`].
pub const INFLUENCER_DEMOGRAPHICS_UPDATED_EVENT_TYPE: &str = "InfluencerDemographicsUpdated";
/// Event type for [`InfluencerMetricsUpdated`].
pub const INFLUENCER_METRICS_UPDATED_EVENT_TYPE: &str = "InfluencerMetricsUpdated";

/// Emitted when an influencer registers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InfluencerRegistered {
    /// The influencer identifier.
    pub influencer_id: Uuid,
    /// Display name.
    pub name: String,
    /// Normalized email.
    pub email: String,
    /// Profile categories.
    pub categories: Vec<String>,
    /// Platforms known at registration (empty until platforms are added).
    pub platforms: Vec<String>,
    /// Registration time.
    pub registered_at: DateTime<Utc>,
}

/// Emitted when an influencer is activated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InfluencerActivated {
    /// The influencer identifier.
    pub influencer_id: Uuid,
    /// Display name.
    pub name: String,
    /// Normalized email.
    pub email: String,
    /// Platforms with audience data.
    pub platforms: Vec<String>,
    /// Activation time.
    pub activated_at: DateTime<Utc>,
}

/// Emitted when an influencer is deactivated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InfluencerDeactivated {
    /// The influencer identifier.
    pub influencer_id: Uuid,
    /// Display name.
    pub name: String,
    /// Normalized email.
    pub email: String,
    /// Why the influencer was deactivated.
    pub reason: String,
    /// Deactivation time.
    pub deactivated_at: DateTime<Utc>,
}

/// Emitted when platform audience data is added or updated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InfluencerAudienceUpdated {
    /// The influencer identifier.
    pub influencer_id: Uuid,
    /// Platform wire name.
    pub platform: String,
    /// New follower count on the platform.
    pub followers: u64,
    /// New engagement rate on the platform.
    pub engagement_rate: f64,
    /// Followers across all platforms.
    pub total_followers: u64,
    /// Mean engagement across all platforms.
    pub average_engagement: f64,
    /// Update time.
    pub updated_at: DateTime<Utc>,
}

/// Emitted when an influencer is suspended.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InfluencerSuspended {
    /// The influencer identifier.
    pub influencer_id: Uuid,
    /// Why the influencer was suspended.
    pub reason: String,
    /// Suspension time.
    pub suspended_at: DateTime<Utc>,
}

/// Emitted when profile fields change.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InfluencerProfileUpdated {
    /// The influencer identifier.
    pub influencer_id: Uuid,
    /// Changed field names mapped to their new values.
    pub changes: BTreeMap<String, String>,
    /// Update time.
    pub updated_at: DateTime<Utc>,
}

/// Emitted when audience demographics are replaced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InfluencerDemographicsUpdated {
    /// The influencer identifier.
    pub influencer_id: Uuid,
    /// Countries with the largest audience share.
    pub top_countries: Vec<String>,
    /// Update time.
    pub updated_at: DateTime<Utc>,
}

/// Emitted when campaign results are recorded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InfluencerMetricsUpdated {
    /// The influencer identifier.
    pub influencer_id: Uuid,
    /// Campaigns completed so far.
    pub completed_campaigns: u32,
    /// Revenue generated so far.
    pub revenue: f64,
    /// Update time.
    pub updated_at: DateTime<Utc>,
}

/// Event payload variants for the Influencers context.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum InfluencerEventKind {
    /// An influencer has registered.
    InfluencerRegistered(InfluencerRegistered),
    /// An influencer has been activated.
    InfluencerActivated(InfluencerActivated),
    /// An influencer has been deactivated.
    InfluencerDeactivated(InfluencerDeactivated),
    /// Audience data for a platform changed.
    InfluencerAudienceUpdated(InfluencerAudienceUpdated),
    /// An influencer has been suspended.
    InfluencerSuspended(InfluencerSuspended),
    /// Profile fields changed.
    InfluencerProfileUpdated(InfluencerProfileUpdated),
    /// Demographics were replaced.
    InfluencerDemographicsUpdated(InfluencerDemographicsUpdated),
    /// Campaign results were recorded.
    InfluencerMetricsUpdated(InfluencerMetricsUpdated),
}

impl InfluencerEventKind {
    /// Event type discriminator.
    #[must_use]
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::InfluencerRegistered(_) => INFLUENCER_REGISTERED_EVENT_TYPE,
            Self::InfluencerActivated(_) => INFLUENCER_ACTIVATED_EVENT_TYPE,
            Self::InfluencerDeactivated(_) => INFLUENCER_DEACTIVATED_EVENT_TYPE,
            Self::InfluencerAudienceUpdated(_) => INFLUENCER_AUDIENCE_UPDATED_EVENT_TYPE,
            Self::InfluencerSuspended(_) => INFLUENCER_SUSPENDED_EVENT_TYPE,
            Self::InfluencerProfileUpdated(_) => INFLUENCER_PROFILE_UPDATED_EVENT_TYPE,
            Self::InfluencerDemographicsUpdated(_) => INFLUENCER_DEMOGRAPHICS_UPDATED_EVENT_TYPE,
            Self::InfluencerMetricsUpdated(_) => INFLUENCER_METRICS_UPDATED_EVENT_TYPE,
        }
    }

    /// Whether the event crosses the context boundary.
    #[must_use]
    pub fn scope(&self) -> EventScope {
        match self {
            Self::InfluencerRegistered(_)
            | Self::InfluencerActivated(_)
            | Self::InfluencerDeactivated(_)
            | Self::InfluencerAudienceUpdated(_) => EventScope::Integration,
            Self::InfluencerSuspended(_)
            | Self::InfluencerProfileUpdated(_)
            | Self::InfluencerDemographicsUpdated(_)
            | Self::InfluencerMetricsUpdated(_) => EventScope::Domain,
        }
    }
}

/// Domain event envelope for the Influencers context.
#[derive(Debug, Clone)]
pub struct InfluencerEvent {
    /// Event metadata.
    pub metadata: EventMetadata,
    /// Event-specific payload.
    pub kind: InfluencerEventKind,
}

impl DomainEvent for InfluencerEvent {
    fn event_type(&self) -> &'static str {
        self.kind.event_type()
    }

    fn scope(&self) -> EventScope {
        self.kind.scope()
    }

    fn to_payload(&self) -> serde_json::Value {
        // Serialization of derived Serialize types to Value is infallible.
        let payload = match &self.kind {
            InfluencerEventKind::InfluencerRegistered(e) => serde_json::to_value(e),
            InfluencerEventKind::InfluencerActivated(e) => serde_json::to_value(e),
            InfluencerEventKind::InfluencerDeactivated(e) => serde_json::to_value(e),
            InfluencerEventKind::InfluencerAudienceUpdated(e) => serde_json::to_value(e),
            InfluencerEventKind::InfluencerSuspended(e) => serde_json::to_value(e),
            InfluencerEventKind::InfluencerProfileUpdated(e) => serde_json::to_value(e),
            InfluencerEventKind::InfluencerDemographicsUpdated(e) => serde_json::to_value(e),
            InfluencerEventKind::InfluencerMetricsUpdated(e) => serde_json::to_value(e),
        };
        payload.expect("InfluencerEventKind serialization is infallible")
    }

    fn metadata(&self) -> &EventMetadata {
        &self.metadata
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    #[test]
    fn test_registered_payload_is_flat() {
        // Arrange
        let influencer_id = Uuid::new_v4();
        let registered_at = Utc.with_ymd_and_hms(2026, 1, 15, 10, 0, 0).unwrap();
        let event = InfluencerEvent {
            metadata: EventMetadata {
                event_id: Uuid::new_v4(),
                event_type: INFLUENCER_REGISTERED_EVENT_TYPE.to_owned(),
                aggregate_id: influencer_id,
                aggregate_type: "influencer".to_owned(),
                sequence_number: 1,
                correlation_id: Uuid::new_v4(),
                causation_id: Uuid::new_v4(),
                occurred_at: registered_at,
            },
            kind: InfluencerEventKind::InfluencerRegistered(InfluencerRegistered {
                influencer_id,
                name: "Ana".to_owned(),
                email: "ana@x.com".to_owned(),
                categories: vec!["fitness".to_owned()],
                platforms: vec![],
                registered_at,
            }),
        };

        // Act
        let payload = event.to_payload();

        // Assert
        assert_eq!(payload["influencer_id"], influencer_id.to_string());
        assert_eq!(payload["categories"][0], "fitness");
        assert_eq!(event.scope(), EventScope::Integration);
    }

    #[test]
    fn test_local_facts_stay_in_domain_scope() {
        let kind = InfluencerEventKind::InfluencerSuspended(InfluencerSuspended {
            influencer_id: Uuid::new_v4(),
            reason: "fraud review".to_owned(),
            suspended_at: Utc::now(),
        });

        assert_eq!(kind.scope(), EventScope::Domain);
        assert_eq!(kind.event_type(), INFLUENCER_SUSPENDED_EVENT_TYPE);
    }
}
