//! Inbound translation of Influencers integration events.
//!
//! Only the fields this context reads are decoded; anything else the
//! upstream payload carries is ignored.

use alpes_core::broker::IntegrationMessage;
use alpes_core::error::DomainError;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use uuid::Uuid;

/// Wire type of a registration.
pub const INFLUENCER_REGISTERED: &str = "InfluencerRegistered";
/// Wire type of an activation.
pub const INFLUENCER_ACTIVATED: &str = "InfluencerActivated";
/// Wire type of a deactivation.
pub const INFLUENCER_DEACTIVATED: &str = "InfluencerDeactivated";

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct RegisteredInfluencer {
    pub influencer_id: Uuid,
    pub name: String,
    #[serde(default)]
    pub categories: Vec<String>,
    pub registered_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ActivatedInfluencer {
    pub influencer_id: Uuid,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct DeactivatedInfluencer {
    pub influencer_id: Uuid,
    #[serde(default)]
    pub reason: String,
}

/// An Influencers event this context knows how to read.
#[derive(Debug, Clone, PartialEq)]
pub enum InfluencerEvent {
    Registered(RegisteredInfluencer),
    Activated(ActivatedInfluencer),
    Deactivated(DeactivatedInfluencer),
    /// Any other event type on the topic.
    Other(String),
}

impl InfluencerEvent {
    /// Translates a wire record.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Validation` if a known event type carries a
    /// payload of the wrong shape.
    pub fn from_message(message: &IntegrationMessage) -> Result<Self, DomainError> {
        match message.event_type.as_str() {
            INFLUENCER_REGISTERED => message.data_as().map(Self::Registered),
            INFLUENCER_ACTIVATED => message.data_as().map(Self::Activated),
            INFLUENCER_DEACTIVATED => message.data_as().map(Self::Deactivated),
            other => Ok(Self::Other(other.to_owned())),
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn message(event_type: &str, data: serde_json::Value) -> IntegrationMessage {
        IntegrationMessage {
            id: Uuid::new_v4(),
            occurred_at_epoch_ms: 1_768_471_200_000,
            ingested_at_epoch_ms: 1_768_471_200_010,
            spec_version: "1.0".to_owned(),
            event_type: event_type.to_owned(),
            content_type: "application/json".to_owned(),
            source_service: "alpes-partners-influencers".to_owned(),
            data,
        }
    }

    #[test]
    fn test_registered_event_ignores_extra_fields() {
        let influencer_id = Uuid::new_v4();
        let message = message(
            INFLUENCER_REGISTERED,
            json!({
                "influencer_id": influencer_id,
                "name": "Ana",
                "email": "ana@x.com",
                "categories": ["fitness"],
                "platforms": [],
                "registered_at": "2026-01-15T10:00:00Z"
            }),
        );

        let event = InfluencerEvent::from_message(&message).unwrap();

        match event {
            InfluencerEvent::Registered(registered) => {
                assert_eq!(registered.influencer_id, influencer_id);
                assert_eq!(registered.categories, vec!["fitness"]);
            }
            other => panic!("expected Registered, got {other:?}"),
        }
    }

    #[test]
    fn test_wrong_payload_shape_is_a_validation_error() {
        let message = message(INFLUENCER_ACTIVATED, json!({ "name": 42 }));

        let result = InfluencerEvent::from_message(&message);

        assert!(matches!(result, Err(DomainError::Validation(_))));
    }

    #[test]
    fn test_unknown_types_are_passed_through() {
        let message = message("InfluencerAudienceUpdated", json!({}));

        let event = InfluencerEvent::from_message(&message).unwrap();

        assert_eq!(event, InfluencerEvent::Other("InfluencerAudienceUpdated".to_owned()));
    }
}
