//! Inbound translation of Affiliates integration events.

use alpes_core::broker::IntegrationMessage;
use alpes_core::error::DomainError;
use serde::Deserialize;
use uuid::Uuid;

/// Wire type of a deactivation.
pub const AFFILIATE_DEACTIVATED: &str = "AffiliateDeactivated";

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct DeactivatedAffiliate {
    pub affiliate_id: Uuid,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub reason: String,
}

/// An Affiliates event this context knows how to read.
#[derive(Debug, Clone, PartialEq)]
pub enum AffiliateEvent {
    Deactivated(DeactivatedAffiliate),
    /// Registrations, activations and anything else on the topic.
    Other(String),
}

impl AffiliateEvent {
    /// Translates a wire record.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Validation` if a deactivation carries a payload
    /// of the wrong shape.
    pub fn from_message(message: &IntegrationMessage) -> Result<Self, DomainError> {
        match message.event_type.as_str() {
            AFFILIATE_DEACTIVATED => message.data_as().map(Self::Deactivated),
            other => Ok(Self::Other(other.to_owned())),
        }
    }
}
