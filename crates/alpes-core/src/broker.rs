//! Broker port and the integration message wire schema.
//!
//! Payloads are decoded once, at this boundary, into [`IntegrationMessage`].
//! Nothing downstream reads raw broker messages.

use std::fmt;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::DomainError;
use crate::event::RecordedEvent;

/// Wire schema version written on every published record.
pub const SPEC_VERSION: &str = "1.0";

/// Content type of the `data` field.
pub const CONTENT_TYPE: &str = "application/json";

/// Versioned wire record for an integration event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IntegrationMessage {
    /// Event identifier, stable across redeliveries.
    pub id: Uuid,
    /// When the fact happened, in epoch milliseconds.
    pub occurred_at_epoch_ms: i64,
    /// When the publisher handed the record to the broker.
    pub ingested_at_epoch_ms: i64,
    /// Wire schema version.
    pub spec_version: String,
    /// Event type discriminator.
    #[serde(rename = "type")]
    pub event_type: String,
    /// Content type of `data`.
    pub content_type: String,
    /// Service that published the record.
    pub source_service: String,
    /// Event-specific payload.
    pub data: serde_json::Value,
}

impl IntegrationMessage {
    /// Maps a recorded event onto the wire schema.
    #[must_use]
    pub fn from_event(event: &RecordedEvent, source_service: &str, ingested_at_epoch_ms: i64) -> Self {
        Self {
            id: event.metadata.event_id,
            occurred_at_epoch_ms: event.metadata.occurred_at.timestamp_millis(),
            ingested_at_epoch_ms,
            spec_version: SPEC_VERSION.to_owned(),
            event_type: event.metadata.event_type.clone(),
            content_type: CONTENT_TYPE.to_owned(),
            source_service: source_service.to_owned(),
            data: event.payload.clone(),
        }
    }

    /// Encodes the record as JSON bytes.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Infrastructure` if serialization fails.
    pub fn encode(&self) -> Result<Vec<u8>, DomainError> {
        serde_json::to_vec(self)
            .map_err(|e| DomainError::Infrastructure(format!("message encoding failed: {e}")))
    }

    /// Decodes a record from JSON bytes.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Validation` if the payload is not a valid record.
    pub fn decode(bytes: &[u8]) -> Result<Self, DomainError> {
        serde_json::from_slice(bytes)
            .map_err(|e| DomainError::Validation(format!("malformed integration message: {e}")))
    }

    /// Decodes the `data` field into a typed payload.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Validation` if `data` does not match `T`.
    pub fn data_as<T: serde::de::DeserializeOwned>(&self) -> Result<T, DomainError> {
        serde_json::from_value(self.data.clone()).map_err(|e| {
            DomainError::Validation(format!("unexpected payload for {}: {e}", self.event_type))
        })
    }
}

/// How consumers attached to the same subscription share messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubscriptionMode {
    /// Competing consumers: each message goes to one of them.
    Shared,
    /// A single consumer may be attached at a time.
    Exclusive,
}

/// Acknowledges one delivery back to the broker.
#[async_trait]
pub trait Acknowledger: Send + Sync {
    /// Confirms the delivery so it is not redelivered.
    async fn ack(&self) -> Result<(), DomainError>;
}

/// One message handed to a consumer. Dropping it without calling
/// [`ack`](Self::ack) leaves it eligible for redelivery.
pub struct Delivery {
    payload: Vec<u8>,
    attempt: u32,
    acknowledger: Box<dyn Acknowledger>,
}

impl fmt::Debug for Delivery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Delivery")
            .field("bytes", &self.payload.len())
            .field("attempt", &self.attempt)
            .finish_non_exhaustive()
    }
}

impl Delivery {
    /// Creates a delivery.
    #[must_use]
    pub fn new(payload: Vec<u8>, attempt: u32, acknowledger: Box<dyn Acknowledger>) -> Self {
        Self {
            payload,
            attempt,
            acknowledger,
        }
    }

    /// Raw payload bytes.
    #[must_use]
    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    /// Delivery attempt, starting at 1.
    #[must_use]
    pub fn attempt(&self) -> u32 {
        self.attempt
    }

    /// Acknowledges the delivery.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Infrastructure` if the broker rejects the ack.
    pub async fn ack(self) -> Result<(), DomainError> {
        self.acknowledger.ack().await
    }
}

/// Stream of deliveries from one subscription.
#[async_trait]
pub trait MessageStream: Send {
    /// Waits for the next delivery. `None` means the subscription closed.
    async fn next_delivery(&mut self) -> Option<Result<Delivery, DomainError>>;
}

/// Broker port with at-least-once delivery.
#[async_trait]
pub trait MessageBroker: Send + Sync {
    /// Publishes a record to a topic.
    async fn publish(&self, topic: &str, message: &IntegrationMessage) -> Result<(), DomainError>;

    /// Opens a durable subscription on a topic.
    async fn subscribe(
        &self,
        topic: &str,
        subscription: &str,
        mode: SubscriptionMode,
    ) -> Result<Box<dyn MessageStream>, DomainError>;
}
