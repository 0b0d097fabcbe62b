//! Domain and integration event abstractions.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Metadata attached to every event an aggregate records.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventMetadata {
    /// Unique event identifier.
    pub event_id: Uuid,
    /// Type name used for routing and on the wire.
    pub event_type: String,
    /// Aggregate this event belongs to.
    pub aggregate_id: Uuid,
    /// Aggregate type, used to pick the integration topic.
    pub aggregate_type: String,
    /// Aggregate version produced by the mutation this event describes.
    pub sequence_number: i64,
    /// Correlation ID for tracing a command through its effects.
    pub correlation_id: Uuid,
    /// Causation ID linking this event to the event/command that caused it.
    pub causation_id: Uuid,
    /// Timestamp of event creation.
    pub occurred_at: DateTime<Utc>,
}

/// Whether an event stays inside its context or crosses the boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventScope {
    /// Intra-context notification; never leaves the process.
    Domain,
    /// Serialisable fact published to a broker topic.
    Integration,
}

/// Trait that all domain events implement.
pub trait DomainEvent: Send + Sync + std::fmt::Debug {
    /// Returns the event type name.
    fn event_type(&self) -> &'static str;

    /// Returns whether the event is promoted to an integration event.
    fn scope(&self) -> EventScope;

    /// Serializes the event payload to JSON.
    fn to_payload(&self) -> serde_json::Value;

    /// Returns the metadata for this event.
    fn metadata(&self) -> &EventMetadata;

    /// Converts the event into its type-erased, storable form.
    fn to_recorded(&self) -> RecordedEvent {
        RecordedEvent {
            metadata: self.metadata().clone(),
            scope: self.scope(),
            payload: self.to_payload(),
        }
    }
}

/// Type-erased event captured by the unit of work and handed to the
/// publisher after commit. Immutable once built.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordedEvent {
    /// Event metadata.
    pub metadata: EventMetadata,
    /// Domain or integration.
    pub scope: EventScope,
    /// Event-specific payload.
    pub payload: serde_json::Value,
}

impl RecordedEvent {
    /// Returns `true` when the event should be published to a broker topic.
    #[must_use]
    pub fn is_integration(&self) -> bool {
        self.scope == EventScope::Integration
    }

    /// Returns the event type name.
    #[must_use]
    pub fn event_type(&self) -> &str {
        &self.metadata.event_type
    }
}
