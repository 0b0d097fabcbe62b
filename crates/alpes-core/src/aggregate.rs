//! Aggregate root abstraction.
//!
//! Aggregates are stored as current-state snapshots. Each one embeds an
//! [`AggregateBase`] that owns the identity, the version counter and the
//! buffer of events recorded since the last successful dispatch.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::event::{DomainEvent, EventMetadata};

/// Identity, version and pending events shared by every aggregate.
///
/// A public mutation either fails and leaves this untouched, or changes
/// state, calls [`bump_version`](Self::bump_version) (except on construction)
/// and records exactly the events describing the change.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(bound = "")]
pub struct AggregateBase<E> {
    id: Uuid,
    version: i64,
    #[serde(skip)]
    persisted_version: Option<i64>,
    #[serde(skip)]
    pending_events: Vec<E>,
}

impl<E> AggregateBase<E> {
    /// Creates the base for a freshly constructed aggregate at version 1.
    #[must_use]
    pub fn new(id: Uuid) -> Self {
        Self {
            id,
            version: 1,
            persisted_version: None,
            pending_events: Vec::new(),
        }
    }

    /// Returns the aggregate identifier.
    #[must_use]
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Returns the current version.
    #[must_use]
    pub fn version(&self) -> i64 {
        self.version
    }

    /// Version the aggregate had when it was loaded, `None` if it has never
    /// been persisted.
    #[must_use]
    pub fn persisted_version(&self) -> Option<i64> {
        self.persisted_version
    }

    /// Events recorded since the last [`clear_events`](Self::clear_events).
    #[must_use]
    pub fn pending_events(&self) -> &[E] {
        &self.pending_events
    }

    /// Appends an event to the pending buffer.
    pub fn record_event(&mut self, event: E) {
        self.pending_events.push(event);
    }

    /// Empties the pending buffer.
    pub fn clear_events(&mut self) {
        self.pending_events.clear();
    }

    /// Increments the version by one.
    pub fn bump_version(&mut self) {
        self.version += 1;
    }

    /// Marks the current version as the one held by the store.
    pub fn mark_persisted(&mut self) {
        self.persisted_version = Some(self.version);
    }

    /// Builds metadata for an event describing the mutation that produced
    /// the current version.
    #[must_use]
    pub fn event_metadata(
        &self,
        aggregate_type: &str,
        event_type: &str,
        correlation_id: Uuid,
        occurred_at: DateTime<Utc>,
    ) -> EventMetadata {
        EventMetadata {
            event_id: Uuid::now_v7(),
            event_type: event_type.to_owned(),
            aggregate_id: self.id,
            aggregate_type: aggregate_type.to_owned(),
            sequence_number: self.version,
            correlation_id,
            causation_id: correlation_id,
            occurred_at,
        }
    }
}

/// Trait for aggregate roots.
pub trait AggregateRoot: Send + Sync {
    /// The event type this aggregate records.
    type Event: DomainEvent + Clone;

    /// Aggregate type name. Doubles as the storage collection and the key
    /// used to route integration events to a topic.
    const AGGREGATE_TYPE: &'static str;

    /// Returns the embedded base.
    fn base(&self) -> &AggregateBase<Self::Event>;

    /// Returns the embedded base mutably.
    fn base_mut(&mut self) -> &mut AggregateBase<Self::Event>;

    /// Returns the aggregate identifier.
    fn aggregate_id(&self) -> Uuid {
        self.base().id()
    }

    /// Returns the current version.
    fn version(&self) -> i64 {
        self.base().version()
    }

    /// Returns events recorded since the last dispatch.
    fn pending_events(&self) -> &[Self::Event] {
        self.base().pending_events()
    }

    /// Clears pending events once the caller has confirmed dispatch.
    fn clear_events(&mut self) {
        self.base_mut().clear_events();
    }
}
