//! Persistence port.
//!
//! Aggregates are stored as JSON snapshots keyed by `(collection, id)`. A
//! [`StoreSession`] is one database transaction; it is never shared across
//! tasks. Writes are not executed by handlers directly: they are captured as
//! [`BatchOperation`]s and registered with the unit of work.

use std::fmt;
use std::marker::PhantomData;

use async_trait::async_trait;
use serde::Serialize;
use serde::de::DeserializeOwned;
use uuid::Uuid;

use crate::aggregate::AggregateRoot;
use crate::error::DomainError;
use crate::event::{DomainEvent, RecordedEvent};

/// Stored snapshot of one aggregate.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredRecord {
    /// Collection (aggregate type) the record belongs to.
    pub collection: String,
    /// Aggregate identifier.
    pub id: Uuid,
    /// Aggregate version captured in `state`.
    pub version: i64,
    /// Optional key that must be unique within the collection.
    pub unique_key: Option<String>,
    /// Serialized aggregate state.
    pub state: serde_json::Value,
}

/// One transaction against the aggregate store.
#[async_trait]
pub trait StoreSession: Send {
    /// Loads a record by id, seeing this session's own uncommitted writes.
    async fn load(
        &mut self,
        collection: &str,
        id: Uuid,
    ) -> Result<Option<StoredRecord>, DomainError>;

    /// Inserts (`expected_version` is `None`) or updates a record.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::ConcurrencyConflict` when the stored version is
    /// not `expected_version`, and `DomainError::BusinessRule` when the
    /// record's unique key is already taken in its collection.
    async fn save(
        &mut self,
        record: StoredRecord,
        expected_version: Option<i64>,
    ) -> Result<(), DomainError>;

    /// Returns whether a record in `collection` already holds `key`.
    async fn exists_by_unique_key(
        &mut self,
        collection: &str,
        key: &str,
    ) -> Result<bool, DomainError>;

    /// Loads the record of `collection` holding `key`, if any.
    async fn load_by_unique_key(
        &mut self,
        collection: &str,
        key: &str,
    ) -> Result<Option<StoredRecord>, DomainError>;

    /// Every record of `collection`, ordered by id.
    async fn list(&mut self, collection: &str) -> Result<Vec<StoredRecord>, DomainError>;

    /// Creates a named nested rollback point.
    async fn savepoint(&mut self, name: &str) -> Result<(), DomainError>;

    /// Reverts every write made after the named savepoint.
    async fn rollback_to_savepoint(&mut self, name: &str) -> Result<(), DomainError>;

    /// Makes every write durable. The session is closed afterwards.
    async fn commit(&mut self) -> Result<(), DomainError>;

    /// Discards every write. The session is closed afterwards.
    async fn rollback(&mut self) -> Result<(), DomainError>;
}

/// Factory for store sessions.
#[async_trait]
pub trait AggregateStore: Send + Sync {
    /// Opens a new transaction.
    async fn begin(&self) -> Result<Box<dyn StoreSession>, DomainError>;
}

/// Aggregates that can be persisted as snapshots.
pub trait SnapshotAggregate: AggregateRoot + Serialize + DeserializeOwned {
    /// Key that must be unique across the collection, if any.
    fn unique_key(&self) -> Option<String> {
        None
    }
}

/// Deferred write registered with a unit of work.
#[async_trait]
pub trait BatchOperation: Send + Sync + fmt::Debug {
    /// Short description for logs.
    fn describe(&self) -> String;

    /// Executes the write against the session.
    async fn execute(&self, session: &mut dyn StoreSession) -> Result<(), DomainError>;

    /// Events to dispatch once the write has been committed.
    fn events(&self) -> &[RecordedEvent];
}

/// Snapshot write for one aggregate, with the events it had pending when
/// the operation was built.
#[derive(Debug, Clone)]
pub struct SaveAggregate {
    record: StoredRecord,
    expected_version: Option<i64>,
    events: Vec<RecordedEvent>,
}

impl SaveAggregate {
    /// Returns the record that will be written.
    #[must_use]
    pub fn record(&self) -> &StoredRecord {
        &self.record
    }

    /// Returns the version the store must hold for the write to succeed.
    #[must_use]
    pub fn expected_version(&self) -> Option<i64> {
        self.expected_version
    }
}

#[async_trait]
impl BatchOperation for SaveAggregate {
    fn describe(&self) -> String {
        format!(
            "save {} {} at version {}",
            self.record.collection, self.record.id, self.record.version
        )
    }

    async fn execute(&self, session: &mut dyn StoreSession) -> Result<(), DomainError> {
        session
            .save(self.record.clone(), self.expected_version)
            .await
    }

    fn events(&self) -> &[RecordedEvent] {
        &self.events
    }
}

/// Typed facade over a [`StoreSession`] for one aggregate type.
pub struct AggregateRepository<A> {
    _aggregate: PhantomData<fn() -> A>,
}

impl<A> fmt::Debug for AggregateRepository<A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AggregateRepository").finish()
    }
}

impl<A> Default for AggregateRepository<A> {
    fn default() -> Self {
        Self::new()
    }
}

impl<A> Clone for AggregateRepository<A> {
    fn clone(&self) -> Self {
        Self::new()
    }
}

impl<A> AggregateRepository<A> {
    /// Creates the repository.
    #[must_use]
    pub fn new() -> Self {
        Self {
            _aggregate: PhantomData,
        }
    }
}

impl<A: SnapshotAggregate> AggregateRepository<A> {
    /// Loads an aggregate, returning `None` when it does not exist.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Infrastructure` if the stored snapshot cannot be
    /// read or deserialized.
    pub async fn load(
        &self,
        session: &mut dyn StoreSession,
        id: Uuid,
    ) -> Result<Option<A>, DomainError> {
        session
            .load(A::AGGREGATE_TYPE, id)
            .await?
            .map(restore)
            .transpose()
    }

    /// Loads an aggregate that must exist.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::AggregateNotFound` when no snapshot exists.
    pub async fn get(&self, session: &mut dyn StoreSession, id: Uuid) -> Result<A, DomainError> {
        self.load(session, id)
            .await?
            .ok_or(DomainError::AggregateNotFound(id))
    }

    /// Returns whether an aggregate with this unique key exists.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Infrastructure` if the store cannot be queried.
    pub async fn exists_by_unique_key(
        &self,
        session: &mut dyn StoreSession,
        key: &str,
    ) -> Result<bool, DomainError> {
        session.exists_by_unique_key(A::AGGREGATE_TYPE, key).await
    }

    /// Loads the aggregate holding a unique key.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Infrastructure` if the store cannot be queried
    /// or the snapshot cannot be deserialized.
    pub async fn find_by_unique_key(
        &self,
        session: &mut dyn StoreSession,
        key: &str,
    ) -> Result<Option<A>, DomainError> {
        session
            .load_by_unique_key(A::AGGREGATE_TYPE, key)
            .await?
            .map(restore)
            .transpose()
    }

    /// Loads every aggregate of this type.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Infrastructure` if the store cannot be queried
    /// or a snapshot cannot be deserialized.
    pub async fn list(&self, session: &mut dyn StoreSession) -> Result<Vec<A>, DomainError> {
        session
            .list(A::AGGREGATE_TYPE)
            .await?
            .into_iter()
            .map(restore)
            .collect()
    }

    /// Captures the aggregate's snapshot and pending events as a deferred
    /// write.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Infrastructure` if the aggregate cannot be
    /// serialized.
    pub fn save_operation(&self, aggregate: &A) -> Result<SaveAggregate, DomainError> {
        let state = serde_json::to_value(aggregate).map_err(|e| {
            DomainError::Infrastructure(format!(
                "snapshot serialization failed for {} {}: {e}",
                A::AGGREGATE_TYPE,
                aggregate.aggregate_id()
            ))
        })?;
        Ok(SaveAggregate {
            record: StoredRecord {
                collection: A::AGGREGATE_TYPE.to_owned(),
                id: aggregate.aggregate_id(),
                version: aggregate.version(),
                unique_key: aggregate.unique_key(),
                state,
            },
            expected_version: aggregate.base().persisted_version(),
            events: aggregate
                .pending_events()
                .iter()
                .map(DomainEvent::to_recorded)
                .collect(),
        })
    }
}

fn restore<A: SnapshotAggregate>(record: StoredRecord) -> Result<A, DomainError> {
    let id = record.id;
    let mut aggregate: A = serde_json::from_value(record.state).map_err(|e| {
        DomainError::Infrastructure(format!(
            "snapshot deserialization failed for {} {id}: {e}",
            A::AGGREGATE_TYPE
        ))
    })?;
    aggregate.base_mut().mark_persisted();
    Ok(aggregate)
}
