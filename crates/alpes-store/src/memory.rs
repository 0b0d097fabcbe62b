//! In-memory snapshot store.
//!
//! Sessions buffer their writes in an overlay and apply them under one lock
//! at commit, re-checking versions and unique keys against the committed
//! table so concurrent sessions behave like row-level optimistic locking.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use tracing::debug;
use uuid::Uuid;

use alpes_core::error::DomainError;
use alpes_core::repository::{AggregateStore, StoreSession, StoredRecord};

type Table = HashMap<(String, Uuid), StoredRecord>;

/// Transactional in-memory store. Clones share the same data.
#[derive(Debug, Clone, Default)]
pub struct InMemoryStore {
    table: Arc<Mutex<Table>>,
}

impl InMemoryStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Committed records of one collection, in no particular order.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Infrastructure` if the store lock is poisoned.
    pub fn records(&self, collection: &str) -> Result<Vec<StoredRecord>, DomainError> {
        Ok(lock(&self.table)?
            .values()
            .filter(|record| record.collection == collection)
            .cloned()
            .collect())
    }

    /// Number of committed records in a collection.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Infrastructure` if the store lock is poisoned.
    pub fn count(&self, collection: &str) -> Result<usize, DomainError> {
        Ok(self.records(collection)?.len())
    }
}

#[async_trait]
impl AggregateStore for InMemoryStore {
    async fn begin(&self) -> Result<Box<dyn StoreSession>, DomainError> {
        Ok(Box::new(InMemorySession {
            table: Arc::clone(&self.table),
            writes: Vec::new(),
            savepoints: Vec::new(),
            open: true,
        }))
    }
}

#[derive(Debug, Clone)]
struct PendingWrite {
    record: StoredRecord,
    expected_version: Option<i64>,
}

#[derive(Debug)]
struct InMemorySession {
    table: Arc<Mutex<Table>>,
    writes: Vec<PendingWrite>,
    savepoints: Vec<(String, usize)>,
    open: bool,
}

impl InMemorySession {
    fn ensure_open(&self) -> Result<(), DomainError> {
        if self.open {
            Ok(())
        } else {
            Err(DomainError::Infrastructure("session is closed".into()))
        }
    }
}

#[async_trait]
impl StoreSession for InMemorySession {
    async fn load(
        &mut self,
        collection: &str,
        id: Uuid,
    ) -> Result<Option<StoredRecord>, DomainError> {
        self.ensure_open()?;
        let table = lock(&self.table)?;
        Ok(current(&table, &self.writes, collection, id).cloned())
    }

    async fn save(
        &mut self,
        record: StoredRecord,
        expected_version: Option<i64>,
    ) -> Result<(), DomainError> {
        self.ensure_open()?;
        let write = PendingWrite {
            record,
            expected_version,
        };
        check_write(&*lock(&self.table)?, &self.writes, &write)?;
        self.writes.push(write);
        Ok(())
    }

    async fn exists_by_unique_key(
        &mut self,
        collection: &str,
        key: &str,
    ) -> Result<bool, DomainError> {
        self.ensure_open()?;
        let table = lock(&self.table)?;
        Ok(holder_of(&table, &self.writes, collection, key).is_some())
    }

    async fn load_by_unique_key(
        &mut self,
        collection: &str,
        key: &str,
    ) -> Result<Option<StoredRecord>, DomainError> {
        self.ensure_open()?;
        let table = lock(&self.table)?;
        Ok(holder_of(&table, &self.writes, collection, key).cloned())
    }

    async fn list(&mut self, collection: &str) -> Result<Vec<StoredRecord>, DomainError> {
        self.ensure_open()?;
        let table = lock(&self.table)?;
        let mut records: Vec<StoredRecord> = visible(&table, &self.writes)
            .filter(|record| record.collection == collection)
            .cloned()
            .collect();
        records.sort_by_key(|record| record.id);
        Ok(records)
    }

    async fn savepoint(&mut self, name: &str) -> Result<(), DomainError> {
        self.ensure_open()?;
        self.savepoints.push((name.to_owned(), self.writes.len()));
        Ok(())
    }

    async fn rollback_to_savepoint(&mut self, name: &str) -> Result<(), DomainError> {
        self.ensure_open()?;
        let Some(position) = self.savepoints.iter().rposition(|(n, _)| n == name) else {
            return Err(DomainError::Infrastructure(format!(
                "unknown savepoint: {name}"
            )));
        };
        let mark = self.savepoints[position].1;
        self.savepoints.truncate(position + 1);
        self.writes.truncate(mark);
        Ok(())
    }

    async fn commit(&mut self) -> Result<(), DomainError> {
        self.ensure_open()?;
        self.open = false;
        let writes = std::mem::take(&mut self.writes);
        let mut table = lock(&self.table)?;
        for (applied, write) in writes.iter().enumerate() {
            check_write(&table, &writes[..applied], write)?;
        }
        let count = writes.len();
        for write in writes {
            table.insert(key_of(&write.record), write.record);
        }
        debug!(writes = count, "in-memory session committed");
        Ok(())
    }

    async fn rollback(&mut self) -> Result<(), DomainError> {
        self.open = false;
        self.writes.clear();
        self.savepoints.clear();
        Ok(())
    }
}

fn key_of(record: &StoredRecord) -> (String, Uuid) {
    (record.collection.clone(), record.id)
}

fn same_key(a: &StoredRecord, b: &StoredRecord) -> bool {
    a.id == b.id && a.collection == b.collection
}

fn lock(table: &Mutex<Table>) -> Result<MutexGuard<'_, Table>, DomainError> {
    table
        .lock()
        .map_err(|_| DomainError::Infrastructure("in-memory store lock poisoned".into()))
}

/// Latest version of one record as `writes` would leave it.
fn current<'a>(
    table: &'a Table,
    writes: &'a [PendingWrite],
    collection: &str,
    id: Uuid,
) -> Option<&'a StoredRecord> {
    writes
        .iter()
        .rev()
        .map(|write| &write.record)
        .find(|record| record.collection == collection && record.id == id)
        .or_else(|| table.get(&(collection.to_owned(), id)))
}

/// Committed records not shadowed by a write, followed by the last write
/// of each record.
fn visible<'a>(
    table: &'a Table,
    writes: &'a [PendingWrite],
) -> impl Iterator<Item = &'a StoredRecord> + 'a {
    let committed = table
        .values()
        .filter(move |record| !writes.iter().any(|w| same_key(&w.record, record)));
    let pending = writes
        .iter()
        .enumerate()
        .filter(move |(index, write)| {
            !writes[index + 1..]
                .iter()
                .any(|later| same_key(&later.record, &write.record))
        })
        .map(|(_, write)| &write.record);
    committed.chain(pending)
}

fn holder_of<'a>(
    table: &'a Table,
    writes: &'a [PendingWrite],
    collection: &str,
    key: &str,
) -> Option<&'a StoredRecord> {
    visible(table, writes).find(|record| {
        record.collection == collection && record.unique_key.as_deref() == Some(key)
    })
}

/// Applies the optimistic version check and the unique-key constraint
/// against the committed table with `writes` on top.
fn check_write(
    table: &Table,
    writes: &[PendingWrite],
    write: &PendingWrite,
) -> Result<(), DomainError> {
    let record = &write.record;
    let current_version = current(table, writes, &record.collection, record.id).map(|r| r.version);
    match (write.expected_version, current_version) {
        (None, None) => {}
        (Some(expected), Some(actual)) if expected == actual => {}
        (expected, actual) => {
            return Err(DomainError::ConcurrencyConflict {
                aggregate_id: record.id,
                expected: expected.unwrap_or(0),
                actual: actual.unwrap_or(0),
            });
        }
    }

    if let Some(key) = record.unique_key.as_deref() {
        let taken = holder_of(table, writes, &record.collection, key)
            .is_some_and(|holder| holder.id != record.id);
        if taken {
            return Err(DomainError::BusinessRule(format!(
                "{} with key '{key}' already exists",
                record.collection
            )));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(id: Uuid, version: i64, key: &str) -> StoredRecord {
        StoredRecord {
            collection: "campaign".into(),
            id,
            version,
            unique_key: Some(key.into()),
            state: serde_json::json!({ "version": version }),
        }
    }

    async fn commit_one(store: &InMemoryStore, record: StoredRecord, expected: Option<i64>) -> Result<(), DomainError> {
        let mut session = store.begin().await?;
        session.save(record, expected).await?;
        session.commit().await
    }

    #[tokio::test]
    async fn test_writes_are_invisible_until_commit() {
        // Arrange
        let store = InMemoryStore::new();
        let id = Uuid::new_v4();
        let mut writer = store.begin().await.unwrap();

        // Act
        writer.save(record(id, 1, "fitness"), None).await.unwrap();
        let mut reader = store.begin().await.unwrap();
        let before = reader.load("campaign", id).await.unwrap();
        let own = writer.load("campaign", id).await.unwrap();
        writer.commit().await.unwrap();
        let after = reader.load("campaign", id).await.unwrap();

        // Assert
        assert!(before.is_none());
        assert_eq!(own.unwrap().version, 1);
        assert_eq!(after.unwrap().version, 1);
    }

    #[tokio::test]
    async fn test_rollback_discards_writes() {
        let store = InMemoryStore::new();
        let mut session = store.begin().await.unwrap();
        session
            .save(record(Uuid::new_v4(), 1, "moda"), None)
            .await
            .unwrap();

        session.rollback().await.unwrap();

        assert_eq!(store.count("campaign").unwrap(), 0);
    }

    #[tokio::test]
    async fn test_stale_update_is_a_concurrency_conflict() {
        // Arrange
        let store = InMemoryStore::new();
        let id = Uuid::new_v4();
        commit_one(&store, record(id, 1, "gaming"), None).await.unwrap();
        let mut first = store.begin().await.unwrap();
        let mut second = store.begin().await.unwrap();
        first.save(record(id, 2, "gaming"), Some(1)).await.unwrap();
        second.save(record(id, 2, "gaming"), Some(1)).await.unwrap();

        // Act
        first.commit().await.unwrap();
        let result = second.commit().await;

        // Assert
        match result {
            Err(DomainError::ConcurrencyConflict {
                expected, actual, ..
            }) => {
                assert_eq!(expected, 1);
                assert_eq!(actual, 2);
            }
            other => panic!("expected ConcurrencyConflict, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_unique_key_is_enforced_within_collection() {
        // Arrange
        let store = InMemoryStore::new();
        commit_one(&store, record(Uuid::new_v4(), 1, "fitness revolution"), None)
            .await
            .unwrap();

        // Act
        let result = commit_one(&store, record(Uuid::new_v4(), 1, "fitness revolution"), None).await;

        // Assert
        assert!(matches!(result, Err(DomainError::BusinessRule(_))));
        assert_eq!(store.count("campaign").unwrap(), 1);
    }

    #[tokio::test]
    async fn test_exists_by_unique_key_sees_own_writes() {
        let store = InMemoryStore::new();
        let mut session = store.begin().await.unwrap();
        session
            .save(record(Uuid::new_v4(), 1, "viajes"), None)
            .await
            .unwrap();

        assert!(session.exists_by_unique_key("campaign", "viajes").await.unwrap());
        assert!(!session.exists_by_unique_key("influencer", "viajes").await.unwrap());
    }

    #[tokio::test]
    async fn test_rollback_to_savepoint_keeps_earlier_writes() {
        // Arrange
        let store = InMemoryStore::new();
        let kept = Uuid::new_v4();
        let dropped = Uuid::new_v4();
        let mut session = store.begin().await.unwrap();
        session.save(record(kept, 1, "a"), None).await.unwrap();
        session.savepoint("sp1").await.unwrap();
        session.save(record(dropped, 1, "b"), None).await.unwrap();

        // Act
        session.rollback_to_savepoint("sp1").await.unwrap();
        session.commit().await.unwrap();

        // Assert
        let ids: Vec<Uuid> = store
            .records("campaign")
            .unwrap()
            .iter()
            .map(|r| r.id)
            .collect();
        assert_eq!(ids, vec![kept]);
    }

    #[tokio::test]
    async fn test_closed_session_rejects_further_use() {
        let store = InMemoryStore::new();
        let mut session = store.begin().await.unwrap();
        session.commit().await.unwrap();

        let result = session.load("campaign", Uuid::new_v4()).await;

        assert!(matches!(result, Err(DomainError::Infrastructure(_))));
    }

    #[tokio::test]
    async fn test_list_merges_own_writes_over_committed_records() {
        // Arrange
        let store = InMemoryStore::new();
        let updated = Uuid::new_v4();
        let untouched = Uuid::new_v4();
        commit_one(&store, record(updated, 1, "moda"), None).await.unwrap();
        commit_one(&store, record(untouched, 1, "gaming"), None).await.unwrap();
        let mut session = store.begin().await.unwrap();
        session.save(record(updated, 2, "moda"), Some(1)).await.unwrap();
        let added = Uuid::new_v4();
        session.save(record(added, 1, "viajes"), None).await.unwrap();

        // Act
        let listed = session.list("campaign").await.unwrap();

        // Assert
        let mut expected = vec![updated, untouched, added];
        expected.sort();
        let ids: Vec<Uuid> = listed.iter().map(|r| r.id).collect();
        assert_eq!(ids, expected);
        let versions: Vec<i64> = listed
            .iter()
            .filter(|r| r.id == updated)
            .map(|r| r.version)
            .collect();
        assert_eq!(versions, vec![2]);
        assert!(session.list("influencer").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_load_by_unique_key_follows_key_changes_in_session() {
        // Arrange
        let store = InMemoryStore::new();
        let id = Uuid::new_v4();
        commit_one(&store, record(id, 1, "old name"), None).await.unwrap();
        let mut session = store.begin().await.unwrap();

        // Act
        session.save(record(id, 2, "new name"), Some(1)).await.unwrap();
        let by_old = session.load_by_unique_key("campaign", "old name").await.unwrap();
        let by_new = session.load_by_unique_key("campaign", "new name").await.unwrap();

        // Assert
        assert!(by_old.is_none());
        assert_eq!(by_new.unwrap().version, 2);
    }

    #[tokio::test]
    async fn test_released_key_can_be_taken_in_the_same_commit() {
        // Arrange
        let store = InMemoryStore::new();
        let renamed = Uuid::new_v4();
        commit_one(&store, record(renamed, 1, "spring sale"), None).await.unwrap();
        let mut session = store.begin().await.unwrap();
        session.save(record(renamed, 2, "spring sale 2025"), Some(1)).await.unwrap();

        // Act
        let reuse = session.save(record(Uuid::new_v4(), 1, "spring sale"), None).await;
        session.commit().await.unwrap();

        // Assert
        assert!(reuse.is_ok());
        assert_eq!(store.count("campaign").unwrap(), 2);
    }
}
