//! Test stores: `AggregateStore` implementations that fail on purpose.

use async_trait::async_trait;
use alpes_core::error::DomainError;
use alpes_core::repository::{AggregateStore, StoreSession, StoredRecord};
use uuid::Uuid;

/// A store that cannot open a transaction.
#[derive(Debug)]
pub struct FailingStore;

#[async_trait]
impl AggregateStore for FailingStore {
    async fn begin(&self) -> Result<Box<dyn StoreSession>, DomainError> {
        Err(DomainError::Infrastructure("connection refused".into()))
    }
}

/// Wraps a real store; reads and writes go through, but every commit fails
/// and rolls the inner session back.
#[derive(Debug)]
pub struct FailingCommitStore<S> {
    inner: S,
}

impl<S> FailingCommitStore<S> {
    /// Wraps `inner`.
    #[must_use]
    pub fn new(inner: S) -> Self {
        Self { inner }
    }
}

#[async_trait]
impl<S: AggregateStore> AggregateStore for FailingCommitStore<S> {
    async fn begin(&self) -> Result<Box<dyn StoreSession>, DomainError> {
        let inner = self.inner.begin().await?;
        Ok(Box::new(FailingCommitSession { inner }))
    }
}

struct FailingCommitSession {
    inner: Box<dyn StoreSession>,
}

#[async_trait]
impl StoreSession for FailingCommitSession {
    async fn load(
        &mut self,
        collection: &str,
        id: Uuid,
    ) -> Result<Option<StoredRecord>, DomainError> {
        self.inner.load(collection, id).await
    }

    async fn save(
        &mut self,
        record: StoredRecord,
        expected_version: Option<i64>,
    ) -> Result<(), DomainError> {
        self.inner.save(record, expected_version).await
    }

    async fn exists_by_unique_key(
        &mut self,
        collection: &str,
        key: &str,
    ) -> Result<bool, DomainError> {
        self.inner.exists_by_unique_key(collection, key).await
    }

    async fn load_by_unique_key(
        &mut self,
        collection: &str,
        key: &str,
    ) -> Result<Option<StoredRecord>, DomainError> {
        self.inner.load_by_unique_key(collection, key).await
    }

    async fn list(&mut self, collection: &str) -> Result<Vec<StoredRecord>, DomainError> {
        self.inner.list(collection).await
    }

    async fn savepoint(&mut self, name: &str) -> Result<(), DomainError> {
        self.inner.savepoint(name).await
    }

    async fn rollback_to_savepoint(&mut self, name: &str) -> Result<(), DomainError> {
        self.inner.rollback_to_savepoint(name).await
    }

    async fn commit(&mut self) -> Result<(), DomainError> {
        self.inner.rollback().await?;
        Err(DomainError::Infrastructure("commit failed: connection reset".into()))
    }

    async fn rollback(&mut self) -> Result<(), DomainError> {
        self.inner.rollback().await
    }
}
