//! `PostgreSQL` implementation of the snapshot store.
//!
//! Each session wraps one `sqlx` transaction. Updates use a
//! compare-and-swap on `version`; unique keys are enforced by a partial
//! unique index (see `migrations/`).

use async_trait::async_trait;
use sqlx::postgres::{PgPool, PgRow};
use sqlx::{Postgres, Row, Transaction};
use tracing::{debug, instrument};
use uuid::Uuid;

use alpes_core::error::DomainError;
use alpes_core::repository::{AggregateStore, StoreSession, StoredRecord};

const PRIMARY_KEY_CONSTRAINT: &str = "aggregate_snapshots_pkey";

/// PostgreSQL-backed snapshot store.
#[derive(Debug, Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    /// Creates a new `PgStore`.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Applies the bundled migrations.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Infrastructure` if a migration fails.
    pub async fn run_migrations(&self) -> Result<(), DomainError> {
        sqlx::migrate!("../../migrations")
            .run(&self.pool)
            .await
            .map_err(|e| DomainError::Infrastructure(format!("migration failed: {e}")))
    }
}

#[async_trait]
impl AggregateStore for PgStore {
    async fn begin(&self) -> Result<Box<dyn StoreSession>, DomainError> {
        let tx = self.pool.begin().await.map_err(infrastructure)?;
        Ok(Box::new(PgSession { tx: Some(tx) }))
    }
}

/// One database transaction.
struct PgSession {
    tx: Option<Transaction<'static, Postgres>>,
}

impl PgSession {
    fn tx(&mut self) -> Result<&mut Transaction<'static, Postgres>, DomainError> {
        self.tx
            .as_mut()
            .ok_or_else(|| DomainError::Infrastructure("session is closed".into()))
    }

    async fn current_version(&mut self, collection: &str, id: Uuid) -> Result<i64, DomainError> {
        let tx = self.tx()?;
        let row = sqlx::query(
            "SELECT version FROM aggregate_snapshots WHERE collection = $1 AND id = $2",
        )
        .bind(collection)
        .bind(id)
        .fetch_optional(&mut **tx)
        .await
        .map_err(infrastructure)?;
        match row {
            Some(row) => row.try_get::<i64, _>("version").map_err(infrastructure),
            None => Ok(0),
        }
    }
}

#[async_trait]
impl StoreSession for PgSession {
    async fn load(
        &mut self,
        collection: &str,
        id: Uuid,
    ) -> Result<Option<StoredRecord>, DomainError> {
        let tx = self.tx()?;
        let row = sqlx::query(
            "SELECT collection, id, version, unique_key, state \
             FROM aggregate_snapshots WHERE collection = $1 AND id = $2",
        )
        .bind(collection)
        .bind(id)
        .fetch_optional(&mut **tx)
        .await
        .map_err(infrastructure)?;
        row.map(|row| to_record(&row)).transpose()
    }

    #[instrument(skip(self, record), fields(collection = %record.collection, id = %record.id))]
    async fn save(
        &mut self,
        record: StoredRecord,
        expected_version: Option<i64>,
    ) -> Result<(), DomainError> {
        let tx = self.tx()?;
        match expected_version {
            None => {
                sqlx::query(
                    "INSERT INTO aggregate_snapshots (collection, id, version, unique_key, state) \
                     VALUES ($1, $2, $3, $4, $5)",
                )
                .bind(&record.collection)
                .bind(record.id)
                .bind(record.version)
                .bind(record.unique_key.as_deref())
                .bind(&record.state)
                .execute(&mut **tx)
                .await
                .map_err(|e| map_write_error(e, &record, None))?;
            }
            Some(expected) => {
                let result = sqlx::query(
                    "UPDATE aggregate_snapshots \
                     SET version = $3, unique_key = $4, state = $5, updated_at = NOW() \
                     WHERE collection = $1 AND id = $2 AND version = $6",
                )
                .bind(&record.collection)
                .bind(record.id)
                .bind(record.version)
                .bind(record.unique_key.as_deref())
                .bind(&record.state)
                .bind(expected)
                .execute(&mut **tx)
                .await
                .map_err(|e| map_write_error(e, &record, Some(expected)))?;

                if result.rows_affected() == 0 {
                    let actual = self.current_version(&record.collection, record.id).await?;
                    return Err(DomainError::ConcurrencyConflict {
                        aggregate_id: record.id,
                        expected,
                        actual,
                    });
                }
            }
        }
        debug!(version = record.version, "snapshot saved");
        Ok(())
    }

    async fn exists_by_unique_key(
        &mut self,
        collection: &str,
        key: &str,
    ) -> Result<bool, DomainError> {
        let tx = self.tx()?;
        let row = sqlx::query(
            "SELECT EXISTS (SELECT 1 FROM aggregate_snapshots \
             WHERE collection = $1 AND unique_key = $2)",
        )
        .bind(collection)
        .bind(key)
        .fetch_one(&mut **tx)
        .await
        .map_err(infrastructure)?;
        row.try_get::<bool, _>(0).map_err(infrastructure)
    }

    async fn load_by_unique_key(
        &mut self,
        collection: &str,
        key: &str,
    ) -> Result<Option<StoredRecord>, DomainError> {
        let tx = self.tx()?;
        let row = sqlx::query(
            "SELECT collection, id, version, unique_key, state \
             FROM aggregate_snapshots WHERE collection = $1 AND unique_key = $2",
        )
        .bind(collection)
        .bind(key)
        .fetch_optional(&mut **tx)
        .await
        .map_err(infrastructure)?;
        row.map(|row| to_record(&row)).transpose()
    }

    async fn list(&mut self, collection: &str) -> Result<Vec<StoredRecord>, DomainError> {
        let tx = self.tx()?;
        let rows = sqlx::query(
            "SELECT collection, id, version, unique_key, state \
             FROM aggregate_snapshots WHERE collection = $1 ORDER BY id",
        )
        .bind(collection)
        .fetch_all(&mut **tx)
        .await
        .map_err(infrastructure)?;
        rows.iter().map(to_record).collect()
    }

    async fn savepoint(&mut self, name: &str) -> Result<(), DomainError> {
        let sql = format!("SAVEPOINT {}", savepoint_ident(name)?);
        let tx = self.tx()?;
        sqlx::query(&sql)
            .execute(&mut **tx)
            .await
            .map_err(infrastructure)?;
        Ok(())
    }

    async fn rollback_to_savepoint(&mut self, name: &str) -> Result<(), DomainError> {
        let sql = format!("ROLLBACK TO SAVEPOINT {}", savepoint_ident(name)?);
        let tx = self.tx()?;
        sqlx::query(&sql)
            .execute(&mut **tx)
            .await
            .map_err(infrastructure)?;
        Ok(())
    }

    async fn commit(&mut self) -> Result<(), DomainError> {
        let tx = self
            .tx
            .take()
            .ok_or_else(|| DomainError::Infrastructure("session is closed".into()))?;
        tx.commit().await.map_err(infrastructure)
    }

    async fn rollback(&mut self) -> Result<(), DomainError> {
        match self.tx.take() {
            Some(tx) => tx.rollback().await.map_err(infrastructure),
            None => Ok(()),
        }
    }
}

fn to_record(row: &PgRow) -> Result<StoredRecord, DomainError> {
    Ok(StoredRecord {
        collection: row.try_get("collection").map_err(infrastructure)?,
        id: row.try_get("id").map_err(infrastructure)?,
        version: row.try_get("version").map_err(infrastructure)?,
        unique_key: row.try_get("unique_key").map_err(infrastructure)?,
        state: row.try_get("state").map_err(infrastructure)?,
    })
}

fn infrastructure(err: sqlx::Error) -> DomainError {
    DomainError::Infrastructure(err.to_string())
}

/// Maps unique violations to the domain: a duplicate primary key means a
/// concurrent insert won, any other unique index is a business key.
fn map_write_error(err: sqlx::Error, record: &StoredRecord, expected: Option<i64>) -> DomainError {
    if let sqlx::Error::Database(db) = &err {
        if db.is_unique_violation() {
            if db.constraint() == Some(PRIMARY_KEY_CONSTRAINT) {
                return DomainError::ConcurrencyConflict {
                    aggregate_id: record.id,
                    expected: expected.unwrap_or(0),
                    actual: record.version,
                };
            }
            return DomainError::BusinessRule(format!(
                "{} with key '{}' already exists",
                record.collection,
                record.unique_key.as_deref().unwrap_or_default()
            ));
        }
    }
    infrastructure(err)
}

/// Savepoint names are interpolated into SQL, so only identifiers pass.
fn savepoint_ident(name: &str) -> Result<&str, DomainError> {
    let valid = !name.is_empty()
        && name.len() <= 63
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_')
        && !name.starts_with(|c: char| c.is_ascii_digit());
    if valid {
        Ok(name)
    } else {
        Err(DomainError::Validation(format!(
            "invalid savepoint name: {name}"
        )))
    }
}
