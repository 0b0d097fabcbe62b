//! Unit of work.
//!
//! One logical transaction: writes are queued as batch operations, executed
//! in registration order at commit, and the events they captured are handed
//! to the dispatcher only after the store transaction is durable. Dropping a
//! unit without committing discards the session, which rolls it back.

use std::sync::Arc;

use tracing::{debug, error, warn};

use crate::error::DomainError;
use crate::event::RecordedEvent;
use crate::publisher::EventDispatcher;
use crate::repository::{AggregateStore, BatchOperation, StoreSession};

/// Outcome of a successful commit.
#[derive(Debug, Clone)]
pub struct CommitReceipt {
    /// Number of batch operations executed.
    pub operations: usize,
    /// Events handed to the dispatcher, in registration order.
    pub events: Vec<RecordedEvent>,
}

#[derive(Debug)]
struct BatchMark {
    name: String,
    batches: usize,
}

/// Coordinates one transaction and gates event dispatch on its commit.
pub struct UnitOfWork {
    session: Option<Box<dyn StoreSession>>,
    dispatcher: Arc<dyn EventDispatcher>,
    batches: Vec<Box<dyn BatchOperation>>,
    savepoints: Vec<BatchMark>,
}

impl std::fmt::Debug for UnitOfWork {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UnitOfWork")
            .field("open", &self.session.is_some())
            .field("batches", &self.batches)
            .field("savepoints", &self.savepoints)
            .finish_non_exhaustive()
    }
}

impl UnitOfWork {
    /// Opens a store session and starts a new unit.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Infrastructure` if the store cannot begin a
    /// transaction.
    pub async fn begin(
        store: &dyn AggregateStore,
        dispatcher: Arc<dyn EventDispatcher>,
    ) -> Result<Self, DomainError> {
        let session = store.begin().await?;
        Ok(Self {
            session: Some(session),
            dispatcher,
            batches: Vec::new(),
            savepoints: Vec::new(),
        })
    }

    /// Returns the session for reads made while building the unit.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Infrastructure` if the unit is already closed.
    pub fn session(&mut self) -> Result<&mut (dyn StoreSession + 'static), DomainError> {
        self.session.as_deref_mut().ok_or_else(closed)
    }

    /// Queues a write without executing it.
    pub fn register_batch(&mut self, operation: impl BatchOperation + 'static) {
        debug!(operation = %operation.describe(), "registering batch operation");
        self.batches.push(Box::new(operation));
    }

    /// Number of queued operations.
    #[must_use]
    pub fn pending_operations(&self) -> usize {
        self.batches.len()
    }

    /// Creates a nested rollback point covering both queued operations and
    /// the store session.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Infrastructure` if the store rejects the
    /// savepoint or the unit is closed.
    pub async fn savepoint(&mut self, name: &str) -> Result<(), DomainError> {
        self.session()?.savepoint(name).await?;
        self.savepoints.push(BatchMark {
            name: name.to_owned(),
            batches: self.batches.len(),
        });
        Ok(())
    }

    /// Drops operations queued after the named savepoint and reverts the
    /// session to it. The savepoint itself stays usable.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Infrastructure` if the savepoint is unknown.
    pub async fn rollback_to_savepoint(&mut self, name: &str) -> Result<(), DomainError> {
        let Some(position) = self.savepoints.iter().rposition(|mark| mark.name == name) else {
            return Err(DomainError::Infrastructure(format!(
                "unknown savepoint: {name}"
            )));
        };
        self.session()?.rollback_to_savepoint(name).await?;
        self.savepoints.truncate(position + 1);
        let keep = self.savepoints[position].batches;
        self.batches.truncate(keep);
        Ok(())
    }

    /// Executes queued operations in order, commits the session and then
    /// dispatches the captured events.
    ///
    /// # Errors
    ///
    /// Returns the first error raised by a batch operation or by the store
    /// commit. The session is rolled back and nothing is dispatched.
    pub async fn commit(mut self) -> Result<CommitReceipt, DomainError> {
        let mut session = self.session.take().ok_or_else(closed)?;
        let batches = std::mem::take(&mut self.batches);

        for operation in &batches {
            if let Err(err) = operation.execute(session.as_mut()).await {
                warn!(
                    operation = %operation.describe(),
                    error = %err,
                    "batch operation failed, rolling back"
                );
                rollback_quietly(session.as_mut()).await;
                return Err(err);
            }
        }

        if let Err(err) = session.commit().await {
            warn!(error = %err, "store commit failed, rolling back");
            rollback_quietly(session.as_mut()).await;
            return Err(err);
        }

        let events: Vec<RecordedEvent> = batches
            .iter()
            .flat_map(|operation| operation.events().iter().cloned())
            .collect();
        debug!(
            operations = batches.len(),
            events = events.len(),
            "unit of work committed"
        );
        self.dispatcher.dispatch(&events).await;

        Ok(CommitReceipt {
            operations: batches.len(),
            events,
        })
    }

    /// Discards queued operations and reverts the session.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Infrastructure` if the store rollback fails.
    pub async fn rollback(mut self) -> Result<(), DomainError> {
        self.batches.clear();
        self.savepoints.clear();
        match self.session.take() {
            Some(mut session) => session.rollback().await,
            None => Ok(()),
        }
    }
}

fn closed() -> DomainError {
    DomainError::Infrastructure("unit of work is closed".into())
}

async fn rollback_quietly(session: &mut dyn StoreSession) {
    if let Err(err) = session.rollback().await {
        error!(error = %err, "rollback after failure also failed");
    }
}
