//! Domain error types.

use thiserror::Error;
use uuid::Uuid;

/// Top-level domain error type.
///
/// Every variant is a distinct kind so callers can give an actionable
/// message ("email already registered") instead of a generic failure.
#[derive(Debug, Error)]
pub enum DomainError {
    /// Malformed input rejected before any event was recorded.
    #[error("validation error: {0}")]
    Validation(String),

    /// A business rule rejected the operation (duplicate name, out of period).
    #[error("business rule violated: {0}")]
    BusinessRule(String),

    /// The operation is not legal in the aggregate's current state.
    #[error("invalid state: {0}")]
    InvalidState(String),

    /// An aggregate was not found.
    #[error("aggregate not found: {0}")]
    AggregateNotFound(Uuid),

    /// No aggregate holds the looked-up unique key.
    #[error("no {collection} found for '{key}'")]
    KeyNotFound {
        /// Collection that was searched.
        collection: &'static str,
        /// The key that was looked up.
        key: String,
    },

    /// Optimistic concurrency conflict.
    #[error("concurrency conflict on aggregate {aggregate_id}: expected version {expected}, found {actual}")]
    ConcurrencyConflict {
        /// The aggregate that had the conflict.
        aggregate_id: Uuid,
        /// The expected version.
        expected: i64,
        /// The actual version found.
        actual: i64,
    },

    /// A command was dispatched without a registered handler. This is a
    /// wiring bug, not a runtime condition.
    #[error("no handler registered for command {0}")]
    UnregisteredCommand(&'static str),

    /// A second handler was registered for the same command type.
    #[error("a handler is already registered for command {0}")]
    DuplicateHandler(&'static str),

    /// An infrastructure error (persistence or broker unavailable).
    #[error("infrastructure error: {0}")]
    Infrastructure(String),
}

impl DomainError {
    /// Returns `true` when retrying the same operation later may succeed.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Infrastructure(_) | Self::ConcurrencyConflict { .. }
        )
    }

    /// Returns `true` for wiring errors detected by the command bus.
    #[must_use]
    pub fn is_configuration(&self) -> bool {
        matches!(self, Self::UnregisteredCommand(_) | Self::DuplicateHandler(_))
    }
}
