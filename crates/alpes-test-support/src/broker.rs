//! Test brokers: mock `MessageBroker` implementations for tests.

use std::sync::Mutex;

use async_trait::async_trait;
use alpes_core::broker::{IntegrationMessage, MessageBroker, MessageStream, SubscriptionMode};
use alpes_core::error::DomainError;

/// A broker that records every published message and refuses
/// subscriptions.
#[derive(Debug, Default)]
pub struct RecordingBroker {
    published: Mutex<Vec<(String, IntegrationMessage)>>,
}

impl RecordingBroker {
    /// Creates an empty broker.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a snapshot of all `(topic, message)` pairs published.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    pub fn published(&self) -> Vec<(String, IntegrationMessage)> {
        self.published.lock().unwrap().clone()
    }
}

#[async_trait]
impl MessageBroker for RecordingBroker {
    async fn publish(&self, topic: &str, message: &IntegrationMessage) -> Result<(), DomainError> {
        self.published
            .lock()
            .unwrap()
            .push((topic.to_owned(), message.clone()));
        Ok(())
    }

    async fn subscribe(
        &self,
        topic: &str,
        _subscription: &str,
        _mode: SubscriptionMode,
    ) -> Result<Box<dyn MessageStream>, DomainError> {
        Err(DomainError::Infrastructure(format!(
            "recording broker cannot subscribe to {topic}"
        )))
    }
}

/// A broker that is always unreachable. Useful for testing that publish
/// failures after commit are swallowed.
#[derive(Debug)]
pub struct FailingBroker;

#[async_trait]
impl MessageBroker for FailingBroker {
    async fn publish(&self, _topic: &str, _message: &IntegrationMessage) -> Result<(), DomainError> {
        Err(DomainError::Infrastructure("connection refused".into()))
    }

    async fn subscribe(
        &self,
        _topic: &str,
        _subscription: &str,
        _mode: SubscriptionMode,
    ) -> Result<Box<dyn MessageStream>, DomainError> {
        Err(DomainError::Infrastructure("connection refused".into()))
    }
}
