//! Integration event publisher.
//!
//! Invoked by the unit of work after the store commit is durable. Domain
//! events stay in-process; integration events are mapped to the wire schema
//! and sent to the topic owned by their aggregate type. Publish failures are
//! logged and not retried, so a broker outage after commit loses the event.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, error, info, warn};

use crate::broker::{IntegrationMessage, MessageBroker};
use crate::clock::Clock;
use crate::error::DomainError;
use crate::event::RecordedEvent;

/// Receives the events of a committed unit of work.
#[async_trait]
pub trait EventDispatcher: Send + Sync {
    /// Dispatches events. Never fails the caller: the write is already
    /// durable by the time this runs.
    async fn dispatch(&self, events: &[RecordedEvent]);
}

/// Fixed mapping from aggregate type to topic.
#[derive(Debug, Clone, Default)]
pub struct TopicRouter {
    routes: HashMap<String, String>,
}

impl TopicRouter {
    /// Creates an empty router.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Routes every integration event of `aggregate_type` to `topic`.
    #[must_use]
    pub fn route(mut self, aggregate_type: &str, topic: &str) -> Self {
        self.routes
            .insert(aggregate_type.to_owned(), topic.to_owned());
        self
    }

    /// Returns the topic for an aggregate type.
    #[must_use]
    pub fn topic_for(&self, aggregate_type: &str) -> Option<&str> {
        self.routes.get(aggregate_type).map(String::as_str)
    }
}

/// Publishes one context's integration events.
pub struct IntegrationEventPublisher {
    broker: Arc<dyn MessageBroker>,
    router: TopicRouter,
    source_service: String,
    clock: Arc<dyn Clock>,
}

impl std::fmt::Debug for IntegrationEventPublisher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IntegrationEventPublisher")
            .field("router", &self.router)
            .field("source_service", &self.source_service)
            .finish_non_exhaustive()
    }
}

impl IntegrationEventPublisher {
    /// Creates a publisher stamping `source_service` on every record.
    #[must_use]
    pub fn new(
        broker: Arc<dyn MessageBroker>,
        router: TopicRouter,
        source_service: impl Into<String>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            broker,
            router,
            source_service: source_service.into(),
            clock,
        }
    }

    /// Maps the event to the wire schema and publishes it to `topic`.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Infrastructure` if encoding or the broker fails.
    pub async fn publish(&self, event: &RecordedEvent, topic: &str) -> Result<(), DomainError> {
        let message =
            IntegrationMessage::from_event(event, &self.source_service, self.clock.epoch_millis());
        self.broker.publish(topic, &message).await?;
        info!(
            topic,
            event_type = %message.event_type,
            event_id = %message.id,
            "published integration event"
        );
        Ok(())
    }
}

#[async_trait]
impl EventDispatcher for IntegrationEventPublisher {
    async fn dispatch(&self, events: &[RecordedEvent]) {
        for event in events {
            if !event.is_integration() {
                debug!(event_type = %event.event_type(), "domain event kept in-process");
                continue;
            }
            let Some(topic) = self.router.topic_for(&event.metadata.aggregate_type) else {
                warn!(
                    aggregate_type = %event.metadata.aggregate_type,
                    event_type = %event.event_type(),
                    "no topic routed for aggregate type, event dropped"
                );
                continue;
            };
            if let Err(err) = self.publish(event, topic).await {
                error!(
                    topic,
                    event_type = %event.event_type(),
                    event_id = %event.metadata.event_id,
                    error = %err,
                    "failed to publish integration event"
                );
            }
        }
    }
}
