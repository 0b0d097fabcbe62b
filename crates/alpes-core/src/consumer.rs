//! Context consumer loop.
//!
//! Subscribes to a topic owned by a foreign context and feeds each decoded
//! record to a [`MessageHandler`]. A message is acknowledged only after its
//! handler returns `Ok`; on failure it is left unacknowledged and the loop
//! sleeps before the next receive, so the broker redelivers it. Delivery is
//! therefore at-least-once and handlers must be idempotent.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::watch;
use tracing::{debug, error, info, instrument, warn};

use crate::broker::{Delivery, IntegrationMessage, MessageBroker, SubscriptionMode};
use crate::error::DomainError;

/// Default pause after a failed message.
pub const DEFAULT_RETRY_DELAY: Duration = Duration::from_secs(5);

/// Reacts to one integration message.
#[async_trait]
pub trait MessageHandler: Send + Sync {
    /// Handles a decoded record. Returning `Err` leaves it for redelivery.
    async fn on_message(&self, message: IntegrationMessage) -> Result<(), DomainError>;
}

/// Where and how a consumer subscribes.
#[derive(Debug, Clone)]
pub struct ConsumerSettings {
    /// Topic to consume.
    pub topic: String,
    /// Durable subscription name shared by every worker instance.
    pub subscription: String,
    /// Subscription sharing mode.
    pub mode: SubscriptionMode,
    /// Pause after a failed message before receiving again.
    pub retry_delay: Duration,
}

impl ConsumerSettings {
    /// Shared subscription with the default retry delay.
    #[must_use]
    pub fn shared(topic: &str, subscription: &str) -> Self {
        Self {
            topic: topic.to_owned(),
            subscription: subscription.to_owned(),
            mode: SubscriptionMode::Shared,
            retry_delay: DEFAULT_RETRY_DELAY,
        }
    }

    /// Overrides the retry delay.
    #[must_use]
    pub fn with_retry_delay(mut self, retry_delay: Duration) -> Self {
        self.retry_delay = retry_delay;
        self
    }
}

/// What happened to one delivery.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryOutcome {
    /// Handled and acknowledged.
    Acknowledged,
    /// Undecodable and acknowledged so it cannot block the subscription.
    Discarded,
    /// Handler failed; left for redelivery.
    Failed,
}

/// Long-lived worker consuming one subscription.
pub struct ContextConsumer {
    broker: Arc<dyn MessageBroker>,
    handler: Arc<dyn MessageHandler>,
    settings: ConsumerSettings,
}

impl std::fmt::Debug for ContextConsumer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ContextConsumer")
            .field("settings", &self.settings)
            .finish_non_exhaustive()
    }
}

impl ContextConsumer {
    /// Creates a consumer.
    #[must_use]
    pub fn new(
        broker: Arc<dyn MessageBroker>,
        handler: Arc<dyn MessageHandler>,
        settings: ConsumerSettings,
    ) -> Self {
        Self {
            broker,
            handler,
            settings,
        }
    }

    /// Returns the consumer settings.
    #[must_use]
    pub fn settings(&self) -> &ConsumerSettings {
        &self.settings
    }

    /// Runs until `shutdown` changes or the subscription closes. A message
    /// already being processed runs to completion before the loop exits.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Infrastructure` if the subscription cannot be
    /// opened.
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) -> Result<(), DomainError> {
        let mut stream = self
            .broker
            .subscribe(
                &self.settings.topic,
                &self.settings.subscription,
                self.settings.mode,
            )
            .await?;
        info!(
            topic = %self.settings.topic,
            subscription = %self.settings.subscription,
            "consumer subscribed"
        );

        loop {
            if *shutdown.borrow() {
                break;
            }
            let next = tokio::select! {
                _ = shutdown.changed() => break,
                next = stream.next_delivery() => next,
            };
            match next {
                None => {
                    warn!(topic = %self.settings.topic, "subscription closed");
                    break;
                }
                Some(Err(err)) => {
                    error!(topic = %self.settings.topic, error = %err, "receive failed");
                    tokio::time::sleep(self.settings.retry_delay).await;
                }
                Some(Ok(delivery)) => {
                    if self.process(delivery).await == DeliveryOutcome::Failed {
                        tokio::time::sleep(self.settings.retry_delay).await;
                    }
                }
            }
        }

        info!(topic = %self.settings.topic, "consumer stopped");
        Ok(())
    }

    /// Decodes, handles and acknowledges one delivery.
    #[instrument(skip(self, delivery), fields(topic = %self.settings.topic, attempt = delivery.attempt()))]
    pub async fn process(&self, delivery: Delivery) -> DeliveryOutcome {
        let message = match IntegrationMessage::decode(delivery.payload()) {
            Ok(message) => message,
            Err(err) => {
                warn!(error = %err, "discarding malformed message");
                if let Err(err) = delivery.ack().await {
                    error!(error = %err, "failed to acknowledge malformed message");
                }
                return DeliveryOutcome::Discarded;
            }
        };

        let event_id = message.id;
        let event_type = message.event_type.clone();
        debug!(%event_id, %event_type, "message received");

        match self.handler.on_message(message).await {
            Ok(()) => {
                if let Err(err) = delivery.ack().await {
                    error!(%event_id, error = %err, "failed to acknowledge message");
                }
                DeliveryOutcome::Acknowledged
            }
            Err(err) => {
                error!(
                    %event_id,
                    %event_type,
                    error = %err,
                    retryable = err.is_retryable(),
                    "message handling failed, leaving it for redelivery"
                );
                DeliveryOutcome::Failed
            }
        }
    }
}
