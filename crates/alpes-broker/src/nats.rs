//! NATS JetStream broker.
//!
//! Each topic is backed by one stream capturing the subject of the same
//! name. A subscription is a durable pull consumer: every worker that
//! subscribes under the same name pulls from it, so JetStream load-balances
//! messages between them. Acks are explicit and unacknowledged messages are
//! redelivered after `ack_wait`. Streams are looked up or created once per
//! topic and process.

use std::collections::HashSet;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use async_nats::jetstream::{self, consumer, stream};
use async_trait::async_trait;
use futures::StreamExt;
use tracing::{debug, info};

use alpes_core::broker::{
    Acknowledger, Delivery, IntegrationMessage, MessageBroker, MessageStream, SubscriptionMode,
};
use alpes_core::error::DomainError;

/// JetStream-backed broker.
#[derive(Clone)]
pub struct NatsBroker {
    jetstream: jetstream::Context,
    ack_wait: Duration,
    known_streams: KnownStreams,
}

impl std::fmt::Debug for NatsBroker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NatsBroker")
            .field("ack_wait", &self.ack_wait)
            .field("known_streams", &self.known_streams)
            .finish_non_exhaustive()
    }
}

impl NatsBroker {
    /// Connects to a NATS server.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Infrastructure` if the connection fails.
    pub async fn connect(url: &str, ack_wait: Duration) -> Result<Self, DomainError> {
        let client = async_nats::connect(url).await.map_err(infrastructure)?;
        info!(url, "connected to NATS");
        Ok(Self {
            jetstream: jetstream::new(client),
            ack_wait,
            known_streams: KnownStreams::default(),
        })
    }

    async fn ensure_stream(&self, topic: &str) -> Result<stream::Stream, DomainError> {
        let stream = self
            .jetstream
            .get_or_create_stream(stream::Config {
                name: stream_name(topic),
                subjects: vec![topic.to_owned()],
                ..Default::default()
            })
            .await
            .map_err(infrastructure)?;
        self.known_streams.insert(topic)?;
        Ok(stream)
    }
}

/// Topics whose stream this process has already created or found.
#[derive(Debug, Clone, Default)]
struct KnownStreams(Arc<Mutex<HashSet<String>>>);

impl KnownStreams {
    /// Runs `create` unless the stream of `topic` is already known. A
    /// failed `create` is retried on the next call.
    async fn ensure<F, Fut, T>(&self, topic: &str, create: F) -> Result<(), DomainError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, DomainError>>,
    {
        if self.contains(topic)? {
            return Ok(());
        }
        create().await?;
        self.insert(topic)
    }

    fn contains(&self, topic: &str) -> Result<bool, DomainError> {
        Ok(self.lock()?.contains(topic))
    }

    fn insert(&self, topic: &str) -> Result<(), DomainError> {
        self.lock()?.insert(topic.to_owned());
        Ok(())
    }

    fn lock(&self) -> Result<MutexGuard<'_, HashSet<String>>, DomainError> {
        self.0
            .lock()
            .map_err(|_| DomainError::Infrastructure("nats stream cache lock poisoned".into()))
    }
}

#[async_trait]
impl MessageBroker for NatsBroker {
    async fn publish(&self, topic: &str, message: &IntegrationMessage) -> Result<(), DomainError> {
        self.known_streams
            .ensure(topic, || self.ensure_stream(topic))
            .await?;
        let payload = message.encode()?;
        self.jetstream
            .publish(topic.to_owned(), payload.into())
            .await
            .map_err(infrastructure)?
            .await
            .map_err(infrastructure)?;
        debug!(topic, event_type = %message.event_type, "message published");
        Ok(())
    }

    async fn subscribe(
        &self,
        topic: &str,
        subscription: &str,
        mode: SubscriptionMode,
    ) -> Result<Box<dyn MessageStream>, DomainError> {
        let stream = self.ensure_stream(topic).await?;
        let mut config = consumer::pull::Config {
            durable_name: Some(subscription.to_owned()),
            ack_policy: consumer::AckPolicy::Explicit,
            ack_wait: self.ack_wait,
            ..Default::default()
        };
        if mode == SubscriptionMode::Exclusive {
            config.max_waiting = 1;
        }
        let consumer: consumer::PullConsumer = stream
            .get_or_create_consumer(subscription, config)
            .await
            .map_err(infrastructure)?;
        let messages = consumer.messages().await.map_err(infrastructure)?;
        info!(topic, subscription, "durable consumer attached");
        Ok(Box::new(NatsStream {
            messages: Box::pin(messages),
        }))
    }
}

struct NatsStream {
    messages: Pin<Box<consumer::pull::Stream>>,
}

#[async_trait]
impl MessageStream for NatsStream {
    async fn next_delivery(&mut self) -> Option<Result<Delivery, DomainError>> {
        let next = self.messages.next().await?;
        Some(next.map_err(infrastructure).map(|message| {
            let attempt = message
                .info()
                .ok()
                .and_then(|info| u32::try_from(info.delivered).ok())
                .unwrap_or(1);
            let payload = message.payload.to_vec();
            Delivery::new(payload, attempt, Box::new(NatsAck { message }))
        }))
    }
}

struct NatsAck {
    message: jetstream::Message,
}

#[async_trait]
impl Acknowledger for NatsAck {
    async fn ack(&self) -> Result<(), DomainError> {
        self.message.ack().await.map_err(infrastructure)
    }
}

fn infrastructure(err: impl std::fmt::Display) -> DomainError {
    DomainError::Infrastructure(format!("nats: {err}"))
}

/// Stream names may not contain `.`, `*`, `>` or whitespace.
fn stream_name(topic: &str) -> String {
    topic
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() {
                c.to_ascii_uppercase()
            } else {
                '_'
            }
        })
        .collect()
}
