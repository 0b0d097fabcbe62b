//! In-memory broker.
//!
//! Topics keep published records until every subscription has acknowledged
//! them; a topic nobody subscribes to keeps everything. A subscription is
//! created on first use, starts from the oldest retained record and is
//! shared by every consumer that attaches under the same name. A delivery
//! that is not acknowledged within `ack_wait` becomes visible again with its
//! attempt counter incremented.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Notify;
use tokio::time::Instant;
use tracing::debug;

use alpes_core::broker::{
    Acknowledger, Delivery, IntegrationMessage, MessageBroker, MessageStream, SubscriptionMode,
};
use alpes_core::error::DomainError;

/// Redelivery timeout used by [`InMemoryBroker::new`].
pub const DEFAULT_ACK_WAIT: Duration = Duration::from_secs(30);

#[derive(Debug, Default)]
struct TopicState {
    log: VecDeque<Vec<u8>>,
    /// Sequence number of the first record in `log`.
    first_seq: u64,
    subscriptions: HashMap<String, Arc<Subscription>>,
}

impl TopicState {
    fn next_seq(&self) -> u64 {
        self.first_seq + self.log.len() as u64
    }

    /// Drops the records every subscription has acknowledged.
    fn trim(&mut self) -> Result<(), DomainError> {
        if self.subscriptions.is_empty() {
            return Ok(());
        }
        let mut floor = self.next_seq();
        for subscription in self.subscriptions.values() {
            if let Some(oldest) = lock(&subscription.queue)?.oldest_unacked() {
                floor = floor.min(oldest);
            }
        }
        while self.first_seq < floor && self.log.pop_front().is_some() {
            self.first_seq += 1;
        }
        Ok(())
    }
}

#[derive(Debug)]
struct Subscription {
    mode: SubscriptionMode,
    queue: Mutex<Queue>,
    notify: Notify,
}

#[derive(Debug, Default)]
struct Queue {
    ready: VecDeque<Pending>,
    in_flight: HashMap<u64, InFlight>,
    next_tag: u64,
    consumers: usize,
}

#[derive(Debug)]
struct Pending {
    seq: u64,
    payload: Vec<u8>,
    attempt: u32,
}

#[derive(Debug)]
struct InFlight {
    seq: u64,
    payload: Vec<u8>,
    attempt: u32,
    deadline: Instant,
}

impl Queue {
    /// Moves expired in-flight deliveries back to the head of the queue,
    /// oldest first.
    fn requeue_expired(&mut self, now: Instant) {
        let mut expired: Vec<u64> = self
            .in_flight
            .iter()
            .filter(|(_, delivery)| delivery.deadline <= now)
            .map(|(tag, _)| *tag)
            .collect();
        expired.sort_unstable();
        for tag in expired.into_iter().rev() {
            if let Some(delivery) = self.in_flight.remove(&tag) {
                self.ready.push_front(Pending {
                    seq: delivery.seq,
                    payload: delivery.payload,
                    attempt: delivery.attempt + 1,
                });
            }
        }
    }

    fn next_deadline(&self) -> Option<Instant> {
        self.in_flight.values().map(|d| d.deadline).min()
    }

    fn oldest_unacked(&self) -> Option<u64> {
        let ready = self.ready.iter().map(|p| p.seq);
        let in_flight = self.in_flight.values().map(|d| d.seq);
        ready.chain(in_flight).min()
    }
}

/// Process-local broker. Clones share the same topics.
#[derive(Debug, Clone)]
pub struct InMemoryBroker {
    topics: Arc<Mutex<HashMap<String, TopicState>>>,
    ack_wait: Duration,
}

impl Default for InMemoryBroker {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryBroker {
    /// Creates a broker with the default redelivery timeout.
    #[must_use]
    pub fn new() -> Self {
        Self::with_ack_wait(DEFAULT_ACK_WAIT)
    }

    /// Creates a broker that redelivers unacknowledged messages after
    /// `ack_wait`.
    #[must_use]
    pub fn with_ack_wait(ack_wait: Duration) -> Self {
        Self {
            topics: Arc::new(Mutex::new(HashMap::new())),
            ack_wait,
        }
    }

    /// Records a topic still retains, oldest first. Records every
    /// subscription has acknowledged are gone.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Infrastructure` if a stored record cannot be
    /// decoded or the broker lock is poisoned.
    pub fn published(&self, topic: &str) -> Result<Vec<IntegrationMessage>, DomainError> {
        let topics = lock(&self.topics)?;
        topics
            .get(topic)
            .map(|state| state.log.iter())
            .into_iter()
            .flatten()
            .map(|payload| IntegrationMessage::decode(payload))
            .collect()
    }

    /// Messages of a subscription that are queued or awaiting an ack.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Infrastructure` if a lock is poisoned.
    pub fn backlog(&self, topic: &str, subscription: &str) -> Result<usize, DomainError> {
        let Some(subscription) = lock(&self.topics)?
            .get(topic)
            .and_then(|state| state.subscriptions.get(subscription))
            .cloned()
        else {
            return Ok(0);
        };
        let queue = lock(&subscription.queue)?;
        Ok(queue.ready.len() + queue.in_flight.len())
    }
}

#[async_trait]
impl MessageBroker for InMemoryBroker {
    async fn publish(&self, topic: &str, message: &IntegrationMessage) -> Result<(), DomainError> {
        let payload = message.encode()?;
        {
            // Queued under the topic lock so a concurrent trim sees the record.
            let mut topics = lock(&self.topics)?;
            let state = topics.entry(topic.to_owned()).or_default();
            let seq = state.next_seq();
            state.log.push_back(payload.clone());
            for subscription in state.subscriptions.values() {
                lock(&subscription.queue)?.ready.push_back(Pending {
                    seq,
                    payload: payload.clone(),
                    attempt: 1,
                });
                subscription.notify.notify_one();
            }
        }
        debug!(topic, event_type = %message.event_type, "message published");
        Ok(())
    }

    async fn subscribe(
        &self,
        topic: &str,
        subscription: &str,
        mode: SubscriptionMode,
    ) -> Result<Box<dyn MessageStream>, DomainError> {
        let shared = {
            let mut topics = lock(&self.topics)?;
            let TopicState {
                log,
                first_seq,
                subscriptions,
            } = topics.entry(topic.to_owned()).or_default();
            Arc::clone(
                subscriptions
                    .entry(subscription.to_owned())
                    .or_insert_with(|| {
                        let ready = (*first_seq..)
                            .zip(log.iter())
                            .map(|(seq, payload)| Pending {
                                seq,
                                payload: payload.clone(),
                                attempt: 1,
                            })
                            .collect();
                        Arc::new(Subscription {
                            mode,
                            queue: Mutex::new(Queue {
                                ready,
                                ..Queue::default()
                            }),
                            notify: Notify::new(),
                        })
                    }),
            )
        };

        {
            let mut queue = lock(&shared.queue)?;
            let exclusive =
                shared.mode == SubscriptionMode::Exclusive || mode == SubscriptionMode::Exclusive;
            if exclusive && queue.consumers > 0 {
                return Err(DomainError::Infrastructure(format!(
                    "subscription {subscription} on {topic} is exclusive and already has a consumer"
                )));
            }
            queue.consumers += 1;
        }
        debug!(topic, subscription, "consumer attached");

        Ok(Box::new(InMemoryStream {
            topics: Arc::clone(&self.topics),
            topic: topic.to_owned(),
            subscription: shared,
            ack_wait: self.ack_wait,
        }))
    }
}

struct InMemoryStream {
    topics: Arc<Mutex<HashMap<String, TopicState>>>,
    topic: String,
    subscription: Arc<Subscription>,
    ack_wait: Duration,
}

impl Drop for InMemoryStream {
    fn drop(&mut self) {
        if let Ok(mut queue) = self.subscription.queue.lock() {
            queue.consumers = queue.consumers.saturating_sub(1);
        }
    }
}

#[async_trait]
impl MessageStream for InMemoryStream {
    async fn next_delivery(&mut self) -> Option<Result<Delivery, DomainError>> {
        loop {
            let wait_until = {
                let mut queue = match lock(&self.subscription.queue) {
                    Ok(queue) => queue,
                    Err(err) => return Some(Err(err)),
                };
                let now = Instant::now();
                queue.requeue_expired(now);
                if let Some(pending) = queue.ready.pop_front() {
                    let tag = queue.next_tag;
                    queue.next_tag += 1;
                    queue.in_flight.insert(
                        tag,
                        InFlight {
                            seq: pending.seq,
                            payload: pending.payload.clone(),
                            attempt: pending.attempt,
                            deadline: now + self.ack_wait,
                        },
                    );
                    let ack = InMemoryAck {
                        topics: Arc::clone(&self.topics),
                        topic: self.topic.clone(),
                        subscription: Arc::clone(&self.subscription),
                        tag,
                    };
                    return Some(Ok(Delivery::new(
                        pending.payload,
                        pending.attempt,
                        Box::new(ack),
                    )));
                }
                queue.next_deadline()
            };

            match wait_until {
                Some(deadline) => {
                    tokio::select! {
                        () = self.subscription.notify.notified() => {}
                        () = tokio::time::sleep_until(deadline) => {}
                    }
                }
                None => self.subscription.notify.notified().await,
            }
        }
    }
}

struct InMemoryAck {
    topics: Arc<Mutex<HashMap<String, TopicState>>>,
    topic: String,
    subscription: Arc<Subscription>,
    tag: u64,
}

#[async_trait]
impl Acknowledger for InMemoryAck {
    async fn ack(&self) -> Result<(), DomainError> {
        lock(&self.subscription.queue)?.in_flight.remove(&self.tag);
        if let Some(state) = lock(&self.topics)?.get_mut(&self.topic) {
            state.trim()?;
        }
        Ok(())
    }
}

fn lock<T>(mutex: &Mutex<T>) -> Result<MutexGuard<'_, T>, DomainError> {
    mutex
        .lock()
        .map_err(|_| DomainError::Infrastructure("in-memory broker lock poisoned".into()))
}
