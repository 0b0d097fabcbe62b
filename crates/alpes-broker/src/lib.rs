//! Alpes Broker: adapters for the broker port.
//!
//! [`memory::InMemoryBroker`] gives shared durable subscriptions with
//! ack-timeout redelivery inside one process. [`nats::NatsBroker`] maps the
//! same contract onto JetStream streams and durable pull consumers.

pub mod memory;
pub mod nats;
