//! Dispatcher that keeps what it was handed.

use std::sync::Mutex;

use async_trait::async_trait;
use alpes_core::event::RecordedEvent;
use alpes_core::publisher::EventDispatcher;

/// Records every dispatched event. Useful for asserting what a committed
/// unit of work would have published.
#[derive(Debug, Default)]
pub struct RecordingDispatcher {
    dispatched: Mutex<Vec<RecordedEvent>>,
}

impl RecordingDispatcher {
    /// Creates an empty dispatcher.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a snapshot of all dispatched events.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    pub fn dispatched(&self) -> Vec<RecordedEvent> {
        self.dispatched.lock().unwrap().clone()
    }

    /// Returns the types of all dispatched events, in order.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    pub fn event_types(&self) -> Vec<String> {
        self.dispatched()
            .iter()
            .map(|event| event.metadata.event_type.clone())
            .collect()
    }
}

#[async_trait]
impl EventDispatcher for RecordingDispatcher {
    async fn dispatch(&self, events: &[RecordedEvent]) {
        self.dispatched.lock().unwrap().extend_from_slice(events);
    }
}
