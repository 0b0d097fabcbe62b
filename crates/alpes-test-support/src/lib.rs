//! Shared test doubles for the Alpes Partners backend.

mod broker;
mod clock;
mod dispatcher;
mod store;

pub use broker::{FailingBroker, RecordingBroker};
pub use clock::{FixedClock, fixed_clock};
pub use dispatcher::RecordingDispatcher;
pub use store::{FailingCommitStore, FailingStore};
