//! Alpes Store: persistence adapters for the aggregate snapshot port.
//!
//! [`memory::InMemoryStore`] backs tests and single-process runs;
//! [`postgres::PgStore`] is the production adapter.

pub mod memory;
pub mod postgres;
