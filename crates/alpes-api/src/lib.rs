//! Alpes Partners: process wiring for the API server and the campaign worker.

pub mod bootstrap;
pub mod config;
pub mod error;
pub mod routes;
pub mod state;
pub mod telemetry;
