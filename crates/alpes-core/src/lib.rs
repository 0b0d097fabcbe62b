//! Alpes Core: shared domain abstractions.
//!
//! This crate defines the traits and types every bounded context depends on:
//! aggregates and their pending events, the command bus, the unit of work,
//! the persistence and broker ports, the integration event publisher and the
//! consumer loop that drives choreography between contexts. It contains no
//! infrastructure code.

pub mod aggregate;
pub mod broker;
pub mod clock;
pub mod command;
pub mod consumer;
pub mod error;
pub mod event;
pub mod publisher;
pub mod query;
pub mod repository;
pub mod unit_of_work;
pub mod values;
