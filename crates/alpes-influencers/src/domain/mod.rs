//! Domain layer: aggregate, value objects, commands and events.

pub mod aggregates;
pub mod commands;
pub mod events;
pub mod values;
