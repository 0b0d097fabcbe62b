pub mod aggregates;
pub mod commands;
pub mod events;
pub mod templates;
pub mod values;
