//! User domain model: aggregate, events and commands.

pub mod aggregates;
pub mod commands;
pub mod events;
