//! Application services for users.

pub mod command_handlers;
pub mod query_handlers;
