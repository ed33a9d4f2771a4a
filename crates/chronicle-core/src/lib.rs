//! Chronicle Core: event application, persistence and hydration.
//!
//! Aggregates are never written directly. Every change is an [`EventRecord`]
//! whose registered mutation is applied to the aggregate inside one unit of
//! work ([`persist_event`]), and any past state can be rebuilt by replaying
//! the log ([`hydrate`]). Storage backends implement [`EventStore`].
//!
//! [`EventRecord`]: event::EventRecord
//! [`persist_event`]: persist::persist_event
//! [`hydrate`]: hydrate::hydrate
//! [`EventStore`]: store::EventStore

pub mod aggregate;
pub mod clock;
pub mod command;
pub mod error;
pub mod event;
pub mod hydrate;
pub mod payload;
pub mod persist;
pub mod store;
