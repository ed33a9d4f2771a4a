//! Chronicle: PostgreSQL-backed aggregate and event store.
//!
//! Each aggregate type owns two tables: the materialized aggregate table
//! (`id`, JSONB `state`, `deleted`) and its append-only event table. Table and
//! column names come from the aggregate's [`AggregateRoot`] constants.
//!
//! [`AggregateRoot`]: chronicle_core::aggregate::AggregateRoot

pub mod error;
pub mod pg_event_store;
pub mod schema;

pub use error::StoreError;
pub use pg_event_store::PgEventStore;
