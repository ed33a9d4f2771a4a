//! Storage abstraction for aggregates and their event logs.
//!
//! The write side goes through a [`UnitOfWork`]: one transaction that locks
//! the target aggregate row, saves the mutated aggregate and appends the event.
//! Dropping a unit of work without calling [`UnitOfWork::commit`] rolls both
//! writes back.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::aggregate::{AggregateRoot, AggregateScope};
use crate::error::DomainError;
use crate::event::EventRecord;

/// Resolved event query, as executed by a store. Results are ordered by id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventFilter {
    /// Every event in the log.
    All,
    /// Events with `created_at <= cutoff`.
    CreatedUntil(DateTime<Utc>),
    /// Events whose id is in the set.
    Ids(Vec<i64>),
    /// Events with `from <= id <= to`.
    IdBetween {
        /// Lowest id, inclusive.
        from: i64,
        /// Highest id, inclusive.
        to: i64,
    },
    /// The full history of one aggregate.
    Aggregate(i64),
}

impl EventFilter {
    /// Returns whether `event` satisfies the filter.
    #[must_use]
    pub fn matches(&self, event: &EventRecord) -> bool {
        match self {
            Self::All => true,
            Self::CreatedUntil(cutoff) => event.created_at() <= *cutoff,
            Self::Ids(ids) => event.id().is_some_and(|id| ids.contains(&id)),
            Self::IdBetween { from, to } => event.id().is_some_and(|id| (*from..=*to).contains(&id)),
            Self::Aggregate(aggregate_id) => event.aggregate_id() == Some(*aggregate_id),
        }
    }
}

/// One atomic write of an aggregate together with its new event.
#[async_trait]
pub trait UnitOfWork<A: AggregateRoot>: Send {
    /// Loads an aggregate and holds an exclusive lock on its row until the
    /// unit of work ends. Destroyed aggregates are returned too.
    async fn lock_aggregate(&mut self, id: i64) -> Result<Option<A>, DomainError>;

    /// Inserts (assigning an id) or updates the aggregate.
    async fn save_aggregate(&mut self, aggregate: &mut A) -> Result<(), DomainError>;

    /// Appends an event, returning it with its assigned id.
    async fn append_event(&mut self, event: EventRecord) -> Result<EventRecord, DomainError>;

    /// Makes every write of this unit of work durable.
    async fn commit(self: Box<Self>) -> Result<(), DomainError>;

    /// Discards every write of this unit of work.
    async fn rollback(self: Box<Self>) -> Result<(), DomainError>;
}

/// Store for one aggregate type and its event log.
#[async_trait]
pub trait EventStore<A: AggregateRoot>: Send + Sync {
    /// Opens a unit of work.
    async fn begin(&self) -> Result<Box<dyn UnitOfWork<A>>, DomainError>;

    /// Reads one aggregate without locking it.
    async fn find_aggregate(
        &self,
        id: i64,
        scope: AggregateScope,
    ) -> Result<Option<A>, DomainError>;

    /// Reads all aggregates visible in `scope`, ordered by id.
    async fn list_aggregates(&self, scope: AggregateScope) -> Result<Vec<A>, DomainError>;

    /// Saves an aggregate outside of any unit of work.
    ///
    /// An aggregate carrying an id is written under that id, inserting the
    /// row if it is missing. An aggregate without one is inserted and gets a
    /// fresh id.
    async fn save_aggregate(&self, aggregate: &mut A) -> Result<(), DomainError>;

    /// Loads the events matching `filter`, ordered by id.
    async fn load_events(&self, filter: &EventFilter) -> Result<Vec<EventRecord>, DomainError>;

    /// Returns the highest event id in the log, if any.
    async fn max_event_id(&self) -> Result<Option<i64>, DomainError>;
}
