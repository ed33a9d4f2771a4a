//! Test stores: in-memory `EventStore` implementations for tests.

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use chronicle_core::aggregate::{AggregateRoot, AggregateScope};
use chronicle_core::error::DomainError;
use chronicle_core::event::EventRecord;
use chronicle_core::payload::Payload;
use chronicle_core::store::{EventFilter, EventStore, UnitOfWork};
use tokio::sync::{Mutex as RowLock, OwnedMutexGuard};

#[derive(Debug)]
struct Tables<A> {
    aggregates: BTreeMap<i64, A>,
    events: Vec<EventRecord>,
    next_aggregate_id: i64,
    next_event_id: i64,
}

impl<A> Default for Tables<A> {
    fn default() -> Self {
        Self {
            aggregates: BTreeMap::new(),
            events: Vec::new(),
            next_aggregate_id: 1,
            next_event_id: 1,
        }
    }
}

impl<A: AggregateRoot> Tables<A> {
    fn allocate_aggregate_id(&mut self) -> i64 {
        let id = self.next_aggregate_id;
        self.next_aggregate_id += 1;
        id
    }

    fn allocate_event_id(&mut self) -> i64 {
        let id = self.next_event_id;
        self.next_event_id += 1;
        id
    }

    fn put_aggregate(&mut self, aggregate: &mut A) {
        let id = if let Some(id) = aggregate.aggregate_id() {
            self.next_aggregate_id = self.next_aggregate_id.max(id + 1);
            id
        } else {
            let id = self.allocate_aggregate_id();
            aggregate.assign_id(id);
            id
        };
        self.aggregates.insert(id, aggregate.clone());
    }
}

#[derive(Debug, Default)]
struct Faults {
    save: AtomicBool,
    append: AtomicBool,
    commit: AtomicBool,
}

impl Faults {
    fn trip(flag: &AtomicBool, what: &str) -> Result<(), DomainError> {
        if flag.swap(false, Ordering::SeqCst) {
            Err(DomainError::Infrastructure(format!("injected {what} failure")))
        } else {
            Ok(())
        }
    }
}

#[derive(Debug)]
struct Shared<A> {
    tables: Mutex<Tables<A>>,
    row_locks: Mutex<HashMap<i64, Arc<RowLock<()>>>>,
    faults: Faults,
    write_latency: Mutex<Option<Duration>>,
}

/// An event store held entirely in memory.
///
/// Mirrors the PostgreSQL store's transactional model: a unit of work holds
/// a per-aggregate lock from `lock_aggregate` until it ends, stages its writes,
/// and publishes them together on commit. Dropping it discards the staged
/// writes. Ids are allocated like database sequences, so a rolled-back unit
/// still consumes the ids it drew.
#[derive(Debug)]
pub struct InMemoryEventStore<A> {
    shared: Arc<Shared<A>>,
}

impl<A> Clone for InMemoryEventStore<A> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<A: AggregateRoot> Default for InMemoryEventStore<A> {
    fn default() -> Self {
        Self::new()
    }
}

impl<A: AggregateRoot> InMemoryEventStore<A> {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self {
            shared: Arc::new(Shared {
                tables: Mutex::new(Tables::default()),
                row_locks: Mutex::new(HashMap::new()),
                faults: Faults::default(),
                write_latency: Mutex::new(None),
            }),
        }
    }

    /// Makes the next aggregate save inside a unit of work fail.
    pub fn fail_next_aggregate_save(&self) {
        self.shared.faults.save.store(true, Ordering::SeqCst);
    }

    /// Makes the next event append fail, after the aggregate has been saved.
    pub fn fail_next_append(&self) {
        self.shared.faults.append.store(true, Ordering::SeqCst);
    }

    /// Makes the next commit fail.
    pub fn fail_next_commit(&self) {
        self.shared.faults.commit.store(true, Ordering::SeqCst);
    }

    /// Sleeps for `latency` on every aggregate save inside a unit of work,
    /// widening the window in which concurrent writers could interleave.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    pub fn set_write_latency(&self, latency: Duration) {
        *self.shared.write_latency.lock().unwrap() = Some(latency);
    }

    /// Returns every committed event, in log order.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    pub fn events(&self) -> Vec<EventRecord> {
        self.shared.tables.lock().unwrap().events.clone()
    }

    /// Returns every committed aggregate row, destroyed ones included.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    pub fn aggregates(&self) -> Vec<A> {
        self.shared
            .tables
            .lock()
            .unwrap()
            .aggregates
            .values()
            .cloned()
            .collect()
    }

    /// Appends a raw event row directly, bypassing the registry and the
    /// aggregate table. Returns the assigned id.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    pub fn insert_raw_event(
        &self,
        aggregate_id: i64,
        event_type: &str,
        payload: Payload,
        created_at: DateTime<Utc>,
    ) -> i64 {
        let mut tables = self.shared.tables.lock().unwrap();
        let id = tables.allocate_event_id();
        tables.events.push(EventRecord::restore(
            id,
            aggregate_id,
            event_type.to_owned(),
            payload,
            created_at,
            created_at,
        ));
        id
    }

    /// Removes every aggregate row, keeping the event log.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    pub fn truncate_aggregates(&self) {
        self.shared.tables.lock().unwrap().aggregates.clear();
    }

    fn row_lock(&self, id: i64) -> Arc<RowLock<()>> {
        let mut locks = self.shared.row_locks.lock().unwrap();
        Arc::clone(locks.entry(id).or_default())
    }
}

#[async_trait]
impl<A: AggregateRoot> EventStore<A> for InMemoryEventStore<A> {
    async fn begin(&self) -> Result<Box<dyn UnitOfWork<A>>, DomainError> {
        Ok(Box::new(InMemoryUnitOfWork {
            store: self.clone(),
            guards: Vec::new(),
            staged_aggregates: BTreeMap::new(),
            staged_events: Vec::new(),
        }))
    }

    async fn find_aggregate(
        &self,
        id: i64,
        scope: AggregateScope,
    ) -> Result<Option<A>, DomainError> {
        let tables = self.shared.tables.lock().unwrap();
        Ok(tables
            .aggregates
            .get(&id)
            .filter(|aggregate| scope.admits(aggregate.is_destroyed()))
            .cloned())
    }

    async fn list_aggregates(&self, scope: AggregateScope) -> Result<Vec<A>, DomainError> {
        let tables = self.shared.tables.lock().unwrap();
        Ok(tables
            .aggregates
            .values()
            .filter(|aggregate| scope.admits(aggregate.is_destroyed()))
            .cloned()
            .collect())
    }

    async fn save_aggregate(&self, aggregate: &mut A) -> Result<(), DomainError> {
        self.shared.tables.lock().unwrap().put_aggregate(aggregate);
        Ok(())
    }

    async fn load_events(&self, filter: &EventFilter) -> Result<Vec<EventRecord>, DomainError> {
        let tables = self.shared.tables.lock().unwrap();
        Ok(tables
            .events
            .iter()
            .filter(|event| filter.matches(event))
            .cloned()
            .collect())
    }

    async fn max_event_id(&self) -> Result<Option<i64>, DomainError> {
        let tables = self.shared.tables.lock().unwrap();
        Ok(tables.events.iter().filter_map(EventRecord::id).max())
    }
}

struct InMemoryUnitOfWork<A> {
    store: InMemoryEventStore<A>,
    guards: Vec<OwnedMutexGuard<()>>,
    staged_aggregates: BTreeMap<i64, A>,
    staged_events: Vec<EventRecord>,
}

#[async_trait]
impl<A: AggregateRoot> UnitOfWork<A> for InMemoryUnitOfWork<A> {
    async fn lock_aggregate(&mut self, id: i64) -> Result<Option<A>, DomainError> {
        let lock = self.store.row_lock(id);
        let guard = lock.lock_owned().await;
        self.guards.push(guard);

        if let Some(staged) = self.staged_aggregates.get(&id) {
            return Ok(Some(staged.clone()));
        }
        let tables = self.store.shared.tables.lock().unwrap();
        Ok(tables.aggregates.get(&id).cloned())
    }

    async fn save_aggregate(&mut self, aggregate: &mut A) -> Result<(), DomainError> {
        let latency = *self.store.shared.write_latency.lock().unwrap();
        if let Some(latency) = latency {
            tokio::time::sleep(latency).await;
        }
        Faults::trip(&self.store.shared.faults.save, "aggregate save")?;

        let id = match aggregate.aggregate_id() {
            Some(id) => id,
            None => {
                let id = self.store.shared.tables.lock().unwrap().allocate_aggregate_id();
                aggregate.assign_id(id);
                id
            }
        };
        self.staged_aggregates.insert(id, aggregate.clone());
        Ok(())
    }

    async fn append_event(&mut self, event: EventRecord) -> Result<EventRecord, DomainError> {
        Faults::trip(&self.store.shared.faults.append, "event append")?;

        let id = self.store.shared.tables.lock().unwrap().allocate_event_id();
        let event = event.into_persisted(id);
        self.staged_events.push(event.clone());
        Ok(event)
    }

    async fn commit(self: Box<Self>) -> Result<(), DomainError> {
        Faults::trip(&self.store.shared.faults.commit, "commit")?;

        let this = *self;
        let mut tables = this.store.shared.tables.lock().unwrap();
        for (id, aggregate) in this.staged_aggregates {
            tables.aggregates.insert(id, aggregate);
        }
        tables.events.extend(this.staged_events);
        tables.events.sort_by_key(|event| event.id());
        tracing::trace!(events = tables.events.len(), "in-memory unit of work committed");
        drop(tables);
        drop(this.guards);
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> Result<(), DomainError> {
        Ok(())
    }
}

/// An event store that always returns an infrastructure error. Useful for
/// testing error-handling paths.
#[derive(Debug)]
pub struct FailingEventStore;

fn refused() -> DomainError {
    DomainError::Infrastructure("connection refused".into())
}

#[async_trait]
impl<A: AggregateRoot> EventStore<A> for FailingEventStore {
    async fn begin(&self) -> Result<Box<dyn UnitOfWork<A>>, DomainError> {
        Err(refused())
    }

    async fn find_aggregate(
        &self,
        _id: i64,
        _scope: AggregateScope,
    ) -> Result<Option<A>, DomainError> {
        Err(refused())
    }

    async fn list_aggregates(&self, _scope: AggregateScope) -> Result<Vec<A>, DomainError> {
        Err(refused())
    }

    async fn save_aggregate(&self, _aggregate: &mut A) -> Result<(), DomainError> {
        Err(refused())
    }

    async fn load_events(&self, _filter: &EventFilter) -> Result<Vec<EventRecord>, DomainError> {
        Err(refused())
    }

    async fn max_event_id(&self) -> Result<Option<i64>, DomainError> {
        Err(refused())
    }
}
