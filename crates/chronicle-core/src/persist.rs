//! The locking event persistence path.

use tracing::{debug, instrument};

use crate::aggregate::AggregateRoot;
use crate::clock::Clock;
use crate::command::CommandOutcome;
use crate::error::DomainError;
use crate::event::{EventRecord, EventRegistry, Registration};
use crate::store::{EventStore, UnitOfWork};

/// An event together with the aggregate state it produced, both committed.
#[derive(Debug, Clone)]
pub struct Persisted<A> {
    /// The appended event, carrying its log id and aggregate id.
    pub event: EventRecord,
    /// The aggregate after the event was applied.
    pub aggregate: A,
}

/// Applies `event` to its aggregate and commits both in one unit of work.
///
/// An event with an `aggregate_id` locks that aggregate's row for the whole
/// unit of work, so concurrent writers to one aggregate apply one at a time.
/// An event without one builds a fresh aggregate, which is inserted and whose
/// new id is stamped onto the event before it is appended.
///
/// The event's timestamps are taken from `clock` once the row lock is held,
/// so one aggregate's events are ordered the same way by id and by
/// `created_at`.
///
/// # Errors
///
/// - `DomainError::EventAlreadyPersisted` if `event` already has a log id.
/// - `DomainError::UnknownEventType` if the discriminator is not registered.
/// - `DomainError::AggregateNotFound` if the targeted aggregate does not exist.
/// - Any error from the event's `apply` or from the store.
///
/// On every error path the unit of work is dropped uncommitted, so neither the
/// aggregate nor the event is written.
#[instrument(
    skip_all,
    fields(
        aggregate_type = A::AGGREGATE_TYPE,
        event_type = %event.event_type(),
        aggregate_id = ?event.aggregate_id(),
    )
)]
pub async fn persist_event<A: AggregateRoot>(
    store: &dyn EventStore<A>,
    registry: &EventRegistry<A>,
    clock: &dyn Clock,
    event: EventRecord,
) -> Result<Persisted<A>, DomainError> {
    let (registration, unit, current) = open(store, registry, &event).await?;
    write(unit, registration, clock, event, current).await
}

/// Like [`persist_event`], but asks the event whether it is a no-op against
/// the locked aggregate first. A no-op rolls the unit of work back and returns
/// the aggregate unchanged.
#[instrument(
    skip_all,
    fields(
        aggregate_type = A::AGGREGATE_TYPE,
        event_type = %event.event_type(),
        aggregate_id = ?event.aggregate_id(),
    )
)]
pub(crate) async fn persist_unless_noop<A: AggregateRoot>(
    store: &dyn EventStore<A>,
    registry: &EventRegistry<A>,
    clock: &dyn Clock,
    event: EventRecord,
) -> Result<CommandOutcome<A>, DomainError> {
    let (registration, unit, current) = open(store, registry, &event).await?;

    if registration.is_noop(&event, &current)? {
        unit.rollback().await?;
        debug!("no-op, unit of work rolled back");
        return Ok(CommandOutcome::Noop(current));
    }

    let persisted = write(unit, registration, clock, event, current).await?;
    Ok(CommandOutcome::Applied {
        event: persisted.event,
        aggregate: persisted.aggregate,
    })
}

async fn open<'r, A: AggregateRoot>(
    store: &dyn EventStore<A>,
    registry: &'r EventRegistry<A>,
    event: &EventRecord,
) -> Result<(&'r Registration<A>, Box<dyn UnitOfWork<A>>, A), DomainError> {
    if let Some(id) = event.id() {
        return Err(DomainError::EventAlreadyPersisted(id));
    }
    let registration = registry.resolve(event)?;

    let mut unit = store.begin().await?;

    let current = match event.aggregate_id() {
        Some(id) => unit
            .lock_aggregate(id)
            .await?
            .ok_or(DomainError::AggregateNotFound(id))?,
        None => A::default(),
    };

    Ok((registration, unit, current))
}

async fn write<A: AggregateRoot>(
    mut unit: Box<dyn UnitOfWork<A>>,
    registration: &Registration<A>,
    clock: &dyn Clock,
    mut event: EventRecord,
    current: A,
) -> Result<Persisted<A>, DomainError> {
    event.stamp(clock.now());

    let mut aggregate = registration.apply(&event, current)?;
    unit.save_aggregate(&mut aggregate).await?;

    let aggregate_id = aggregate.aggregate_id().ok_or_else(|| {
        DomainError::Infrastructure("store did not assign an aggregate id".to_owned())
    })?;
    event.assign_aggregate(aggregate_id)?;

    let event = unit.append_event(event).await?;
    unit.commit().await?;

    debug!(event_id = ?event.id(), aggregate_id, "event persisted");

    Ok(Persisted { event, aggregate })
}
