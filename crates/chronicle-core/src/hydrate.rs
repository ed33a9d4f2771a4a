//! Hydration: rebuilding aggregate state by replaying the event log.
//!
//! Replay is an in-memory fold over an ordered event selection. It never goes
//! through the locking persistence path; when results are materialized, each
//! final snapshot is written once with a plain save.

use std::collections::BTreeMap;
use std::ops::{Bound, RangeBounds};

use chrono::{DateTime, Utc};
use tracing::{debug, info, instrument};

use crate::aggregate::{AggregateKey, AggregateRoot};
use crate::error::DomainError;
use crate::event::{EventRecord, EventRegistry};
use crate::store::{EventFilter, EventStore};

/// Final snapshots of a replay, keyed by aggregate.
pub type Snapshots<A> = BTreeMap<AggregateKey, A>;

/// Which events a replay covers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventSelection {
    /// The whole log.
    All,
    /// Every event recorded at or before the cutoff.
    CreatedUntil(DateTime<Utc>),
    /// An explicit, possibly sparse, set of event ids.
    Ids(Vec<i64>),
    /// A range of event ids.
    ///
    /// An unbounded end, or an end that would leave the range empty, is
    /// resolved against the highest event id at query time.
    Range {
        /// Lower bound.
        start: Bound<i64>,
        /// Upper bound.
        end: Bound<i64>,
    },
}

impl EventSelection {
    /// Selects a range of event ids, e.g. `EventSelection::range(5..)`.
    pub fn range(bounds: impl RangeBounds<i64>) -> Self {
        Self::Range {
            start: bounds.start_bound().cloned(),
            end: bounds.end_bound().cloned(),
        }
    }
}

/// Whether replay results are written back to the aggregate table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum HydrationMode {
    /// Compute snapshots only.
    InMemory,
    /// Compute snapshots, then save each one.
    #[default]
    Materialize,
}

/// Replays the selected events and returns the resulting snapshots.
///
/// # Errors
///
/// - `DomainError::UnknownEventType` naming the first event whose
///   discriminator is not registered; nothing is materialized in that case.
/// - Any error from an event's `apply` or from the store.
#[instrument(skip(store, registry), fields(aggregate_type = A::AGGREGATE_TYPE))]
pub async fn hydrate<A: AggregateRoot>(
    store: &dyn EventStore<A>,
    registry: &EventRegistry<A>,
    selection: &EventSelection,
    mode: HydrationMode,
) -> Result<Snapshots<A>, DomainError> {
    let events = match resolve_selection(store, selection).await? {
        Some(filter) => store.load_events(&filter).await?,
        None => Vec::new(),
    };

    let mut snapshots = fold_events(registry, &events)?;

    if mode == HydrationMode::Materialize {
        for snapshot in snapshots.values_mut() {
            store.save_aggregate(snapshot).await?;
        }
    }

    info!(
        events = events.len(),
        aggregates = snapshots.len(),
        ?mode,
        "hydration complete"
    );

    Ok(snapshots)
}

/// Folds events, in the given order, into one snapshot per aggregate key.
///
/// Events without an aggregate are accumulated under
/// [`AggregateKey::Pending`]. Every key starts from a fresh default snapshot;
/// persisted keys get their identity assigned up front.
///
/// # Errors
///
/// Returns `DomainError::UnknownEventType` for an unregistered discriminator,
/// or whatever an event's `apply` returns.
pub fn fold_events<'a, A: AggregateRoot>(
    registry: &EventRegistry<A>,
    events: impl IntoIterator<Item = &'a EventRecord>,
) -> Result<Snapshots<A>, DomainError> {
    let mut snapshots: Snapshots<A> = BTreeMap::new();

    for event in events {
        let registration = registry.resolve(event)?;
        let key = event.key();
        let current = snapshots.remove(&key).unwrap_or_else(|| blank(key));
        let next = registration.apply(event, current)?;
        snapshots.insert(key, next);
    }

    Ok(snapshots)
}

fn blank<A: AggregateRoot>(key: AggregateKey) -> A {
    let mut aggregate = A::default();
    if let AggregateKey::Persisted(id) = key {
        aggregate.assign_id(id);
    }
    aggregate
}

/// Turns a selection into a concrete store filter. `None` means the
/// selection is empty.
async fn resolve_selection<A: AggregateRoot>(
    store: &dyn EventStore<A>,
    selection: &EventSelection,
) -> Result<Option<EventFilter>, DomainError> {
    let filter = match selection {
        EventSelection::All => EventFilter::All,
        EventSelection::CreatedUntil(cutoff) => EventFilter::CreatedUntil(*cutoff),
        EventSelection::Ids(ids) if ids.is_empty() => return Ok(None),
        EventSelection::Ids(ids) => EventFilter::Ids(ids.clone()),
        EventSelection::Range { start, end } => {
            let from = match start {
                Bound::Included(from) => *from,
                Bound::Excluded(from) => from.saturating_add(1),
                Bound::Unbounded => i64::MIN,
            };
            let to = match end {
                Bound::Included(to) if *to >= from => Some(*to),
                Bound::Excluded(to) if *to > from => Some(to.saturating_sub(1)),
                _ => None,
            };
            let to = match to {
                Some(to) => to,
                None => match store.max_event_id().await? {
                    Some(max) => {
                        debug!(from, max, "open range resolved against max event id");
                        max
                    }
                    None => return Ok(None),
                },
            };
            EventFilter::IdBetween { from, to }
        }
    };
    Ok(Some(filter))
}
