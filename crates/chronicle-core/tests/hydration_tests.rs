//! Replay over event selections, exercised against the in-memory store.

mod common;

use chrono::Duration;
use chronicle_core::aggregate::AggregateKey;
use chronicle_core::error::DomainError;
use chronicle_core::hydrate::{EventSelection, HydrationMode, hydrate};
use chronicle_core::payload::Payload;
use chronicle_test_support::InMemoryEventStore;

use common::{Ledger, registry, start_of_day};

fn payload(attribute: &str, value: impl serde::Serialize) -> Payload {
    let mut payload = Payload::new();
    payload.set(attribute, value).unwrap();
    payload
}

/// Seeds two ledgers, one event per minute:
///
/// | id | ledger | event          |
/// |----|--------|----------------|
/// | 1  | 1      | Opened "ada"   |
/// | 2  | 2      | Opened "grace" |
/// | 3  | 1      | Deposited 10   |
/// | 4  | 2      | Deposited 7    |
/// | 5  | 1      | Deposited 5    |
fn seeded_store() -> InMemoryEventStore<Ledger> {
    let store = InMemoryEventStore::new();
    let rows = [
        (1, "Opened", payload("owner", "ada")),
        (2, "Opened", payload("owner", "grace")),
        (1, "Deposited", payload("amount", 10)),
        (2, "Deposited", payload("amount", 7)),
        (1, "Deposited", payload("amount", 5)),
    ];
    for (minute, (ledger_id, event_type, payload)) in (0_i64..).zip(rows) {
        store.insert_raw_event(
            ledger_id,
            event_type,
            payload,
            start_of_day() + Duration::minutes(minute),
        );
    }
    store
}

#[tokio::test]
async fn test_full_replay_rebuilds_every_aggregate() {
    // Arrange
    let store = seeded_store();

    // Act
    let snapshots = hydrate(&store, &registry(), &EventSelection::All, HydrationMode::InMemory)
        .await
        .unwrap();

    // Assert
    let ada = &snapshots[&AggregateKey::Persisted(1)];
    assert_eq!(ada.id, Some(1));
    assert_eq!(ada.owner, "ada");
    assert_eq!(ada.balance, 15);
    assert_eq!(snapshots[&AggregateKey::Persisted(2)].balance, 7);
    assert!(store.aggregates().is_empty());
}

#[tokio::test]
async fn test_replay_is_deterministic() {
    let store = seeded_store();

    let first = hydrate(&store, &registry(), &EventSelection::All, HydrationMode::InMemory)
        .await
        .unwrap();
    let second = hydrate(&store, &registry(), &EventSelection::All, HydrationMode::InMemory)
        .await
        .unwrap();

    assert_eq!(first, second);
}

#[tokio::test]
async fn test_materialized_replay_writes_each_snapshot_once() {
    let store = seeded_store();

    let snapshots = hydrate(
        &store,
        &registry(),
        &EventSelection::All,
        HydrationMode::Materialize,
    )
    .await
    .unwrap();

    assert_eq!(
        store.aggregates(),
        snapshots.into_values().collect::<Vec<_>>()
    );
    assert_eq!(store.events().len(), 5);
}

#[tokio::test]
async fn test_cutoff_replay_stops_at_timestamp() {
    let store = seeded_store();
    let cutoff = start_of_day() + Duration::minutes(2);

    let snapshots = hydrate(
        &store,
        &registry(),
        &EventSelection::CreatedUntil(cutoff),
        HydrationMode::InMemory,
    )
    .await
    .unwrap();

    assert_eq!(snapshots[&AggregateKey::Persisted(1)].balance, 10);
    assert_eq!(snapshots[&AggregateKey::Persisted(2)].balance, 0);
}

#[tokio::test]
async fn test_open_range_runs_to_latest_event() {
    // Arrange
    let store = seeded_store();

    // Act
    let snapshots = hydrate(
        &store,
        &registry(),
        &EventSelection::range(3..),
        HydrationMode::InMemory,
    )
    .await
    .unwrap();

    // Assert
    let ada = &snapshots[&AggregateKey::Persisted(1)];
    assert_eq!(ada.owner, "");
    assert_eq!(ada.balance, 15);
    assert_eq!(snapshots[&AggregateKey::Persisted(2)].balance, 7);
}

#[tokio::test]
async fn test_inverted_range_end_resolves_to_latest_event() {
    let store = seeded_store();

    let snapshots = hydrate(
        &store,
        &registry(),
        &EventSelection::range(4..2),
        HydrationMode::InMemory,
    )
    .await
    .unwrap();

    assert_eq!(snapshots[&AggregateKey::Persisted(1)].balance, 5);
    assert_eq!(snapshots[&AggregateKey::Persisted(2)].balance, 7);
}

#[tokio::test]
async fn test_bounded_range_is_inclusive() {
    let store = seeded_store();

    let snapshots = hydrate(
        &store,
        &registry(),
        &EventSelection::range(1..=3),
        HydrationMode::InMemory,
    )
    .await
    .unwrap();

    assert_eq!(snapshots[&AggregateKey::Persisted(1)].balance, 10);
    assert_eq!(snapshots[&AggregateKey::Persisted(2)].owner, "grace");
}

#[tokio::test]
async fn test_id_set_replays_only_listed_events() {
    let store = seeded_store();

    let snapshots = hydrate(
        &store,
        &registry(),
        &EventSelection::Ids(vec![2, 5]),
        HydrationMode::InMemory,
    )
    .await
    .unwrap();

    assert_eq!(snapshots[&AggregateKey::Persisted(1)].balance, 5);
    assert_eq!(snapshots[&AggregateKey::Persisted(2)].owner, "grace");
}

#[tokio::test]
async fn test_empty_selections_yield_nothing() {
    let empty = InMemoryEventStore::<Ledger>::new();
    let seeded = seeded_store();

    let open_range_on_empty_log = hydrate(
        &empty,
        &registry(),
        &EventSelection::range(1..),
        HydrationMode::Materialize,
    )
    .await
    .unwrap();
    let no_ids = hydrate(
        &seeded,
        &registry(),
        &EventSelection::Ids(Vec::new()),
        HydrationMode::Materialize,
    )
    .await
    .unwrap();

    assert!(open_range_on_empty_log.is_empty());
    assert!(no_ids.is_empty());
    assert!(seeded.aggregates().is_empty());
}

#[tokio::test]
async fn test_unknown_event_aborts_replay_without_writes() {
    // Arrange
    let store = seeded_store();
    let bad = store.insert_raw_event(2, "Frozen", Payload::new(), start_of_day());

    // Act
    let result = hydrate(
        &store,
        &registry(),
        &EventSelection::All,
        HydrationMode::Materialize,
    )
    .await;

    // Assert
    match result {
        Err(DomainError::UnknownEventType {
            event_id,
            event_type,
        }) => {
            assert_eq!(event_id, Some(bad));
            assert_eq!(event_type, "Frozen");
        }
        other => panic!("expected UnknownEventType, got {other:?}"),
    }
    assert!(store.aggregates().is_empty());
}
