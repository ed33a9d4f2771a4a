//! Aggregate root abstraction.

use std::fmt;

use serde::Serialize;
use serde::de::DeserializeOwned;

/// Trait for aggregate roots whose state is derived from their event history.
///
/// Each aggregate type statically declares where it lives, so the engine never
/// has to discover its storage by reflection.
pub trait AggregateRoot:
    Clone + Default + fmt::Debug + Serialize + DeserializeOwned + Send + Sync + 'static
{
    /// Short type name used in logs (e.g. `"user"`).
    const AGGREGATE_TYPE: &'static str;

    /// Table holding the materialized aggregate rows.
    const TABLE: &'static str;

    /// Table holding this aggregate's event log.
    const EVENTS_TABLE: &'static str;

    /// Column in the events table referencing the aggregate.
    const FOREIGN_KEY: &'static str;

    /// Returns the identity, or `None` until the aggregate is first persisted.
    fn aggregate_id(&self) -> Option<i64>;

    /// Assigns the identity handed out by the store.
    fn assign_id(&mut self, id: i64);

    /// Whether the aggregate carries the tombstone flag.
    fn is_destroyed(&self) -> bool;

    /// Returns whether the aggregate has been persisted.
    fn is_persisted(&self) -> bool {
        self.aggregate_id().is_some()
    }
}

/// Which aggregates a read should see.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AggregateScope {
    /// Hide destroyed aggregates (the default read).
    #[default]
    Live,
    /// Include destroyed aggregates.
    WithDestroyed,
}

impl AggregateScope {
    /// Returns whether an aggregate with the given tombstone flag is visible.
    #[must_use]
    pub fn admits(self, destroyed: bool) -> bool {
        match self {
            Self::Live => !destroyed,
            Self::WithDestroyed => true,
        }
    }
}

/// Key under which the hydration engine accumulates a snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum AggregateKey {
    /// Events whose aggregate has not been persisted yet.
    Pending,
    /// Events for an aggregate with a known identity.
    Persisted(i64),
}

impl fmt::Display for AggregateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pending => f.write_str("build"),
            Self::Persisted(id) => write!(f, "{id}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_live_scope_hides_destroyed() {
        assert!(AggregateScope::Live.admits(false));
        assert!(!AggregateScope::Live.admits(true));
        assert!(AggregateScope::WithDestroyed.admits(true));
    }

    #[test]
    fn test_pending_key_sorts_first_and_displays_as_build() {
        let mut keys = vec![AggregateKey::Persisted(2), AggregateKey::Pending];
        keys.sort();

        assert_eq!(keys, vec![AggregateKey::Pending, AggregateKey::Persisted(2)]);
        assert_eq!(AggregateKey::Pending.to_string(), "build");
        assert_eq!(AggregateKey::Persisted(2).to_string(), "2");
    }
}
