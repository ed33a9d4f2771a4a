//! Aggregate roots for user accounts.

use chronicle_core::aggregate::AggregateRoot;
use serde::{Deserialize, Serialize};

/// The aggregate root for a user account.
///
/// The identity lives in the table's `id` column, not in the serialized state.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    /// Aggregate identifier, assigned on first persistence.
    #[serde(skip)]
    pub id: Option<i64>,
    /// Display name.
    pub name: String,
    /// Contact address.
    pub email: Option<String>,
    /// bcrypt digest of the password. Never exposed by views.
    pub password_digest: Option<String>,
    /// Tombstone flag. Destroyed users are hidden from default reads.
    pub deleted: bool,
}

impl AggregateRoot for User {
    const AGGREGATE_TYPE: &'static str = "user";
    const TABLE: &'static str = "users";
    const EVENTS_TABLE: &'static str = "user_events";
    const FOREIGN_KEY: &'static str = "user_id";

    fn aggregate_id(&self) -> Option<i64> {
        self.id
    }

    fn assign_id(&mut self, id: i64) {
        self.id = Some(id);
    }

    fn is_destroyed(&self) -> bool {
        self.deleted
    }
}
