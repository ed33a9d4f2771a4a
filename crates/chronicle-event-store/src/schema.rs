//! SQL statements for one aggregate type.
//!
//! Table names are compile-time constants on the aggregate, so the statements
//! are rendered once per store and reused for every query.

use chronicle_core::aggregate::AggregateRoot;

/// Rendered statements for the aggregate table `A::TABLE` and its event table
/// `A::EVENTS_TABLE`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Statements {
    /// `$1` id. Takes a row lock held until the transaction ends.
    pub lock_aggregate: String,
    /// `$1` id, `$2` whether destroyed rows are visible.
    pub find_aggregate: String,
    /// `$1` whether destroyed rows are visible.
    pub list_aggregates: String,
    /// `$1` state, `$2` deleted. Returns the new id.
    pub insert_aggregate: String,
    /// `$1` id, `$2` state, `$3` deleted. Returns whether a row was inserted.
    pub upsert_aggregate: String,
    /// Moves the id sequence past explicitly inserted ids.
    pub sync_aggregate_sequence: String,
    /// `$1` aggregate id, `$2` type, `$3` payload, `$4` `created_at`,
    /// `$5` `updated_at`. Returns the new id.
    pub append_event: String,
    /// Event columns, without a filter. Callers add `WHERE` and `ORDER BY`.
    pub select_events: String,
    /// Returns the highest event id, or `NULL` on an empty log.
    pub max_event_id: String,
    /// The aggregate's foreign key column in the event table.
    pub foreign_key: &'static str,
}

impl Statements {
    /// Renders the statements for `A`.
    #[must_use]
    pub fn for_aggregate<A: AggregateRoot>() -> Self {
        let table = A::TABLE;
        let events = A::EVENTS_TABLE;
        let fk = A::FOREIGN_KEY;
        Self {
            lock_aggregate: format!(
                "SELECT id, state FROM {table} WHERE id = $1 FOR UPDATE"
            ),
            find_aggregate: format!(
                "SELECT id, state FROM {table} WHERE id = $1 AND ($2 OR NOT deleted)"
            ),
            list_aggregates: format!(
                "SELECT id, state FROM {table} WHERE ($1 OR NOT deleted) ORDER BY id"
            ),
            insert_aggregate: format!(
                "INSERT INTO {table} (state, deleted) VALUES ($1, $2) RETURNING id"
            ),
            upsert_aggregate: format!(
                "INSERT INTO {table} (id, state, deleted) VALUES ($1, $2, $3) \
                 ON CONFLICT (id) DO UPDATE \
                 SET state = EXCLUDED.state, deleted = EXCLUDED.deleted, updated_at = NOW() \
                 RETURNING (xmax = 0) AS inserted"
            ),
            sync_aggregate_sequence: format!(
                "SELECT setval(pg_get_serial_sequence('{table}', 'id'), \
                 GREATEST((SELECT MAX(id) FROM {table}), 1))"
            ),
            append_event: format!(
                "INSERT INTO {events} ({fk}, event_type, payload, created_at, updated_at) \
                 VALUES ($1, $2, $3, $4, $5) RETURNING id"
            ),
            select_events: format!(
                "SELECT id, {fk} AS aggregate_id, event_type, payload, created_at, updated_at \
                 FROM {events}"
            ),
            max_event_id: format!("SELECT MAX(id) FROM {events}"),
            foreign_key: fk,
        }
    }
}

#[cfg(test)]
mod tests {
    use serde::{Deserialize, Serialize};

    use super::*;

    #[derive(Debug, Clone, Default, Serialize, Deserialize)]
    struct Invoice;

    impl AggregateRoot for Invoice {
        const AGGREGATE_TYPE: &'static str = "invoice";
        const TABLE: &'static str = "invoices";
        const EVENTS_TABLE: &'static str = "invoice_events";
        const FOREIGN_KEY: &'static str = "invoice_id";

        fn aggregate_id(&self) -> Option<i64> {
            None
        }

        fn assign_id(&mut self, _id: i64) {}

        fn is_destroyed(&self) -> bool {
            false
        }
    }

    #[test]
    fn test_statements_use_aggregate_table_names() {
        let statements = Statements::for_aggregate::<Invoice>();

        assert!(statements.lock_aggregate.contains("FROM invoices WHERE id = $1 FOR UPDATE"));
        assert!(statements.append_event.starts_with("INSERT INTO invoice_events (invoice_id,"));
        assert!(statements.select_events.contains("invoice_id AS aggregate_id"));
        assert!(
            statements
                .sync_aggregate_sequence
                .contains("pg_get_serial_sequence('invoices', 'id')")
        );
        assert_eq!(statements.foreign_key, "invoice_id");
    }
}
