//! `PostgreSQL` implementation of the `EventStore` trait.

use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgConnection, PgPool, Postgres, Transaction};
use tracing::debug;

use chronicle_core::aggregate::{AggregateRoot, AggregateScope};
use chronicle_core::error::DomainError;
use chronicle_core::event::EventRecord;
use chronicle_core::payload::Payload;
use chronicle_core::store::{EventFilter, EventStore, UnitOfWork};

use crate::error::StoreError;
use crate::schema::Statements;

#[derive(Debug, sqlx::FromRow)]
struct AggregateRow {
    id: i64,
    state: serde_json::Value,
}

impl AggregateRow {
    fn into_aggregate<A: AggregateRoot>(self) -> Result<A, StoreError> {
        let mut aggregate: A = serde_json::from_value(self.state)?;
        aggregate.assign_id(self.id);
        Ok(aggregate)
    }
}

#[derive(Debug, sqlx::FromRow)]
struct EventRow {
    id: i64,
    aggregate_id: i64,
    event_type: String,
    payload: serde_json::Value,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl EventRow {
    fn into_record(self) -> Result<EventRecord, DomainError> {
        let payload = Payload::from_value(&self.event_type, self.payload)?;
        Ok(EventRecord::restore(
            self.id,
            self.aggregate_id,
            self.event_type,
            payload,
            self.created_at,
            self.updated_at,
        ))
    }
}

/// `PostgreSQL`-backed store for aggregate `A` and its event log.
pub struct PgEventStore<A> {
    pool: PgPool,
    statements: Arc<Statements>,
    aggregate: PhantomData<fn() -> A>,
}

impl<A: AggregateRoot> PgEventStore<A> {
    /// Creates a new `PgEventStore`.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool,
            statements: Arc::new(Statements::for_aggregate::<A>()),
            aggregate: PhantomData,
        }
    }

    async fn fetch_events(&self, filter: &EventFilter) -> Result<Vec<EventRow>, StoreError> {
        let select = &self.statements.select_events;
        let fk = self.statements.foreign_key;
        let rows = match filter {
            EventFilter::All => {
                sqlx::query_as::<_, EventRow>(&format!("{select} ORDER BY id"))
                    .fetch_all(&self.pool)
                    .await?
            }
            EventFilter::CreatedUntil(cutoff) => {
                sqlx::query_as::<_, EventRow>(&format!(
                    "{select} WHERE created_at <= $1 ORDER BY id"
                ))
                .bind(cutoff)
                .fetch_all(&self.pool)
                .await?
            }
            EventFilter::Ids(ids) => {
                sqlx::query_as::<_, EventRow>(&format!("{select} WHERE id = ANY($1) ORDER BY id"))
                    .bind(ids)
                    .fetch_all(&self.pool)
                    .await?
            }
            EventFilter::IdBetween { from, to } => {
                sqlx::query_as::<_, EventRow>(&format!(
                    "{select} WHERE id BETWEEN $1 AND $2 ORDER BY id"
                ))
                .bind(from)
                .bind(to)
                .fetch_all(&self.pool)
                .await?
            }
            EventFilter::Aggregate(aggregate_id) => {
                sqlx::query_as::<_, EventRow>(&format!("{select} WHERE {fk} = $1 ORDER BY id"))
                    .bind(aggregate_id)
                    .fetch_all(&self.pool)
                    .await?
            }
        };
        Ok(rows)
    }
}

impl<A> Clone for PgEventStore<A> {
    fn clone(&self) -> Self {
        Self {
            pool: self.pool.clone(),
            statements: Arc::clone(&self.statements),
            aggregate: PhantomData,
        }
    }
}

impl<A> fmt::Debug for PgEventStore<A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PgEventStore")
            .field("pool", &self.pool)
            .finish_non_exhaustive()
    }
}

/// Inserts `aggregate`, or upserts it under its existing id.
async fn write_aggregate<A: AggregateRoot>(
    conn: &mut PgConnection,
    statements: &Statements,
    aggregate: &mut A,
) -> Result<(), StoreError> {
    let state = serde_json::to_value(&*aggregate)?;
    let deleted = aggregate.is_destroyed();

    if let Some(id) = aggregate.aggregate_id() {
        let inserted: bool = sqlx::query_scalar(&statements.upsert_aggregate)
            .bind(id)
            .bind(&state)
            .bind(deleted)
            .fetch_one(&mut *conn)
            .await?;
        if inserted {
            sqlx::query(&statements.sync_aggregate_sequence)
                .execute(&mut *conn)
                .await?;
        }
    } else {
        let id: i64 = sqlx::query_scalar(&statements.insert_aggregate)
            .bind(&state)
            .bind(deleted)
            .fetch_one(&mut *conn)
            .await?;
        aggregate.assign_id(id);
    }
    Ok(())
}

#[async_trait]
impl<A: AggregateRoot> EventStore<A> for PgEventStore<A> {
    async fn begin(&self) -> Result<Box<dyn UnitOfWork<A>>, DomainError> {
        let tx = self.pool.begin().await.map_err(StoreError::from)?;
        Ok(Box::new(PgUnitOfWork {
            tx,
            statements: Arc::clone(&self.statements),
            aggregate: PhantomData,
        }))
    }

    async fn find_aggregate(
        &self,
        id: i64,
        scope: AggregateScope,
    ) -> Result<Option<A>, DomainError> {
        let row = sqlx::query_as::<_, AggregateRow>(&self.statements.find_aggregate)
            .bind(id)
            .bind(scope == AggregateScope::WithDestroyed)
            .fetch_optional(&self.pool)
            .await
            .map_err(StoreError::from)?;
        Ok(row.map(AggregateRow::into_aggregate::<A>).transpose()?)
    }

    async fn list_aggregates(&self, scope: AggregateScope) -> Result<Vec<A>, DomainError> {
        let rows = sqlx::query_as::<_, AggregateRow>(&self.statements.list_aggregates)
            .bind(scope == AggregateScope::WithDestroyed)
            .fetch_all(&self.pool)
            .await
            .map_err(StoreError::from)?;
        Ok(rows
            .into_iter()
            .map(AggregateRow::into_aggregate::<A>)
            .collect::<Result<Vec<_>, _>>()?)
    }

    async fn save_aggregate(&self, aggregate: &mut A) -> Result<(), DomainError> {
        let mut conn = self.pool.acquire().await.map_err(StoreError::from)?;
        write_aggregate(&mut conn, &self.statements, aggregate).await?;
        Ok(())
    }

    async fn load_events(&self, filter: &EventFilter) -> Result<Vec<EventRecord>, DomainError> {
        let rows = self.fetch_events(filter).await?;
        debug!(count = rows.len(), ?filter, "loaded events");
        rows.into_iter().map(EventRow::into_record).collect()
    }

    async fn max_event_id(&self) -> Result<Option<i64>, DomainError> {
        let max: Option<i64> = sqlx::query_scalar(&self.statements.max_event_id)
            .fetch_one(&self.pool)
            .await
            .map_err(StoreError::from)?;
        Ok(max)
    }
}

/// A unit of work backed by one `PostgreSQL` transaction. Dropping it rolls
/// the transaction back and releases its row locks.
struct PgUnitOfWork<A> {
    tx: Transaction<'static, Postgres>,
    statements: Arc<Statements>,
    aggregate: PhantomData<fn() -> A>,
}

#[async_trait]
impl<A: AggregateRoot> UnitOfWork<A> for PgUnitOfWork<A> {
    async fn lock_aggregate(&mut self, id: i64) -> Result<Option<A>, DomainError> {
        let row = sqlx::query_as::<_, AggregateRow>(&self.statements.lock_aggregate)
            .bind(id)
            .fetch_optional(&mut *self.tx)
            .await
            .map_err(StoreError::from)?;
        Ok(row.map(AggregateRow::into_aggregate::<A>).transpose()?)
    }

    async fn save_aggregate(&mut self, aggregate: &mut A) -> Result<(), DomainError> {
        write_aggregate(&mut self.tx, &self.statements, aggregate).await?;
        Ok(())
    }

    async fn append_event(&mut self, event: EventRecord) -> Result<EventRecord, DomainError> {
        let aggregate_id = event.aggregate_id().ok_or_else(|| {
            DomainError::Infrastructure("event has no aggregate to append to".to_owned())
        })?;
        let id: i64 = sqlx::query_scalar(&self.statements.append_event)
            .bind(aggregate_id)
            .bind(event.event_type())
            .bind(event.payload().to_value())
            .bind(event.created_at())
            .bind(event.updated_at())
            .fetch_one(&mut *self.tx)
            .await
            .map_err(StoreError::from)?;
        Ok(event.into_persisted(id))
    }

    async fn commit(self: Box<Self>) -> Result<(), DomainError> {
        self.tx.commit().await.map_err(StoreError::from)?;
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> Result<(), DomainError> {
        self.tx.rollback().await.map_err(StoreError::from)?;
        Ok(())
    }
}
