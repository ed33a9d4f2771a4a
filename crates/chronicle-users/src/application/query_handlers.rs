//! Query handlers for user accounts.
//!
//! Reads come from the materialized `users` table, which the persistence path
//! keeps in step with the event log. `replay_user` is the exception: it
//! folds the user's history in memory and never touches the table.

use chrono::{DateTime, Utc};
use chronicle_core::aggregate::{AggregateKey, AggregateScope};
use chronicle_core::error::DomainError;
use chronicle_core::event::{EventRecord, EventRegistry};
use chronicle_core::hydrate::fold_events;
use chronicle_core::store::{EventFilter, EventStore};
use serde::Serialize;
use serde_json::Value;

use crate::domain::aggregates::User;

/// Read-only view of a user. The password digest is never exposed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UserView {
    /// The user identifier.
    pub id: i64,
    /// Display name.
    pub name: String,
    /// Contact address.
    pub email: Option<String>,
    /// Whether the account is closed.
    pub deleted: bool,
}

impl UserView {
    /// Builds a view of a persisted user.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Infrastructure` if the user has no id.
    pub fn from_user(user: &User) -> Result<Self, DomainError> {
        let id = user
            .id
            .ok_or_else(|| DomainError::Infrastructure("user has not been persisted".into()))?;
        Ok(Self {
            id,
            name: user.name.clone(),
            email: user.email.clone(),
            deleted: user.deleted,
        })
    }
}

/// Read-only view of one entry in a user's history.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UserEventView {
    /// Log position.
    pub id: Option<i64>,
    /// The user the event belongs to.
    pub user_id: Option<i64>,
    /// Event discriminator.
    pub event_type: String,
    /// Raw payload.
    pub payload: Value,
    /// When the event was recorded.
    pub created_at: DateTime<Utc>,
}

impl From<&EventRecord> for UserEventView {
    fn from(event: &EventRecord) -> Self {
        Self {
            id: event.id(),
            user_id: event.aggregate_id(),
            event_type: event.event_type().to_owned(),
            payload: event.payload().to_value(),
            created_at: event.created_at(),
        }
    }
}

/// Retrieves a live user by id.
///
/// # Errors
///
/// Returns `DomainError::AggregateNotFound` if the user does not exist or has
/// been destroyed.
pub async fn get_user(
    user_id: i64,
    store: &dyn EventStore<User>,
) -> Result<UserView, DomainError> {
    let user = store
        .find_aggregate(user_id, AggregateScope::Live)
        .await?
        .ok_or(DomainError::AggregateNotFound(user_id))?;
    UserView::from_user(&user)
}

/// Lists every live user, ordered by id.
///
/// # Errors
///
/// Returns `DomainError::Infrastructure` if the store cannot be read.
pub async fn list_users(store: &dyn EventStore<User>) -> Result<Vec<UserView>, DomainError> {
    let mut users = store
        .list_aggregates(AggregateScope::Live)
        .await?
        .iter()
        .map(UserView::from_user)
        .collect::<Result<Vec<_>, _>>()?;
    users.sort_by_key(|user| user.id);
    Ok(users)
}

/// Returns a user's full event history in log order, destroyed users
/// included.
///
/// # Errors
///
/// Returns `DomainError::AggregateNotFound` if the user has no events.
pub async fn user_history(
    user_id: i64,
    store: &dyn EventStore<User>,
) -> Result<Vec<UserEventView>, DomainError> {
    let events = store.load_events(&EventFilter::Aggregate(user_id)).await?;
    if events.is_empty() {
        return Err(DomainError::AggregateNotFound(user_id));
    }
    Ok(events.iter().map(UserEventView::from).collect())
}

/// Rebuilds one user from its history without reading or writing the
/// `users` table.
///
/// # Errors
///
/// Returns `DomainError::AggregateNotFound` if the user has no events, or
/// `DomainError::UnknownEventType` if its history holds an unregistered event.
pub async fn replay_user(
    user_id: i64,
    store: &dyn EventStore<User>,
    registry: &EventRegistry<User>,
) -> Result<UserView, DomainError> {
    let events = store.load_events(&EventFilter::Aggregate(user_id)).await?;
    let mut snapshots = fold_events(registry, &events)?;
    let user = snapshots
        .remove(&AggregateKey::Persisted(user_id))
        .ok_or(DomainError::AggregateNotFound(user_id))?;
    UserView::from_user(&user)
}
