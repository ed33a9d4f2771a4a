//! Command handlers for user accounts.
//!
//! Each handler runs one command through the shared persistence path: the
//! event is applied to the locked user row and both are committed together.

use chronicle_core::clock::Clock;
use chronicle_core::command::{self, CommandOutcome};
use chronicle_core::error::DomainError;
use chronicle_core::event::EventRegistry;
use chronicle_core::hydrate::{self, EventSelection, HydrationMode, Snapshots};
use chronicle_core::store::EventStore;
use tracing::{info, instrument};
use uuid::Uuid;

use crate::domain::aggregates::User;
use crate::domain::commands::{CreateUser, DestroyUser, UpdateEmail, UpdateName};

/// Command to rebuild user state from the event log.
#[derive(Debug, Clone)]
pub struct HydrateUsers {
    /// The correlation ID for tracing.
    pub correlation_id: Uuid,
    /// Which events to replay.
    pub selection: EventSelection,
    /// Whether to write the rebuilt users back.
    pub mode: HydrationMode,
}

/// Handles the `CreateUser` command.
///
/// # Errors
///
/// Returns `DomainError::Validation` if the input is rejected, or any
/// persistence error.
pub async fn handle_create_user(
    command: &CreateUser,
    clock: &dyn Clock,
    store: &dyn EventStore<User>,
    registry: &EventRegistry<User>,
) -> Result<CommandOutcome<User>, DomainError> {
    command::execute(command, store, registry, clock).await
}

/// Handles the `UpdateName` command.
///
/// # Errors
///
/// Returns `DomainError::AggregateNotFound` if the user does not exist, or
/// any persistence error.
pub async fn handle_update_name(
    command: &UpdateName,
    clock: &dyn Clock,
    store: &dyn EventStore<User>,
    registry: &EventRegistry<User>,
) -> Result<CommandOutcome<User>, DomainError> {
    command::execute_passthrough(command, store, registry, clock).await
}

/// Handles the `UpdateEmail` command.
///
/// # Errors
///
/// Returns `DomainError::AggregateNotFound` if the user does not exist, or
/// any persistence error.
pub async fn handle_update_email(
    command: &UpdateEmail,
    clock: &dyn Clock,
    store: &dyn EventStore<User>,
    registry: &EventRegistry<User>,
) -> Result<CommandOutcome<User>, DomainError> {
    command::execute_passthrough(command, store, registry, clock).await
}

/// Handles the `DestroyUser` command. Destroying an already destroyed user
/// writes nothing and returns [`CommandOutcome::Noop`].
///
/// # Errors
///
/// Returns `DomainError::AggregateNotFound` if the user does not exist, or
/// any persistence error.
pub async fn handle_destroy_user(
    command: &DestroyUser,
    clock: &dyn Clock,
    store: &dyn EventStore<User>,
    registry: &EventRegistry<User>,
) -> Result<CommandOutcome<User>, DomainError> {
    command::execute_passthrough(command, store, registry, clock).await
}

/// Handles the `HydrateUsers` command.
///
/// # Errors
///
/// Returns `DomainError::UnknownEventType` if the selection contains an
/// unregistered event, or any store error.
#[instrument(skip_all, fields(correlation_id = %command.correlation_id))]
pub async fn handle_hydrate_users(
    command: &HydrateUsers,
    store: &dyn EventStore<User>,
    registry: &EventRegistry<User>,
) -> Result<Snapshots<User>, DomainError> {
    let snapshots = hydrate::hydrate(store, registry, &command.selection, command.mode).await?;
    info!(users = snapshots.len(), "users hydrated");
    Ok(snapshots)
}
