//! Routes for user accounts.

use std::ops::Bound;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::{get, patch, post};
use axum::{Json, Router};
use chrono::{DateTime, Utc};
use chronicle_core::command::CommandOutcome;
use chronicle_core::hydrate::{EventSelection, HydrationMode};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument};
use uuid::Uuid;
use validator::{ValidationError, ValidationErrors};

use chronicle_users::application::query_handlers::{UserEventView, UserView};
use chronicle_users::application::{command_handlers, query_handlers};
use chronicle_users::domain::aggregates::User;
use chronicle_users::domain::commands;

use crate::error::ApiError;
use crate::state::AppState;

/// Request body for POST /.
#[derive(Debug, Deserialize)]
pub struct CreateUserRequest {
    /// Display name.
    #[serde(default)]
    pub name: String,
    /// Contact address.
    pub email: Option<String>,
    /// Plaintext password.
    pub password: Option<String>,
}

/// Request body for PATCH /{id}/name.
#[derive(Debug, Deserialize)]
pub struct UpdateNameRequest {
    /// The new name.
    pub name: String,
}

/// Request body for PATCH /{id}/email.
#[derive(Debug, Deserialize)]
pub struct UpdateEmailRequest {
    /// The new address.
    pub email: String,
}

/// Request body for POST /hydrate.
///
/// `until` replays every event recorded up to a timestamp; `from`/`to`
/// replays an inclusive id range whose open end runs to the latest event.
/// With neither, or with no JSON body at all, the whole log is replayed.
#[derive(Debug, Default, Deserialize)]
pub struct HydrateRequest {
    /// Creation-time cutoff.
    pub until: Option<DateTime<Utc>>,
    /// First event id.
    pub from: Option<i64>,
    /// Last event id.
    pub to: Option<i64>,
    /// Compute snapshots without writing them back.
    #[serde(default)]
    pub in_memory: bool,
}

impl HydrateRequest {
    fn selection(&self) -> Result<EventSelection, ValidationErrors> {
        let ranged = self.from.is_some() || self.to.is_some();
        match self.until {
            Some(_) if ranged => {
                let mut errors = ValidationErrors::new();
                errors.add(
                    "until",
                    ValidationError::new("exclusive")
                        .with_message("cannot be combined with from/to".into()),
                );
                Err(errors)
            }
            Some(until) => Ok(EventSelection::CreatedUntil(until)),
            None if ranged => Ok(EventSelection::Range {
                start: self.from.map_or(Bound::Unbounded, Bound::Included),
                end: self.to.map_or(Bound::Unbounded, Bound::Included),
            }),
            None => Ok(EventSelection::All),
        }
    }

    fn mode(&self) -> HydrationMode {
        if self.in_memory {
            HydrationMode::InMemory
        } else {
            HydrationMode::Materialize
        }
    }
}

/// Response body returned after a user command is handled.
#[derive(Debug, Serialize)]
pub struct CommandResponse {
    /// The user after the command.
    pub user: UserView,
    /// The appended event, absent when the command was a no-op.
    pub event_id: Option<i64>,
    /// Whether the command was skipped because it would change nothing.
    pub noop: bool,
}

impl CommandResponse {
    fn from_outcome(outcome: &CommandOutcome<User>) -> Result<Self, ApiError> {
        Ok(Self {
            user: UserView::from_user(outcome.aggregate())?,
            event_id: outcome.event().and_then(|event| event.id()),
            noop: outcome.is_noop(),
        })
    }
}

/// Response body for POST /hydrate.
#[derive(Debug, Serialize)]
pub struct HydrateResponse {
    /// Rebuilt users, ordered by id.
    pub users: Vec<UserView>,
    /// Whether the rebuilt users were written back.
    pub materialized: bool,
}

/// POST /
#[instrument(skip(state, request))]
async fn create_user(
    State(state): State<AppState>,
    Json(request): Json<CreateUserRequest>,
) -> Result<(StatusCode, Json<CommandResponse>), ApiError> {
    let command = commands::CreateUser {
        correlation_id: Uuid::new_v4(),
        name: request.name,
        email: request.email,
        password: request.password,
        password_cost: state.password_cost,
    };

    info!(correlation_id = %command.correlation_id, "handling create_user command");

    let outcome = command_handlers::handle_create_user(
        &command,
        state.clock.as_ref(),
        state.users.as_ref(),
        &state.user_events,
    )
    .await?;

    Ok((
        StatusCode::CREATED,
        Json(CommandResponse::from_outcome(&outcome)?),
    ))
}

/// GET /
async fn list_users(State(state): State<AppState>) -> Result<Json<Vec<UserView>>, ApiError> {
    let users = query_handlers::list_users(state.users.as_ref()).await?;
    Ok(Json(users))
}

/// GET /{id}
async fn get_user(
    State(state): State<AppState>,
    Path(user_id): Path<i64>,
) -> Result<Json<UserView>, ApiError> {
    let user = query_handlers::get_user(user_id, state.users.as_ref()).await?;
    Ok(Json(user))
}

/// PATCH /{id}/name
#[instrument(skip(state, request))]
async fn update_name(
    State(state): State<AppState>,
    Path(user_id): Path<i64>,
    Json(request): Json<UpdateNameRequest>,
) -> Result<Json<CommandResponse>, ApiError> {
    let command = commands::update_name(Uuid::new_v4(), user_id, request.name)?;

    let outcome = command_handlers::handle_update_name(
        &command,
        state.clock.as_ref(),
        state.users.as_ref(),
        &state.user_events,
    )
    .await?;

    Ok(Json(CommandResponse::from_outcome(&outcome)?))
}

/// PATCH /{id}/email
#[instrument(skip(state, request))]
async fn update_email(
    State(state): State<AppState>,
    Path(user_id): Path<i64>,
    Json(request): Json<UpdateEmailRequest>,
) -> Result<Json<CommandResponse>, ApiError> {
    let command = commands::update_email(Uuid::new_v4(), user_id, request.email)?;

    let outcome = command_handlers::handle_update_email(
        &command,
        state.clock.as_ref(),
        state.users.as_ref(),
        &state.user_events,
    )
    .await?;

    Ok(Json(CommandResponse::from_outcome(&outcome)?))
}

/// DELETE /{id}
#[instrument(skip(state))]
async fn destroy_user(
    State(state): State<AppState>,
    Path(user_id): Path<i64>,
) -> Result<Json<CommandResponse>, ApiError> {
    let command = commands::destroy_user(Uuid::new_v4(), user_id)?;

    let outcome = command_handlers::handle_destroy_user(
        &command,
        state.clock.as_ref(),
        state.users.as_ref(),
        &state.user_events,
    )
    .await?;

    Ok(Json(CommandResponse::from_outcome(&outcome)?))
}

/// GET /{id}/events
async fn user_history(
    State(state): State<AppState>,
    Path(user_id): Path<i64>,
) -> Result<Json<Vec<UserEventView>>, ApiError> {
    let history = query_handlers::user_history(user_id, state.users.as_ref()).await?;
    Ok(Json(history))
}

/// GET /{id}/replay
async fn replay_user(
    State(state): State<AppState>,
    Path(user_id): Path<i64>,
) -> Result<Json<UserView>, ApiError> {
    let user =
        query_handlers::replay_user(user_id, state.users.as_ref(), &state.user_events).await?;
    Ok(Json(user))
}

/// POST /hydrate
#[instrument(skip(state, request))]
async fn hydrate(
    State(state): State<AppState>,
    request: Option<Json<HydrateRequest>>,
) -> Result<Json<HydrateResponse>, ApiError> {
    let request = request.map(|Json(request)| request).unwrap_or_default();
    let command = command_handlers::HydrateUsers {
        correlation_id: Uuid::new_v4(),
        selection: request.selection()?,
        mode: request.mode(),
    };

    info!(correlation_id = %command.correlation_id, selection = ?command.selection, "handling hydrate command");

    let snapshots =
        command_handlers::handle_hydrate_users(&command, state.users.as_ref(), &state.user_events)
            .await?;

    let users = snapshots
        .values()
        .map(UserView::from_user)
        .collect::<Result<Vec<_>, _>>()?;

    Ok(Json(HydrateResponse {
        users,
        materialized: command.mode == HydrationMode::Materialize,
    }))
}

/// Returns the router for user accounts.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", post(create_user).get(list_users))
        .route("/hydrate", post(hydrate))
        .route("/{id}", get(get_user).delete(destroy_user))
        .route("/{id}/name", patch(update_name))
        .route("/{id}/email", patch(update_email))
        .route("/{id}/events", get(user_history))
        .route("/{id}/replay", get(replay_user))
}
