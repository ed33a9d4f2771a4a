//! Shared application state.

use std::fmt;
use std::sync::Arc;

use chronicle_core::clock::Clock;
use chronicle_core::event::EventRegistry;
use chronicle_core::store::EventStore;
use chronicle_users::domain::aggregates::User;
use chronicle_users::domain::commands::DEFAULT_PASSWORD_COST;
use chronicle_users::domain::events;

/// Application state shared across all request handlers.
#[derive(Clone)]
pub struct AppState {
    /// Clock stamping new events.
    pub clock: Arc<dyn Clock>,
    /// Store for users and their event log.
    pub users: Arc<dyn EventStore<User>>,
    /// User event types, resolved once at startup.
    pub user_events: Arc<EventRegistry<User>>,
    /// bcrypt work factor for new password digests.
    pub password_cost: u32,
}

impl AppState {
    /// Create new application state.
    #[must_use]
    pub fn new(clock: Arc<dyn Clock>, users: Arc<dyn EventStore<User>>) -> Self {
        Self {
            clock,
            users,
            user_events: Arc::new(events::registry()),
            password_cost: DEFAULT_PASSWORD_COST,
        }
    }

    /// Overrides the bcrypt work factor.
    #[must_use]
    pub fn with_password_cost(mut self, password_cost: u32) -> Self {
        self.password_cost = password_cost;
        self
    }
}

impl fmt::Debug for AppState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AppState")
            .field("user_events", &self.user_events.event_types())
            .field("password_cost", &self.password_cost)
            .finish_non_exhaustive()
    }
}
