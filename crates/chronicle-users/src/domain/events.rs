//! Domain events for user accounts.

use chronicle_core::error::DomainError;
use chronicle_core::event::{Event, EventRegistry};
use serde::{Deserialize, Serialize};

use super::aggregates::User;

/// A user account was opened.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserCreated {
    /// Display name.
    pub name: String,
    /// Contact address.
    #[serde(default)]
    pub email: Option<String>,
    /// bcrypt digest of the chosen password.
    #[serde(default)]
    pub password_digest: Option<String>,
}

impl Event for UserCreated {
    type Aggregate = User;
    const EVENT_TYPE: &'static str = "UserCreated";
    const ATTRIBUTES: &'static [&'static str] = &["name", "email", "password_digest"];

    fn apply(&self, mut user: User) -> Result<User, DomainError> {
        user.name.clone_from(&self.name);
        user.email.clone_from(&self.email);
        user.password_digest.clone_from(&self.password_digest);
        Ok(user)
    }
}

/// A user's display name changed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NameUpdated {
    /// The new name.
    pub name: String,
}

impl Event for NameUpdated {
    type Aggregate = User;
    const EVENT_TYPE: &'static str = "NameUpdated";
    const ATTRIBUTES: &'static [&'static str] = &["name"];

    fn apply(&self, mut user: User) -> Result<User, DomainError> {
        user.name.clone_from(&self.name);
        Ok(user)
    }
}

/// A user's contact address changed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmailUpdated {
    /// The new address.
    pub email: String,
}

impl Event for EmailUpdated {
    type Aggregate = User;
    const EVENT_TYPE: &'static str = "EmailUpdated";
    const ATTRIBUTES: &'static [&'static str] = &["email"];

    fn apply(&self, mut user: User) -> Result<User, DomainError> {
        user.email = Some(self.email.clone());
        Ok(user)
    }
}

/// A user account was closed. The row is kept with its tombstone set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserDestroyed {
    /// The destroyed user.
    pub id: i64,
}

impl Event for UserDestroyed {
    type Aggregate = User;
    const EVENT_TYPE: &'static str = "UserDestroyed";
    const ATTRIBUTES: &'static [&'static str] = &["id"];

    fn apply(&self, mut user: User) -> Result<User, DomainError> {
        user.deleted = true;
        Ok(user)
    }

    fn is_noop(&self, user: &User) -> bool {
        user.deleted
    }
}

/// Every user event type, keyed by discriminator.
#[must_use]
pub fn registry() -> EventRegistry<User> {
    EventRegistry::new()
        .register::<UserCreated>()
        .register::<NameUpdated>()
        .register::<EmailUpdated>()
        .register::<UserDestroyed>()
}
