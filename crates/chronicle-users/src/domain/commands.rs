//! Commands for user accounts.

use std::fmt;

use chronicle_core::clock::Clock;
use chronicle_core::command::{Command, PayloadCommand};
use chronicle_core::error::DomainError;
use chronicle_core::event::EventRecord;
use uuid::Uuid;
use validator::{Validate, ValidationError, ValidationErrors};

use super::aggregates::User;
use super::events::{EmailUpdated, NameUpdated, UserCreated, UserDestroyed};

/// bcrypt work factor used unless configured otherwise.
pub const DEFAULT_PASSWORD_COST: u32 = bcrypt::DEFAULT_COST;

/// Cheapest bcrypt work factor. Only suitable for tests.
pub const MIN_PASSWORD_COST: u32 = 4;

/// Command to open a new user account.
#[derive(Clone, Validate)]
pub struct CreateUser {
    /// The correlation ID for tracing.
    pub correlation_id: Uuid,
    /// The user's display name. Must not be blank.
    pub name: String,
    /// The user's contact address.
    #[validate(email)]
    pub email: Option<String>,
    /// The plaintext password. Only its digest is recorded.
    pub password: Option<String>,
    /// bcrypt work factor for the digest.
    pub password_cost: u32,
}

impl fmt::Debug for CreateUser {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CreateUser")
            .field("correlation_id", &self.correlation_id)
            .field("name", &self.name)
            .field("email", &self.email)
            .field("password", &self.password.as_ref().map(|_| "[redacted]"))
            .field("password_cost", &self.password_cost)
            .finish()
    }
}

impl Command<User> for CreateUser {
    fn command_type(&self) -> &'static str {
        "users.create_user"
    }

    fn correlation_id(&self) -> Uuid {
        self.correlation_id
    }

    fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = match Validate::validate(self) {
            Ok(()) => ValidationErrors::new(),
            Err(errors) => errors,
        };
        if self.name.trim().is_empty() {
            errors.add(
                "name",
                ValidationError::new("presence").with_message("can't be blank".into()),
            );
        }
        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }

    fn build_event(&self, clock: &dyn Clock) -> Result<EventRecord, DomainError> {
        let password_digest = self
            .password
            .as_deref()
            .map(|password| bcrypt::hash(password, self.password_cost))
            .transpose()
            .map_err(|e| DomainError::Infrastructure(format!("password hashing failed: {e}")))?;

        let event = UserCreated {
            name: self.name.trim().to_owned(),
            email: self.email.clone(),
            password_digest,
        };
        EventRecord::new(None, &event, clock)
    }
}

/// Command to rename a user.
pub type UpdateName = PayloadCommand<NameUpdated>;

/// Command to change a user's contact address.
pub type UpdateEmail = PayloadCommand<EmailUpdated>;

/// Command to close a user account. Skipped when the user is already closed.
pub type DestroyUser = PayloadCommand<UserDestroyed>;

/// Builds an [`UpdateName`] command.
///
/// # Errors
///
/// Returns `DomainError::MalformedPayload` if the event cannot be encoded.
pub fn update_name(
    correlation_id: Uuid,
    user_id: i64,
    name: impl Into<String>,
) -> Result<UpdateName, DomainError> {
    PayloadCommand::from_event(correlation_id, user_id, &NameUpdated { name: name.into() })
}

/// Builds an [`UpdateEmail`] command.
///
/// # Errors
///
/// Returns `DomainError::MalformedPayload` if the event cannot be encoded.
pub fn update_email(
    correlation_id: Uuid,
    user_id: i64,
    email: impl Into<String>,
) -> Result<UpdateEmail, DomainError> {
    PayloadCommand::from_event(
        correlation_id,
        user_id,
        &EmailUpdated {
            email: email.into(),
        },
    )
}

/// Builds a [`DestroyUser`] command.
///
/// # Errors
///
/// Returns `DomainError::MalformedPayload` if the event cannot be encoded.
pub fn destroy_user(correlation_id: Uuid, user_id: i64) -> Result<DestroyUser, DomainError> {
    PayloadCommand::from_event(correlation_id, user_id, &UserDestroyed { id: user_id })
}

#[cfg(test)]
mod tests {
    use chronicle_test_support::FixedClock;
    use chrono::Utc;

    use super::*;

    fn create_user(name: &str, email: Option<&str>) -> CreateUser {
        CreateUser {
            correlation_id: Uuid::new_v4(),
            name: name.to_owned(),
            email: email.map(str::to_owned),
            password: Some("hunter2".to_owned()),
            password_cost: MIN_PASSWORD_COST,
        }
    }

    #[test]
    fn test_create_user_accepts_valid_input() {
        let command = create_user("Ada", Some("ada@example.com"));

        assert!(Command::validate(&command).is_ok());
    }

    #[test]
    fn test_create_user_rejects_blank_name() {
        let command = create_user("   ", None);

        let errors = Command::validate(&command).unwrap_err();

        assert!(errors.field_errors().contains_key("name"));
    }

    #[test]
    fn test_create_user_rejects_malformed_email() {
        let command = create_user("Ada", Some("not-an-address"));

        let errors = Command::validate(&command).unwrap_err();

        let fields = errors.field_errors();
        assert!(fields.contains_key("email"));
        assert!(!fields.contains_key("name"));
    }

    #[test]
    fn test_create_user_records_digest_not_password() {
        // Arrange
        let command = create_user("Ada", None);
        let clock = FixedClock(Utc::now());

        // Act
        let event = command.build_event(&clock).unwrap();

        // Assert
        let created: UserCreated = event.decode().unwrap();
        let digest = created.password_digest.unwrap();
        assert_ne!(digest, "hunter2");
        assert!(bcrypt::verify("hunter2", &digest).unwrap());
        assert!(digest.starts_with("$2b$04$"));
        assert!(!event.payload().contains("password"));
        assert_eq!(event.aggregate_id(), None);
    }

    #[test]
    fn test_create_user_hashes_at_configured_cost() {
        let mut command = create_user("Ada", None);
        command.password_cost = 5;

        let event = command.build_event(&FixedClock(Utc::now())).unwrap();

        let created: UserCreated = event.decode().unwrap();
        assert!(created.password_digest.unwrap().starts_with("$2b$05$"));
    }

    #[test]
    fn test_create_user_with_unsupported_cost_fails() {
        let mut command = create_user("Ada", None);
        command.password_cost = 2;

        let result = command.build_event(&FixedClock(Utc::now()));

        assert!(matches!(result, Err(DomainError::Infrastructure(_))));
    }

    #[test]
    fn test_debug_output_redacts_password() {
        let command = create_user("Ada", None);

        let rendered = format!("{command:?}");

        assert!(!rendered.contains("hunter2"));
        assert!(rendered.contains("[redacted]"));
    }

    #[test]
    fn test_destroy_user_carries_target_id() {
        let command = destroy_user(Uuid::new_v4(), 42).unwrap();

        assert_eq!(command.aggregate_id(), 42);
        assert_eq!(command.payload().get::<i64>("id"), Some(42));
    }
}
