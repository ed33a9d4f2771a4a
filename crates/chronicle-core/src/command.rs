//! Command abstractions.
//!
//! A command turns external input into exactly one event, or fails with zero
//! side effects. Two shapes are supported:
//!
//! - types implementing [`Command`] that validate their input and construct
//!   the event themselves;
//! - [`PayloadCommand`], which copies whitelisted input attributes straight
//!   into an event payload and can be short-circuited when the event would be
//!   a no-op.

use std::fmt;
use std::marker::PhantomData;

use serde_json::{Map, Value};
use tracing::{info, instrument};
use uuid::Uuid;
use validator::{ValidationError, ValidationErrors};

use crate::aggregate::AggregateRoot;
use crate::clock::Clock;
use crate::error::DomainError;
use crate::event::{Event, EventRecord, EventRegistry};
use crate::payload::Payload;
use crate::persist::{persist_event, persist_unless_noop};
use crate::store::EventStore;

/// Trait that all commands implement.
pub trait Command<A: AggregateRoot>: Send + Sync + fmt::Debug {
    /// The type name for this command (for logging/routing).
    fn command_type(&self) -> &'static str;

    /// Correlation ID to trace this command through the system.
    fn correlation_id(&self) -> Uuid;

    /// Checks the command's input.
    ///
    /// # Errors
    ///
    /// Returns field-level errors describing every failed rule.
    fn validate(&self) -> Result<(), ValidationErrors> {
        Ok(())
    }

    /// Builds the (unsaved) event this command produces.
    ///
    /// # Errors
    ///
    /// Returns `DomainError` if the event cannot be constructed.
    fn build_event(&self, clock: &dyn Clock) -> Result<EventRecord, DomainError>;
}

/// Result of running a command.
#[derive(Debug, Clone)]
pub enum CommandOutcome<A> {
    /// The event was appended and the aggregate saved.
    Applied {
        /// The persisted event.
        event: EventRecord,
        /// The aggregate after the event.
        aggregate: A,
    },
    /// The event would not have changed anything, so nothing was written.
    Noop(A),
}

impl<A> CommandOutcome<A> {
    /// The aggregate as it stands after the command.
    #[must_use]
    pub fn aggregate(&self) -> &A {
        match self {
            Self::Applied { aggregate, .. } | Self::Noop(aggregate) => aggregate,
        }
    }

    /// Consumes the outcome, keeping the aggregate.
    #[must_use]
    pub fn into_aggregate(self) -> A {
        match self {
            Self::Applied { aggregate, .. } | Self::Noop(aggregate) => aggregate,
        }
    }

    /// The persisted event, if one was written.
    #[must_use]
    pub fn event(&self) -> Option<&EventRecord> {
        match self {
            Self::Applied { event, .. } => Some(event),
            Self::Noop(_) => None,
        }
    }

    /// Whether the command was skipped as a no-op.
    #[must_use]
    pub fn is_noop(&self) -> bool {
        matches!(self, Self::Noop(_))
    }
}

/// Validates `command`, builds its event and persists it.
///
/// # Errors
///
/// Returns `DomainError::Validation` without touching the store when
/// validation fails, otherwise any error from [`persist_event`].
#[instrument(
    skip_all,
    fields(
        command_type = command.command_type(),
        correlation_id = %command.correlation_id(),
    )
)]
pub async fn execute<A, C>(
    command: &C,
    store: &dyn EventStore<A>,
    registry: &EventRegistry<A>,
    clock: &dyn Clock,
) -> Result<CommandOutcome<A>, DomainError>
where
    A: AggregateRoot,
    C: Command<A>,
{
    if let Err(errors) = command.validate() {
        info!(%errors, "command rejected");
        return Err(DomainError::Validation(errors));
    }

    let event = command.build_event(clock)?;
    let persisted = persist_event(store, registry, clock, event).await?;

    info!(
        event_id = ?persisted.event.id(),
        aggregate_id = ?persisted.event.aggregate_id(),
        "command applied"
    );

    Ok(CommandOutcome::Applied {
        event: persisted.event,
        aggregate: persisted.aggregate,
    })
}

/// A command whose input maps attribute-for-attribute onto the payload of
/// event `E`, targeting an existing aggregate.
pub struct PayloadCommand<E: Event> {
    correlation_id: Uuid,
    aggregate_id: i64,
    payload: Payload,
    event: PhantomData<fn() -> E>,
}

impl<E: Event> PayloadCommand<E> {
    /// Builds the command, keeping only the attributes `E` declares.
    #[must_use]
    pub fn new(correlation_id: Uuid, aggregate_id: i64, input: &Map<String, Value>) -> Self {
        Self {
            correlation_id,
            aggregate_id,
            payload: Payload::permit(input, E::ATTRIBUTES),
            event: PhantomData,
        }
    }

    /// Builds the command from an already typed event.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::MalformedPayload` if `event` does not encode to
    /// an object.
    pub fn from_event(
        correlation_id: Uuid,
        aggregate_id: i64,
        event: &E,
    ) -> Result<Self, DomainError> {
        Ok(Self {
            correlation_id,
            aggregate_id,
            payload: Payload::encode(E::EVENT_TYPE, event)?,
            event: PhantomData,
        })
    }

    /// The targeted aggregate.
    #[must_use]
    pub fn aggregate_id(&self) -> i64 {
        self.aggregate_id
    }

    /// The whitelisted payload.
    #[must_use]
    pub fn payload(&self) -> &Payload {
        &self.payload
    }

}

impl<E: Event> fmt::Debug for PayloadCommand<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PayloadCommand")
            .field("event_type", &E::EVENT_TYPE)
            .field("correlation_id", &self.correlation_id)
            .field("aggregate_id", &self.aggregate_id)
            .field("payload", &self.payload)
            .finish()
    }
}

impl<E: Event> Command<E::Aggregate> for PayloadCommand<E> {
    fn command_type(&self) -> &'static str {
        E::EVENT_TYPE
    }

    fn correlation_id(&self) -> Uuid {
        self.correlation_id
    }

    fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();
        for &attribute in E::ATTRIBUTES {
            if !self.payload.contains(attribute) {
                errors.add(attribute, ValidationError::new("required"));
            }
        }
        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }

    fn build_event(&self, clock: &dyn Clock) -> Result<EventRecord, DomainError> {
        Ok(EventRecord::from_payload(
            Some(self.aggregate_id),
            E::EVENT_TYPE.to_owned(),
            self.payload.clone(),
            clock,
        ))
    }
}

/// Runs a payload command, skipping the write when it would be a no-op.
///
/// The no-op check runs inside the unit of work against the locked aggregate
/// (destroyed ones included), so of two concurrent commands that would both
/// see a change, the second one to take the lock sees the first's result.
///
/// # Errors
///
/// - `DomainError::Validation` if a declared attribute is missing.
/// - `DomainError::AggregateNotFound` if the target does not exist.
/// - Any error from [`persist_event`].
#[instrument(
    skip_all,
    fields(
        command_type = E::EVENT_TYPE,
        correlation_id = %command.correlation_id,
        aggregate_id = command.aggregate_id,
    )
)]
pub async fn execute_passthrough<E: Event>(
    command: &PayloadCommand<E>,
    store: &dyn EventStore<E::Aggregate>,
    registry: &EventRegistry<E::Aggregate>,
    clock: &dyn Clock,
) -> Result<CommandOutcome<E::Aggregate>, DomainError> {
    command.validate().map_err(DomainError::Validation)?;

    let event = command.build_event(clock)?;
    let outcome = persist_unless_noop(store, registry, clock, event).await?;

    match &outcome {
        CommandOutcome::Noop(_) => info!("command is a no-op, nothing written"),
        CommandOutcome::Applied { event, .. } => {
            info!(event_id = ?event.id(), "command applied");
        }
    }

    Ok(outcome)
}
