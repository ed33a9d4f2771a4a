//! Domain event abstractions.
//!
//! An [`EventRecord`] is one row of an aggregate's history: the discriminator,
//! the untyped payload and its position in the log. Concrete event types
//! implement [`Event`] and are bound to discriminators through an
//! [`EventRegistry`] built once at startup.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::aggregate::{AggregateKey, AggregateRoot};
use crate::clock::Clock;
use crate::error::DomainError;
use crate::payload::Payload;

/// Trait that all concrete event types implement.
///
/// The implementing struct is the event's typed payload. Its serialized form is
/// what gets stored in [`EventRecord::payload`].
pub trait Event: Serialize + DeserializeOwned + Send + Sync + 'static {
    /// The aggregate type this event mutates.
    type Aggregate: AggregateRoot;

    /// Discriminator stored in the `event_type` column.
    const EVENT_TYPE: &'static str;

    /// Payload attributes accepted by this event type, in declaration order.
    const ATTRIBUTES: &'static [&'static str];

    /// Applies this event to an aggregate snapshot and returns the new state.
    ///
    /// # Errors
    ///
    /// The default implementation returns `DomainError::Unimplemented`; every
    /// concrete event type must override it.
    fn apply(&self, _aggregate: Self::Aggregate) -> Result<Self::Aggregate, DomainError> {
        Err(DomainError::Unimplemented(Self::EVENT_TYPE))
    }

    /// Returns whether applying this event would leave `aggregate` unchanged.
    fn is_noop(&self, _aggregate: &Self::Aggregate) -> bool {
        false
    }
}

/// Immutable record of one state transition.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EventRecord {
    id: Option<i64>,
    aggregate_id: Option<i64>,
    event_type: String,
    payload: Payload,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl EventRecord {
    /// Builds an unsaved record from a typed event.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::MalformedPayload` if the event does not serialize
    /// to an object.
    pub fn new<E: Event>(
        aggregate_id: Option<i64>,
        event: &E,
        clock: &dyn Clock,
    ) -> Result<Self, DomainError> {
        let payload = Payload::encode(E::EVENT_TYPE, event)?;
        Ok(Self::from_payload(
            aggregate_id,
            E::EVENT_TYPE.to_owned(),
            payload,
            clock,
        ))
    }

    /// Builds an unsaved record from a raw discriminator and payload.
    #[must_use]
    pub fn from_payload(
        aggregate_id: Option<i64>,
        event_type: String,
        payload: Payload,
        clock: &dyn Clock,
    ) -> Self {
        let now = clock.now();
        Self {
            id: None,
            aggregate_id,
            event_type,
            payload,
            created_at: now,
            updated_at: now,
        }
    }

    /// Rebuilds a record read back from storage.
    #[must_use]
    pub fn restore(
        id: i64,
        aggregate_id: i64,
        event_type: String,
        payload: Payload,
        created_at: DateTime<Utc>,
        updated_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Some(id),
            aggregate_id: Some(aggregate_id),
            event_type,
            payload,
            created_at,
            updated_at,
        }
    }

    /// Log position, `None` until appended.
    #[must_use]
    pub fn id(&self) -> Option<i64> {
        self.id
    }

    /// The aggregate this event mutates, `None` until it has been persisted.
    #[must_use]
    pub fn aggregate_id(&self) -> Option<i64> {
        self.aggregate_id
    }

    /// The stored discriminator.
    #[must_use]
    pub fn event_type(&self) -> &str {
        &self.event_type
    }

    /// The event's parameters.
    #[must_use]
    pub fn payload(&self) -> &Payload {
        &self.payload
    }

    /// When the event was recorded. Hydration cutoffs compare against this.
    ///
    /// Set when the record is built, then set again when it is persisted,
    /// after its aggregate has been locked.
    #[must_use]
    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Row bookkeeping timestamp. Events are never updated, so this equals
    /// `created_at` for anything written by this crate.
    #[must_use]
    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    /// Whether the record has been appended to the log.
    #[must_use]
    pub fn is_persisted(&self) -> bool {
        self.id.is_some()
    }

    /// Grouping key for in-memory replay.
    #[must_use]
    pub fn key(&self) -> AggregateKey {
        self.aggregate_id
            .map_or(AggregateKey::Pending, AggregateKey::Persisted)
    }

    /// Binds the event to its aggregate.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::AggregateAlreadyAssigned` if the event already
    /// targets a different aggregate.
    pub fn assign_aggregate(&mut self, aggregate_id: i64) -> Result<(), DomainError> {
        match self.aggregate_id {
            Some(current) if current != aggregate_id => {
                Err(DomainError::AggregateAlreadyAssigned {
                    current,
                    requested: aggregate_id,
                })
            }
            _ => {
                self.aggregate_id = Some(aggregate_id);
                Ok(())
            }
        }
    }

    pub(crate) fn stamp(&mut self, at: DateTime<Utc>) {
        self.created_at = at;
        self.updated_at = at;
    }

    /// Marks the record as appended at log position `id`.
    #[must_use]
    pub fn into_persisted(mut self, id: i64) -> Self {
        self.id = Some(id);
        self
    }

    /// Decodes the payload as the typed event `E`.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::MalformedPayload` if the payload does not match.
    pub fn decode<E: Event>(&self) -> Result<E, DomainError> {
        self.payload.decode(&self.event_type)
    }
}

type ApplyFn<A> = fn(&EventRecord, A) -> Result<A, DomainError>;
type NoopFn<A> = fn(&EventRecord, &A) -> Result<bool, DomainError>;

/// Resolved mutation for one discriminator.
#[derive(Debug, Clone)]
pub struct Registration<A: AggregateRoot> {
    apply: ApplyFn<A>,
    noop: NoopFn<A>,
}

impl<A: AggregateRoot> Registration<A> {
    fn of<E: Event<Aggregate = A>>() -> Self {
        Self {
            apply: apply_typed::<E>,
            noop: noop_typed::<E>,
        }
    }

    /// Decodes `event` and applies it to `aggregate`.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::MalformedPayload` if the payload does not decode,
    /// or whatever the event's `apply` returns.
    pub fn apply(&self, event: &EventRecord, aggregate: A) -> Result<A, DomainError> {
        (self.apply)(event, aggregate)
    }

    /// Decodes `event` and asks it whether it would be a no-op on `aggregate`.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::MalformedPayload` if the payload does not decode.
    pub fn is_noop(&self, event: &EventRecord, aggregate: &A) -> Result<bool, DomainError> {
        (self.noop)(event, aggregate)
    }
}

fn apply_typed<E: Event>(
    event: &EventRecord,
    aggregate: E::Aggregate,
) -> Result<E::Aggregate, DomainError> {
    event.decode::<E>()?.apply(aggregate)
}

fn noop_typed<E: Event>(event: &EventRecord, aggregate: &E::Aggregate) -> Result<bool, DomainError> {
    Ok(event.decode::<E>()?.is_noop(aggregate))
}

/// Maps stored discriminators to the event types that know how to apply them.
#[derive(Debug, Clone)]
pub struct EventRegistry<A: AggregateRoot> {
    registrations: HashMap<&'static str, Registration<A>>,
}

impl<A: AggregateRoot> Default for EventRegistry<A> {
    fn default() -> Self {
        Self {
            registrations: HashMap::new(),
        }
    }
}

impl<A: AggregateRoot> EventRegistry<A> {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `E` under its discriminator, replacing any earlier entry.
    #[must_use]
    pub fn register<E: Event<Aggregate = A>>(mut self) -> Self {
        self.registrations
            .insert(E::EVENT_TYPE, Registration::of::<E>());
        self
    }

    /// Returns whether `event_type` is registered.
    #[must_use]
    pub fn contains(&self, event_type: &str) -> bool {
        self.registrations.contains_key(event_type)
    }

    /// Registered discriminators, sorted.
    #[must_use]
    pub fn event_types(&self) -> Vec<&'static str> {
        let mut types: Vec<_> = self.registrations.keys().copied().collect();
        types.sort_unstable();
        types
    }

    /// Finds the registration for an event's discriminator.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::UnknownEventType` naming the event if its
    /// discriminator is not registered.
    pub fn resolve(&self, event: &EventRecord) -> Result<&Registration<A>, DomainError> {
        self.registrations
            .get(event.event_type())
            .ok_or_else(|| DomainError::UnknownEventType {
                event_id: event.id(),
                event_type: event.event_type().to_owned(),
            })
    }
}
