//! Event payload codec.
//!
//! A [`Payload`] is the untyped key/value document persisted with every
//! event. Event types read it through their typed payload struct
//! ([`Payload::decode`]) or attribute by attribute ([`Payload::get`]).

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

use crate::error::DomainError;

/// Untyped key/value bag carrying an event's parameters.
#[derive(Debug, Clone, Default, PartialEq, Serialize, serde::Deserialize)]
#[serde(transparent)]
pub struct Payload(Map<String, Value>);

impl Payload {
    /// Creates an empty payload.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Encodes a typed payload struct into the bag.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::MalformedPayload` if `value` does not serialize
    /// to a JSON object.
    pub fn encode<T: Serialize>(event_type: &str, value: &T) -> Result<Self, DomainError> {
        match serde_json::to_value(value) {
            Ok(Value::Object(map)) => Ok(Self(map)),
            Ok(other) => Err(DomainError::MalformedPayload {
                event_type: event_type.to_owned(),
                reason: format!("expected an object, got {other}"),
            }),
            Err(e) => Err(DomainError::MalformedPayload {
                event_type: event_type.to_owned(),
                reason: e.to_string(),
            }),
        }
    }

    /// Decodes the bag into a typed payload struct.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::MalformedPayload` if the bag does not match `T`.
    pub fn decode<T: DeserializeOwned>(&self, event_type: &str) -> Result<T, DomainError> {
        serde_json::from_value(Value::Object(self.0.clone())).map_err(|e| {
            DomainError::MalformedPayload {
                event_type: event_type.to_owned(),
                reason: e.to_string(),
            }
        })
    }

    /// Copies the listed attributes out of a raw input document.
    ///
    /// Keys not in `attributes` are dropped, missing keys are skipped.
    #[must_use]
    pub fn permit(input: &Map<String, Value>, attributes: &[&str]) -> Self {
        let map = attributes
            .iter()
            .filter_map(|name| {
                input
                    .get(*name)
                    .map(|value| ((*name).to_owned(), value.clone()))
            })
            .collect();
        Self(map)
    }

    /// Reads one attribute. Absent or mistyped attributes read as `None`.
    #[must_use]
    pub fn get<T: DeserializeOwned>(&self, attribute: &str) -> Option<T> {
        self.0
            .get(attribute)
            .and_then(|value| serde_json::from_value(value.clone()).ok())
    }

    /// Writes one attribute, replacing any previous value.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::InvalidAttribute` if `value` cannot be serialized.
    pub fn set<T: Serialize>(&mut self, attribute: &str, value: T) -> Result<(), DomainError> {
        let value = serde_json::to_value(value).map_err(|e| DomainError::InvalidAttribute {
            attribute: attribute.to_owned(),
            reason: e.to_string(),
        })?;
        self.0.insert(attribute.to_owned(), value);
        Ok(())
    }

    /// Returns whether the attribute is present.
    #[must_use]
    pub fn contains(&self, attribute: &str) -> bool {
        self.0.contains_key(attribute)
    }

    /// Attribute names currently present, in key order.
    pub fn attributes(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    /// Returns the payload as a JSON value (for storage).
    #[must_use]
    pub fn to_value(&self) -> Value {
        Value::Object(self.0.clone())
    }

    /// Builds a payload from a stored JSON value.
    ///
    /// `null` reads as an empty payload.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::MalformedPayload` for any other non-object value.
    pub fn from_value(event_type: &str, value: Value) -> Result<Self, DomainError> {
        match value {
            Value::Object(map) => Ok(Self(map)),
            Value::Null => Ok(Self::default()),
            other => Err(DomainError::MalformedPayload {
                event_type: event_type.to_owned(),
                reason: format!("expected an object, got {other}"),
            }),
        }
    }
}
