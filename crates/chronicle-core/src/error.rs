//! Domain error types.

use thiserror::Error;
use validator::ValidationErrors;

/// Top-level domain error type.
#[derive(Debug, Error)]
pub enum DomainError {
    /// Command input failed its declared rules. Nothing was persisted.
    #[error("validation failed: {0}")]
    Validation(ValidationErrors),

    /// An event targets an aggregate that does not exist.
    #[error("aggregate not found: {0}")]
    AggregateNotFound(i64),

    /// A stored discriminator has no registered event type.
    #[error("unknown event type {event_type:?} (event id: {})", display_event_id(.event_id))]
    UnknownEventType {
        /// The offending event, if it has been persisted.
        event_id: Option<i64>,
        /// The unresolved discriminator.
        event_type: String,
    },

    /// An event type was registered without overriding `apply`.
    #[error("event type {0} does not implement apply")]
    Unimplemented(&'static str),

    /// A payload could not be decoded into its registered event type.
    #[error("malformed payload for {event_type}: {reason}")]
    MalformedPayload {
        /// The discriminator of the event being decoded.
        event_type: String,
        /// The decoder's complaint.
        reason: String,
    },

    /// A payload attribute could not be written.
    #[error("invalid attribute {attribute}: {reason}")]
    InvalidAttribute {
        /// The attribute being set.
        attribute: String,
        /// The encoder's complaint.
        reason: String,
    },

    /// An event already targets a different aggregate.
    #[error("event already belongs to aggregate {current}, cannot reassign to {requested}")]
    AggregateAlreadyAssigned {
        /// The aggregate the event is bound to.
        current: i64,
        /// The aggregate that was requested.
        requested: i64,
    },

    /// An event that is already in the log was submitted again.
    #[error("event {0} is already persisted")]
    EventAlreadyPersisted(i64),

    /// An infrastructure/persistence error.
    #[error("infrastructure error: {0}")]
    Infrastructure(String),
}

#[allow(clippy::ref_option)]
fn display_event_id(event_id: &Option<i64>) -> String {
    event_id.map_or_else(|| "unsaved".to_owned(), |id| id.to_string())
}

impl From<ValidationErrors> for DomainError {
    fn from(errors: ValidationErrors) -> Self {
        Self::Validation(errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_event_type_message_names_event_id() {
        let err = DomainError::UnknownEventType {
            event_id: Some(42),
            event_type: "Renamed".to_owned(),
        };

        assert_eq!(
            err.to_string(),
            "unknown event type \"Renamed\" (event id: 42)"
        );
    }

    #[test]
    fn test_unknown_event_type_message_for_unsaved_event() {
        let err = DomainError::UnknownEventType {
            event_id: None,
            event_type: "Renamed".to_owned(),
        };

        assert_eq!(
            err.to_string(),
            "unknown event type \"Renamed\" (event id: unsaved)"
        );
    }
}
