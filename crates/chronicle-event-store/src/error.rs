//! Error types for the PostgreSQL store.

use chronicle_core::error::DomainError;

/// Errors raised while talking to `PostgreSQL`.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// A `PostgreSQL` operation failed.
    #[error("PostgreSQL error: {0}")]
    Postgres(#[from] sqlx::Error),

    /// Aggregate state could not be encoded or decoded.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl From<StoreError> for DomainError {
    fn from(err: StoreError) -> Self {
        Self::Infrastructure(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_store_error_becomes_infrastructure_error() {
        let err = StoreError::Postgres(sqlx::Error::PoolTimedOut);

        let domain: DomainError = err.into();

        match domain {
            DomainError::Infrastructure(message) => {
                assert!(message.starts_with("PostgreSQL error:"));
            }
            other => panic!("expected Infrastructure, got {other:?}"),
        }
    }
}
