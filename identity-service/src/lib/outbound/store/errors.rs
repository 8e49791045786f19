use thiserror::Error;

use super::models::RecordKey;
use crate::domain::context::DeadlineExceeded;
use crate::user::errors::UserError;

/// Error for key-value store operations
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StoreError {
    /// A precondition failed; nothing was written.
    #[error("Conditional check failed for {}", format_keys(.keys))]
    ConditionalCheckFailed { keys: Vec<RecordKey> },

    #[error("Store deadline exceeded")]
    DeadlineExceeded,

    #[error("Invalid store request: {0}")]
    InvalidRequest(String),

    #[error("Store backend error: {0}")]
    Backend(String),
}

impl StoreError {
    /// Whether the precondition on `key` is among the failed ones.
    pub fn failed_on(&self, key: &RecordKey) -> bool {
        matches!(self, StoreError::ConditionalCheckFailed { keys } if keys.contains(key))
    }
}

fn format_keys(keys: &[RecordKey]) -> String {
    keys.iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

impl From<DeadlineExceeded> for StoreError {
    fn from(_: DeadlineExceeded) -> Self {
        StoreError::DeadlineExceeded
    }
}

impl From<StoreError> for UserError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::DeadlineExceeded => UserError::Cancelled,
            other => UserError::Storage(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_failed_on() {
        let reservation = RecordKey::new("USERNAME", "alice");
        let err = StoreError::ConditionalCheckFailed {
            keys: vec![reservation.clone()],
        };

        assert!(err.failed_on(&reservation));
        assert!(!err.failed_on(&RecordKey::new("USER#1", "PROFILE")));
        assert!(!StoreError::Backend("x".to_string()).failed_on(&reservation));
        assert_eq!(
            err.to_string(),
            "Conditional check failed for USERNAME/alice"
        );
    }

    #[test]
    fn test_user_error_mapping() {
        assert_eq!(
            UserError::from(StoreError::DeadlineExceeded),
            UserError::Cancelled
        );
        assert!(UserError::from(StoreError::Backend("throttled".to_string())).is_internal());
    }
}
