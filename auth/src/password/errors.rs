use thiserror::Error;

/// Error type for password operations.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum PasswordError {
    #[error("Malformed password hash: {0}")]
    MalformedHash(String),

    #[error("Unsupported password hash algorithm: {0}")]
    UnsupportedAlgorithm(String),
}
