use thiserror::Error;

/// Error for UserId parsing failures
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum UserIdError {
    #[error("Invalid UUID format: {0}")]
    InvalidFormat(String),
}

/// Error for Username validation failures
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum UsernameError {
    #[error("Username too short: minimum {min} characters, got {actual}")]
    TooShort { min: usize, actual: usize },

    #[error("Username too long: maximum {max} characters, got {actual}")]
    TooLong { max: usize, actual: usize },

    #[error("Username must not contain whitespace or control characters")]
    InvalidCharacters,
}

/// Error for Bio validation failures
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum BioError {
    #[error("Bio too long: maximum {max} characters, got {actual}")]
    TooLong { max: usize, actual: usize },
}

/// Error for signup password policy violations
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum PasswordPolicyError {
    #[error("Password too short: minimum {min} bytes, got {actual}")]
    TooShort { min: usize, actual: usize },

    #[error("Password must contain at least one digit")]
    MissingDigit,

    #[error("Password must contain at least one letter")]
    MissingLetter,
}

/// Error for token operations
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TokenError {
    #[error("Token is expired")]
    Expired,

    #[error("Token is invalid: {0}")]
    Invalid(String),

    #[error("Token operation failed: {0}")]
    Internal(String),
}

/// Top-level error for all identity operations
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum UserError {
    // Value object validation errors (automatically converted via #[from])
    #[error("Invalid user ID: {0}")]
    InvalidUserId(#[from] UserIdError),

    #[error("Invalid username: {0}")]
    InvalidUsername(#[from] UsernameError),

    #[error("Invalid bio: {0}")]
    InvalidBio(#[from] BioError),

    #[error("Invalid password: {0}")]
    InvalidPassword(#[from] PasswordPolicyError),

    // Domain-level errors
    #[error("User not found: {0}")]
    NotFound(String),

    #[error("Username already exists: {0}")]
    UsernameAlreadyExists(String),

    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("Invalid token")]
    InvalidToken,

    #[error("Token expired")]
    TokenExpired,

    // Infrastructure errors
    #[error("Request cancelled: deadline exceeded")]
    Cancelled,

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl UserError {
    /// Whether the error is a malformed-input error.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            UserError::InvalidUserId(_)
                | UserError::InvalidUsername(_)
                | UserError::InvalidBio(_)
                | UserError::InvalidPassword(_)
        )
    }

    /// Whether the error is an unclassified failure whose detail must not
    /// reach end users.
    pub fn is_internal(&self) -> bool {
        matches!(self, UserError::Storage(_) | UserError::Internal(_))
    }
}

impl From<TokenError> for UserError {
    fn from(err: TokenError) -> Self {
        match err {
            TokenError::Expired => UserError::TokenExpired,
            TokenError::Invalid(_) => UserError::InvalidToken,
            TokenError::Internal(msg) => UserError::Internal(msg),
        }
    }
}
