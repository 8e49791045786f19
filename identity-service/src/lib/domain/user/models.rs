use std::fmt;

use chrono::DateTime;
use chrono::Utc;
use uuid::Uuid;

use crate::user::errors::BioError;
use crate::user::errors::PasswordPolicyError;
use crate::user::errors::UserIdError;
use crate::user::errors::UsernameError;

/// User aggregate entity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct User {
    pub id: UserId,
    pub username: Username,
    /// Encoded `auth::PasswordHash`
    pub password_hash: String,
    pub bio: Option<Bio>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// User unique identifier type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct UserId(pub Uuid);

impl UserId {
    /// Generate a new random user ID.
    ///
    /// # Returns
    /// UserId with random UUID v4
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Parse a user ID from string.
    ///
    /// # Errors
    /// * `InvalidFormat` - String is not a valid UUID
    pub fn from_string(s: &str) -> Result<Self, UserIdError> {
        Uuid::parse_str(s)
            .map(UserId)
            .map_err(|e| UserIdError::InvalidFormat(e.to_string()))
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Username value type
///
/// 1-32 characters, no whitespace and no control characters. Usernames are
/// case-sensitive and immutable once the account exists.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Username(String);

impl Username {
    const MIN_LENGTH: usize = 1;
    const MAX_LENGTH: usize = 32;

    /// Create a new valid username.
    ///
    /// # Errors
    /// * `TooShort` - Username is empty
    /// * `TooLong` - Username longer than 32 characters
    /// * `InvalidCharacters` - Contains whitespace or control characters
    pub fn new(username: String) -> Result<Self, UsernameError> {
        let username = Self::with_valid_length(username)?;
        let username = Self::with_valid_chars(username)?;
        Ok(Self(username))
    }

    fn with_valid_length(username: String) -> Result<String, UsernameError> {
        let length = username.chars().count();
        if length < Self::MIN_LENGTH {
            Err(UsernameError::TooShort {
                min: Self::MIN_LENGTH,
                actual: length,
            })
        } else if length > Self::MAX_LENGTH {
            Err(UsernameError::TooLong {
                max: Self::MAX_LENGTH,
                actual: length,
            })
        } else {
            Ok(username)
        }
    }

    fn with_valid_chars(username: String) -> Result<String, UsernameError> {
        if username
            .chars()
            .any(|c| c.is_whitespace() || c.is_control())
        {
            Err(UsernameError::InvalidCharacters)
        } else {
            Ok(username)
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Username {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Free-form profile text, at most 300 characters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Bio(String);

impl Bio {
    const MAX_LENGTH: usize = 300;

    pub fn new(bio: String) -> Result<Self, BioError> {
        let length = bio.chars().count();
        if length > Self::MAX_LENGTH {
            return Err(BioError::TooLong {
                max: Self::MAX_LENGTH,
                actual: length,
            });
        }
        Ok(Self(bio))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Plaintext password accepted at signup.
///
/// At least 10 bytes of UTF-8 with at least one digit and one letter, where
/// digits and letters are Unicode-aware (`٣` counts as a digit). Never
/// printed by `Debug`.
#[derive(Clone, PartialEq, Eq)]
pub struct Password(String);

impl Password {
    const MIN_LENGTH: usize = 10;

    /// Validate a new password against the signup policy.
    ///
    /// # Errors
    /// * `TooShort` - Shorter than 10 bytes
    /// * `MissingDigit` - No numeric character
    /// * `MissingLetter` - No alphabetic character
    pub fn new(password: String) -> Result<Self, PasswordPolicyError> {
        let length = password.len();
        if length < Self::MIN_LENGTH {
            return Err(PasswordPolicyError::TooShort {
                min: Self::MIN_LENGTH,
                actual: length,
            });
        }
        if !password.chars().any(|c| c.is_numeric()) {
            return Err(PasswordPolicyError::MissingDigit);
        }
        if !password.chars().any(char::is_alphabetic) {
            return Err(PasswordPolicyError::MissingLetter);
        }
        Ok(Self(password))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Password {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Password(<redacted>)")
    }
}

/// Identity asserted by a bearer token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Claims {
    pub user_id: UserId,
    pub expires_at: DateTime<Utc>,
}

impl Claims {
    pub fn new(user_id: UserId, expires_at: DateTime<Utc>) -> Self {
        Self {
            user_id,
            expires_at,
        }
    }
}

/// Command to create a new account
#[derive(Debug)]
pub struct SignupCommand {
    pub username: Username,
    pub password: Password,
}

impl SignupCommand {
    pub fn new(username: Username, password: Password) -> Self {
        Self { username, password }
    }
}

/// Command to exchange credentials for a token.
///
/// Fields are unvalidated: any malformed input is reported as invalid
/// credentials.
pub struct LoginCommand {
    pub username: String,
    pub password: String,
}

impl LoginCommand {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }
}

impl fmt::Debug for LoginCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoginCommand")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Command to change the mutable profile fields.
///
/// The bio is replaced as a whole; `None` removes it.
#[derive(Debug, Clone)]
pub struct UpdateProfileCommand {
    pub bio: Option<Bio>,
}

#[derive(Debug, Clone)]
pub struct SignupResult {
    pub user: User,
    pub token: String,
}

#[derive(Debug, Clone)]
pub struct LoginResult {
    pub user: User,
    pub token: String,
}

#[derive(Debug, Clone)]
pub struct AuthenticateResult {
    pub user: User,
    pub refreshed_token: String,
}
