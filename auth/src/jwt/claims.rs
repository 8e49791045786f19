use chrono::DateTime;
use chrono::Utc;
use serde::Deserialize;
use serde::Serialize;
use uuid::Uuid;

/// Registered JWT claims.
///
/// Subset of RFC 7519 used for bearer tokens. All fields are optional on the
/// wire; `JwtHandler` requires `sub` and `exp` when decoding.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Claims {
    /// Subject (user/entity identifier)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sub: Option<String>,

    /// Expiration time (Unix timestamp)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exp: Option<i64>,

    /// Issued at (Unix timestamp)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub iat: Option<i64>,

    /// Not before (Unix timestamp)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub nbf: Option<i64>,

    /// JWT ID (unique token identifier)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub jti: Option<String>,
}

impl Claims {
    /// Create new empty claims.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create claims for a freshly issued token.
    ///
    /// # Arguments
    /// * `subject` - Identifier the token speaks for
    /// * `expires_at` - Expiration instant
    /// * `issued_at` - Issue instant, also used as not-before
    ///
    /// # Returns
    /// Claims with sub, exp, iat, nbf and a random jti set
    pub fn issue(
        subject: impl ToString,
        expires_at: DateTime<Utc>,
        issued_at: DateTime<Utc>,
    ) -> Self {
        Self {
            sub: Some(subject.to_string()),
            exp: Some(expires_at.timestamp()),
            iat: Some(issued_at.timestamp()),
            nbf: Some(issued_at.timestamp()),
            jti: Some(Uuid::new_v4().to_string()),
        }
    }

    /// Set subject.
    pub fn with_subject(mut self, sub: impl ToString) -> Self {
        self.sub = Some(sub.to_string());
        self
    }

    /// Set expiration (Unix timestamp).
    pub fn with_expiration(mut self, exp: i64) -> Self {
        self.exp = Some(exp);
        self
    }

    /// Expiration as a timestamp, if present and representable.
    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        self.exp.and_then(|exp| DateTime::from_timestamp(exp, 0))
    }

    /// Check if token is expired.
    pub fn is_expired(&self, current_timestamp: i64) -> bool {
        self.exp.map_or(false, |exp| exp < current_timestamp)
    }
}
