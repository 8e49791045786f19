use std::sync::Arc;

use jsonwebtoken::decode;
use jsonwebtoken::encode;
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::Algorithm;
use jsonwebtoken::DecodingKey;
use jsonwebtoken::EncodingKey;
use jsonwebtoken::Header;
use jsonwebtoken::Validation;

use super::claims::Claims;
use super::errors::JwtError;
use crate::clock::Clock;
use crate::clock::SystemClock;

/// JWT token handler for encoding and decoding tokens.
///
/// Uses HS256 (HMAC with SHA-256). Signature checks are done by
/// `jsonwebtoken`; `exp` is checked against the handler's clock and is the
/// only time-based reason to reject a token. `iat` and `nbf` are
/// informational.
pub struct JwtHandler {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    algorithm: Algorithm,
    clock: Arc<dyn Clock>,
}

impl JwtHandler {
    /// Create a new JWT handler with a secret key and the system clock.
    ///
    /// # Arguments
    /// * `secret` - Secret key for signing tokens (should be stored securely)
    ///
    /// # Security Notes
    /// - The secret should be at least 256 bits (32 bytes) for HS256
    /// - Store secrets in environment variables or secure vaults, never in code
    pub fn new(secret: &[u8]) -> Self {
        Self::with_clock(secret, Arc::new(SystemClock))
    }

    /// Create a new JWT handler that reads time from `clock`.
    pub fn with_clock(secret: &[u8], clock: Arc<dyn Clock>) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(secret),
            decoding_key: DecodingKey::from_secret(secret),
            algorithm: Algorithm::HS256,
            clock,
        }
    }

    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }

    /// Encode claims into a JWT token.
    ///
    /// # Errors
    /// * `EncodingFailed` - Token encoding failed
    pub fn encode(&self, claims: &Claims) -> Result<String, JwtError> {
        let header = Header::new(self.algorithm);

        encode(&header, claims, &self.encoding_key)
            .map_err(|e| JwtError::EncodingFailed(e.to_string()))
    }

    /// Decode and validate a JWT token.
    ///
    /// # Arguments
    /// * `token` - JWT token string to decode
    ///
    /// # Returns
    /// Decoded claims; `sub` and `exp` are guaranteed to be present
    ///
    /// # Errors
    /// * `InvalidToken` - Signature does not verify, token is malformed or
    ///   a required claim is missing
    /// * `TokenExpired` - `exp` lies in the past
    /// * `DecodingFailed` - Key or crypto backend failure
    pub fn decode(&self, token: &str) -> Result<Claims, JwtError> {
        let mut validation = Validation::new(self.algorithm);
        validation.validate_exp = false;
        validation.validate_nbf = false;
        validation.set_required_spec_claims(&["exp", "sub"]);

        let token_data = decode::<Claims>(token, &self.decoding_key, &validation).map_err(|e| {
            match e.kind() {
                ErrorKind::ExpiredSignature => JwtError::TokenExpired,
                ErrorKind::InvalidEcdsaKey
                | ErrorKind::InvalidRsaKey(_)
                | ErrorKind::InvalidKeyFormat
                | ErrorKind::Crypto(_) => JwtError::DecodingFailed(e.to_string()),
                _ => JwtError::InvalidToken(e.to_string()),
            }
        })?;

        let claims = token_data.claims;

        if claims.is_expired(self.clock.now().timestamp()) {
            return Err(JwtError::TokenExpired);
        }

        Ok(claims)
    }
}
