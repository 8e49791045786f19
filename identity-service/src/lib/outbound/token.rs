use auth::JwtError;
use auth::JwtHandler;

use crate::domain::user::models::Claims;
use crate::domain::user::models::UserId;
use crate::domain::user::ports::TokenManager;
use crate::user::errors::TokenError;

/// Bearer tokens as HS256 JWTs.
///
/// The subject is the user id; every token also carries `iat`, `nbf` and a
/// random `jti`, so two tokens minted in the same second still differ.
pub struct JwtTokenManager {
    handler: JwtHandler,
}

impl JwtTokenManager {
    pub fn new(handler: JwtHandler) -> Self {
        Self { handler }
    }
}

impl TokenManager for JwtTokenManager {
    fn generate(&self, claims: &Claims) -> Result<String, TokenError> {
        let registered = auth::Claims::issue(
            claims.user_id,
            claims.expires_at,
            self.handler.clock().now(),
        );

        self.handler
            .encode(&registered)
            .map_err(|e| TokenError::Internal(e.to_string()))
    }

    fn parse(&self, token: &str) -> Result<Claims, TokenError> {
        let registered = self.handler.decode(token).map_err(|e| match e {
            JwtError::TokenExpired => TokenError::Expired,
            JwtError::InvalidToken(reason) => TokenError::Invalid(reason),
            other => TokenError::Internal(other.to_string()),
        })?;

        let subject = registered
            .sub
            .as_deref()
            .ok_or_else(|| TokenError::Invalid("Token has no subject".to_string()))?;
        let user_id =
            UserId::from_string(subject).map_err(|e| TokenError::Invalid(e.to_string()))?;

        let expires_at = registered
            .expires_at()
            .ok_or_else(|| TokenError::Invalid("Token expiry is out of range".to_string()))?;

        Ok(Claims::new(user_id, expires_at))
    }
}
