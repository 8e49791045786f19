use async_trait::async_trait;

use crate::domain::context::RequestContext;
use crate::domain::user::models::AuthenticateResult;
use crate::domain::user::models::Claims;
use crate::domain::user::models::LoginCommand;
use crate::domain::user::models::LoginResult;
use crate::domain::user::models::SignupCommand;
use crate::domain::user::models::SignupResult;
use crate::domain::user::models::UpdateProfileCommand;
use crate::domain::user::models::User;
use crate::domain::user::models::UserId;
use crate::domain::user::models::Username;
use crate::user::errors::TokenError;
use crate::user::errors::UserError;

/// Port for identity operations exposed to the transport layer.
#[async_trait]
pub trait IdentityServicePort: Send + Sync + 'static {
    /// Create a new account and issue its first token.
    ///
    /// # Arguments
    /// * `ctx` - Request deadline
    /// * `command` - Validated username and password
    ///
    /// # Returns
    /// Created user and a token valid for the full lifetime window
    ///
    /// # Errors
    /// * `UsernameAlreadyExists` - Username is already taken
    /// * `Cancelled` - Deadline elapsed
    /// * `Storage` / `Internal` - Store or signing failure
    async fn signup(
        &self,
        ctx: &RequestContext,
        command: SignupCommand,
    ) -> Result<SignupResult, UserError>;

    /// Exchange a username and password for a token.
    ///
    /// # Errors
    /// * `InvalidCredentials` - Unknown username or wrong password
    /// * `Cancelled` - Deadline elapsed
    /// * `Storage` / `Internal` - Store or signing failure
    async fn login(
        &self,
        ctx: &RequestContext,
        command: LoginCommand,
    ) -> Result<LoginResult, UserError>;

    /// Resolve a token to its user and issue a refreshed token.
    ///
    /// # Errors
    /// * `TokenExpired` - Token expiry has passed
    /// * `InvalidToken` - Signature or payload is invalid
    /// * `NotFound` - Token refers to a user that does not exist
    /// * `Cancelled` - Deadline elapsed
    async fn authenticate(
        &self,
        ctx: &RequestContext,
        token: &str,
    ) -> Result<AuthenticateResult, UserError>;

    /// Change the mutable profile fields of the token's user.
    ///
    /// # Returns
    /// User as stored after the update
    ///
    /// # Errors
    /// Same as `authenticate`.
    async fn update_profile(
        &self,
        ctx: &RequestContext,
        token: &str,
        command: UpdateProfileCommand,
    ) -> Result<User, UserError>;

    /// Retrieve user by unique identifier.
    ///
    /// # Errors
    /// * `NotFound` - User does not exist
    async fn get_user(&self, ctx: &RequestContext, id: &UserId) -> Result<User, UserError>;

    /// Retrieve user by unique username.
    ///
    /// # Errors
    /// * `NotFound` - No user with this username
    async fn get_user_by_username(
        &self,
        ctx: &RequestContext,
        username: &Username,
    ) -> Result<User, UserError>;
}

/// Persistence operations for the user aggregate.
///
/// Implementations must enforce username uniqueness on `create` even under
/// concurrent calls.
#[async_trait]
pub trait UserRepository: Send + Sync + 'static {
    /// Persist a new user and reserve its username atomically.
    ///
    /// # Errors
    /// * `UsernameAlreadyExists` - Username is already reserved
    /// * `Cancelled` - Deadline elapsed
    /// * `Storage` - Any other store failure
    async fn create(&self, ctx: &RequestContext, user: User) -> Result<User, UserError>;

    /// Retrieve user by identifier.
    ///
    /// # Errors
    /// * `NotFound` - No profile with this identifier
    async fn get(&self, ctx: &RequestContext, id: &UserId) -> Result<User, UserError>;

    /// Retrieve user by username through its reservation.
    ///
    /// # Errors
    /// * `NotFound` - Username is not reserved
    async fn get_by_name(
        &self,
        ctx: &RequestContext,
        username: &Username,
    ) -> Result<User, UserError>;

    /// Write the mutable fields (bio, updated_at) of an existing user.
    ///
    /// # Returns
    /// User as stored after the update
    ///
    /// # Errors
    /// * `NotFound` - No profile with this identifier
    async fn update(&self, ctx: &RequestContext, user: User) -> Result<User, UserError>;
}

/// Issues and verifies bearer tokens.
pub trait TokenManager: Send + Sync + 'static {
    /// Sign `claims` into a token string.
    ///
    /// # Errors
    /// * `Internal` - Signing failed
    fn generate(&self, claims: &Claims) -> Result<String, TokenError>;

    /// Verify a token and recover its claims.
    ///
    /// # Errors
    /// * `Expired` - Expiry has passed
    /// * `Invalid` - Bad signature, malformed payload or malformed user id
    /// * `Internal` - Unexpected verification failure
    fn parse(&self, token: &str) -> Result<Claims, TokenError>;
}
