use std::sync::Arc;

use async_trait::async_trait;
use auth::Clock;
use chrono::Duration;

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
use crate::user::errors::UserError;
use crate::user::ports::IdentityServicePort;
use crate::user::ports::TokenManager;
use crate::user::ports::UserRepository;

/// Default lifetime of every issued token (4 weeks).
pub const DEFAULT_TOKEN_LIFETIME_DAYS: i64 = 28;

/// Domain service implementation for identity operations.
///
/// Each call is one store transaction or read plus at most one token
/// operation. Every successful signup, login or authenticate mints a token
/// with a full lifetime window; earlier tokens stay valid until they expire.
pub struct IdentityService<UR, TM>
where
    UR: UserRepository,
    TM: TokenManager,
{
    repository: Arc<UR>,
    token_manager: Arc<TM>,
    password_hasher: auth::PasswordHasher,
    clock: Arc<dyn Clock>,
    token_lifetime: Duration,
}

impl<UR, TM> IdentityService<UR, TM>
where
    UR: UserRepository,
    TM: TokenManager,
{
    /// Create a new identity service with injected dependencies.
    ///
    /// # Arguments
    /// * `repository` - User persistence implementation
    /// * `token_manager` - Token signing and verification
    /// * `clock` - Time source for timestamps and token expiry
    pub fn new(repository: Arc<UR>, token_manager: Arc<TM>, clock: Arc<dyn Clock>) -> Self {
        Self {
            repository,
            token_manager,
            password_hasher: auth::PasswordHasher::new(),
            clock,
            token_lifetime: Duration::days(DEFAULT_TOKEN_LIFETIME_DAYS),
        }
    }

    pub fn with_password_hasher(mut self, password_hasher: auth::PasswordHasher) -> Self {
        self.password_hasher = password_hasher;
        self
    }

    pub fn with_token_lifetime(mut self, token_lifetime: Duration) -> Self {
        self.token_lifetime = token_lifetime;
        self
    }

    fn issue_token(&self, user_id: UserId) -> Result<String, UserError> {
        let claims = Claims::new(user_id, self.clock.now() + self.token_lifetime);
        Ok(self.token_manager.generate(&claims)?)
    }

    async fn authorize(&self, ctx: &RequestContext, token: &str) -> Result<User, UserError> {
        let claims = self.token_manager.parse(token)?;
        self.repository.get(ctx, &claims.user_id).await
    }

    async fn signup_inner(
        &self,
        ctx: &RequestContext,
        command: SignupCommand,
    ) -> Result<SignupResult, UserError> {
        let now = self.clock.now();
        let password_hash = self
            .password_hasher
            .hash(command.password.as_str())
            .to_string();

        let user = User {
            id: UserId::new(),
            username: command.username,
            password_hash,
            bio: None,
            created_at: now,
            updated_at: now,
        };

        let user = self.repository.create(ctx, user).await?;
        let token = self.issue_token(user.id)?;

        tracing::info!(user_id = %user.id, username = %user.username, "User signed up");

        Ok(SignupResult { user, token })
    }

    async fn login_inner(
        &self,
        ctx: &RequestContext,
        command: LoginCommand,
    ) -> Result<LoginResult, UserError> {
        let username =
            Username::new(command.username).map_err(|_| UserError::InvalidCredentials)?;

        let user = self
            .repository
            .get_by_name(ctx, &username)
            .await
            .map_err(|e| match e {
                UserError::NotFound(_) => UserError::InvalidCredentials,
                other => other,
            })?;

        if !self
            .password_hasher
            .verify(&user.password_hash, &command.password)
        {
            tracing::debug!(user_id = %user.id, "Password mismatch");
            return Err(UserError::InvalidCredentials);
        }

        let token = self.issue_token(user.id)?;

        Ok(LoginResult { user, token })
    }

    async fn authenticate_inner(
        &self,
        ctx: &RequestContext,
        token: &str,
    ) -> Result<AuthenticateResult, UserError> {
        let user = self.authorize(ctx, token).await?;
        let refreshed_token = self.issue_token(user.id)?;

        Ok(AuthenticateResult {
            user,
            refreshed_token,
        })
    }

    async fn update_profile_inner(
        &self,
        ctx: &RequestContext,
        token: &str,
        command: UpdateProfileCommand,
    ) -> Result<User, UserError> {
        let mut user = self.authorize(ctx, token).await?;

        user.bio = command.bio;
        user.updated_at = self.clock.now();

        let updated_user = self.repository.update(ctx, user).await?;

        tracing::info!(user_id = %updated_user.id, "Profile updated");

        Ok(updated_user)
    }
}

/// Log a failed operation. Internal failures are errors, the named kinds are
/// expected outcomes.
fn observe<T>(operation: &'static str, result: Result<T, UserError>) -> Result<T, UserError> {
    if let Err(e) = &result {
        if e.is_internal() {
            tracing::error!(operation, error = %e, "Identity operation failed");
        } else {
            tracing::debug!(operation, error = %e, "Identity operation rejected");
        }
    }
    result
}

#[async_trait]
impl<UR, TM> IdentityServicePort for IdentityService<UR, TM>
where
    UR: UserRepository,
    TM: TokenManager,
{
    async fn signup(
        &self,
        ctx: &RequestContext,
        command: SignupCommand,
    ) -> Result<SignupResult, UserError> {
        observe("signup", self.signup_inner(ctx, command).await)
    }

    async fn login(
        &self,
        ctx: &RequestContext,
        command: LoginCommand,
    ) -> Result<LoginResult, UserError> {
        observe("login", self.login_inner(ctx, command).await)
    }

    async fn authenticate(
        &self,
        ctx: &RequestContext,
        token: &str,
    ) -> Result<AuthenticateResult, UserError> {
        observe("authenticate", self.authenticate_inner(ctx, token).await)
    }

    async fn update_profile(
        &self,
        ctx: &RequestContext,
        token: &str,
        command: UpdateProfileCommand,
    ) -> Result<User, UserError> {
        observe(
            "update_profile",
            self.update_profile_inner(ctx, token, command).await,
        )
    }

    async fn get_user(&self, ctx: &RequestContext, id: &UserId) -> Result<User, UserError> {
        observe("get_user", self.repository.get(ctx, id).await)
    }

    async fn get_user_by_username(
        &self,
        ctx: &RequestContext,
        username: &Username,
    ) -> Result<User, UserError> {
        observe(
            "get_user_by_username",
            self.repository.get_by_name(ctx, username).await,
        )
    }
}

#[cfg(test)]
mod tests {
    use auth::ManualClock;
    use chrono::DateTime;
    use chrono::TimeZone;
    use chrono::Utc;
    use mockall::mock;

    use super::*;
    use crate::domain::user::models::Bio;
    use crate::domain::user::models::Password;
    use crate::outbound::token::JwtTokenManager;
    use crate::user::errors::TokenError;

    const SECRET: &[u8] = b"test-secret-key-for-jwt-signing-at-least-32-bytes";

    mock! {
        pub TestUserRepository {}

        #[async_trait]
        impl UserRepository for TestUserRepository {
            async fn create(&self, ctx: &RequestContext, user: User) -> Result<User, UserError>;
            async fn get(&self, ctx: &RequestContext, id: &UserId) -> Result<User, UserError>;
            async fn get_by_name(&self, ctx: &RequestContext, username: &Username) -> Result<User, UserError>;
            async fn update(&self, ctx: &RequestContext, user: User) -> Result<User, UserError>;
        }
    }

    mock! {
        pub TestTokenManager {}

        impl TokenManager for TestTokenManager {
            fn generate(&self, claims: &Claims) -> Result<String, TokenError>;
            fn parse(&self, token: &str) -> Result<Claims, TokenError>;
        }
    }

    fn start() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 2, 1, 9, 0, 0).unwrap()
    }

    fn service_with(
        repository: MockTestUserRepository,
        clock: Arc<ManualClock>,
    ) -> IdentityService<MockTestUserRepository, JwtTokenManager> {
        let token_manager = Arc::new(JwtTokenManager::new(auth::JwtHandler::with_clock(
            SECRET,
            clock.clone(),
        )));
        IdentityService::new(Arc::new(repository), token_manager, clock)
    }

    fn stored_user(username: &str, password: &str) -> User {
        User {
            id: UserId::new(),
            username: Username::new(username.to_string()).unwrap(),
            password_hash: auth::PasswordHasher::new().hash(password).to_string(),
            bio: None,
            created_at: start(),
            updated_at: start(),
        }
    }

    #[tokio::test]
    async fn test_signup_success() {
        let mut repository = MockTestUserRepository::new();
        repository
            .expect_create()
            .withf(|_, user| {
                user.username.as_str() == "alice"
                    && user.password_hash.starts_with("pbkdf2_sha256$120000$")
                    && user.created_at == start()
                    && user.updated_at == start()
                    && user.bio.is_none()
            })
            .times(1)
            .returning(|_, user| Ok(user));

        let clock = Arc::new(ManualClock::new(start()));
        let service = service_with(repository, clock);

        let command = SignupCommand::new(
            Username::new("alice".to_string()).unwrap(),
            Password::new("Passw0rd!!".to_string()).unwrap(),
        );

        let result = service
            .signup(&RequestContext::background(), command)
            .await
            .expect("Signup failed");

        assert_eq!(result.user.username.as_str(), "alice");
        assert!(auth::PasswordHasher::new().verify(&result.user.password_hash, "Passw0rd!!"));
        assert!(!result.token.is_empty());
    }

    #[tokio::test]
    async fn test_signup_token_has_full_lifetime() {
        let mut repository = MockTestUserRepository::new();
        repository.expect_create().returning(|_, user| Ok(user));

        let clock = Arc::new(ManualClock::new(start()));
        let token_manager = JwtTokenManager::new(auth::JwtHandler::with_clock(SECRET, clock.clone()));
        let service = service_with(repository, clock);

        let command = SignupCommand::new(
            Username::new("alice".to_string()).unwrap(),
            Password::new("Passw0rd!!".to_string()).unwrap(),
        );
        let result = service
            .signup(&RequestContext::background(), command)
            .await
            .unwrap();

        let claims = token_manager.parse(&result.token).unwrap();
        assert_eq!(claims.user_id, result.user.id);
        assert_eq!(claims.expires_at, start() + Duration::days(28));
    }

    #[tokio::test]
    async fn test_signup_duplicate_username() {
        let mut repository = MockTestUserRepository::new();
        repository.expect_create().times(1).returning(|_, user| {
            Err(UserError::UsernameAlreadyExists(
                user.username.as_str().to_string(),
            ))
        });

        let service = service_with(repository, Arc::new(ManualClock::new(start())));

        let command = SignupCommand::new(
            Username::new("alice".to_string()).unwrap(),
            Password::new("Passw0rd!!".to_string()).unwrap(),
        );

        let result = service.signup(&RequestContext::background(), command).await;
        assert_eq!(
            result.unwrap_err(),
            UserError::UsernameAlreadyExists("alice".to_string())
        );
    }

    #[tokio::test]
    async fn test_signup_signing_failure_is_internal() {
        let mut repository = MockTestUserRepository::new();
        repository.expect_create().returning(|_, user| Ok(user));

        let mut token_manager = MockTestTokenManager::new();
        token_manager
            .expect_generate()
            .returning(|_| Err(TokenError::Internal("signing key unavailable".to_string())));

        let clock = Arc::new(ManualClock::new(start()));
        let service = IdentityService::new(Arc::new(repository), Arc::new(token_manager), clock);

        let command = SignupCommand::new(
            Username::new("alice".to_string()).unwrap(),
            Password::new("Passw0rd!!".to_string()).unwrap(),
        );

        let error = service
            .signup(&RequestContext::background(), command)
            .await
            .unwrap_err();
        assert!(error.is_internal());
    }

    #[tokio::test]
    async fn test_login_success() {
        let user = stored_user("alice", "Passw0rd!!");
        let user_id = user.id;

        let mut repository = MockTestUserRepository::new();
        repository
            .expect_get_by_name()
            .withf(|_, username| username.as_str() == "alice")
            .times(1)
            .returning(move |_, _| Ok(user.clone()));

        let service = service_with(repository, Arc::new(ManualClock::new(start())));

        let result = service
            .login(
                &RequestContext::background(),
                LoginCommand::new("alice", "Passw0rd!!"),
            )
            .await
            .expect("Login failed");

        assert_eq!(result.user.id, user_id);
        assert!(!result.token.is_empty());
    }

    #[tokio::test]
    async fn test_login_wrong_password() {
        let user = stored_user("alice", "Passw0rd!!");

        let mut repository = MockTestUserRepository::new();
        repository
            .expect_get_by_name()
            .returning(move |_, _| Ok(user.clone()));

        let service = service_with(repository, Arc::new(ManualClock::new(start())));

        let result = service
            .login(
                &RequestContext::background(),
                LoginCommand::new("alice", "wrong"),
            )
            .await;
        assert_eq!(result.unwrap_err(), UserError::InvalidCredentials);
    }

    #[tokio::test]
    async fn test_login_unknown_user_is_invalid_credentials() {
        let mut repository = MockTestUserRepository::new();
        repository
            .expect_get_by_name()
            .times(1)
            .returning(|_, username| Err(UserError::NotFound(username.to_string())));

        let service = service_with(repository, Arc::new(ManualClock::new(start())));

        let result = service
            .login(
                &RequestContext::background(),
                LoginCommand::new("nobody", "Passw0rd!!"),
            )
            .await;
        assert_eq!(result.unwrap_err(), UserError::InvalidCredentials);
    }

    #[tokio::test]
    async fn test_login_malformed_username_is_invalid_credentials() {
        let mut repository = MockTestUserRepository::new();
        repository.expect_get_by_name().times(0);

        let service = service_with(repository, Arc::new(ManualClock::new(start())));

        let result = service
            .login(
                &RequestContext::background(),
                LoginCommand::new("", "Passw0rd!!"),
            )
            .await;
        assert_eq!(result.unwrap_err(), UserError::InvalidCredentials);
    }

    #[tokio::test]
    async fn test_login_corrupt_hash_is_invalid_credentials() {
        let mut user = stored_user("alice", "Passw0rd!!");
        user.password_hash = "corrupted".to_string();

        let mut repository = MockTestUserRepository::new();
        repository
            .expect_get_by_name()
            .returning(move |_, _| Ok(user.clone()));

        let service = service_with(repository, Arc::new(ManualClock::new(start())));

        let result = service
            .login(
                &RequestContext::background(),
                LoginCommand::new("alice", "Passw0rd!!"),
            )
            .await;
        assert_eq!(result.unwrap_err(), UserError::InvalidCredentials);
    }

    #[tokio::test]
    async fn test_login_storage_error_propagates() {
        let mut repository = MockTestUserRepository::new();
        repository
            .expect_get_by_name()
            .returning(|_, _| Err(UserError::Storage("connection reset".to_string())));

        let service = service_with(repository, Arc::new(ManualClock::new(start())));

        let result = service
            .login(
                &RequestContext::background(),
                LoginCommand::new("alice", "Passw0rd!!"),
            )
            .await;
        assert_eq!(
            result.unwrap_err(),
            UserError::Storage("connection reset".to_string())
        );
    }

    #[tokio::test]
    async fn test_authenticate_refreshes_token() {
        let user = stored_user("alice", "Passw0rd!!");
        let user_id = user.id;

        let mut repository = MockTestUserRepository::new();
        repository
            .expect_get()
            .withf(move |_, id| *id == user_id)
            .times(1)
            .returning(move |_, _| Ok(user.clone()));

        let clock = Arc::new(ManualClock::new(start()));
        let token_manager = JwtTokenManager::new(auth::JwtHandler::with_clock(SECRET, clock.clone()));
        let token = token_manager
            .generate(&Claims::new(user_id, start() + Duration::days(28)))
            .unwrap();

        let service = service_with(repository, clock.clone());
        clock.advance(Duration::days(10));

        let result = service
            .authenticate(&RequestContext::background(), &token)
            .await
            .expect("Authenticate failed");

        assert_eq!(result.user.id, user_id);
        assert_ne!(result.refreshed_token, token);

        let refreshed = token_manager.parse(&result.refreshed_token).unwrap();
        assert_eq!(refreshed.user_id, user_id);
        assert_eq!(refreshed.expires_at, start() + Duration::days(38));
    }

    #[tokio::test]
    async fn test_authenticate_expired_token() {
        let mut repository = MockTestUserRepository::new();
        repository.expect_get().times(0);

        let clock = Arc::new(ManualClock::new(start()));
        let token_manager = JwtTokenManager::new(auth::JwtHandler::with_clock(SECRET, clock.clone()));
        let token = token_manager
            .generate(&Claims::new(UserId::new(), start() + Duration::days(28)))
            .unwrap();

        let service = service_with(repository, clock.clone());
        clock.advance(Duration::days(29));

        let result = service
            .authenticate(&RequestContext::background(), &token)
            .await;
        assert_eq!(result.unwrap_err(), UserError::TokenExpired);
    }

    #[tokio::test]
    async fn test_authenticate_invalid_token() {
        let mut repository = MockTestUserRepository::new();
        repository.expect_get().times(0);

        let service = service_with(repository, Arc::new(ManualClock::new(start())));

        let result = service
            .authenticate(&RequestContext::background(), "not.a.token")
            .await;
        assert_eq!(result.unwrap_err(), UserError::InvalidToken);
    }

    #[tokio::test]
    async fn test_authenticate_unknown_user_is_not_found() {
        let mut repository = MockTestUserRepository::new();
        repository
            .expect_get()
            .times(1)
            .returning(|_, id| Err(UserError::NotFound(id.to_string())));

        let clock = Arc::new(ManualClock::new(start()));
        let token_manager = JwtTokenManager::new(auth::JwtHandler::with_clock(SECRET, clock.clone()));
        let token = token_manager
            .generate(&Claims::new(UserId::new(), start() + Duration::days(1)))
            .unwrap();

        let service = service_with(repository, clock);

        let result = service
            .authenticate(&RequestContext::background(), &token)
            .await;
        assert!(matches!(result.unwrap_err(), UserError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_update_profile_sets_bio() {
        let user = stored_user("alice", "Passw0rd!!");
        let user_id = user.id;

        let mut repository = MockTestUserRepository::new();
        repository
            .expect_get()
            .times(1)
            .returning(move |_, _| Ok(user.clone()));
        repository
            .expect_update()
            .withf(move |_, user| {
                user.id == user_id
                    && user.bio.as_ref().map(|b| b.as_str()) == Some("Rustacean")
                    && user.updated_at == start() + Duration::hours(1)
                    && user.created_at == start()
            })
            .times(1)
            .returning(|_, user| Ok(user));

        let clock = Arc::new(ManualClock::new(start()));
        let token_manager = JwtTokenManager::new(auth::JwtHandler::with_clock(SECRET, clock.clone()));
        let token = token_manager
            .generate(&Claims::new(user_id, start() + Duration::days(28)))
            .unwrap();

        let service = service_with(repository, clock.clone());
        clock.advance(Duration::hours(1));

        let command = UpdateProfileCommand {
            bio: Some(Bio::new("Rustacean".to_string()).unwrap()),
        };
        let updated = service
            .update_profile(&RequestContext::background(), &token, command)
            .await
            .expect("Update failed");

        assert_eq!(updated.bio.unwrap().as_str(), "Rustacean");
    }

    #[tokio::test]
    async fn test_update_profile_invalid_token() {
        let mut repository = MockTestUserRepository::new();
        repository.expect_get().times(0);
        repository.expect_update().times(0);

        let service = service_with(repository, Arc::new(ManualClock::new(start())));

        let result = service
            .update_profile(
                &RequestContext::background(),
                "garbage",
                UpdateProfileCommand { bio: None },
            )
            .await;
        assert_eq!(result.unwrap_err(), UserError::InvalidToken);
    }

    #[tokio::test]
    async fn test_get_user_not_found() {
        let mut repository = MockTestUserRepository::new();
        repository
            .expect_get()
            .times(1)
            .returning(|_, id| Err(UserError::NotFound(id.to_string())));

        let service = service_with(repository, Arc::new(ManualClock::new(start())));

        let result = service
            .get_user(&RequestContext::background(), &UserId::new())
            .await;
        assert!(matches!(result.unwrap_err(), UserError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_get_user_by_username_success() {
        let user = stored_user("alice", "Passw0rd!!");
        let expected = user.clone();

        let mut repository = MockTestUserRepository::new();
        repository
            .expect_get_by_name()
            .withf(|_, username| username.as_str() == "alice")
            .times(1)
            .returning(move |_, _| Ok(user.clone()));

        let service = service_with(repository, Arc::new(ManualClock::new(start())));

        let username = Username::new("alice".to_string()).unwrap();
        let result = service
            .get_user_by_username(&RequestContext::background(), &username)
            .await
            .unwrap();
        assert_eq!(result, expected);
    }
}
