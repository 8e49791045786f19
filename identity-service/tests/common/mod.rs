use std::sync::Arc;

use auth::ManualClock;
use chrono::DateTime;
use chrono::TimeZone;
use chrono::Utc;
use identity_service::bootstrap::with_store;
use identity_service::config::Config;
use identity_service::config::JwtConfig;
use identity_service::config::PasswordConfig;
use identity_service::config::StoreBackend;
use identity_service::config::StoreConfig;
use identity_service::domain::context::RequestContext;
use identity_service::outbound::store::InMemoryKeyValueStore;
use identity_service::user::models::Password;
use identity_service::user::models::SignupCommand;
use identity_service::user::models::SignupResult;
use identity_service::user::models::Username;
use identity_service::user::ports::IdentityServicePort;

pub const JWT_SECRET: &str = "test-secret-key-for-jwt-signing-at-least-32-bytes";

/// Identity service wired over an in-memory store and a manual clock
pub struct TestApp {
    pub service: Arc<dyn IdentityServicePort>,
    pub store: Arc<InMemoryKeyValueStore>,
    pub clock: Arc<ManualClock>,
}

impl TestApp {
    pub fn spawn() -> Self {
        let config = Config {
            store: StoreConfig {
                backend: StoreBackend::Memory,
                table_name: "identity-test".to_string(),
                endpoint: None,
                region: "us-east-1".to_string(),
            },
            jwt: JwtConfig {
                secret: JWT_SECRET.to_string(),
                expiration_days: 28,
            },
            password: PasswordConfig::default(),
        };

        let store = Arc::new(InMemoryKeyValueStore::new());
        let clock = Arc::new(ManualClock::new(Self::start()));
        let service = with_store(&config, store.clone(), clock.clone());

        Self {
            service,
            store,
            clock,
        }
    }

    pub fn start() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 15, 10, 0, 0).unwrap()
    }

    pub fn ctx(&self) -> RequestContext {
        RequestContext::background()
    }

    /// Helper to sign up a user, panicking on failure
    pub async fn signup(&self, username: &str, password: &str) -> SignupResult {
        self.service
            .signup(&self.ctx(), signup_command(username, password))
            .await
            .expect("Failed to sign up")
    }
}

pub fn signup_command(username: &str, password: &str) -> SignupCommand {
    SignupCommand::new(
        Username::new(username.to_string()).expect("Invalid username"),
        Password::new(password.to_string()).expect("Invalid password"),
    )
}
