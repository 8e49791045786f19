use std::sync::Arc;

use auth::Clock;
use auth::JwtHandler;
use auth::PasswordHasher;

use crate::config::Config;
use crate::config::StoreBackend;
use crate::domain::user::ports::IdentityServicePort;
use crate::domain::user::service::IdentityService;
use crate::outbound::repositories::KeyValueUserRepository;
use crate::outbound::store::DynamoDbKeyValueStore;
use crate::outbound::store::InMemoryKeyValueStore;
use crate::outbound::store::KeyValueStore;
use crate::outbound::token::JwtTokenManager;

/// Wire the identity service over the store selected by `config.store`.
///
/// # Arguments
/// * `config` - Loaded configuration
/// * `clock` - Time source shared by the service and the token manager
pub async fn build_identity_service(
    config: &Config,
    clock: Arc<dyn Clock>,
) -> Arc<dyn IdentityServicePort> {
    match config.store.backend {
        StoreBackend::Memory => {
            tracing::info!(backend = "memory", "Using in-memory store");
            with_store(config, Arc::new(InMemoryKeyValueStore::new()), clock)
        }
        StoreBackend::DynamoDb => {
            let store = DynamoDbKeyValueStore::connect(&config.store).await;
            with_store(config, Arc::new(store), clock)
        }
    }
}

/// Wire the identity service over an existing store.
pub fn with_store<S>(
    config: &Config,
    store: Arc<S>,
    clock: Arc<dyn Clock>,
) -> Arc<dyn IdentityServicePort>
where
    S: KeyValueStore,
{
    let repository = Arc::new(KeyValueUserRepository::new(store));
    let token_manager = Arc::new(JwtTokenManager::new(JwtHandler::with_clock(
        config.jwt.secret.as_bytes(),
        clock.clone(),
    )));

    let service = IdentityService::new(repository, token_manager, clock)
        .with_password_hasher(PasswordHasher::with_iterations(config.password.iterations))
        .with_token_lifetime(config.jwt.token_lifetime());

    tracing::info!(
        token_lifetime_days = config.jwt.expiration_days,
        password_iterations = config.password.iterations,
        "Identity service ready"
    );

    Arc::new(service)
}
