use std::env;

use chrono::Duration;
use config::Config as ConfigBuilder;
use config::ConfigError;
use config::Environment;
use config::File;
use serde::Deserialize;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub store: StoreConfig,
    pub jwt: JwtConfig,
    #[serde(default)]
    pub password: PasswordConfig,
}

/// Which `KeyValueStore` adapter backs the user repository.
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    Memory,
    DynamoDb,
}

#[derive(Debug, Deserialize, Clone)]
pub struct StoreConfig {
    pub backend: StoreBackend,
    pub table_name: String,
    /// Overrides the AWS endpoint, e.g. a local DynamoDB.
    #[serde(default)]
    pub endpoint: Option<String>,
    pub region: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct JwtConfig {
    pub secret: String,
    #[serde(default = "default_expiration_days")]
    pub expiration_days: i64,
}

impl JwtConfig {
    pub fn token_lifetime(&self) -> Duration {
        Duration::days(self.expiration_days)
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct PasswordConfig {
    /// PBKDF2 iterations for new hashes; raised to the hasher's minimum.
    #[serde(default = "default_iterations")]
    pub iterations: u32,
}

impl Default for PasswordConfig {
    fn default() -> Self {
        Self {
            iterations: default_iterations(),
        }
    }
}

fn default_expiration_days() -> i64 {
    28
}

fn default_iterations() -> u32 {
    auth::PasswordHasher::MIN_ITERATIONS
}

impl Config {
    /// Load configuration from files with environment variable overrides
    ///
    /// Priority (highest to lowest):
    /// 1. Environment variables (STORE__TABLE_NAME, JWT__SECRET, etc.)
    /// 2. Environment-specific config file (config/{environment}.toml)
    /// 3. Default config file (config/default.toml)
    pub fn load() -> Result<Self, ConfigError> {
        let run_mode = env::var("RUN_MODE").unwrap_or_else(|_| "development".to_string());

        let configuration = ConfigBuilder::builder()
            // Start with default configuration
            .add_source(File::with_name("config/default").required(false))
            // Layer on environment-specific configuration
            .add_source(File::with_name(&format!("config/{}", run_mode)).required(false))
            // Layer on environment variables (with __ as separator)
            // Example: JWT__SECRET=... overrides jwt.secret
            .add_source(Environment::with_prefix("").separator("__"))
            .build()?;

        let config: Config = configuration.try_deserialize()?;

        Ok(config)
    }
}
