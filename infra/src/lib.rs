//! # Infrastructure Layer
//!
//! Concrete implementations of the seams defined in `tm_core`:
//!
//! - **Cache**: Redis client with retry logic and the Redis-backed
//!   [`CounterStore`](tm_core::repositories::CounterStore)
//! - **Identity**: Firebase Identity Toolkit client implementing
//!   [`IdentityProvider`](tm_core::services::auth::IdentityProvider)
//! - **Telemetry**: tracing subscriber setup
//! - **Configuration**: layered loading of [`AppConfig`]

use std::sync::Arc;

use tm_core::errors::DomainError;
use tm_core::services::auth::LoginService;
use tm_core::services::security::{LoginSecurityGuard, RateLimiter};
use tm_shared::config::{AppConfig, Environment};

/// Cache module - Redis client and the counter store built on it
pub mod cache;

/// Identity provider clients
pub mod identity;

/// Tracing subscriber setup
pub mod telemetry;

pub use cache::{RedisClient, RedisCounterStore};
pub use identity::FirebaseIdentityProvider;

/// Fully wired security services over Redis and Firebase
pub struct SecurityServices {
    pub store: Arc<RedisCounterStore>,
    pub identity: Arc<FirebaseIdentityProvider>,
    pub guard: Arc<LoginSecurityGuard<RedisCounterStore, FirebaseIdentityProvider>>,
    pub rate_limiter: Arc<RateLimiter<RedisCounterStore>>,
    pub login: LoginService<RedisCounterStore, FirebaseIdentityProvider>,
}

/// Connect to Redis and the identity provider and wire the services
///
/// This function sets up:
/// - The Redis connection and counter store
/// - The identity provider HTTP client
/// - The login guard, rate limiter and login service sharing that store
pub async fn initialize(config: &AppConfig) -> Result<SecurityServices, InfrastructureError> {
    tracing::info!(environment = %config.environment, "Initializing security services");

    let store = Arc::new(RedisCounterStore::connect(&config.cache).await?);
    let identity = Arc::new(FirebaseIdentityProvider::new(config.identity.clone())?);

    let guard = Arc::new(LoginSecurityGuard::new(
        store.clone(),
        identity.clone(),
        config.login_security.clone(),
    ));
    let rate_limiter = Arc::new(RateLimiter::new(store.clone(), config.rate_limit.clone()));
    let login = LoginService::new(guard.clone(), identity.clone());

    tracing::info!("Security services initialized successfully");

    Ok(SecurityServices {
        store,
        identity,
        guard,
        rate_limiter,
        login,
    })
}

/// Load the application configuration
///
/// Layers, lowest precedence first:
/// 1. Defaults for the environment named by `TECHMARKET_ENV` (plus `REDIS_URL`,
///    `FIREBASE_API_KEY` and friends)
/// 2. `config.<environment>.toml` in the working directory, if present
/// 3. `TECHMARKET__<SECTION>__<FIELD>` environment variables
pub fn load_config() -> Result<AppConfig, InfrastructureError> {
    dotenvy::dotenv().ok(); // Load .env file if present

    let environment = Environment::from_env();
    let defaults = AppConfig::from_env();

    let settings = config::Config::builder()
        .add_source(config::Config::try_from(&defaults).map_err(config_error)?)
        .add_source(config::File::new(environment.config_file(), config::FileFormat::Toml).required(false))
        .add_source(
            config::Environment::with_prefix("TECHMARKET")
                .separator("__")
                .try_parsing(true),
        )
        .build()
        .map_err(config_error)?;

    settings.try_deserialize::<AppConfig>().map_err(config_error)
}

fn config_error(err: config::ConfigError) -> InfrastructureError {
    InfrastructureError::Config(err.to_string())
}

/// Infrastructure-specific error types
#[derive(Debug, thiserror::Error)]
pub enum InfrastructureError {
    /// Redis cache error
    #[error("Cache error: {0}")]
    Cache(#[from] redis::RedisError),

    /// HTTP request error for external services
    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Stored or received data could not be decoded
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// General infrastructure error
    #[error("Infrastructure error: {0}")]
    General(String),
}

impl From<serde_json::Error> for InfrastructureError {
    fn from(err: serde_json::Error) -> Self {
        InfrastructureError::Serialization(err.to_string())
    }
}

impl From<InfrastructureError> for DomainError {
    fn from(err: InfrastructureError) -> Self {
        match err {
            InfrastructureError::Serialization(message) => DomainError::Serialization { message },
            other => DomainError::Storage {
                message: other.to_string(),
            },
        }
    }
}
