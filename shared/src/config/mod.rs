//! Configuration module with business-specific sub-modules
//!
//! - `cache` - Redis connection for the attempt counter store
//! - `environment` - Environment detection and logging configuration
//! - `identity` - Hosted identity provider credentials
//! - `rate_limit` - Per-category action throttling
//! - `security` - Login lockout thresholds and escalation tables

pub mod cache;
pub mod environment;
pub mod identity;
pub mod rate_limit;
pub mod security;

use serde::{Deserialize, Serialize};

// Re-export commonly used types
pub use cache::CacheConfig;
pub use environment::{Environment, LogFormat, LoggingConfig};
pub use identity::IdentityProviderConfig;
pub use rate_limit::{CategoryLimit, RateLimitConfig};
pub use security::{LockoutTierConfig, LoginSecurityConfig};

/// Complete application configuration combining all sub-configurations
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct AppConfig {
    /// Environment
    #[serde(default)]
    pub environment: Environment,

    /// Counter store connection
    #[serde(default)]
    pub cache: CacheConfig,

    /// Login lockout
    #[serde(default)]
    pub login_security: LoginSecurityConfig,

    /// Action throttling
    #[serde(default)]
    pub rate_limit: RateLimitConfig,

    /// Identity provider
    #[serde(default)]
    pub identity: IdentityProviderConfig,

    /// Logging
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        let env = Environment::default();
        Self {
            environment: env,
            cache: CacheConfig::default(),
            login_security: LoginSecurityConfig::default(),
            rate_limit: RateLimitConfig::default(),
            identity: IdentityProviderConfig::default(),
            logging: LoggingConfig::for_environment(env),
        }
    }
}

impl AppConfig {
    /// Configuration for development environment
    pub fn development() -> Self {
        Self {
            environment: Environment::Development,
            rate_limit: RateLimitConfig::development(),
            logging: LoggingConfig::for_environment(Environment::Development),
            ..Default::default()
        }
    }

    /// Configuration for production environment
    pub fn production() -> Self {
        Self {
            environment: Environment::Production,
            cache: CacheConfig::new("redis://prod-cache:6379"),
            rate_limit: RateLimitConfig::production(),
            logging: LoggingConfig::for_environment(Environment::Production),
            ..Default::default()
        }
    }

    /// Defaults for the environment named by `TECHMARKET_ENV`, with connection settings from the environment
    pub fn from_env() -> Self {
        let env = Environment::from_env();
        let mut config = match env {
            Environment::Development => Self::development(),
            Environment::Production => Self::production(),
            Environment::Staging => {
                let mut config = Self::development();
                config.environment = Environment::Staging;
                config.logging = LoggingConfig::for_environment(Environment::Staging);
                config
            }
        };
        config.cache = CacheConfig::from_env();
        config.identity = IdentityProviderConfig::from_env();
        config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_production_is_strict() {
        let config = AppConfig::production();
        assert_eq!(config.environment, Environment::Production);
        assert_eq!(config.rate_limit.api, CategoryLimit::api());
        assert_eq!(config.logging.format, LogFormat::Json);
    }

    #[test]
    fn test_partial_document_falls_back_to_defaults() {
        let config: AppConfig = serde_json::from_str(
            r#"{ "environment": "staging", "rate_limit": { "fail_open": false } }"#,
        )
        .unwrap();

        assert_eq!(config.environment, Environment::Staging);
        assert!(!config.rate_limit.fail_open);
        assert_eq!(config.rate_limit.contact, CategoryLimit::contact());
        assert_eq!(config.login_security, LoginSecurityConfig::default());
    }
}
