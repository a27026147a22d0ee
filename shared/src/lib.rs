//! Shared utilities and common types for TechMarket services
//!
//! This crate provides common functionality used across the security crates:
//! - Configuration types (environment, logging, cache, lockout, rate limits)
//! - Identifier utilities (email normalization, client fingerprint hashing)

pub mod config;
pub mod utils;

// Re-export commonly used items at crate root
pub use config::{
    AppConfig, Environment, LoggingConfig, LogFormat,
    CacheConfig, RateLimitConfig, CategoryLimit,
    LoginSecurityConfig, LockoutTierConfig, IdentityProviderConfig,
};
pub use utils::identifier;
