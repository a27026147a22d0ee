//! Rate limiting configuration module

use serde::{Deserialize, Serialize};

/// Rate limiting configuration for throttled actions
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct RateLimitConfig {
    /// Enable rate limiting; when disabled every check is allowed without touching the store
    #[serde(default = "default_enabled")]
    pub enabled: bool,

    /// Allow the action when the counter store fails
    #[serde(default = "default_fail_open")]
    pub fail_open: bool,

    /// Compare-and-swap attempts per check before settling on the last read
    #[serde(default = "default_max_write_retries")]
    pub max_write_retries: u32,

    /// Store collection holding the counters
    #[serde(default = "default_collection")]
    pub collection: String,

    /// Generic API calls
    #[serde(default = "CategoryLimit::api")]
    pub api: CategoryLimit,

    /// Authentication actions
    #[serde(default = "CategoryLimit::auth")]
    pub auth: CategoryLimit,

    /// Service request creation
    #[serde(default = "CategoryLimit::service_request")]
    pub service_request: CategoryLimit,

    /// Contact form submission
    #[serde(default = "CategoryLimit::contact")]
    pub contact: CategoryLimit,
}

/// Upper bound applied to configured block and reset windows (ten years)
pub const MAX_WINDOW_MINUTES: u64 = 10 * 365 * 24 * 60;

/// Limits for one action category
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
pub struct CategoryLimit {
    /// Attempts allowed inside one reset window
    pub max_attempts: u32,

    /// Block length once the allowance is exhausted, in minutes
    pub block_duration_minutes: u64,

    /// Inactivity after which the counter starts over, in minutes
    pub reset_window_minutes: u64,
}

impl CategoryLimit {
    pub const fn new(max_attempts: u32, block_duration_minutes: u64, reset_window_minutes: u64) -> Self {
        Self {
            max_attempts,
            block_duration_minutes,
            reset_window_minutes,
        }
    }

    /// 100 calls, 15 minute block, 1 hour window
    pub const fn api() -> Self {
        Self::new(100, 15, 60)
    }

    /// 5 attempts, 30 minute block, 1 hour window
    pub const fn auth() -> Self {
        Self::new(5, 30, 60)
    }

    /// 10 requests, 1 hour block, 4 hour window
    pub const fn service_request() -> Self {
        Self::new(10, 60, 240)
    }

    /// 3 submissions, 30 minute block, 1 hour window
    pub const fn contact() -> Self {
        Self::new(3, 30, 60)
    }

    /// Block duration in seconds, capped at [`MAX_WINDOW_MINUTES`]
    pub fn block_duration_seconds(&self) -> u64 {
        self.block_duration_minutes.min(MAX_WINDOW_MINUTES).saturating_mul(60)
    }

    /// Reset window in seconds, capped at [`MAX_WINDOW_MINUTES`]
    pub fn reset_window_seconds(&self) -> u64 {
        self.reset_window_minutes.min(MAX_WINDOW_MINUTES).saturating_mul(60)
    }
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            enabled: default_enabled(),
            fail_open: default_fail_open(),
            max_write_retries: default_max_write_retries(),
            collection: default_collection(),
            api: CategoryLimit::api(),
            auth: CategoryLimit::auth(),
            service_request: CategoryLimit::service_request(),
            contact: CategoryLimit::contact(),
        }
    }
}

impl RateLimitConfig {
    /// Development configuration (more lenient API budget)
    pub fn development() -> Self {
        Self {
            api: CategoryLimit::new(1000, 1, 60),
            ..Default::default()
        }
    }

    /// Production configuration
    pub fn production() -> Self {
        Self::default()
    }
}

fn default_enabled() -> bool {
    true
}

fn default_fail_open() -> bool {
    true
}

fn default_max_write_retries() -> u32 {
    3
}

fn default_collection() -> String {
    String::from("rateLimits")
}
