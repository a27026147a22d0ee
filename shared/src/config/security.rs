//! Login lockout configuration module

use serde::{Deserialize, Serialize};

/// Escalating block durations for email-keyed login failures, in minutes
pub const DEFAULT_BLOCK_DURATIONS_MINUTES: [u64; 7] = [1, 5, 15, 30, 60, 120, 1440];

/// Login brute-force protection configuration
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct LoginSecurityConfig {
    /// Allow the attempt when the counter store fails
    #[serde(default = "default_fail_open")]
    pub fail_open: bool,

    /// Compare-and-swap attempts per recorded failure before settling on the last read
    #[serde(default = "default_max_write_retries")]
    pub max_write_retries: u32,

    /// Tracking keyed by normalized email
    #[serde(default = "LockoutTierConfig::email")]
    pub email: LockoutTierConfig,

    /// Tracking keyed by hashed client fingerprint
    #[serde(default = "LockoutTierConfig::anonymous")]
    pub anonymous: LockoutTierConfig,
}

/// One escalating lockout tracker
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct LockoutTierConfig {
    /// Store collection holding the attempt records
    pub collection: String,

    /// Failures in one epoch that trigger a block
    pub max_attempts: u32,

    /// Block duration per escalation tier, in minutes; the last entry repeats
    pub block_durations_minutes: Vec<u64>,

    /// Failures in a streak after which a password reset is suggested
    #[serde(default)]
    pub reset_suggestion_threshold: Option<u32>,

    /// Quiet period, in minutes after the later of the last attempt and the
    /// last block end, after which a failure starts a new streak; `None`
    /// keeps the streak until a successful login resets it
    #[serde(default)]
    pub streak_idle_reset_minutes: Option<u64>,
}

impl LockoutTierConfig {
    /// 5 attempts, `[1m, 5m, 15m, 30m, 1h, 2h, 24h]`, reset suggested from 7 failures
    pub fn email() -> Self {
        Self {
            collection: String::from("loginAttempts"),
            max_attempts: 5,
            block_durations_minutes: DEFAULT_BLOCK_DURATIONS_MINUTES.to_vec(),
            reset_suggestion_threshold: Some(7),
            streak_idle_reset_minutes: None,
        }
    }

    /// 10 attempts, the email table doubled, no reset suggestion; the streak
    /// winds down after one top-tier block (48h) of quiet
    pub fn anonymous() -> Self {
        let block_durations_minutes: Vec<u64> = DEFAULT_BLOCK_DURATIONS_MINUTES
            .iter()
            .map(|minutes| minutes * 2)
            .collect();
        let top_tier = block_durations_minutes.last().copied();

        Self {
            collection: String::from("anonymousLoginAttempts"),
            max_attempts: 10,
            block_durations_minutes,
            reset_suggestion_threshold: None,
            streak_idle_reset_minutes: top_tier,
        }
    }
}

impl Default for LoginSecurityConfig {
    fn default() -> Self {
        Self {
            fail_open: default_fail_open(),
            max_write_retries: default_max_write_retries(),
            email: LockoutTierConfig::email(),
            anonymous: LockoutTierConfig::anonymous(),
        }
    }
}

fn default_fail_open() -> bool {
    true
}

fn default_max_write_retries() -> u32 {
    3
}
