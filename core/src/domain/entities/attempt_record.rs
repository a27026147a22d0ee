//! Attempt record entities persisted in the counter store.
//!
//! Records are stored as JSON documents with camelCase field names, one per
//! tracked identifier. They are created lazily on the first recorded attempt
//! and reset in place; nothing ever deletes them.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Failed-login counter for one identifier (normalized email or fingerprint hash)
///
/// Fields missing from a stored document take their default, so a document
/// created by a partial merge write (for example only `passwordResetSent`)
/// still reads back as a valid, unblocked record.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginAttemptRecord {
    /// Tracked identifier
    #[serde(default)]
    pub identifier: String,

    /// Failures in the current lockout epoch
    #[serde(default)]
    pub failed_attempts: u32,

    /// Server time of the most recent recorded attempt
    #[serde(default)]
    pub last_attempt_time: DateTime<Utc>,

    /// End of the active block, if any
    #[serde(default)]
    pub block_until: Option<DateTime<Utc>>,

    /// Sticky password-reset flag; only a successful login clears it
    #[serde(default)]
    pub password_reset_sent: bool,

    /// Blocks imposed since the last successful login
    #[serde(default)]
    pub lockout_count: u32,

    /// Failures recorded since the last successful login
    #[serde(default)]
    pub total_failures: u32,
}

impl LoginAttemptRecord {
    /// Record state after a successful login
    pub fn cleared(identifier: impl Into<String>, now: DateTime<Utc>) -> Self {
        Self {
            identifier: identifier.into(),
            last_attempt_time: now,
            ..Default::default()
        }
    }

    /// Whether a block was set and has run out by `now`
    pub fn block_expired_at(&self, now: DateTime<Utc>) -> bool {
        matches!(self.block_until, Some(until) if until <= now)
    }

    /// Time left on the active block, `None` when not blocked
    pub fn remaining_block(&self, now: DateTime<Utc>) -> Option<Duration> {
        self.block_until
            .filter(|until| *until > now)
            .map(|until| until - now)
    }
}

/// Action counter for one `category_identifier` key
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RateLimitRecord {
    /// Composite `category_identifier` key
    #[serde(default)]
    pub identifier: String,

    /// Attempts in the current window
    #[serde(default)]
    pub attempts: u32,

    /// Server time of the most recent attempt
    #[serde(default)]
    pub last_attempt: DateTime<Utc>,

    /// End of the active block, if any
    #[serde(default)]
    pub block_until: Option<DateTime<Utc>>,
}

impl RateLimitRecord {
    /// Record state after an explicit reset
    pub fn cleared(identifier: impl Into<String>, now: DateTime<Utc>) -> Self {
        Self {
            identifier: identifier.into(),
            last_attempt: now,
            ..Default::default()
        }
    }

    /// Time left on the active block, `None` when not blocked
    pub fn remaining_block(&self, now: DateTime<Utc>) -> Option<Duration> {
        self.block_until
            .filter(|until| *until > now)
            .map(|until| until - now)
    }

    /// Whether a block was set and has run out by `now`
    pub fn block_expired_at(&self, now: DateTime<Utc>) -> bool {
        matches!(self.block_until, Some(until) if until <= now)
    }

    /// Whether the window has lapsed without activity
    pub fn window_elapsed_at(&self, now: DateTime<Utc>, reset_window: Duration) -> bool {
        now > self.last_attempt + reset_window
    }
}
