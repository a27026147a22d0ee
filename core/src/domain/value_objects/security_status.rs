//! Decision value objects for login lockout and action throttling.

use serde::{Deserialize, Serialize};

/// Outcome of recording or probing a login attempt for an email
///
/// A block is a denial, not an error: callers render a countdown from
/// `block_time_remaining_ms` and, when `suggest_password_reset` is set, offer
/// a password reset.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginAttemptStatus {
    /// Whether the identifier is locked out
    pub is_blocked: bool,
    /// Remaining lockout in milliseconds, 0 when not blocked
    pub block_time_remaining_ms: u64,
    /// Whether the caller should offer a password reset
    pub suggest_password_reset: bool,
}

impl LoginAttemptStatus {
    /// Attempt may proceed, nothing to suggest
    pub fn allowed() -> Self {
        Self::default()
    }

    /// Locked out for `remaining_ms`
    pub fn blocked(remaining_ms: u64, suggest_password_reset: bool) -> Self {
        Self {
            is_blocked: true,
            block_time_remaining_ms: remaining_ms,
            suggest_password_reset,
        }
    }
}

/// Outcome of recording or probing a login attempt for a client fingerprint
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnonymousAttemptStatus {
    /// Whether the fingerprint is locked out
    pub is_blocked: bool,
    /// Remaining lockout in milliseconds, 0 when not blocked
    pub block_time_remaining_ms: u64,
}

impl AnonymousAttemptStatus {
    /// Attempt may proceed
    pub fn allowed() -> Self {
        Self::default()
    }

    /// Locked out for `remaining_ms`
    pub fn blocked(remaining_ms: u64) -> Self {
        Self {
            is_blocked: true,
            block_time_remaining_ms: remaining_ms,
        }
    }
}

/// Outcome of a rate limit check
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RateLimitDecision {
    /// Whether the action may proceed
    pub allowed: bool,
    /// Attempts left in the current window
    pub remaining_attempts: u32,
    /// Remaining block in seconds, 0 when allowed
    pub block_time_remaining_sec: u64,
}

impl RateLimitDecision {
    /// Action may proceed with `remaining_attempts` left
    pub fn allowed(remaining_attempts: u32) -> Self {
        Self {
            allowed: true,
            remaining_attempts,
            block_time_remaining_sec: 0,
        }
    }

    /// Action denied for `block_time_remaining_sec`
    pub fn denied(block_time_remaining_sec: u64) -> Self {
        Self {
            allowed: false,
            remaining_attempts: 0,
            block_time_remaining_sec,
        }
    }
}
