//! Escalating lockout counter for brute-force protection
//!
//! Counts failed attempts per identifier and blocks the identifier once a
//! threshold is crossed. Each block in a streak lasts longer than the previous
//! one, following the policy's duration table; the last entry repeats. Expired
//! blocks are detected lazily on the next attempt, which starts a new epoch.
//! An explicit reset (successful login) ends the streak; a policy may also
//! let the streak lapse after a long enough quiet period.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use serde_json::json;
use tracing::{debug, info, warn};

use tm_shared::config::rate_limit::MAX_WINDOW_MINUTES;
use tm_shared::config::LockoutTierConfig;
use tm_shared::config::security::DEFAULT_BLOCK_DURATIONS_MINUTES;

use crate::domain::entities::LoginAttemptRecord;
use crate::errors::DomainResult;
use crate::repositories::counter_store::{fetch_typed, CounterStore, Versioned};

/// Thresholds and escalation table of one lockout tracker
#[derive(Debug, Clone, PartialEq)]
pub struct LockoutPolicy {
    /// Store collection holding the attempt records
    pub collection: String,
    /// Failures in one epoch that trigger a block
    pub max_attempts: u32,
    /// Block duration per escalation tier; never empty
    pub block_durations: Vec<Duration>,
    /// Streak failures from which a password reset is suggested
    pub reset_suggestion_threshold: Option<u32>,
    /// Quiet period after which a failure starts a new streak
    pub streak_idle_reset: Option<Duration>,
}

impl LockoutPolicy {
    /// Build a policy from configuration
    ///
    /// An empty duration table falls back to the default email table, and a
    /// zero threshold is raised to 1.
    pub fn from_config(config: &LockoutTierConfig) -> Self {
        let minutes: Vec<u64> = if config.block_durations_minutes.is_empty() {
            DEFAULT_BLOCK_DURATIONS_MINUTES.to_vec()
        } else {
            config.block_durations_minutes.clone()
        };

        Self {
            collection: config.collection.clone(),
            max_attempts: config.max_attempts.max(1),
            block_durations: minutes.into_iter().map(bounded_minutes).collect(),
            reset_suggestion_threshold: config.reset_suggestion_threshold,
            streak_idle_reset: config.streak_idle_reset_minutes.map(bounded_minutes),
        }
    }

    /// Default policy for email-keyed tracking
    pub fn email() -> Self {
        Self::from_config(&LockoutTierConfig::email())
    }

    /// Default policy for fingerprint-keyed tracking
    pub fn anonymous() -> Self {
        Self::from_config(&LockoutTierConfig::anonymous())
    }

    /// Block duration for an escalation tier, clamped to the last entry
    pub fn block_duration_for_tier(&self, tier: u32) -> Duration {
        let last = self.block_durations.len().saturating_sub(1);
        let index = usize::try_from(tier).map_or(last, |tier| tier.min(last));
        self.block_durations
            .get(index)
            .copied()
            .unwrap_or_else(|| Duration::minutes(1))
    }

    /// Duration of the first tier
    pub fn first_block_duration(&self) -> Duration {
        self.block_duration_for_tier(0)
    }

    /// Whether the streak of `record` has lapsed at `now`
    fn streak_lapsed(&self, record: &LoginAttemptRecord, now: DateTime<Utc>) -> bool {
        let Some(idle) = self.streak_idle_reset else {
            return false;
        };
        let quiet_since = record
            .block_until
            .map_or(record.last_attempt_time, |until| until.max(record.last_attempt_time));
        now - quiet_since >= idle
    }

    fn reaches_reset_threshold(&self, total_failures: u32) -> bool {
        self.reset_suggestion_threshold
            .is_some_and(|threshold| total_failures >= threshold)
    }
}

/// Result of recording or probing one identifier
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LockoutOutcome {
    /// Whether the identifier is blocked
    pub is_blocked: bool,
    /// Remaining block in milliseconds
    pub block_time_remaining_ms: u64,
    /// Whether a password reset should be suggested
    pub suggest_password_reset: bool,
    /// Failures in the current epoch after this call
    pub failed_attempts: u32,
}

/// One state-machine step: the record to persist (if any) and the answer
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Transition {
    pub record: Option<LoginAttemptRecord>,
    pub outcome: LockoutOutcome,
}

fn bounded_minutes(minutes: u64) -> Duration {
    Duration::minutes(minutes.min(MAX_WINDOW_MINUTES) as i64)
}

fn duration_ms(duration: Duration) -> u64 {
    u64::try_from(duration.num_milliseconds()).unwrap_or(0)
}

/// Apply one failed attempt to the current record
pub(crate) fn next_failure_state(
    policy: &LockoutPolicy,
    identifier: &str,
    current: Option<&LoginAttemptRecord>,
    now: DateTime<Utc>,
) -> Transition {
    let mut record = current.cloned().unwrap_or_default();
    record.identifier = identifier.to_string();

    // Active block: answer from the record, write nothing
    if let Some(remaining) = record.remaining_block(now) {
        let suggest = record.password_reset_sent || policy.reaches_reset_threshold(record.total_failures);
        return Transition {
            record: None,
            outcome: LockoutOutcome {
                is_blocked: true,
                block_time_remaining_ms: duration_ms(remaining),
                suggest_password_reset: suggest,
                failed_attempts: record.failed_attempts,
            },
        };
    }

    // Lapsed streak: start over, keeping only the reset latch
    if current.is_some() && policy.streak_lapsed(&record, now) {
        record = LoginAttemptRecord {
            password_reset_sent: record.password_reset_sent,
            ..LoginAttemptRecord::cleared(identifier, now)
        };
    }

    record.last_attempt_time = now;
    record.total_failures = record.total_failures.saturating_add(1);

    // Expired block: new epoch, the latch is reported as stored
    if record.block_expired_at(now) {
        record.failed_attempts = 1;
        record.block_until = None;
        let outcome = LockoutOutcome {
            is_blocked: false,
            block_time_remaining_ms: 0,
            suggest_password_reset: record.password_reset_sent,
            failed_attempts: 1,
        };
        return Transition {
            record: Some(record),
            outcome,
        };
    }

    record.failed_attempts = record.failed_attempts.saturating_add(1);
    record.password_reset_sent =
        record.password_reset_sent || policy.reaches_reset_threshold(record.total_failures);

    let mut outcome = LockoutOutcome {
        is_blocked: false,
        block_time_remaining_ms: 0,
        suggest_password_reset: record.password_reset_sent,
        failed_attempts: record.failed_attempts,
    };

    if record.failed_attempts >= policy.max_attempts {
        let tier = record
            .lockout_count
            .saturating_add(record.failed_attempts - policy.max_attempts);
        let duration = policy.block_duration_for_tier(tier);
        record.block_until = Some(now + duration);
        record.lockout_count = record.lockout_count.saturating_add(1);
        outcome.is_blocked = true;
        outcome.block_time_remaining_ms = duration_ms(duration);
    }

    Transition {
        record: Some(record),
        outcome,
    }
}

/// Read-only view of a record
pub(crate) fn probe_state(
    policy: &LockoutPolicy,
    current: Option<&LoginAttemptRecord>,
    now: DateTime<Utc>,
) -> LockoutOutcome {
    let Some(record) = current else {
        return LockoutOutcome::default();
    };

    match record.remaining_block(now) {
        Some(remaining) => LockoutOutcome {
            is_blocked: true,
            block_time_remaining_ms: duration_ms(remaining),
            suggest_password_reset: record.password_reset_sent
                || policy.reaches_reset_threshold(record.total_failures),
            failed_attempts: record.failed_attempts,
        },
        None => LockoutOutcome {
            is_blocked: false,
            block_time_remaining_ms: 0,
            suggest_password_reset: record.password_reset_sent,
            failed_attempts: record.failed_attempts,
        },
    }
}

/// Escalating lockout tracker over a counter store
///
/// Every transition is written with a compare-and-swap on the record's
/// revision. On conflict the record is re-read and the transition recomputed,
/// up to `max_write_retries` times; after that the answer computed from the
/// latest read is returned without persisting it.
pub struct EscalatingLockout<C>
where
    C: CounterStore + ?Sized,
{
    /// Store holding the attempt records
    store: Arc<C>,
    /// Thresholds and escalation table
    policy: LockoutPolicy,
    /// Compare-and-swap retries per call
    max_write_retries: u32,
}

impl<C> EscalatingLockout<C>
where
    C: CounterStore + ?Sized,
{
    /// Create a new lockout tracker
    pub fn new(store: Arc<C>, policy: LockoutPolicy, max_write_retries: u32) -> Self {
        Self {
            store,
            policy,
            max_write_retries,
        }
    }

    /// Policy in effect
    pub fn policy(&self) -> &LockoutPolicy {
        &self.policy
    }

    /// Record one failed attempt for `identifier`
    ///
    /// # Returns
    /// * `Ok(LockoutOutcome)` - Block state after this failure
    /// * `Err(DomainError)` - If the store cannot be read or written
    pub async fn record_failure(&self, identifier: &str) -> DomainResult<LockoutOutcome> {
        let collection = self.policy.collection.as_str();
        let mut conflicts = 0u32;

        loop {
            let now = self.store.server_time().await?;
            let current = fetch_typed::<C, LoginAttemptRecord>(self.store.as_ref(), collection, identifier).await?;
            let expected_revision = current.as_ref().map(|v| v.revision);
            let current = current.map(|Versioned { value, .. }| value);

            let transition = next_failure_state(&self.policy, identifier, current.as_ref(), now);
            let Some(record) = transition.record else {
                debug!(
                    collection = collection,
                    identifier = identifier,
                    remaining_ms = transition.outcome.block_time_remaining_ms,
                    "Attempt rejected while blocked"
                );
                return Ok(transition.outcome);
            };

            let document = serde_json::to_value(&record)?;
            if self
                .store
                .put_if_revision(collection, identifier, document, expected_revision)
                .await?
            {
                self.log_transition(identifier, &record, &transition.outcome);
                return Ok(transition.outcome);
            }

            conflicts += 1;
            if conflicts > self.max_write_retries {
                warn!(
                    collection = collection,
                    identifier = identifier,
                    conflicts = conflicts,
                    "Concurrent updates kept winning; returning decision without persisting"
                );
                return Ok(transition.outcome);
            }
            debug!(
                collection = collection,
                identifier = identifier,
                conflicts = conflicts,
                "Attempt record changed underneath us, retrying"
            );
        }
    }

    /// Current block state of `identifier` without recording anything
    pub async fn status(&self, identifier: &str) -> DomainResult<LockoutOutcome> {
        let now = self.store.server_time().await?;
        let current =
            fetch_typed::<C, LoginAttemptRecord>(self.store.as_ref(), &self.policy.collection, identifier).await?;
        Ok(probe_state(
            &self.policy,
            current.as_ref().map(|v| &v.value),
            now,
        ))
    }

    /// Clear the record after a successful authentication
    pub async fn reset(&self, identifier: &str) -> DomainResult<()> {
        let now = self.store.server_time().await?;
        let record = LoginAttemptRecord::cleared(identifier, now);
        self.store
            .put(&self.policy.collection, identifier, serde_json::to_value(&record)?, false)
            .await?;

        info!(
            collection = %self.policy.collection,
            identifier = identifier,
            "Failed attempt counter reset after successful authentication"
        );
        Ok(())
    }

    /// Latch the password-reset flag without touching the counters
    pub async fn mark_password_reset_sent(&self, identifier: &str) -> DomainResult<()> {
        self.store
            .put(
                &self.policy.collection,
                identifier,
                json!({ "identifier": identifier, "passwordResetSent": true }),
                true,
            )
            .await?;
        Ok(())
    }

    fn log_transition(&self, identifier: &str, record: &LoginAttemptRecord, outcome: &LockoutOutcome) {
        if outcome.is_blocked {
            info!(
                collection = %self.policy.collection,
                identifier = identifier,
                failed_attempts = record.failed_attempts,
                lockout_count = record.lockout_count,
                block_ms = outcome.block_time_remaining_ms,
                "Identifier locked due to failed authentication attempts"
            );
        } else {
            warn!(
                collection = %self.policy.collection,
                identifier = identifier,
                failed_attempts = record.failed_attempts,
                max_attempts = self.policy.max_attempts,
                "Failed authentication attempt recorded"
            );
        }
    }
}
