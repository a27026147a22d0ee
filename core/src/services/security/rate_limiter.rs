//! Per-category action throttling
//!
//! Counts actions per `(category, identifier)` in a sliding inactivity window.
//! Exceeding the category's allowance blocks the key for a fixed duration.
//! The counter starts over once a block has expired or the window has passed
//! without activity.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};

use tm_shared::config::{CategoryLimit, RateLimitConfig};
use tm_shared::utils::identifier::rate_limit_key;

use crate::domain::entities::RateLimitRecord;
use crate::domain::value_objects::RateLimitDecision;
use crate::errors::{DomainError, DomainResult};
use crate::repositories::counter_store::{fetch_typed, CounterStore, Versioned};

/// Throttled action category
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum RateLimitCategory {
    /// Generic API calls
    Api,
    /// Authentication actions
    Auth,
    /// Service request creation
    ServiceRequest,
    /// Contact form submission
    Contact,
}

impl RateLimitCategory {
    pub const ALL: [RateLimitCategory; 4] = [
        RateLimitCategory::Api,
        RateLimitCategory::Auth,
        RateLimitCategory::ServiceRequest,
        RateLimitCategory::Contact,
    ];

    /// Name used in store keys and configuration
    pub fn as_str(&self) -> &'static str {
        match self {
            RateLimitCategory::Api => "api",
            RateLimitCategory::Auth => "auth",
            RateLimitCategory::ServiceRequest => "serviceRequest",
            RateLimitCategory::Contact => "contact",
        }
    }

    /// Limits configured for this category
    pub fn limit(&self, config: &RateLimitConfig) -> CategoryLimit {
        match self {
            RateLimitCategory::Api => config.api,
            RateLimitCategory::Auth => config.auth,
            RateLimitCategory::ServiceRequest => config.service_request,
            RateLimitCategory::Contact => config.contact,
        }
    }
}

impl fmt::Display for RateLimitCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RateLimitCategory {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|category| category.as_str() == s)
            .ok_or_else(|| DomainError::Validation {
                message: format!("Unknown rate limit category: {}", s),
            })
    }
}

fn seconds(value: u64) -> Duration {
    Duration::seconds(i64::try_from(value).unwrap_or(i64::MAX / 1000))
}

fn ceil_seconds(remaining: Duration) -> u64 {
    u64::try_from(remaining.num_milliseconds())
        .map(|ms| ms.div_ceil(1000))
        .unwrap_or(0)
}

/// Apply one action to the current counter
///
/// Returns the record to persist (`None` while a block is active) and the
/// decision for the caller.
pub(crate) fn next_rate_limit_state(
    limit: &CategoryLimit,
    key: &str,
    current: Option<&RateLimitRecord>,
    now: DateTime<Utc>,
) -> (Option<RateLimitRecord>, RateLimitDecision) {
    let fresh_epoch = |mut record: RateLimitRecord| {
        record.identifier = key.to_string();
        record.attempts = 1;
        record.last_attempt = now;
        record.block_until = None;
        (
            Some(record),
            RateLimitDecision::allowed(limit.max_attempts.saturating_sub(1)),
        )
    };

    let Some(current) = current else {
        return fresh_epoch(RateLimitRecord::default());
    };

    if let Some(remaining) = current.remaining_block(now) {
        return (None, RateLimitDecision::denied(ceil_seconds(remaining)));
    }

    if current.block_expired_at(now) || current.window_elapsed_at(now, seconds(limit.reset_window_seconds())) {
        return fresh_epoch(current.clone());
    }

    let mut record = current.clone();
    record.identifier = key.to_string();
    record.attempts = record.attempts.saturating_add(1);
    record.last_attempt = now;

    if record.attempts > limit.max_attempts {
        record.block_until = Some(now + seconds(limit.block_duration_seconds()));
        return (Some(record), RateLimitDecision::denied(limit.block_duration_seconds()));
    }

    let remaining = limit.max_attempts - record.attempts;
    (Some(record), RateLimitDecision::allowed(remaining))
}

/// Rate limiter over a counter store
pub struct RateLimiter<C>
where
    C: CounterStore + ?Sized,
{
    store: Arc<C>,
    config: RateLimitConfig,
}

impl<C> RateLimiter<C>
where
    C: CounterStore + ?Sized,
{
    /// Create a new rate limiter
    pub fn new(store: Arc<C>, config: RateLimitConfig) -> Self {
        Self { store, config }
    }

    /// Configuration in effect
    pub fn config(&self) -> &RateLimitConfig {
        &self.config
    }

    /// Count one action for `identifier` and decide whether it may proceed
    ///
    /// Store failures resolve to `fail_open`: a full allowance when set, a
    /// denial for the category's block duration otherwise.
    pub async fn check_rate_limit(&self, identifier: &str, category: RateLimitCategory) -> RateLimitDecision {
        let limit = category.limit(&self.config);

        if !self.config.enabled {
            return RateLimitDecision::allowed(limit.max_attempts);
        }

        let key = rate_limit_key(category.as_str(), identifier);
        match self.apply(&key, &limit).await {
            Ok(decision) => {
                if !decision.allowed {
                    warn!(
                        category = %category,
                        key = %key,
                        retry_after_seconds = decision.block_time_remaining_sec,
                        "Rate limit exceeded"
                    );
                }
                decision
            }
            Err(err) => {
                error!(
                    category = %category,
                    key = %key,
                    error = %err,
                    fail_open = self.config.fail_open,
                    "Rate limit store unavailable"
                );
                if self.config.fail_open {
                    RateLimitDecision::allowed(limit.max_attempts)
                } else {
                    RateLimitDecision::denied(limit.block_duration_seconds())
                }
            }
        }
    }

    /// Start the counter for `identifier` over
    pub async fn reset_rate_limit(&self, identifier: &str, category: RateLimitCategory) {
        let key = rate_limit_key(category.as_str(), identifier);
        if let Err(err) = self.clear(&key).await {
            error!(
                category = %category,
                key = %key,
                error = %err,
                "Failed to reset rate limit"
            );
        }
    }

    async fn apply(&self, key: &str, limit: &CategoryLimit) -> DomainResult<RateLimitDecision> {
        let collection = self.config.collection.as_str();
        let mut conflicts = 0u32;

        loop {
            let now = self.store.server_time().await?;
            let current = fetch_typed::<C, RateLimitRecord>(self.store.as_ref(), collection, key).await?;
            let expected_revision = current.as_ref().map(|v| v.revision);
            let current = current.map(|Versioned { value, .. }| value);

            let (record, decision) = next_rate_limit_state(limit, key, current.as_ref(), now);
            let Some(record) = record else {
                return Ok(decision);
            };

            let written = self
                .store
                .put_if_revision(collection, key, serde_json::to_value(&record)?, expected_revision)
                .await?;
            if written {
                if record.block_until.is_some() {
                    info!(
                        key = %key,
                        attempts = record.attempts,
                        block_seconds = decision.block_time_remaining_sec,
                        "Rate limit block imposed"
                    );
                }
                return Ok(decision);
            }

            conflicts += 1;
            if conflicts > self.config.max_write_retries {
                warn!(
                    key = %key,
                    conflicts = conflicts,
                    "Concurrent updates kept winning; returning decision without persisting"
                );
                return Ok(decision);
            }
            debug!(key = %key, conflicts = conflicts, "Rate limit record changed underneath us, retrying");
        }
    }

    async fn clear(&self, key: &str) -> DomainResult<()> {
        let now = self.store.server_time().await?;
        let record = RateLimitRecord::cleared(key, now);
        self.store
            .put(&self.config.collection, key, serde_json::to_value(&record)?, false)
            .await?;
        info!(key = %key, "Rate limit reset");
        Ok(())
    }
}
