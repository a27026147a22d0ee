//! Tests for the escalating lockout state machine

use std::sync::Arc;

use chrono::Duration;

use tm_shared::config::LockoutTierConfig;

use super::mocks::{clocked_store, start_time, FlakyCounterStore};
use crate::domain::entities::LoginAttemptRecord;
use crate::repositories::counter_store::{fetch_typed, CounterStore, ManualClock};
use crate::services::security::lockout::{next_failure_state, probe_state, EscalatingLockout, LockoutPolicy};

const EMAIL: &str = "victim@example.com";

#[test]
fn test_policy_from_default_config() {
    let email = LockoutPolicy::email();
    assert_eq!(email.collection, "loginAttempts");
    assert_eq!(email.max_attempts, 5);
    assert_eq!(email.block_durations.len(), 7);
    assert_eq!(email.first_block_duration(), Duration::minutes(1));
    assert_eq!(email.reset_suggestion_threshold, Some(7));

    let anonymous = LockoutPolicy::anonymous();
    assert_eq!(anonymous.collection, "anonymousLoginAttempts");
    assert_eq!(anonymous.max_attempts, 10);
    assert_eq!(anonymous.first_block_duration(), Duration::minutes(2));
    assert_eq!(anonymous.block_duration_for_tier(6), Duration::minutes(2880));
    assert_eq!(anonymous.reset_suggestion_threshold, None);
}

#[test]
fn test_tier_is_clamped_to_last_entry() {
    let policy = LockoutPolicy::email();
    assert_eq!(policy.block_duration_for_tier(5), Duration::minutes(120));
    assert_eq!(policy.block_duration_for_tier(6), Duration::hours(24));
    assert_eq!(policy.block_duration_for_tier(7), Duration::hours(24));
    assert_eq!(policy.block_duration_for_tier(u32::MAX), Duration::hours(24));
}

#[test]
fn test_degenerate_config_is_sanitized() {
    let policy = LockoutPolicy::from_config(&LockoutTierConfig {
        collection: "custom".to_string(),
        max_attempts: 0,
        block_durations_minutes: Vec::new(),
        reset_suggestion_threshold: None,
        streak_idle_reset_minutes: Some(u64::MAX),
    });
    assert_eq!(policy.max_attempts, 1);
    assert!(policy.streak_idle_reset.is_some());
    assert_eq!(policy.block_durations.len(), 7);
}

#[test]
fn test_first_failure_creates_record() {
    let policy = LockoutPolicy::email();
    let now = start_time();

    let transition = next_failure_state(&policy, EMAIL, None, now);
    let record = transition.record.expect("record to persist");

    assert_eq!(record.identifier, EMAIL);
    assert_eq!(record.failed_attempts, 1);
    assert_eq!(record.last_attempt_time, now);
    assert_eq!(record.block_until, None);
    assert!(!record.password_reset_sent);
    assert!(!transition.outcome.is_blocked);
    assert_eq!(transition.outcome.block_time_remaining_ms, 0);
}

#[test]
fn test_fifth_failure_blocks_for_first_tier() {
    let policy = LockoutPolicy::email();
    let now = start_time();
    let current = LoginAttemptRecord {
        identifier: EMAIL.to_string(),
        failed_attempts: 4,
        total_failures: 4,
        last_attempt_time: now,
        ..Default::default()
    };

    let transition = next_failure_state(&policy, EMAIL, Some(&current), now);
    let record = transition.record.unwrap();

    assert!(transition.outcome.is_blocked);
    assert_eq!(transition.outcome.block_time_remaining_ms, 60_000);
    assert!(!transition.outcome.suggest_password_reset);
    assert_eq!(record.block_until, Some(now + Duration::minutes(1)));
    assert_eq!(record.lockout_count, 1);
}

#[test]
fn test_active_block_writes_nothing() {
    let policy = LockoutPolicy::email();
    let now = start_time();
    let current = LoginAttemptRecord {
        identifier: EMAIL.to_string(),
        failed_attempts: 5,
        total_failures: 5,
        lockout_count: 1,
        block_until: Some(now + Duration::seconds(42)),
        ..Default::default()
    };

    let transition = next_failure_state(&policy, EMAIL, Some(&current), now);

    assert!(transition.record.is_none());
    assert!(transition.outcome.is_blocked);
    assert_eq!(transition.outcome.block_time_remaining_ms, 42_000);
    assert_eq!(transition.outcome.failed_attempts, 5);
}

#[test]
fn test_block_ending_exactly_now_counts_as_expired() {
    let policy = LockoutPolicy::email();
    let now = start_time();
    let current = LoginAttemptRecord {
        failed_attempts: 5,
        total_failures: 5,
        lockout_count: 1,
        block_until: Some(now),
        password_reset_sent: true,
        ..Default::default()
    };

    let transition = next_failure_state(&policy, EMAIL, Some(&current), now);
    let record = transition.record.unwrap();

    assert!(!transition.outcome.is_blocked);
    assert!(transition.outcome.suggest_password_reset);
    assert_eq!(record.failed_attempts, 1);
    assert_eq!(record.block_until, None);
    assert_eq!(record.lockout_count, 1);
    assert_eq!(record.total_failures, 6);
}

#[test]
fn test_quiet_streak_lapses_when_policy_allows() {
    let policy = LockoutPolicy::anonymous();
    let blocked_at = start_time();
    let current = LoginAttemptRecord {
        identifier: "client".to_string(),
        failed_attempts: 10,
        total_failures: 70,
        lockout_count: 7,
        last_attempt_time: blocked_at,
        block_until: Some(blocked_at + Duration::minutes(2880)),
        ..Default::default()
    };

    // One top-tier window after the block ended the streak is still live
    let just_short = blocked_at + Duration::minutes(2 * 2880) - Duration::seconds(1);
    let record = next_failure_state(&policy, "client", Some(&current), just_short)
        .record
        .unwrap();
    assert_eq!(record.lockout_count, 7);
    assert_eq!(record.total_failures, 71);

    let lapsed = blocked_at + Duration::minutes(2 * 2880);
    let record = next_failure_state(&policy, "client", Some(&current), lapsed)
        .record
        .unwrap();
    assert_eq!(record.lockout_count, 0);
    assert_eq!(record.total_failures, 1);
    assert_eq!(record.failed_attempts, 1);
    assert_eq!(record.block_until, None);
}

#[test]
fn test_email_streak_never_lapses_on_its_own() {
    let policy = LockoutPolicy::email();
    let now = start_time();
    let current = LoginAttemptRecord {
        identifier: EMAIL.to_string(),
        failed_attempts: 1,
        total_failures: 36,
        lockout_count: 7,
        last_attempt_time: now - Duration::days(365),
        password_reset_sent: true,
        ..Default::default()
    };

    let transition = next_failure_state(&policy, EMAIL, Some(&current), now);
    let record = transition.record.unwrap();
    assert_eq!(record.lockout_count, 7);
    assert_eq!(record.total_failures, 37);
    assert!(transition.outcome.suggest_password_reset);
}

#[test]
fn test_probe_reports_without_counting() {
    let policy = LockoutPolicy::email();
    let now = start_time();

    assert!(!probe_state(&policy, None, now).is_blocked);

    let blocked = LoginAttemptRecord {
        failed_attempts: 5,
        total_failures: 12,
        block_until: Some(now + Duration::minutes(5)),
        ..Default::default()
    };
    let outcome = probe_state(&policy, Some(&blocked), now);
    assert!(outcome.is_blocked);
    assert_eq!(outcome.block_time_remaining_ms, 300_000);
    assert!(outcome.suggest_password_reset);

    let expired = LoginAttemptRecord {
        block_until: Some(now - Duration::seconds(1)),
        ..blocked
    };
    let outcome = probe_state(&policy, Some(&expired), now);
    assert!(!outcome.is_blocked);
    assert!(!outcome.suggest_password_reset);
}

#[tokio::test]
async fn test_record_failure_persists_each_step() {
    let (store, _clock) = clocked_store();
    let lockout = EscalatingLockout::new(store.clone(), LockoutPolicy::email(), 3);

    for expected in 1..=4u32 {
        let outcome = lockout.record_failure(EMAIL).await.unwrap();
        assert!(!outcome.is_blocked);
        assert_eq!(outcome.failed_attempts, expected);
    }

    let stored = fetch_typed::<_, LoginAttemptRecord>(&*store, "loginAttempts", EMAIL)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(stored.value.failed_attempts, 4);
    assert_eq!(stored.revision, 4);
}

#[tokio::test]
async fn test_nth_lockout_uses_nth_table_entry() {
    let (store, clock) = clocked_store();
    let lockout = EscalatingLockout::new(store, LockoutPolicy::email(), 3);
    let expected_minutes = [1i64, 5, 15, 30, 60, 120, 1440, 1440];

    for minutes in expected_minutes {
        let mut outcome = lockout.record_failure(EMAIL).await.unwrap();
        for _ in 1..5 {
            assert!(!outcome.is_blocked);
            outcome = lockout.record_failure(EMAIL).await.unwrap();
        }
        assert!(outcome.is_blocked);
        assert_eq!(outcome.block_time_remaining_ms, (minutes * 60_000) as u64);

        clock.advance(Duration::minutes(minutes) + Duration::seconds(1));
    }
}

#[tokio::test]
async fn test_reset_starts_streak_over() {
    let (store, clock) = clocked_store();
    let lockout = EscalatingLockout::new(store.clone(), LockoutPolicy::email(), 3);

    for _ in 0..5 {
        lockout.record_failure(EMAIL).await.unwrap();
    }
    clock.advance(Duration::minutes(2));
    lockout.reset(EMAIL).await.unwrap();

    let record = fetch_typed::<_, LoginAttemptRecord>(&*store, "loginAttempts", EMAIL)
        .await
        .unwrap()
        .unwrap()
        .value;
    assert_eq!(record, LoginAttemptRecord::cleared(EMAIL, start_time() + Duration::minutes(2)));

    // First lockout of the new streak is back at the first tier
    let mut outcome = lockout.record_failure(EMAIL).await.unwrap();
    assert_eq!(outcome.failed_attempts, 1);
    for _ in 1..5 {
        outcome = lockout.record_failure(EMAIL).await.unwrap();
    }
    assert!(outcome.is_blocked);
    assert_eq!(outcome.block_time_remaining_ms, 60_000);
}

#[tokio::test]
async fn test_mark_password_reset_sent_keeps_counters() {
    let (store, _clock) = clocked_store();
    let lockout = EscalatingLockout::new(store.clone(), LockoutPolicy::email(), 3);

    lockout.record_failure(EMAIL).await.unwrap();
    lockout.record_failure(EMAIL).await.unwrap();
    lockout.mark_password_reset_sent(EMAIL).await.unwrap();

    let record = fetch_typed::<_, LoginAttemptRecord>(&*store, "loginAttempts", EMAIL)
        .await
        .unwrap()
        .unwrap()
        .value;
    assert_eq!(record.failed_attempts, 2);
    assert!(record.password_reset_sent);

    let outcome = lockout.record_failure(EMAIL).await.unwrap();
    assert!(outcome.suggest_password_reset);
}

#[tokio::test]
async fn test_mark_password_reset_sent_on_unknown_identifier() {
    let (store, _clock) = clocked_store();
    let lockout = EscalatingLockout::new(store.clone(), LockoutPolicy::email(), 3);

    lockout.mark_password_reset_sent("new@example.com").await.unwrap();

    let status = lockout.status("new@example.com").await.unwrap();
    assert!(!status.is_blocked);
    assert!(status.suggest_password_reset);
}

#[tokio::test]
async fn test_lost_races_are_retried() {
    let clock = ManualClock::new(start_time());
    let store = Arc::new(FlakyCounterStore::new(clock));
    let lockout = EscalatingLockout::new(store.clone(), LockoutPolicy::email(), 3);

    store.lose_next_races(2);
    let outcome = lockout.record_failure(EMAIL).await.unwrap();

    assert_eq!(outcome.failed_attempts, 1);
    assert_eq!(store.cas_calls.load(std::sync::atomic::Ordering::SeqCst), 3);
    assert!(store.get("loginAttempts", EMAIL).await.unwrap().is_some());
}

#[tokio::test]
async fn test_exhausted_retries_return_unpersisted_decision() {
    let clock = ManualClock::new(start_time());
    let store = Arc::new(FlakyCounterStore::new(clock));
    let lockout = EscalatingLockout::new(store.clone(), LockoutPolicy::email(), 3);

    store.lose_next_races(100);
    let outcome = lockout.record_failure(EMAIL).await.unwrap();

    assert!(!outcome.is_blocked);
    assert_eq!(outcome.failed_attempts, 1);
    assert_eq!(store.cas_calls.load(std::sync::atomic::Ordering::SeqCst), 4);
    assert!(store.get("loginAttempts", EMAIL).await.unwrap().is_none());
}

#[tokio::test]
async fn test_store_errors_propagate_from_tracker() {
    let store = Arc::new(FlakyCounterStore::failing(ManualClock::new(start_time())));
    let lockout = EscalatingLockout::new(store, LockoutPolicy::email(), 3);

    assert!(lockout.record_failure(EMAIL).await.is_err());
    assert!(lockout.status(EMAIL).await.is_err());
    assert!(lockout.reset(EMAIL).await.is_err());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_failures_are_all_counted() {
    let (store, _clock) = clocked_store();
    let lockout = Arc::new(EscalatingLockout::new(store.clone(), LockoutPolicy::email(), 10));

    let handles: Vec<_> = (0..5)
        .map(|_| {
            let lockout = lockout.clone();
            tokio::spawn(async move { lockout.record_failure(EMAIL).await.unwrap() })
        })
        .collect();

    let mut blocked = 0;
    for handle in handles {
        if handle.await.unwrap().is_blocked {
            blocked += 1;
        }
    }

    let record = fetch_typed::<_, LoginAttemptRecord>(&*store, "loginAttempts", EMAIL)
        .await
        .unwrap()
        .unwrap()
        .value;
    assert_eq!(record.failed_attempts, 5);
    assert_eq!(record.total_failures, 5);
    assert!(record.block_until.is_some());
    assert_eq!(blocked, 1);
}
