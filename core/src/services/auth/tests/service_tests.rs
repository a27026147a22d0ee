//! Tests for the login flow

use chrono::Duration;

use super::mocks::{create_test_service, MockIdentityProvider};
use crate::domain::entities::LoginAttemptRecord;
use crate::errors::{AuthError, IdentityError};
use crate::repositories::counter_store::{fetch_typed, CounterStore};
use crate::services::security::generate_simple_hash;

const EMAIL: &str = "tech@example.com";
const PASSWORD: &str = "correct horse";
const CLIENT: &str = "203.0.113.9";

async fn email_record(store: &crate::repositories::InMemoryCounterStore) -> Option<LoginAttemptRecord> {
    fetch_typed::<_, LoginAttemptRecord>(store, "loginAttempts", EMAIL)
        .await
        .unwrap()
        .map(|v| v.value)
}

#[tokio::test]
async fn test_successful_login_returns_user() {
    let ctx = create_test_service(MockIdentityProvider::with_user(EMAIL, PASSWORD));

    let user = ctx.service.login(" Tech@Example.com", PASSWORD, Some(CLIENT)).await.unwrap();

    assert_eq!(user.email, EMAIL);
    assert_eq!(user.uid, "uid-tech@example.com");
    assert_eq!(email_record(&ctx.store).await.unwrap().failed_attempts, 0);
}

#[tokio::test]
async fn test_wrong_password_is_recorded_on_both_trackers() {
    let ctx = create_test_service(MockIdentityProvider::with_user(EMAIL, PASSWORD));

    let err = ctx.service.login(EMAIL, "nope", Some(CLIENT)).await.unwrap_err();

    assert_eq!(err, AuthError::InvalidCredentials { suggest_password_reset: false });
    assert_eq!(email_record(&ctx.store).await.unwrap().failed_attempts, 1);

    let client = ctx
        .store
        .get("anonymousLoginAttempts", &generate_simple_hash(CLIENT))
        .await
        .unwrap();
    assert!(client.is_some());
}

#[tokio::test]
async fn test_success_clears_failure_history() {
    let ctx = create_test_service(MockIdentityProvider::with_user(EMAIL, PASSWORD));

    for _ in 0..3 {
        let _ = ctx.service.login(EMAIL, "nope", None).await;
    }
    assert_eq!(email_record(&ctx.store).await.unwrap().failed_attempts, 3);

    ctx.service.login(EMAIL, PASSWORD, None).await.unwrap();

    let record = email_record(&ctx.store).await.unwrap();
    assert_eq!(record.failed_attempts, 0);
    assert_eq!(record.total_failures, 0);
    assert_eq!(record.block_until, None);
}

#[tokio::test]
async fn test_success_clears_client_failure_history() {
    let ctx = create_test_service(MockIdentityProvider::with_user(EMAIL, PASSWORD));

    for n in 0..4 {
        let _ = ctx.service.login(&format!("user{}@example.com", n), "guess", Some(CLIENT)).await;
    }
    ctx.service.login(EMAIL, PASSWORD, Some(CLIENT)).await.unwrap();

    let client: LoginAttemptRecord =
        fetch_typed::<_, LoginAttemptRecord>(&*ctx.store, "anonymousLoginAttempts", &generate_simple_hash(CLIENT))
            .await
            .unwrap()
            .unwrap()
            .value;
    assert_eq!(client.failed_attempts, 0);
    assert_eq!(client.total_failures, 0);
    assert_eq!(client.lockout_count, 0);
}

#[tokio::test]
async fn test_fifth_failure_returns_login_blocked() {
    let ctx = create_test_service(MockIdentityProvider::with_user(EMAIL, PASSWORD));

    for _ in 0..4 {
        let err = ctx.service.login(EMAIL, "nope", None).await.unwrap_err();
        assert_eq!(err.code(), "INVALID_CREDENTIALS");
    }

    let err = ctx.service.login(EMAIL, "nope", None).await.unwrap_err();
    assert_eq!(
        err,
        AuthError::LoginBlocked {
            wait_time: "1 minutos".to_string(),
            remaining_ms: 60_000,
            suggest_password_reset: false,
        }
    );
}

#[tokio::test]
async fn test_blocked_login_skips_credential_check() {
    let ctx = create_test_service(MockIdentityProvider::with_user(EMAIL, PASSWORD));

    for _ in 0..5 {
        let _ = ctx.service.login(EMAIL, "nope", None).await;
    }
    assert_eq!(ctx.provider.check_count(), 5);
    ctx.clock.advance(Duration::seconds(30));

    let err = ctx.service.login(EMAIL, PASSWORD, None).await.unwrap_err();

    assert_eq!(ctx.provider.check_count(), 5);
    match err {
        AuthError::LoginBlocked { wait_time, remaining_ms, .. } => {
            assert_eq!(wait_time, "30 segundos");
            assert_eq!(remaining_ms, 30_000);
        }
        other => panic!("expected LoginBlocked, got {:?}", other),
    }
    // The probe did not count as another failure
    assert_eq!(email_record(&ctx.store).await.unwrap().failed_attempts, 5);
}

#[tokio::test]
async fn test_login_succeeds_after_block_expires() {
    let ctx = create_test_service(MockIdentityProvider::with_user(EMAIL, PASSWORD));

    for _ in 0..5 {
        let _ = ctx.service.login(EMAIL, "nope", None).await;
    }
    ctx.clock.advance(Duration::minutes(1));

    let user = ctx.service.login(EMAIL, PASSWORD, None).await.unwrap();
    assert_eq!(user.email, EMAIL);
}

#[tokio::test]
async fn test_reset_suggestion_reaches_caller() {
    let ctx = create_test_service(MockIdentityProvider::with_user(EMAIL, PASSWORD));

    for _ in 0..5 {
        let _ = ctx.service.login(EMAIL, "nope", None).await;
    }
    ctx.clock.advance(Duration::seconds(61));

    let sixth = ctx.service.login(EMAIL, "nope", None).await.unwrap_err();
    assert!(!sixth.suggests_password_reset());

    let seventh = ctx.service.login(EMAIL, "nope", None).await.unwrap_err();
    assert_eq!(seventh, AuthError::InvalidCredentials { suggest_password_reset: true });
}

#[tokio::test]
async fn test_rotating_emails_from_one_client_get_blocked() {
    let ctx = create_test_service(MockIdentityProvider::new());

    for n in 0..9 {
        let err = ctx
            .service
            .login(&format!("user{}@example.com", n), "guess", Some(CLIENT))
            .await
            .unwrap_err();
        assert_eq!(err.code(), "INVALID_CREDENTIALS");
    }

    let tenth = ctx.service.login("user9@example.com", "guess", Some(CLIENT)).await.unwrap_err();
    assert_eq!(
        tenth,
        AuthError::LoginBlocked {
            wait_time: "2 minutos".to_string(),
            remaining_ms: 120_000,
            suggest_password_reset: false,
        }
    );

    let checks = ctx.provider.check_count();
    let eleventh = ctx.service.login("fresh@example.com", "guess", Some(CLIENT)).await.unwrap_err();
    assert_eq!(eleventh.code(), "LOGIN_BLOCKED");
    assert_eq!(ctx.provider.check_count(), checks);

    // A different client is unaffected
    let other = ctx.service.login("fresh@example.com", "guess", Some("198.51.100.4")).await.unwrap_err();
    assert_eq!(other.code(), "INVALID_CREDENTIALS");
}

#[tokio::test]
async fn test_without_fingerprint_only_email_is_tracked() {
    let ctx = create_test_service(MockIdentityProvider::with_user(EMAIL, PASSWORD));

    let _ = ctx.service.login(EMAIL, "nope", None).await;

    assert_eq!(ctx.store.len(), 1);
}

#[tokio::test]
async fn test_provider_outage_records_nothing() {
    let ctx = create_test_service(MockIdentityProvider::with_user(EMAIL, PASSWORD));
    ctx.provider.fail_with(IdentityError::Unavailable {
        message: "connection reset".to_string(),
    });

    let err = ctx.service.login(EMAIL, PASSWORD, Some(CLIENT)).await.unwrap_err();

    assert_eq!(err, AuthError::IdentityProviderUnavailable);
    assert!(ctx.store.is_empty());
}

#[tokio::test]
async fn test_provider_throttling_maps_to_rate_limit() {
    let ctx = create_test_service(MockIdentityProvider::with_user(EMAIL, PASSWORD));
    ctx.provider.fail_with(IdentityError::TooManyRequests);

    let err = ctx.service.login(EMAIL, PASSWORD, None).await.unwrap_err();

    assert_eq!(err, AuthError::RateLimitExceeded { retry_after_seconds: 60 });
    assert!(ctx.store.is_empty());
}

#[tokio::test]
async fn test_disabled_user_is_not_counted() {
    let ctx = create_test_service(MockIdentityProvider::with_user(EMAIL, PASSWORD));
    ctx.provider.fail_with(IdentityError::UserDisabled);

    let err = ctx.service.login(EMAIL, PASSWORD, None).await.unwrap_err();

    assert_eq!(err, AuthError::UserDisabled);
    assert!(ctx.store.is_empty());
}

#[tokio::test]
async fn test_request_password_reset_forwards_normalized_email() {
    let ctx = create_test_service(MockIdentityProvider::with_user(EMAIL, PASSWORD));

    assert!(ctx.service.request_password_reset("TECH@example.com ").await);

    assert_eq!(ctx.provider.reset_emails.lock().unwrap().as_slice(), [EMAIL.to_string()]);
    assert!(email_record(&ctx.store).await.unwrap().password_reset_sent);
}
