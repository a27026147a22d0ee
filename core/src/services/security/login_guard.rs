//! Login brute-force protection
//!
//! Two escalating lockout trackers sit in front of the identity provider: one
//! keyed by normalized email, one keyed by a hashed client fingerprint so an
//! attacker rotating through many addresses from one source is caught too.
//! Storage failures never surface to the caller; they resolve to allow or deny
//! according to `fail_open`.

use std::sync::Arc;

use tracing::{error, info, warn};

use tm_shared::config::LoginSecurityConfig;
use tm_shared::utils::identifier::normalize_email;

use crate::domain::value_objects::{AnonymousAttemptStatus, LoginAttemptStatus};
use crate::errors::DomainError;
use crate::repositories::counter_store::CounterStore;
use crate::services::auth::identity::IdentityProvider;

use super::lockout::{EscalatingLockout, LockoutOutcome, LockoutPolicy};

/// Guards login attempts per email and per client fingerprint
pub struct LoginSecurityGuard<C, P>
where
    C: CounterStore + ?Sized,
    P: IdentityProvider + ?Sized,
{
    email: EscalatingLockout<C>,
    anonymous: EscalatingLockout<C>,
    identity: Arc<P>,
    fail_open: bool,
}

impl<C, P> LoginSecurityGuard<C, P>
where
    C: CounterStore + ?Sized,
    P: IdentityProvider + ?Sized,
{
    /// Create a new guard over `store`
    pub fn new(store: Arc<C>, identity: Arc<P>, config: LoginSecurityConfig) -> Self {
        let email = EscalatingLockout::new(
            store.clone(),
            LockoutPolicy::from_config(&config.email),
            config.max_write_retries,
        );
        let anonymous = EscalatingLockout::new(
            store,
            LockoutPolicy::from_config(&config.anonymous),
            config.max_write_retries,
        );

        Self {
            email,
            anonymous,
            identity,
            fail_open: config.fail_open,
        }
    }

    /// Create a guard with the default thresholds and escalation tables
    pub fn with_defaults(store: Arc<C>, identity: Arc<P>) -> Self {
        Self::new(store, identity, LoginSecurityConfig::default())
    }

    /// Policy applied to email-keyed tracking
    pub fn email_policy(&self) -> &LockoutPolicy {
        self.email.policy()
    }

    /// Policy applied to fingerprint-keyed tracking
    pub fn anonymous_policy(&self) -> &LockoutPolicy {
        self.anonymous.policy()
    }

    /// Record a confirmed failed login for `email`
    ///
    /// Call this after the identity provider rejected the credentials, never
    /// before. The returned status tells whether the email is now locked out,
    /// for how long, and whether to offer a password reset.
    pub async fn record_failed_login_attempt(&self, email: &str) -> LoginAttemptStatus {
        let email = normalize_email(email);
        match self.email.record_failure(&email).await {
            Ok(outcome) => login_status(outcome),
            Err(err) => self.email_store_failure("record_failed_login_attempt", &email, err),
        }
    }

    /// Whether `email` is currently locked out, without recording anything
    pub async fn check_login_status(&self, email: &str) -> LoginAttemptStatus {
        let email = normalize_email(email);
        match self.email.status(&email).await {
            Ok(outcome) => login_status(outcome),
            Err(err) => self.email_store_failure("check_login_status", &email, err),
        }
    }

    /// Clear the failure history of `email` after a successful login
    pub async fn reset_login_attempts(&self, email: &str) {
        let email = normalize_email(email);
        if let Err(err) = self.email.reset(&email).await {
            error!(
                email = %email,
                error = %err,
                "Failed to reset login attempts"
            );
        }
    }

    /// Record a confirmed failed login from the client identified by `ip_hash`
    pub async fn record_failed_anonymous_attempt(&self, ip_hash: &str) -> AnonymousAttemptStatus {
        match self.anonymous.record_failure(ip_hash).await {
            Ok(outcome) => anonymous_status(outcome),
            Err(err) => self.anonymous_store_failure("record_failed_anonymous_attempt", ip_hash, err),
        }
    }

    /// Whether the client identified by `ip_hash` is currently locked out
    pub async fn check_anonymous_status(&self, ip_hash: &str) -> AnonymousAttemptStatus {
        match self.anonymous.status(ip_hash).await {
            Ok(outcome) => anonymous_status(outcome),
            Err(err) => self.anonymous_store_failure("check_anonymous_status", ip_hash, err),
        }
    }

    /// Clear the failure history of the client identified by `ip_hash` after a
    /// successful login from it
    pub async fn reset_anonymous_attempts(&self, ip_hash: &str) {
        if let Err(err) = self.anonymous.reset(ip_hash).await {
            error!(
                ip_hash = %ip_hash,
                error = %err,
                "Failed to reset anonymous attempts"
            );
        }
    }

    /// Ask the identity provider to send a password-reset email
    ///
    /// # Returns
    /// * `true` - The provider accepted the request
    /// * `false` - The provider refused or could not be reached
    pub async fn send_password_reset(&self, email: &str) -> bool {
        let email = normalize_email(email);

        if let Err(err) = self.identity.send_password_reset_email(&email).await {
            warn!(
                email = %email,
                error = %err,
                "Password reset email could not be sent"
            );
            return false;
        }

        if let Err(err) = self.email.mark_password_reset_sent(&email).await {
            error!(
                email = %email,
                error = %err,
                "Password reset sent but flag could not be stored"
            );
        }

        info!(email = %email, "Password reset email sent");
        true
    }

    fn email_store_failure(&self, operation: &str, email: &str, err: DomainError) -> LoginAttemptStatus {
        error!(
            operation = operation,
            email = %email,
            error = %err,
            fail_open = self.fail_open,
            "Login attempt store unavailable"
        );

        if self.fail_open {
            LoginAttemptStatus::allowed()
        } else {
            LoginAttemptStatus::blocked(first_block_ms(self.email.policy()), false)
        }
    }

    fn anonymous_store_failure(&self, operation: &str, ip_hash: &str, err: DomainError) -> AnonymousAttemptStatus {
        error!(
            operation = operation,
            ip_hash = %ip_hash,
            error = %err,
            fail_open = self.fail_open,
            "Anonymous attempt store unavailable"
        );

        if self.fail_open {
            AnonymousAttemptStatus::allowed()
        } else {
            AnonymousAttemptStatus::blocked(first_block_ms(self.anonymous.policy()))
        }
    }
}

fn login_status(outcome: LockoutOutcome) -> LoginAttemptStatus {
    LoginAttemptStatus {
        is_blocked: outcome.is_blocked,
        block_time_remaining_ms: outcome.block_time_remaining_ms,
        suggest_password_reset: outcome.suggest_password_reset,
    }
}

fn anonymous_status(outcome: LockoutOutcome) -> AnonymousAttemptStatus {
    AnonymousAttemptStatus {
        is_blocked: outcome.is_blocked,
        block_time_remaining_ms: outcome.block_time_remaining_ms,
    }
}

fn first_block_ms(policy: &LockoutPolicy) -> u64 {
    u64::try_from(policy.first_block_duration().num_milliseconds()).unwrap_or(0)
}
