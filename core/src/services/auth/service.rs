//! Email/password login flow guarded by the lockout trackers.

use std::sync::Arc;

use tracing::{info, warn};

use tm_shared::utils::identifier::{generate_simple_hash, normalize_email};

use crate::domain::value_objects::{AnonymousAttemptStatus, LoginAttemptStatus};
use crate::errors::{AuthError, IdentityError};
use crate::repositories::counter_store::CounterStore;
use crate::services::security::{format_block_time, LoginSecurityGuard};

use super::identity::{AuthenticatedUser, IdentityProvider};

/// Login service
///
/// Orders the calls the way the lockout contract requires: probe the block
/// state first, verify credentials, then record a failure only after the
/// provider confirmed the rejection, or reset the counters on success.
pub struct LoginService<C, P>
where
    C: CounterStore + ?Sized,
    P: IdentityProvider + ?Sized,
{
    guard: Arc<LoginSecurityGuard<C, P>>,
    identity: Arc<P>,
}

impl<C, P> LoginService<C, P>
where
    C: CounterStore + ?Sized,
    P: IdentityProvider + ?Sized,
{
    /// Create a new login service
    pub fn new(guard: Arc<LoginSecurityGuard<C, P>>, identity: Arc<P>) -> Self {
        Self { guard, identity }
    }

    /// Guard shared with other callers
    pub fn guard(&self) -> &Arc<LoginSecurityGuard<C, P>> {
        &self.guard
    }

    /// Sign in with email and password
    ///
    /// `client_fingerprint` identifies the calling client (address, device
    /// string); it is hashed before use as a tracking key.
    ///
    /// # Returns
    /// * `Ok(AuthenticatedUser)` - Credentials accepted, failure history of the
    ///   email and of the client cleared
    /// * `Err(AuthError::LoginBlocked)` - Email or client currently locked out
    /// * `Err(AuthError::InvalidCredentials)` - Rejected, failure recorded
    /// * `Err(AuthError)` - Provider throttled, disabled account or outage
    pub async fn login(
        &self,
        email: &str,
        password: &str,
        client_fingerprint: Option<&str>,
    ) -> Result<AuthenticatedUser, AuthError> {
        let email = normalize_email(email);
        let client_hash = client_fingerprint.map(generate_simple_hash);

        let email_status = self.guard.check_login_status(&email).await;
        let client_status = match client_hash.as_deref() {
            Some(hash) => self.guard.check_anonymous_status(hash).await,
            None => AnonymousAttemptStatus::allowed(),
        };
        if let Some(blocked) = blocked_error(&email_status, &client_status) {
            warn!(email = %email, code = blocked.code(), "Login attempt while locked out");
            return Err(blocked);
        }

        match self.identity.check_credentials(&email, password).await {
            Ok(user) => {
                self.guard.reset_login_attempts(&email).await;
                if let Some(hash) = client_hash.as_deref() {
                    self.guard.reset_anonymous_attempts(hash).await;
                }
                info!(email = %email, uid = %user.uid, "User logged in");
                Ok(user)
            }
            Err(IdentityError::InvalidCredentials) => {
                let email_status = self.guard.record_failed_login_attempt(&email).await;
                let client_status = match client_hash.as_deref() {
                    Some(hash) => self.guard.record_failed_anonymous_attempt(hash).await,
                    None => AnonymousAttemptStatus::allowed(),
                };

                Err(blocked_error(&email_status, &client_status).unwrap_or(AuthError::InvalidCredentials {
                    suggest_password_reset: email_status.suggest_password_reset,
                }))
            }
            Err(IdentityError::UserDisabled) => Err(AuthError::UserDisabled),
            Err(IdentityError::TooManyRequests) => Err(AuthError::RateLimitExceeded {
                retry_after_seconds: 60,
            }),
            Err(IdentityError::Unavailable { message }) => {
                warn!(email = %email, error = %message, "Identity provider unavailable");
                Err(AuthError::IdentityProviderUnavailable)
            }
        }
    }

    /// Send a password-reset email; `false` when the provider refused
    pub async fn request_password_reset(&self, email: &str) -> bool {
        self.guard.send_password_reset(email).await
    }
}

/// Build the lockout error when either tracker blocks; the longer wait wins
fn blocked_error(email: &LoginAttemptStatus, client: &AnonymousAttemptStatus) -> Option<AuthError> {
    let remaining_ms = match (email.is_blocked, client.is_blocked) {
        (false, false) => return None,
        (true, false) => email.block_time_remaining_ms,
        (false, true) => client.block_time_remaining_ms,
        (true, true) => email.block_time_remaining_ms.max(client.block_time_remaining_ms),
    };

    Some(AuthError::LoginBlocked {
        wait_time: format_block_time(remaining_ms),
        remaining_ms,
        suggest_password_reset: email.suggest_password_reset,
    })
}
