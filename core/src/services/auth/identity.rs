//! Identity provider seam.
//!
//! Credential verification and password-reset emails are delegated to a hosted
//! identity service. The security services only need the two calls below.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::errors::IdentityError;

/// User returned by a successful credential check
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthenticatedUser {
    /// Provider-assigned user id
    pub uid: String,
    /// Email the user signed in with
    pub email: String,
    /// Session token issued by the provider, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id_token: Option<String>,
}

/// Hosted identity provider
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Verify an email/password pair
    ///
    /// # Returns
    /// * `Ok(AuthenticatedUser)` - Credentials accepted
    /// * `Err(IdentityError::InvalidCredentials)` - Confirmed rejection
    /// * `Err(IdentityError)` - Any other provider failure
    async fn check_credentials(&self, email: &str, password: &str) -> Result<AuthenticatedUser, IdentityError>;

    /// Ask the provider to email a password-reset link
    async fn send_password_reset_email(&self, email: &str) -> Result<(), IdentityError>;
}
