//! Firebase Identity Toolkit client
//!
//! Implements credential checks with `accounts:signInWithPassword` and
//! password-reset emails with `accounts:sendOobCode`. Provider error codes are
//! mapped onto [`IdentityError`] so the login flow can tell a confirmed
//! rejection apart from throttling or an outage.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::de::{DeserializeOwned, IgnoredAny};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use tm_core::errors::IdentityError;
use tm_core::services::auth::{AuthenticatedUser, IdentityProvider};
use tm_shared::config::IdentityProviderConfig;

use crate::InfrastructureError;

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct SignInRequest<'a> {
    email: &'a str,
    password: &'a str,
    return_secure_token: bool,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct SignInResponse {
    pub local_id: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub id_token: Option<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct OobCodeRequest<'a> {
    request_type: &'static str,
    email: &'a str,
}

#[derive(Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Deserialize)]
struct ErrorBody {
    message: String,
}

/// Map a provider error message onto an [`IdentityError`]
///
/// Messages look like `INVALID_PASSWORD` or
/// `TOO_MANY_ATTEMPTS_TRY_LATER : Access to this account has been ...`; only
/// the code before the first ` : ` is significant.
pub(crate) fn map_error_message(message: &str) -> IdentityError {
    let code = message.split(" : ").next().unwrap_or(message).trim();

    match code {
        "INVALID_PASSWORD" | "EMAIL_NOT_FOUND" | "INVALID_LOGIN_CREDENTIALS" | "INVALID_EMAIL" => {
            IdentityError::InvalidCredentials
        }
        "USER_DISABLED" => IdentityError::UserDisabled,
        "TOO_MANY_ATTEMPTS_TRY_LATER" => IdentityError::TooManyRequests,
        _ => IdentityError::Unavailable {
            message: message.to_string(),
        },
    }
}

/// Classify a non-success HTTP response
pub(crate) fn classify_failure(status: StatusCode, body: &str) -> IdentityError {
    if let Ok(envelope) = serde_json::from_str::<ErrorEnvelope>(body) {
        return map_error_message(&envelope.error.message);
    }

    if status == StatusCode::TOO_MANY_REQUESTS {
        return IdentityError::TooManyRequests;
    }

    IdentityError::Unavailable {
        message: format!("HTTP {}", status),
    }
}

/// Identity provider backed by the Firebase Identity Toolkit REST API
pub struct FirebaseIdentityProvider {
    http: reqwest::Client,
    config: IdentityProviderConfig,
}

impl FirebaseIdentityProvider {
    /// Create a new client
    ///
    /// # Returns
    /// * `Ok(FirebaseIdentityProvider)` - Ready client
    /// * `Err(InfrastructureError::Http)` - If the HTTP client cannot be built
    pub fn new(config: IdentityProviderConfig) -> Result<Self, InfrastructureError> {
        if config.api_key.is_empty() {
            warn!("Firebase API key is empty; the provider will reject every request");
        }

        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()?;

        Ok(Self { http, config })
    }

    /// URL of an `accounts:*` method, API key included
    pub(crate) fn endpoint(&self, method: &str) -> String {
        format!(
            "{}/accounts:{}?key={}",
            self.config.base_url.trim_end_matches('/'),
            method,
            self.config.api_key
        )
    }

    async fn call<B, R>(&self, method: &str, body: &B) -> Result<R, IdentityError>
    where
        B: Serialize + Sync,
        R: DeserializeOwned,
    {
        let response = self
            .http
            .post(self.endpoint(method))
            .json(body)
            .send()
            .await
            .map_err(|e| {
                warn!(method = method, error = %e, "Identity provider request failed");
                IdentityError::Unavailable {
                    message: e.without_url().to_string(),
                }
            })?;

        let status = response.status();
        if status.is_success() {
            return response.json::<R>().await.map_err(|e| IdentityError::Unavailable {
                message: format!("Invalid response from identity provider: {}", e.without_url()),
            });
        }

        let body = response.text().await.unwrap_or_default();
        let error = classify_failure(status, &body);
        debug!(method = method, status = %status, error = %error, "Identity provider refused request");
        Err(error)
    }
}

#[async_trait]
impl IdentityProvider for FirebaseIdentityProvider {
    async fn check_credentials(&self, email: &str, password: &str) -> Result<AuthenticatedUser, IdentityError> {
        let request = SignInRequest {
            email,
            password,
            return_secure_token: true,
        };
        let response: SignInResponse = self.call("signInWithPassword", &request).await?;

        Ok(AuthenticatedUser {
            uid: response.local_id,
            email: response.email.unwrap_or_else(|| email.to_string()),
            id_token: response.id_token,
        })
    }

    async fn send_password_reset_email(&self, email: &str) -> Result<(), IdentityError> {
        let request = OobCodeRequest {
            request_type: "PASSWORD_RESET",
            email,
        };
        let _: IgnoredAny = self.call("sendOobCode", &request).await?;
        Ok(())
    }
}
