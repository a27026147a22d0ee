//! Error types for authentication and identity-provider operations
//!
//! Messages are bilingual (English | Spanish) so the presentation layer can
//! pick the half matching the user's locale.

use thiserror::Error;

/// Authentication-related errors with bilingual messages
#[derive(Error, Debug, Clone, PartialEq)]
pub enum AuthError {
    #[error("Too many failed login attempts. Try again in {wait_time} | Demasiados intentos fallidos. Inténtalo de nuevo en {wait_time}")]
    LoginBlocked {
        /// Human-readable wait, rendered by `format_block_time`
        wait_time: String,
        /// Remaining block in milliseconds
        remaining_ms: u64,
        /// Whether the caller should offer a password reset
        suggest_password_reset: bool,
    },

    #[error("Invalid email or password | Correo electrónico o contraseña incorrectos")]
    InvalidCredentials { suggest_password_reset: bool },

    #[error("User account is disabled | La cuenta de usuario está deshabilitada")]
    UserDisabled,

    #[error("Too many requests. Try again in {retry_after_seconds} seconds | Demasiadas solicitudes. Inténtalo de nuevo en {retry_after_seconds} segundos")]
    RateLimitExceeded { retry_after_seconds: u64 },

    #[error("Authentication service unavailable. Please try again later | Servicio de autenticación no disponible. Inténtalo más tarde")]
    IdentityProviderUnavailable,
}

impl AuthError {
    /// Stable error code for programmatic handling
    pub fn code(&self) -> &'static str {
        match self {
            AuthError::LoginBlocked { .. } => "LOGIN_BLOCKED",
            AuthError::InvalidCredentials { .. } => "INVALID_CREDENTIALS",
            AuthError::UserDisabled => "USER_DISABLED",
            AuthError::RateLimitExceeded { .. } => "RATE_LIMIT_EXCEEDED",
            AuthError::IdentityProviderUnavailable => "IDENTITY_PROVIDER_UNAVAILABLE",
        }
    }

    /// Whether the caller should surface a password-reset action
    pub fn suggests_password_reset(&self) -> bool {
        match self {
            AuthError::LoginBlocked { suggest_password_reset, .. }
            | AuthError::InvalidCredentials { suggest_password_reset } => *suggest_password_reset,
            _ => false,
        }
    }
}

/// Failures reported by the hosted identity provider
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum IdentityError {
    #[error("credentials rejected")]
    InvalidCredentials,

    #[error("user disabled")]
    UserDisabled,

    #[error("provider throttled the request")]
    TooManyRequests,

    #[error("identity provider unavailable: {message}")]
    Unavailable { message: String },
}
