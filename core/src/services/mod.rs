//! Business services containing the lockout and throttling logic.

pub mod auth;
pub mod security;

// Re-export commonly used types
pub use auth::{AuthenticatedUser, IdentityProvider, LoginService};
pub use security::{
    format_block_time, EscalatingLockout, LockoutOutcome, LockoutPolicy,
    LoginSecurityGuard, RateLimitCategory, RateLimiter,
};
