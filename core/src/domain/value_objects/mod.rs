//! Value objects returned to callers of the security services.

pub mod security_status;

// Re-export commonly used types
pub use security_status::{AnonymousAttemptStatus, LoginAttemptStatus, RateLimitDecision};
