//! Brute-force protection and action throttling.

pub mod lockout;
pub mod login_guard;
pub mod rate_limiter;
pub mod wait_time;

#[cfg(test)]
mod tests;

pub use lockout::{EscalatingLockout, LockoutOutcome, LockoutPolicy};
pub use login_guard::LoginSecurityGuard;
pub use rate_limiter::{RateLimitCategory, RateLimiter};
pub use wait_time::format_block_time;

pub use tm_shared::utils::identifier::{generate_simple_hash, normalize_email};
