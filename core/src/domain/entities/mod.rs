//! Domain entities persisted by the security services.

pub mod attempt_record;

#[cfg(test)]
mod tests;

// Re-export commonly used types
pub use attempt_record::{LoginAttemptRecord, RateLimitRecord};
