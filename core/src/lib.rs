//! # TechMarket Core
//!
//! Brute-force protection and action throttling for the TechMarket backend.
//! This crate contains the attempt-record entities, the counter-store
//! interface, the escalating lockout and rate limiting services, and the
//! login flow that ties them to a hosted identity provider.

pub mod domain;
pub mod services;
pub mod repositories;
pub mod errors;

// Re-export commonly used types for convenience
pub use domain::*;
pub use services::*;
pub use repositories::*;
pub use errors::*;
