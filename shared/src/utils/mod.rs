//! Common utility functions

pub mod identifier;

// Re-export commonly used utilities
pub use identifier::*;
