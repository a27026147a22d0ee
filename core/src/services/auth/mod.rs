//! Authentication flow on top of the hosted identity provider.

pub mod identity;
pub mod service;

#[cfg(test)]
mod tests;

pub use identity::{AuthenticatedUser, IdentityProvider};
pub use service::LoginService;
