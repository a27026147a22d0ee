//! Identity provider clients

pub mod firebase;

#[cfg(test)]
mod tests;

pub use firebase::FirebaseIdentityProvider;
