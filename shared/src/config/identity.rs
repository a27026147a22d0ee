//! Identity provider configuration module

use serde::{Deserialize, Serialize};

/// Hosted identity provider (Firebase Identity Toolkit) configuration
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct IdentityProviderConfig {
    /// Web API key of the project
    #[serde(default)]
    pub api_key: String,

    /// REST base URL
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Request timeout in seconds
    #[serde(default = "default_timeout_seconds")]
    pub timeout_seconds: u64,
}

impl Default for IdentityProviderConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            base_url: default_base_url(),
            timeout_seconds: default_timeout_seconds(),
        }
    }
}

impl IdentityProviderConfig {
    /// Create from environment variables
    pub fn from_env() -> Self {
        Self {
            api_key: std::env::var("FIREBASE_API_KEY").unwrap_or_default(),
            base_url: std::env::var("FIREBASE_AUTH_BASE_URL")
                .unwrap_or_else(|_| default_base_url()),
            ..Default::default()
        }
    }
}

fn default_base_url() -> String {
    String::from("https://identitytoolkit.googleapis.com/v1")
}

fn default_timeout_seconds() -> u64 {
    10
}
