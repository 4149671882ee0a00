//! Identity provider configuration (Firebase service account)

use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use std::time::Duration;

use super::error::ValidationError;
use super::validate_url;

/// Service account credentials and endpoints for custom claims
#[derive(Debug, Clone, Deserialize)]
pub struct IdentityConfig {
    pub project_id: String,

    pub service_account_email: String,

    /// PEM private key. Literal `\n` sequences from env files are accepted.
    pub private_key: SecretString,

    #[serde(default = "default_token_uri")]
    pub token_uri: String,

    #[serde(default = "default_api_base_url")]
    pub api_base_url: String,

    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
}

impl IdentityConfig {
    /// The private key with escaped newlines restored.
    pub fn private_key_pem(&self) -> SecretString {
        SecretString::new(self.private_key.expose_secret().replace("\\n", "\n"))
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Validate identity configuration
    pub fn validate(&self, production: bool) -> Result<(), ValidationError> {
        if self.project_id.is_empty() {
            return Err(ValidationError::MissingRequired("IDENTITY_PROJECT_ID"));
        }
        if !self.service_account_email.contains('@') {
            return Err(ValidationError::InvalidServiceAccountEmail);
        }
        if !self
            .private_key_pem()
            .expose_secret()
            .contains("-----BEGIN")
        {
            return Err(ValidationError::InvalidPrivateKey);
        }
        if self.timeout_secs == 0 || self.timeout_secs > 60 {
            return Err(ValidationError::InvalidTimeout);
        }
        validate_url("IDENTITY_TOKEN_URI", &self.token_uri, production)?;
        validate_url("IDENTITY_API_BASE_URL", &self.api_base_url, production)
    }
}

fn default_token_uri() -> String {
    "https://oauth2.googleapis.com/token".to_string()
}

fn default_api_base_url() -> String {
    "https://identitytoolkit.googleapis.com".to_string()
}

fn default_timeout() -> u64 {
    10
}
