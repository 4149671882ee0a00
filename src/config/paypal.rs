//! PayPal configuration

use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use std::time::Duration;

use super::error::ValidationError;
use super::server::Environment;
use super::validate_url;

/// PayPal REST environment
#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum PayPalMode {
    #[default]
    Sandbox,
    Live,
}

impl PayPalMode {
    pub fn api_base_url(&self) -> &'static str {
        match self {
            PayPalMode::Sandbox => "https://api-m.sandbox.paypal.com",
            PayPalMode::Live => "https://api-m.paypal.com",
        }
    }
}

/// PayPal webhook verification configuration
#[derive(Debug, Clone, Deserialize)]
pub struct PayPalConfig {
    #[serde(default)]
    pub client_id: String,

    #[serde(default = "empty_secret")]
    pub secret: SecretString,

    /// Webhook id registered in the PayPal dashboard
    #[serde(default)]
    pub webhook_id: String,

    #[serde(default)]
    pub mode: PayPalMode,

    /// Overrides the mode's base URL (local mocks)
    pub api_base_url: Option<String>,

    /// Accept unverified deliveries. Honored only when `server.environment=test`.
    #[serde(default)]
    pub skip_signature_verification: bool,

    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,

    #[serde(default = "default_max_verify_attempts")]
    pub max_verify_attempts: u32,

    #[serde(default = "default_retry_backoff_ms")]
    pub retry_backoff_ms: u64,
}

impl PayPalConfig {
    pub fn api_base_url(&self) -> &str {
        self.api_base_url
            .as_deref()
            .unwrap_or_else(|| self.mode.api_base_url())
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn retry_backoff(&self) -> Duration {
        Duration::from_millis(self.retry_backoff_ms)
    }

    /// True only when the bypass flag is set and the process runs under test.
    pub fn bypass_effective(&self, environment: Environment) -> bool {
        self.skip_signature_verification && environment == Environment::Test
    }

    /// Validate PayPal configuration
    pub fn validate(&self, environment: Environment) -> Result<(), ValidationError> {
        if self.bypass_effective(environment) {
            return Ok(());
        }
        if self.client_id.is_empty() {
            return Err(ValidationError::MissingRequired("PAYPAL_CLIENT_ID"));
        }
        if self.secret.expose_secret().is_empty() {
            return Err(ValidationError::MissingRequired("PAYPAL_SECRET"));
        }
        if self.webhook_id.is_empty() {
            return Err(ValidationError::MissingRequired("PAYPAL_WEBHOOK_ID"));
        }
        if self.max_verify_attempts == 0 || self.max_verify_attempts > 10 {
            return Err(ValidationError::InvalidRetryAttempts);
        }
        if self.timeout_secs == 0 || self.timeout_secs > 60 {
            return Err(ValidationError::InvalidTimeout);
        }
        validate_url(
            "PAYPAL_API_BASE_URL",
            self.api_base_url(),
            environment == Environment::Production,
        )
    }
}

impl Default for PayPalConfig {
    fn default() -> Self {
        Self {
            client_id: String::new(),
            secret: empty_secret(),
            webhook_id: String::new(),
            mode: PayPalMode::default(),
            api_base_url: None,
            skip_signature_verification: false,
            timeout_secs: default_timeout(),
            max_verify_attempts: default_max_verify_attempts(),
            retry_backoff_ms: default_retry_backoff_ms(),
        }
    }
}

fn empty_secret() -> SecretString {
    SecretString::new(String::new())
}

fn default_timeout() -> u64 {
    10
}

fn default_max_verify_attempts() -> u32 {
    3
}

fn default_retry_backoff_ms() -> u64 {
    200
}
