//! Stripe configuration

use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use std::time::Duration;

use super::error::ValidationError;
use super::validate_url;

/// Stripe webhook and API configuration
#[derive(Debug, Clone, Deserialize)]
pub struct PaymentConfig {
    /// Stripe secret API key, used for subscription lookups
    pub stripe_api_key: SecretString,

    /// Stripe webhook signing secret
    pub stripe_webhook_secret: SecretString,

    #[serde(default = "default_stripe_api_base_url")]
    pub stripe_api_base_url: String,

    /// Maximum age of a signed webhook timestamp
    #[serde(default = "default_signature_tolerance")]
    pub stripe_signature_tolerance_secs: i64,

    #[serde(default = "default_lookup_timeout")]
    pub stripe_lookup_timeout_secs: u64,
}

impl PaymentConfig {
    /// Check if using Stripe test mode
    pub fn is_test_mode(&self) -> bool {
        self.stripe_api_key.expose_secret().starts_with("sk_test_")
    }

    /// Check if using Stripe live mode
    pub fn is_live_mode(&self) -> bool {
        self.stripe_api_key.expose_secret().starts_with("sk_live_")
    }

    pub fn lookup_timeout(&self) -> Duration {
        Duration::from_secs(self.stripe_lookup_timeout_secs)
    }

    /// Validate payment configuration
    pub fn validate(&self, production: bool) -> Result<(), ValidationError> {
        let api_key = self.stripe_api_key.expose_secret();
        let webhook_secret = self.stripe_webhook_secret.expose_secret();

        if api_key.is_empty() {
            return Err(ValidationError::MissingRequired("STRIPE_API_KEY"));
        }
        if webhook_secret.is_empty() {
            return Err(ValidationError::MissingRequired("STRIPE_WEBHOOK_SECRET"));
        }

        // Restricted keys (rk_) can read subscriptions too
        if !api_key.starts_with("sk_") && !api_key.starts_with("rk_") {
            return Err(ValidationError::InvalidStripeKey);
        }
        if !webhook_secret.starts_with("whsec_") {
            return Err(ValidationError::InvalidStripeWebhookSecret);
        }
        if self.stripe_signature_tolerance_secs <= 0 || self.stripe_signature_tolerance_secs > 3600
        {
            return Err(ValidationError::InvalidSignatureTolerance);
        }
        if self.stripe_lookup_timeout_secs == 0 || self.stripe_lookup_timeout_secs > 60 {
            return Err(ValidationError::InvalidTimeout);
        }
        validate_url("STRIPE_API_BASE_URL", &self.stripe_api_base_url, production)
    }
}

impl Default for PaymentConfig {
    fn default() -> Self {
        Self {
            stripe_api_key: SecretString::new(String::new()),
            stripe_webhook_secret: SecretString::new(String::new()),
            stripe_api_base_url: default_stripe_api_base_url(),
            stripe_signature_tolerance_secs: default_signature_tolerance(),
            stripe_lookup_timeout_secs: default_lookup_timeout(),
        }
    }
}

fn default_stripe_api_base_url() -> String {
    "https://api.stripe.com".to_string()
}

fn default_signature_tolerance() -> i64 {
    300
}

fn default_lookup_timeout() -> u64 {
    10
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid() -> PaymentConfig {
        PaymentConfig {
            stripe_api_key: SecretString::new("sk_test_abcd1234".to_string()),
            stripe_webhook_secret: SecretString::new("whsec_xyz789".to_string()),
            ..Default::default()
        }
    }

    #[test]
    fn test_is_test_mode() {
        let config = valid();
        assert!(config.is_test_mode());
        assert!(!config.is_live_mode());
    }

    #[test]
    fn test_is_live_mode() {
        let config = PaymentConfig {
            stripe_api_key: SecretString::new("sk_live_xxx".to_string()),
            ..valid()
        };
        assert!(config.is_live_mode());
        assert!(!config.is_test_mode());
    }

    #[test]
    fn test_validation_missing_api_key() {
        assert_eq!(
            PaymentConfig::default().validate(false),
            Err(ValidationError::MissingRequired("STRIPE_API_KEY"))
        );
    }

    #[test]
    fn test_validation_invalid_api_key_prefix() {
        let config = PaymentConfig {
            stripe_api_key: SecretString::new("pk_test_xxx".to_string()),
            ..valid()
        };
        assert_eq!(config.validate(false), Err(ValidationError::InvalidStripeKey));
    }

    #[test]
    fn test_validation_invalid_webhook_secret_prefix() {
        let config = PaymentConfig {
            stripe_webhook_secret: SecretString::new("secret_xxx".to_string()),
            ..valid()
        };
        assert_eq!(
            config.validate(false),
            Err(ValidationError::InvalidStripeWebhookSecret)
        );
    }

    #[test]
    fn test_validation_tolerance_bounds() {
        let config = PaymentConfig {
            stripe_signature_tolerance_secs: 0,
            ..valid()
        };
        assert_eq!(
            config.validate(false),
            Err(ValidationError::InvalidSignatureTolerance)
        );
    }

    #[test]
    fn test_production_requires_https_base_url() {
        let config = PaymentConfig {
            stripe_api_base_url: "http://localhost:12111".to_string(),
            ..valid()
        };
        assert!(config.validate(false).is_ok());
        assert_eq!(
            config.validate(true),
            Err(ValidationError::MustBeHttps("STRIPE_API_BASE_URL"))
        );
    }

    #[test]
    fn test_validation_valid_config() {
        assert!(valid().validate(true).is_ok());
    }
}
