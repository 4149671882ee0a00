//! Stripe subscription lookup adapter.
//!
//! Implements the `SubscriptionLookup` port against the Stripe REST API.
//! `invoice.payment_failed` events carry no user id, so the owning
//! subscription is fetched to read `metadata.userId`.
//!
//! # Configuration
//!
//! ```ignore
//! let config = StripeConfig::new(api_key).with_timeout(Duration::from_secs(10));
//! let lookup = StripeSubscriptionClient::new(config)?;
//! ```

use std::time::Duration;

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use tracing::debug;

use crate::domain::billing::StripeSubscription;
use crate::ports::{PaymentError, PaymentErrorCode, SubscriptionLookup};

const DEFAULT_API_BASE_URL: &str = "https://api.stripe.com";
const DEFAULT_TIMEOUT_SECS: u64 = 10;

/// Stripe API configuration.
#[derive(Clone)]
pub struct StripeConfig {
    /// Stripe secret API key (sk_live_... or sk_test_...).
    api_key: SecretString,

    /// Base URL for Stripe API (default: https://api.stripe.com).
    api_base_url: String,

    /// Bound on each API call.
    timeout: Duration,
}

impl StripeConfig {
    /// Create a new Stripe configuration.
    pub fn new(api_key: SecretString) -> Self {
        Self {
            api_key,
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        }
    }

    /// Set a custom API base URL (for testing).
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.api_base_url = url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

/// Stripe REST client for subscription lookups.
pub struct StripeSubscriptionClient {
    config: StripeConfig,
    http_client: reqwest::Client,
}

impl StripeSubscriptionClient {
    /// Create a new client with the given configuration.
    pub fn new(config: StripeConfig) -> Result<Self, PaymentError> {
        let http_client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| PaymentError::configuration(e.to_string()))?;
        Ok(Self {
            config,
            http_client,
        })
    }
}

#[async_trait]
impl SubscriptionLookup for StripeSubscriptionClient {
    async fn get_subscription(
        &self,
        subscription_id: &str,
    ) -> Result<Option<StripeSubscription>, PaymentError> {
        let url = format!(
            "{}/v1/subscriptions/{}",
            self.config.api_base_url, subscription_id
        );

        let response = self
            .http_client
            .get(&url)
            .basic_auth(self.config.api_key.expose_secret(), Option::<&str>::None)
            .send()
            .await
            .map_err(|e| PaymentError::network(e.to_string()))?;

        let status = response.status();
        if status == reqwest::StatusCode::NOT_FOUND {
            debug!(subscription_id, "Stripe subscription not found");
            return Ok(None);
        }

        if status == reqwest::StatusCode::UNAUTHORIZED {
            return Err(PaymentError::authentication("Stripe rejected the API key"));
        }

        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            return Err(PaymentError::new(
                PaymentErrorCode::RateLimitExceeded,
                "Stripe rate limit exceeded",
            ));
        }

        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(PaymentError::provider(format!(
                "Stripe API error ({}): {}",
                status, error_text
            )));
        }

        let subscription: StripeSubscription = response.json().await.map_err(|e| {
            PaymentError::invalid_response(format!("Failed to parse Stripe response: {}", e))
        })?;

        Ok(Some(subscription))
    }
}
