//! Payment providers and the authenticated event envelope.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;
use std::str::FromStr;

use crate::domain::foundation::{Timestamp, ValidationError};

/// Payment provider that delivered a webhook.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    Stripe,
    Paypal,
}

impl Provider {
    /// Storage and logging representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            Provider::Stripe => "stripe",
            Provider::Paypal => "paypal",
        }
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Provider {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "stripe" => Ok(Provider::Stripe),
            "paypal" => Ok(Provider::Paypal),
            other => Err(ValidationError::invalid_format(
                "provider",
                format!("unknown provider '{}'", other),
            )),
        }
    }
}

/// Identity of a delivery in the idempotency ledger.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct IdempotencyKey {
    pub provider: Provider,
    pub external_event_id: String,
}

impl IdempotencyKey {
    pub fn new(provider: Provider, external_event_id: impl Into<String>) -> Self {
        Self {
            provider,
            external_event_id: external_event_id.into(),
        }
    }

    /// Key derived from the raw body, for envelopes that carry no event id.
    pub fn from_body_digest(provider: Provider, body: &[u8]) -> Self {
        let digest = Sha256::digest(body);
        Self::new(provider, format!("sha256:{}", hex::encode(digest)))
    }
}

impl fmt::Display for IdempotencyKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.provider, self.external_event_id)
    }
}

/// An authenticated provider notification, before normalization.
///
/// The payload stays opaque here; only the normalizer looks inside it.
#[derive(Debug, Clone)]
pub struct PaymentEvent {
    pub provider: Provider,
    pub external_event_id: String,
    pub event_type: String,
    pub payload: serde_json::Value,
    pub received_at: Timestamp,
}

impl PaymentEvent {
    pub fn idempotency_key(&self) -> IdempotencyKey {
        IdempotencyKey::new(self.provider, self.external_event_id.clone())
    }
}
