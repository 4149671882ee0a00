//! PayPalWebhookVerifier port - Remote webhook signature verification.

use async_trait::async_trait;
use serde::Serialize;
use serde_json::value::RawValue;

use super::payment_error::PaymentError;

/// Transmission headers PayPal attaches to every webhook delivery.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PayPalTransmission {
    pub transmission_id: String,
    pub transmission_time: String,
    pub transmission_sig: String,
    pub cert_url: String,
    pub auth_algo: String,
}

/// Port for PayPal's verify-webhook-signature call.
#[async_trait]
pub trait PayPalWebhookVerifier: Send + Sync {
    /// Returns `Ok(true)` only if PayPal answers `SUCCESS` for this
    /// transmission and event body. `webhook_event` is the delivered body
    /// verbatim; PayPal verifies the bytes it signed.
    async fn verify(
        &self,
        transmission: &PayPalTransmission,
        webhook_event: &RawValue,
    ) -> Result<bool, PaymentError>;
}
