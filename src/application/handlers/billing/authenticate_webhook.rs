//! WebhookAuthenticator - Turns a raw delivery into a trusted PaymentEvent.
//!
//! Nothing downstream of this module sees an unauthenticated body. Every
//! failure here is a rejection: no ledger record, no state change.

use std::sync::Arc;

use serde_json::value::RawValue;
use tracing::warn;

use crate::domain::billing::{PayPalEvent, PaymentEvent, StripeSignatureVerifier, WebhookError};
use crate::ports::{Clock, PayPalTransmission, PayPalWebhookVerifier};

/// A webhook delivery as received on the wire.
#[derive(Debug, Clone)]
pub enum ProcessWebhookCommand {
    Stripe {
        /// Raw body, byte-for-byte as signed.
        payload: Vec<u8>,
        /// `Stripe-Signature` header.
        signature: Option<String>,
    },
    PayPal {
        payload: Vec<u8>,
        /// `None` when any of the five transmission headers is missing.
        transmission: Option<PayPalTransmission>,
    },
}

/// How PayPal deliveries are authenticated.
#[derive(Clone)]
pub enum PayPalVerification {
    /// Server-to-server verification call.
    Remote(Arc<dyn PayPalWebhookVerifier>),
    /// Accept without verification. Only constructed for the test environment.
    Bypass,
}

pub struct WebhookAuthenticator {
    stripe: StripeSignatureVerifier,
    paypal: PayPalVerification,
    clock: Arc<dyn Clock>,
}

impl WebhookAuthenticator {
    pub fn new(
        stripe: StripeSignatureVerifier,
        paypal: PayPalVerification,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            stripe,
            paypal,
            clock,
        }
    }

    /// Verifies the delivery and wraps it as a [`PaymentEvent`].
    ///
    /// # Errors
    ///
    /// Only rejection variants of [`WebhookError`].
    pub async fn authenticate(
        &self,
        cmd: &ProcessWebhookCommand,
    ) -> Result<PaymentEvent, WebhookError> {
        match cmd {
            ProcessWebhookCommand::Stripe { payload, signature } => {
                self.authenticate_stripe(payload, signature.as_deref())
            }
            ProcessWebhookCommand::PayPal {
                payload,
                transmission,
            } => self.authenticate_paypal(payload, transmission.as_ref()).await,
        }
    }

    fn authenticate_stripe(
        &self,
        payload: &[u8],
        signature: Option<&str>,
    ) -> Result<PaymentEvent, WebhookError> {
        let signature = signature.ok_or_else(|| {
            WebhookError::InvalidSignature("missing Stripe-Signature header".to_string())
        })?;

        let received_at = self.clock.now();
        let event = self
            .stripe
            .verify_and_parse_at(payload, signature, received_at.as_unix_secs())?;

        event
            .into_payment_event(received_at)
            .map_err(|e| WebhookError::ParseError(e.to_string()))
    }

    async fn authenticate_paypal(
        &self,
        payload: &[u8],
        transmission: Option<&PayPalTransmission>,
    ) -> Result<PaymentEvent, WebhookError> {
        let body: &RawValue =
            serde_json::from_slice(payload).map_err(|e| WebhookError::ParseError(e.to_string()))?;

        match &self.paypal {
            PayPalVerification::Remote(verifier) => {
                let transmission = transmission.ok_or_else(|| {
                    WebhookError::InvalidSignature("missing PayPal transmission headers".to_string())
                })?;

                match verifier.verify(transmission, body).await {
                    Ok(true) => {}
                    Ok(false) => {
                        return Err(WebhookError::InvalidSignature(
                            "verification_status is not SUCCESS".to_string(),
                        ))
                    }
                    Err(e) => {
                        warn!(
                            transmission_id = %transmission.transmission_id,
                            error = %e,
                            "PayPal signature verification unavailable"
                        );
                        return Err(WebhookError::InvalidSignature(format!(
                            "verification failed: {}",
                            e.code
                        )));
                    }
                }
            }
            PayPalVerification::Bypass => {
                warn!("PayPal signature verification bypassed (test environment)");
            }
        }

        let event: PayPalEvent =
            serde_json::from_str(body.get()).map_err(|e| WebhookError::ParseError(e.to_string()))?;

        event
            .into_payment_event(payload, self.clock.now())
            .map_err(|e| WebhookError::ParseError(e.to_string()))
    }
}
