//! HTTP handlers for provider webhooks.
//!
//! Bodies are taken as raw bytes; nothing is parsed before the signature
//! has been checked.

use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::{Json, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::IntoResponse;

use crate::application::handlers::billing::{ProcessWebhookCommand, ProcessWebhookHandler};
use crate::domain::billing::WebhookError;
use crate::ports::PayPalTransmission;

use super::dto::{ErrorResponse, HealthResponse, ReceivedResponse};

pub const STRIPE_SIGNATURE_HEADER: &str = "stripe-signature";
pub const PAYPAL_TRANSMISSION_ID_HEADER: &str = "paypal-transmission-id";
pub const PAYPAL_TRANSMISSION_TIME_HEADER: &str = "paypal-transmission-time";
pub const PAYPAL_TRANSMISSION_SIG_HEADER: &str = "paypal-transmission-sig";
pub const PAYPAL_CERT_URL_HEADER: &str = "paypal-cert-url";
pub const PAYPAL_AUTH_ALGO_HEADER: &str = "paypal-auth-algo";

// ════════════════════════════════════════════════════════════════════════════════
// Application State
// ════════════════════════════════════════════════════════════════════════════════

/// Shared state for the webhook routes.
#[derive(Clone)]
pub struct WebhookAppState {
    pub processor: Arc<ProcessWebhookHandler>,
}

impl WebhookAppState {
    pub fn new(processor: Arc<ProcessWebhookHandler>) -> Self {
        Self { processor }
    }
}

// ════════════════════════════════════════════════════════════════════════════════
// Handlers
// ════════════════════════════════════════════════════════════════════════════════

/// POST /webhooks/stripe
pub async fn handle_stripe_webhook(
    State(state): State<WebhookAppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<impl IntoResponse, WebhookApiError> {
    let cmd = ProcessWebhookCommand::Stripe {
        payload: body.to_vec(),
        signature: header_value(&headers, STRIPE_SIGNATURE_HEADER),
    };

    state.processor.handle(cmd).await?;

    Ok((StatusCode::OK, Json(ReceivedResponse::ok())))
}

/// POST /webhooks/paypal
pub async fn handle_paypal_webhook(
    State(state): State<WebhookAppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<impl IntoResponse, WebhookApiError> {
    let cmd = ProcessWebhookCommand::PayPal {
        payload: body.to_vec(),
        transmission: paypal_transmission(&headers),
    };

    state.processor.handle(cmd).await?;

    Ok((StatusCode::OK, Json(ReceivedResponse::ok())))
}

/// GET /health
pub async fn health() -> impl IntoResponse {
    Json(HealthResponse {
        status: "ok".to_string(),
    })
}

fn header_value(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
}

/// All five transmission headers, or `None` if any is missing.
fn paypal_transmission(headers: &HeaderMap) -> Option<PayPalTransmission> {
    Some(PayPalTransmission {
        transmission_id: header_value(headers, PAYPAL_TRANSMISSION_ID_HEADER)?,
        transmission_time: header_value(headers, PAYPAL_TRANSMISSION_TIME_HEADER)?,
        transmission_sig: header_value(headers, PAYPAL_TRANSMISSION_SIG_HEADER)?,
        cert_url: header_value(headers, PAYPAL_CERT_URL_HEADER)?,
        auth_algo: header_value(headers, PAYPAL_AUTH_ALGO_HEADER)?,
    })
}

// ════════════════════════════════════════════════════════════════════════════════
// Error Handling
// ════════════════════════════════════════════════════════════════════════════════

/// API error type that converts webhook errors to HTTP responses.
#[derive(Debug)]
pub struct WebhookApiError(WebhookError);

impl From<WebhookError> for WebhookApiError {
    fn from(err: WebhookError) -> Self {
        Self(err)
    }
}

impl IntoResponse for WebhookApiError {
    fn into_response(self) -> axum::response::Response {
        let status = self.0.status_code();
        let code = if self.0.is_rejection() {
            "invalid_signature"
        } else {
            "internal_error"
        };
        (status, Json(ErrorResponse::new(code))).into_response()
    }
}
