//! Axum router configuration for the webhook service.

use std::time::Duration;

use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};
use axum::Router;
use tower::ServiceBuilder;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

use super::handlers::{handle_paypal_webhook, handle_stripe_webhook, health, WebhookAppState};

/// Provider webhook bodies are small JSON envelopes.
const MAX_BODY_BYTES: usize = 1024 * 1024;

/// Create the provider webhook router.
///
/// # Routes
/// - `POST /stripe` - Stripe deliveries, verified by `Stripe-Signature`
/// - `POST /paypal` - PayPal deliveries, verified remotely
pub fn webhook_routes() -> Router<WebhookAppState> {
    Router::new()
        .route("/stripe", post(handle_stripe_webhook))
        .route("/paypal", post(handle_paypal_webhook))
}

/// Create the complete service router with tracing and request limits.
///
/// # Routes
/// - `GET /health`
/// - `POST /webhooks/stripe`
/// - `POST /webhooks/paypal`
pub fn billing_router(state: WebhookAppState, request_timeout: Duration) -> Router {
    Router::new()
        .route("/health", get(health))
        .nest("/webhooks", webhook_routes())
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(TimeoutLayer::new(request_timeout))
                .layer(DefaultBodyLimit::max(MAX_BODY_BYTES)),
        )
        .with_state(state)
}
