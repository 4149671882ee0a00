//! HTTP adapter for provider webhooks.
//!
//! - `POST /webhooks/stripe` - Stripe deliveries
//! - `POST /webhooks/paypal` - PayPal deliveries
//! - `GET /health` - Liveness

pub mod dto;
mod handlers;
mod routes;

pub use handlers::{
    handle_paypal_webhook, handle_stripe_webhook, health, WebhookApiError, WebhookAppState,
    PAYPAL_AUTH_ALGO_HEADER, PAYPAL_CERT_URL_HEADER, PAYPAL_TRANSMISSION_ID_HEADER,
    PAYPAL_TRANSMISSION_SIG_HEADER, PAYPAL_TRANSMISSION_TIME_HEADER, STRIPE_SIGNATURE_HEADER,
};
pub use routes::{billing_router, webhook_routes};
