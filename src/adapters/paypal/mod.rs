//! PayPal adapter.
//!
//! Implements the `PayPalWebhookVerifier` port:
//! - `PayPalTokenSource` - OAuth client-credentials token, cached until near expiry
//! - `PayPalSignatureVerifier` - Remote webhook signature verification with retries
//!
//! # Security
//!
//! - Client secret and access tokens are held as `secrecy::SecretString`
//! - Every call uses the shared client's bounded timeout

mod token_cache;
mod webhook_verifier;

pub use token_cache::PayPalTokenSource;
pub use webhook_verifier::{PayPalSignatureVerifier, PayPalVerifierConfig};
