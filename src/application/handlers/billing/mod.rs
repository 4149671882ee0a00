//! Billing webhook handlers.
//!
//! - `WebhookAuthenticator` - Signature verification per provider
//! - `EventNormalizer` - Provider payloads to canonical events
//! - `StateTransitionEngine` - Atomic per-user state updates plus journal
//! - `ClaimsSynchronizer` - Custom claims projection and reconciliation
//! - `ProcessWebhookHandler` - The full delivery pipeline

mod apply_transition;
mod authenticate_webhook;
mod normalize_event;
mod process_webhook;
mod sync_claims;

pub use apply_transition::{StateTransitionEngine, Transition};
pub use authenticate_webhook::{PayPalVerification, ProcessWebhookCommand, WebhookAuthenticator};
pub use normalize_event::{normalize_paypal, EventNormalizer, INSURANCE_MARKER};
pub use process_webhook::{ProcessWebhookHandler, WebhookOutcome};
pub use sync_claims::{ClaimsSync, ClaimsSynchronizer};
