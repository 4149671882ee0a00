//! Ports - Interfaces for external dependencies.
//!
//! Following hexagonal architecture, ports define the contracts between
//! the domain and the outside world. Adapters implement these ports.
//!
//! ## Persistence Ports
//!
//! - `BillingStateRepository` - Per-user atomic billing state transitions
//! - `IdempotencyLedger` - Create-if-absent webhook delivery tracking
//! - `BillingJournal` - Subscription, insurance, failure, and notification records
//!
//! ## Provider Ports
//!
//! - `SubscriptionLookup` - Stripe subscription fetch for invoice events
//! - `PayPalWebhookVerifier` - PayPal remote signature verification
//! - `IdentityProvider` - Custom claims on the identity token

mod billing_journal;
mod billing_state_repository;
mod clock;
mod identity_provider;
mod idempotency_ledger;
mod payment_error;
mod paypal_verifier;
mod subscription_lookup;

pub use billing_journal::BillingJournal;
pub use billing_state_repository::{ApplyOutcome, BillingStateRepository};
pub use clock::{Clock, SystemClock};
pub use identity_provider::IdentityProvider;
pub use idempotency_ledger::{
    IdempotencyLedger, LedgerOutcome, Reservation, DEFAULT_RESERVATION_LEASE,
};
pub use payment_error::{PaymentError, PaymentErrorCode};
pub use paypal_verifier::{PayPalTransmission, PayPalWebhookVerifier};
pub use subscription_lookup::SubscriptionLookup;
