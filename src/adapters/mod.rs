//! Adapters - Implementations of port interfaces.
//!
//! Adapters connect the domain to external systems:
//! - `http` - Axum webhook ingress
//! - `postgres` - SQLx persistence for billing state, ledger, and journal
//! - `memory` - In-process implementations for tests and local runs
//! - `stripe` - Stripe subscription lookup
//! - `paypal` - PayPal OAuth token cache and signature verification
//! - `firebase` - Identity Toolkit custom claims

pub mod firebase;
pub mod http;
pub mod memory;
pub mod paypal;
pub mod postgres;
pub mod stripe;

pub use firebase::{FirebaseIdentityProvider, ServiceAccountTokenSource};
pub use memory::{
    InMemoryBillingJournal, InMemoryBillingStore, InMemoryIdempotencyLedger,
    InMemoryIdentityProvider,
};
pub use paypal::{PayPalSignatureVerifier, PayPalTokenSource, PayPalVerifierConfig};
pub use postgres::{PostgresBillingJournal, PostgresBillingStateRepository, PostgresIdempotencyLedger};
pub use stripe::{StripeConfig, StripeSubscriptionClient};
