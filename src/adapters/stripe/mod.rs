//! Stripe adapter.
//!
//! Implements the `SubscriptionLookup` port for resolving the user behind
//! an `invoice.payment_failed` event.
//!
//! # Security
//!
//! - The API key is held as `secrecy::SecretString` and sent as basic auth
//! - Webhook signatures are verified in the domain, not here
//!
//! # Configuration
//!
//! - `TUCITASEGURA_BILLING__PAYMENT__STRIPE_API_KEY`: Stripe secret API key

mod stripe_adapter;

pub use stripe_adapter::{StripeConfig, StripeSubscriptionClient};
