//! Billing domain - payment events, per-user billing state, and claims.
//!
//! Provider payloads enter as [`PaymentEvent`]s, are normalized into a
//! closed [`CanonicalEvent`] set, and are applied to [`UserBillingState`].
//! [`AuthorizationClaims`] are a pure projection of the resulting state.

mod canonical_event;
mod claims;
mod journal;
mod money;
mod paypal_event;
mod provider;
mod state;
mod status;
mod stripe_event;
mod stripe_signature;
mod webhook_errors;

pub use canonical_event::{CanonicalEvent, Normalized, PaymentFailure, PaymentKind};
pub use claims::{AuthorizationClaims, ALLOWED_GENDERS, DEFAULT_ROLE, OWNED_CLAIM_KEYS};
pub use journal::{
    FailedPaymentRecord, InsuranceRecord, JournalEntry, NotificationLevel, SubscriptionRecord,
    UserNotification,
};
pub use money::{Currency, Money, RawAmount};
pub use paypal_event::{
    PayPalAuthorization, PayPalBillingInfo, PayPalEvent, PayPalEventType, PayPalLastPayment,
    PayPalMoney, PayPalSale, PayPalSaleAmount, PayPalSubscription,
};
pub use provider::{IdempotencyKey, PaymentEvent, Provider};
pub use state::{BillingUser, UserBillingState};
pub use status::SubscriptionStatus;
pub use stripe_event::{
    StripeErrorDetail, StripeEvent, StripeEventData, StripeEventType, StripeInvoice, StripeList,
    StripePaymentIntent, StripePrice, StripeSubscription, StripeSubscriptionItem,
};
#[cfg(test)]
pub use stripe_event::StripeEventBuilder;
pub use stripe_signature::{
    sign_payload, SignatureHeader, StripeSignatureVerifier, DEFAULT_TOLERANCE_SECS,
};
pub use webhook_errors::WebhookError;
