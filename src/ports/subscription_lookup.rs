//! SubscriptionLookup port - Server-to-server subscription fetch.
//!
//! Stripe invoices do not carry the user id; the normalizer resolves it
//! through the subscription's metadata.

use async_trait::async_trait;

use super::payment_error::PaymentError;
use crate::domain::billing::StripeSubscription;

#[async_trait]
pub trait SubscriptionLookup: Send + Sync {
    /// Fetches a subscription by provider id.
    ///
    /// Returns `None` if the provider does not know the subscription.
    async fn get_subscription(
        &self,
        subscription_id: &str,
    ) -> Result<Option<StripeSubscription>, PaymentError>;
}
