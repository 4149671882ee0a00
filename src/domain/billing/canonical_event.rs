//! Provider-agnostic billing events.
//!
//! The normalizer turns every authenticated provider payload into exactly one
//! of these variants (or an ignore reason). Nothing downstream of the
//! normalizer reads raw provider JSON.

use serde::{Deserialize, Serialize};

use super::money::Money;
use crate::domain::foundation::{Timestamp, UserId};

/// What the failed charge was for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentKind {
    Subscription,
    Insurance,
    OneTime,
}

impl PaymentKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentKind::Subscription => "subscription",
            PaymentKind::Insurance => "insurance",
            PaymentKind::OneTime => "one_time",
        }
    }
}

/// Details of a declined, refunded, or otherwise failed charge.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentFailure {
    pub payment_id: String,
    pub kind: PaymentKind,
    pub amount: Option<Money>,
    pub reason: String,
    pub error_code: Option<String>,
    pub error_message: Option<String>,
    pub attempt_count: Option<u32>,
}

impl PaymentFailure {
    /// Failure record for a declined subscription invoice.
    pub fn subscription_invoice(
        invoice_id: impl Into<String>,
        amount: Option<Money>,
        attempt_count: Option<u32>,
        error_message: Option<String>,
    ) -> Self {
        Self {
            payment_id: invoice_id.into(),
            kind: PaymentKind::Subscription,
            amount,
            reason: "subscription_renewal_failed".to_string(),
            error_code: None,
            error_message,
            attempt_count,
        }
    }
}

/// Closed set of billing occurrences the state engine understands.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum CanonicalEvent {
    SubscriptionActivated {
        user_id: UserId,
        external_subscription_id: String,
        plan: Option<Money>,
        period_start: Option<Timestamp>,
        period_end: Option<Timestamp>,
        cancel_at_period_end: bool,
    },
    SubscriptionCanceled {
        user_id: UserId,
        external_subscription_id: String,
    },
    SubscriptionPastDue {
        user_id: UserId,
        external_subscription_id: String,
        failure: Option<PaymentFailure>,
    },
    InsurancePurchased {
        user_id: UserId,
        payment_id: String,
        amount: Money,
    },
    InsuranceVoided {
        user_id: UserId,
        payment_id: String,
    },
    PaymentFailed {
        user_id: UserId,
        failure: PaymentFailure,
    },
}

impl CanonicalEvent {
    /// The user whose billing state this event targets.
    pub fn user_id(&self) -> &UserId {
        match self {
            CanonicalEvent::SubscriptionActivated { user_id, .. }
            | CanonicalEvent::SubscriptionCanceled { user_id, .. }
            | CanonicalEvent::SubscriptionPastDue { user_id, .. }
            | CanonicalEvent::InsurancePurchased { user_id, .. }
            | CanonicalEvent::InsuranceVoided { user_id, .. }
            | CanonicalEvent::PaymentFailed { user_id, .. } => user_id,
        }
    }

    /// Short name used in logs.
    pub fn kind(&self) -> &'static str {
        match self {
            CanonicalEvent::SubscriptionActivated { .. } => "subscription_activated",
            CanonicalEvent::SubscriptionCanceled { .. } => "subscription_canceled",
            CanonicalEvent::SubscriptionPastDue { .. } => "subscription_past_due",
            CanonicalEvent::InsurancePurchased { .. } => "insurance_purchased",
            CanonicalEvent::InsuranceVoided { .. } => "insurance_voided",
            CanonicalEvent::PaymentFailed { .. } => "payment_failed",
        }
    }

    /// The payment failure this event reports, if any.
    pub fn failure(&self) -> Option<&PaymentFailure> {
        match self {
            CanonicalEvent::SubscriptionPastDue { failure, .. } => failure.as_ref(),
            CanonicalEvent::PaymentFailed { failure, .. } => Some(failure),
            _ => None,
        }
    }
}

/// Result of normalizing an authenticated provider event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Normalized {
    Canonical(CanonicalEvent),
    /// Acknowledged without any mutation.
    Ignored(String),
}
