//! PayPal webhook event types.
//!
//! PayPal resources differ per event family: subscriptions carry the user
//! in `custom_id`, sales and authorizations in `custom`.

use serde::{Deserialize, Serialize};

use super::provider::{IdempotencyKey, PaymentEvent, Provider};
use crate::domain::foundation::Timestamp;

/// PayPal webhook envelope.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PayPalEvent {
    /// Event id (WH-xxx). Older test payloads may omit it.
    #[serde(default)]
    pub id: Option<String>,

    pub event_type: String,

    #[serde(default)]
    pub create_time: Option<String>,

    #[serde(default)]
    pub resource_type: Option<String>,

    #[serde(default)]
    pub resource: serde_json::Value,
}

impl PayPalEvent {
    pub fn parsed_type(&self) -> PayPalEventType {
        PayPalEventType::from_str(&self.event_type)
    }

    /// Ledger key: the event id, or a digest of the raw body when absent.
    pub fn idempotency_key(&self, raw_body: &[u8]) -> IdempotencyKey {
        match self.id.as_deref().filter(|id| !id.trim().is_empty()) {
            Some(id) => IdempotencyKey::new(Provider::Paypal, id),
            None => IdempotencyKey::from_body_digest(Provider::Paypal, raw_body),
        }
    }

    /// Wraps the authenticated envelope for the processing pipeline.
    pub fn into_payment_event(
        self,
        raw_body: &[u8],
        received_at: Timestamp,
    ) -> Result<PaymentEvent, serde_json::Error> {
        let key = self.idempotency_key(raw_body);
        Ok(PaymentEvent {
            provider: Provider::Paypal,
            external_event_id: key.external_event_id,
            event_type: self.event_type.clone(),
            payload: serde_json::to_value(&self)?,
            received_at,
        })
    }
}

/// Known PayPal event types that billing reacts to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PayPalEventType {
    SubscriptionActivated,
    SubscriptionUpdated,
    SubscriptionCancelled,
    SubscriptionSuspended,
    SaleCompleted,
    SaleDenied,
    SaleRefunded,
    AuthorizationVoided,
    Unknown,
}

impl PayPalEventType {
    pub fn from_str(s: &str) -> Self {
        match s {
            "BILLING.SUBSCRIPTION.ACTIVATED" => Self::SubscriptionActivated,
            "BILLING.SUBSCRIPTION.UPDATED" => Self::SubscriptionUpdated,
            "BILLING.SUBSCRIPTION.CANCELLED" => Self::SubscriptionCancelled,
            "BILLING.SUBSCRIPTION.SUSPENDED" => Self::SubscriptionSuspended,
            "PAYMENT.SALE.COMPLETED" => Self::SaleCompleted,
            "PAYMENT.SALE.DENIED" => Self::SaleDenied,
            "PAYMENT.SALE.REFUNDED" => Self::SaleRefunded,
            "PAYMENT.AUTHORIZATION.VOIDED" => Self::AuthorizationVoided,
            _ => Self::Unknown,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::SubscriptionActivated => "BILLING.SUBSCRIPTION.ACTIVATED",
            Self::SubscriptionUpdated => "BILLING.SUBSCRIPTION.UPDATED",
            Self::SubscriptionCancelled => "BILLING.SUBSCRIPTION.CANCELLED",
            Self::SubscriptionSuspended => "BILLING.SUBSCRIPTION.SUSPENDED",
            Self::SaleCompleted => "PAYMENT.SALE.COMPLETED",
            Self::SaleDenied => "PAYMENT.SALE.DENIED",
            Self::SaleRefunded => "PAYMENT.SALE.REFUNDED",
            Self::AuthorizationVoided => "PAYMENT.AUTHORIZATION.VOIDED",
            Self::Unknown => "UNKNOWN",
        }
    }
}

/// `subscription` resource (BILLING.SUBSCRIPTION.*).
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PayPalSubscription {
    pub id: String,
    #[serde(default)]
    pub custom_id: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub start_time: Option<String>,
    #[serde(default)]
    pub billing_info: Option<PayPalBillingInfo>,
}

impl PayPalSubscription {
    pub fn user_id(&self) -> Option<&str> {
        non_blank(self.custom_id.as_deref())
    }

    /// Amount of the last captured payment.
    pub fn last_payment_amount(&self) -> Option<&PayPalMoney> {
        self.billing_info
            .as_ref()?
            .last_payment
            .as_ref()?
            .amount
            .as_ref()
    }

    pub fn next_billing_time(&self) -> Option<&str> {
        self.billing_info.as_ref()?.next_billing_time.as_deref()
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PayPalBillingInfo {
    #[serde(default)]
    pub last_payment: Option<PayPalLastPayment>,
    #[serde(default)]
    pub next_billing_time: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PayPalLastPayment {
    #[serde(default)]
    pub amount: Option<PayPalMoney>,
    #[serde(default)]
    pub time: Option<String>,
}

/// v2-style money (`{"value": "29.99", "currency_code": "EUR"}`).
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PayPalMoney {
    pub value: String,
    pub currency_code: String,
}

/// `sale` resource (PAYMENT.SALE.*).
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PayPalSale {
    pub id: String,
    #[serde(default)]
    pub custom: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub amount: Option<PayPalSaleAmount>,
    #[serde(default)]
    pub state: Option<String>,
    #[serde(default)]
    pub reason_code: Option<String>,
}

impl PayPalSale {
    pub fn user_id(&self) -> Option<&str> {
        non_blank(self.custom.as_deref())
    }
}

/// v1-style amount (`{"total": "120.00", "currency": "EUR"}`).
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PayPalSaleAmount {
    pub total: String,
    pub currency: String,
}

/// `authorization` resource (PAYMENT.AUTHORIZATION.*).
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PayPalAuthorization {
    pub id: String,
    #[serde(default)]
    pub custom: Option<String>,
    #[serde(default)]
    pub custom_id: Option<String>,
}

impl PayPalAuthorization {
    /// `custom`, falling back to the v2 `custom_id`.
    pub fn user_id(&self) -> Option<&str> {
        non_blank(self.custom.as_deref()).or_else(|| non_blank(self.custom_id.as_deref()))
    }
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.trim().is_empty())
}
