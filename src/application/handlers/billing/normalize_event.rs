//! EventNormalizer - Maps authenticated provider payloads to canonical events.
//!
//! This is the only place that reads provider-specific JSON. Anything it
//! cannot map (unknown type, missing user id, non-insurance one-off payment)
//! becomes `Normalized::Ignored` and is acknowledged without mutation.

use std::sync::Arc;

use serde::de::DeserializeOwned;
use tracing::warn;

use crate::domain::billing::{
    CanonicalEvent, Money, Normalized, PaymentEvent, PaymentFailure, PaymentKind,
    PayPalAuthorization, PayPalEvent, PayPalEventType, PayPalSale, PayPalSubscription, Provider,
    StripeEvent, StripeEventType, StripeInvoice, StripePaymentIntent, StripeSubscription,
    WebhookError,
};
use crate::domain::foundation::{Timestamp, UserId, ValidationError};
use crate::ports::SubscriptionLookup;

/// Free-text marker identifying an anti-ghosting insurance payment.
pub const INSURANCE_MARKER: &str = "insurance";

/// Subscription price (EUR cents) assumed when PayPal omits the last payment.
const DEFAULT_SUBSCRIPTION_CENTS: u32 = 2999;

/// Insurance price (EUR cents) assumed when the provider omits the amount.
const DEFAULT_INSURANCE_CENTS: u32 = 12000;

/// Normalizes Stripe and PayPal events.
pub struct EventNormalizer {
    subscription_lookup: Arc<dyn SubscriptionLookup>,
}

impl EventNormalizer {
    pub fn new(subscription_lookup: Arc<dyn SubscriptionLookup>) -> Self {
        Self {
            subscription_lookup,
        }
    }

    /// Maps an authenticated event to a canonical event or an ignore reason.
    ///
    /// Fails only when a lookup needed to resolve the user fails, which is
    /// retryable.
    pub async fn normalize(&self, event: &PaymentEvent) -> Result<Normalized, WebhookError> {
        match event.provider {
            Provider::Stripe => self.normalize_stripe(event).await,
            Provider::Paypal => Ok(normalize_paypal(event)),
        }
    }

    async fn normalize_stripe(&self, event: &PaymentEvent) -> Result<Normalized, WebhookError> {
        let envelope: StripeEvent = match serde_json::from_value(event.payload.clone()) {
            Ok(envelope) => envelope,
            Err(e) => return Ok(ignored(format!("malformed stripe envelope: {}", e))),
        };

        match envelope.parsed_type() {
            StripeEventType::CustomerSubscriptionCreated
            | StripeEventType::CustomerSubscriptionUpdated => {
                Ok(object::<StripeSubscription>(&envelope.data.object)
                    .map_or_else(Normalized::Ignored, |sub| stripe_subscription_changed(&sub)))
            }
            StripeEventType::CustomerSubscriptionDeleted => {
                Ok(object::<StripeSubscription>(&envelope.data.object)
                    .map_or_else(Normalized::Ignored, |sub| stripe_subscription_deleted(&sub)))
            }
            StripeEventType::PaymentIntentSucceeded => {
                Ok(object::<StripePaymentIntent>(&envelope.data.object)
                    .map_or_else(Normalized::Ignored, |intent| stripe_intent_succeeded(&intent)))
            }
            StripeEventType::PaymentIntentPaymentFailed => {
                Ok(object::<StripePaymentIntent>(&envelope.data.object)
                    .map_or_else(Normalized::Ignored, |intent| stripe_intent_failed(&intent)))
            }
            StripeEventType::InvoicePaymentFailed => {
                match object::<StripeInvoice>(&envelope.data.object) {
                    Ok(invoice) => self.stripe_invoice_failed(&invoice).await,
                    Err(reason) => Ok(Normalized::Ignored(reason)),
                }
            }
            StripeEventType::InvoicePaymentSucceeded => Ok(ignored(
                "invoice.payment_succeeded is carried by the subscription update",
            )),
            StripeEventType::Unknown => Ok(ignored(format!(
                "unhandled stripe event type {}",
                envelope.event_type
            ))),
        }
    }

    async fn stripe_invoice_failed(
        &self,
        invoice: &StripeInvoice,
    ) -> Result<Normalized, WebhookError> {
        let Some(subscription_id) = invoice.subscription.as_deref() else {
            return Ok(ignored(format!("invoice {} has no subscription", invoice.id)));
        };

        let subscription = self
            .subscription_lookup
            .get_subscription(subscription_id)
            .await?;

        let Some(subscription) = subscription else {
            return Ok(ignored(format!("subscription {} not found", subscription_id)));
        };
        let Some(user_id) = resolve_user(subscription.user_id()) else {
            return Ok(ignored(format!(
                "subscription {} has no metadata.userId",
                subscription_id
            )));
        };

        let amount = match (invoice.amount_due, invoice.currency.as_deref()) {
            (Some(due), Some(currency)) => {
                provider_amount(Money::from_minor_units(due, currency), &invoice.id)
            }
            _ => None,
        };
        let error_message = invoice
            .last_finalization_error
            .as_ref()
            .and_then(|e| e.message.clone());

        Ok(Normalized::Canonical(CanonicalEvent::SubscriptionPastDue {
            user_id,
            external_subscription_id: subscription_id.to_string(),
            failure: Some(PaymentFailure::subscription_invoice(
                invoice.id.clone(),
                amount,
                invoice.attempt_count,
                error_message,
            )),
        }))
    }
}

fn ignored(reason: impl Into<String>) -> Normalized {
    Normalized::Ignored(reason.into())
}

fn object<T: DeserializeOwned>(value: &serde_json::Value) -> Result<T, String> {
    serde_json::from_value(value.clone()).map_err(|e| format!("malformed event object: {}", e))
}

fn resolve_user(raw: Option<&str>) -> Option<UserId> {
    raw.and_then(|id| UserId::new(id).ok())
}

/// Keeps a provider-supplied amount only if it normalizes; a discarded
/// amount is logged since callers may substitute a default.
fn provider_amount(parsed: Result<Money, ValidationError>, object_id: &str) -> Option<Money> {
    match parsed {
        Ok(money) => Some(money),
        Err(e) => {
            warn!(
                object_id,
                error = %e,
                "Discarding provider amount that does not normalize"
            );
            None
        }
    }
}

// ══════════════════════════════════════════════════════════════
// Stripe mappings
// ══════════════════════════════════════════════════════════════

fn stripe_subscription_changed(sub: &StripeSubscription) -> Normalized {
    let Some(user_id) = resolve_user(sub.user_id()) else {
        return ignored(format!("subscription {} has no metadata.userId", sub.id));
    };

    match sub.status.as_str() {
        "active" => {
            let plan = sub
                .first_price()
                .and_then(|(minor, currency)| {
                    provider_amount(Money::from_minor_units(minor, currency), &sub.id)
                });
            Normalized::Canonical(CanonicalEvent::SubscriptionActivated {
                user_id,
                external_subscription_id: sub.id.clone(),
                plan,
                period_start: sub.current_period_start.and_then(Timestamp::from_unix_secs),
                period_end: sub.current_period_end.and_then(Timestamp::from_unix_secs),
                cancel_at_period_end: sub.cancel_at_period_end,
            })
        }
        "canceled" | "incomplete_expired" => {
            Normalized::Canonical(CanonicalEvent::SubscriptionCanceled {
                user_id,
                external_subscription_id: sub.id.clone(),
            })
        }
        "past_due" | "unpaid" => Normalized::Canonical(CanonicalEvent::SubscriptionPastDue {
            user_id,
            external_subscription_id: sub.id.clone(),
            failure: None,
        }),
        other => ignored(format!("subscription status {} carries no transition", other)),
    }
}

fn stripe_subscription_deleted(sub: &StripeSubscription) -> Normalized {
    match resolve_user(sub.user_id()) {
        Some(user_id) => Normalized::Canonical(CanonicalEvent::SubscriptionCanceled {
            user_id,
            external_subscription_id: sub.id.clone(),
        }),
        None => ignored(format!("subscription {} has no metadata.userId", sub.id)),
    }
}

fn stripe_intent_amount(intent: &StripePaymentIntent) -> Option<Money> {
    match (intent.amount, intent.currency.as_deref()) {
        (Some(amount), Some(currency)) => {
            provider_amount(Money::from_minor_units(amount, currency), &intent.id)
        }
        _ => None,
    }
}

fn stripe_intent_succeeded(intent: &StripePaymentIntent) -> Normalized {
    if intent.payment_type() != Some(INSURANCE_MARKER) {
        return ignored(format!("payment intent {} is not an insurance payment", intent.id));
    }
    let Some(user_id) = resolve_user(intent.user_id()) else {
        return ignored(format!("payment intent {} has no metadata.userId", intent.id));
    };

    Normalized::Canonical(CanonicalEvent::InsurancePurchased {
        user_id,
        payment_id: intent.id.clone(),
        amount: stripe_intent_amount(intent)
            .unwrap_or_else(|| Money::euros_from_cents(DEFAULT_INSURANCE_CENTS)),
    })
}

fn stripe_intent_failed(intent: &StripePaymentIntent) -> Normalized {
    let Some(user_id) = resolve_user(intent.user_id()) else {
        return ignored(format!("payment intent {} has no metadata.userId", intent.id));
    };
    let kind = if intent.payment_type() == Some(INSURANCE_MARKER) {
        PaymentKind::Insurance
    } else {
        PaymentKind::OneTime
    };
    let error = intent.last_payment_error.as_ref();

    Normalized::Canonical(CanonicalEvent::PaymentFailed {
        user_id,
        failure: PaymentFailure {
            payment_id: intent.id.clone(),
            kind,
            amount: stripe_intent_amount(intent),
            reason: "payment_intent_failed".to_string(),
            error_code: error.and_then(|e| e.decline_code.clone().or_else(|| e.code.clone())),
            error_message: error.and_then(|e| e.message.clone()),
            attempt_count: None,
        },
    })
}

// ══════════════════════════════════════════════════════════════
// PayPal mappings
// ══════════════════════════════════════════════════════════════

/// Maps a PayPal event. Pure: no lookups are ever needed.
pub fn normalize_paypal(event: &PaymentEvent) -> Normalized {
    let envelope: PayPalEvent = match serde_json::from_value(event.payload.clone()) {
        Ok(envelope) => envelope,
        Err(e) => return ignored(format!("malformed paypal envelope: {}", e)),
    };

    let result = match envelope.parsed_type() {
        PayPalEventType::SubscriptionActivated | PayPalEventType::SubscriptionUpdated => {
            object::<PayPalSubscription>(&envelope.resource)
                .map(|sub| paypal_subscription_active(&envelope, &sub))
        }
        PayPalEventType::SubscriptionCancelled | PayPalEventType::SubscriptionSuspended => {
            object::<PayPalSubscription>(&envelope.resource)
                .map(|sub| paypal_subscription_ended(&sub))
        }
        PayPalEventType::SaleCompleted => {
            object::<PayPalSale>(&envelope.resource).map(|sale| paypal_sale_completed(&sale))
        }
        PayPalEventType::SaleDenied | PayPalEventType::SaleRefunded => {
            object::<PayPalSale>(&envelope.resource)
                .map(|sale| paypal_sale_failed(envelope.parsed_type(), &sale))
        }
        PayPalEventType::AuthorizationVoided => {
            object::<PayPalAuthorization>(&envelope.resource).map(|auth| paypal_voided(&auth))
        }
        PayPalEventType::Unknown => Ok(ignored(format!(
            "unhandled paypal event type {}",
            envelope.event_type
        ))),
    };

    result.unwrap_or_else(Normalized::Ignored)
}

fn paypal_subscription_active(envelope: &PayPalEvent, sub: &PayPalSubscription) -> Normalized {
    let Some(user_id) = resolve_user(sub.user_id()) else {
        return ignored(format!("subscription {} has no custom_id", sub.id));
    };
    if let Some(status) = sub.status.as_deref() {
        if !status.eq_ignore_ascii_case("ACTIVE") {
            return ignored(format!("subscription {} is {}", sub.id, status));
        }
    }

    let plan = sub
        .last_payment_amount()
        .and_then(|m| provider_amount(Money::parse_major(&m.value, &m.currency_code), &sub.id))
        .unwrap_or_else(|| Money::euros_from_cents(DEFAULT_SUBSCRIPTION_CENTS));
    let period_start = sub
        .start_time
        .as_deref()
        .or(envelope.create_time.as_deref())
        .and_then(Timestamp::parse_rfc3339);

    Normalized::Canonical(CanonicalEvent::SubscriptionActivated {
        user_id,
        external_subscription_id: sub.id.clone(),
        plan: Some(plan),
        period_start,
        period_end: sub.next_billing_time().and_then(Timestamp::parse_rfc3339),
        cancel_at_period_end: false,
    })
}

fn paypal_subscription_ended(sub: &PayPalSubscription) -> Normalized {
    match resolve_user(sub.user_id()) {
        Some(user_id) => Normalized::Canonical(CanonicalEvent::SubscriptionCanceled {
            user_id,
            external_subscription_id: sub.id.clone(),
        }),
        None => ignored(format!("subscription {} has no custom_id", sub.id)),
    }
}

fn paypal_sale_amount(sale: &PayPalSale) -> Option<Money> {
    sale.amount
        .as_ref()
        .and_then(|a| provider_amount(Money::parse_major(&a.total, &a.currency), &sale.id))
}

fn paypal_sale_completed(sale: &PayPalSale) -> Normalized {
    if sale.description.as_deref() != Some(INSURANCE_MARKER) {
        return ignored(format!("sale {} is not an insurance payment", sale.id));
    }
    let Some(user_id) = resolve_user(sale.user_id()) else {
        return ignored(format!("sale {} has no custom", sale.id));
    };

    Normalized::Canonical(CanonicalEvent::InsurancePurchased {
        user_id,
        payment_id: sale.id.clone(),
        amount: paypal_sale_amount(sale)
            .unwrap_or_else(|| Money::euros_from_cents(DEFAULT_INSURANCE_CENTS)),
    })
}

fn paypal_sale_failed(event_type: PayPalEventType, sale: &PayPalSale) -> Normalized {
    let Some(user_id) = resolve_user(sale.user_id()) else {
        return ignored(format!("sale {} has no custom", sale.id));
    };
    let kind = if sale.description.as_deref() == Some(INSURANCE_MARKER) {
        PaymentKind::Insurance
    } else {
        PaymentKind::OneTime
    };
    let reason = match event_type {
        PayPalEventType::SaleRefunded => "sale_refunded",
        _ => "sale_denied",
    };

    Normalized::Canonical(CanonicalEvent::PaymentFailed {
        user_id,
        failure: PaymentFailure {
            payment_id: sale.id.clone(),
            kind,
            amount: paypal_sale_amount(sale),
            reason: reason.to_string(),
            error_code: sale.reason_code.clone(),
            error_message: sale.state.clone(),
            attempt_count: None,
        },
    })
}

fn paypal_voided(auth: &PayPalAuthorization) -> Normalized {
    match resolve_user(auth.user_id()) {
        Some(user_id) => Normalized::Canonical(CanonicalEvent::InsuranceVoided {
            user_id,
            payment_id: auth.id.clone(),
        }),
        None => ignored(format!("authorization {} has no custom", auth.id)),
    }
}
