//! Billing journal: durable metadata written alongside state transitions.
//!
//! Every entry carries a natural key built from provider ids, so writing
//! the same entry twice converges to one row.

use serde::{Deserialize, Serialize};

use super::canonical_event::{CanonicalEvent, PaymentFailure};
use super::money::Money;
use super::provider::Provider;
use super::status::SubscriptionStatus;
use crate::domain::foundation::{Timestamp, UserId};

const PAYMENT_SETTINGS_URL: &str = "/webapp/cuenta-pagos.html";

/// Subscription record, keyed by `(provider, subscription_id)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubscriptionRecord {
    pub provider: Provider,
    pub subscription_id: String,
    pub user_id: UserId,
    pub status: SubscriptionStatus,
    pub plan: Option<Money>,
    pub current_period_start: Option<Timestamp>,
    pub current_period_end: Option<Timestamp>,
    pub cancel_at_period_end: bool,
    pub recorded_at: Timestamp,
}

/// Insurance record, keyed by `payment_id`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InsuranceRecord {
    pub payment_id: String,
    pub provider: Provider,
    pub user_id: UserId,
    pub amount: Option<Money>,
    pub active: bool,
    pub recorded_at: Timestamp,
}

/// Failed payment record, keyed by `(provider, payment_id)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailedPaymentRecord {
    pub provider: Provider,
    pub user_id: UserId,
    pub subscription_id: Option<String>,
    pub failure: PaymentFailure,
    pub recorded_at: Timestamp,
}

/// Notification severity shown by the client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NotificationLevel {
    Info,
    Warning,
    Error,
    Success,
}

impl NotificationLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationLevel::Info => "info",
            NotificationLevel::Warning => "warning",
            NotificationLevel::Error => "error",
            NotificationLevel::Success => "success",
        }
    }
}

/// In-app notification, keyed by `notification_id`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserNotification {
    pub notification_id: String,
    pub user_id: UserId,
    pub title: String,
    pub message: String,
    pub level: NotificationLevel,
    pub action_url: Option<String>,
    pub action_label: Option<String>,
    pub created_at: Timestamp,
}

/// One journal write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JournalEntry {
    Subscription(SubscriptionRecord),
    Insurance(InsuranceRecord),
    FailedPayment(FailedPaymentRecord),
    Notification(UserNotification),
}

impl JournalEntry {
    /// Journal writes implied by a canonical event.
    pub fn for_event(
        provider: Provider,
        event: &CanonicalEvent,
        recorded_at: Timestamp,
    ) -> Vec<JournalEntry> {
        match event {
            CanonicalEvent::SubscriptionActivated {
                user_id,
                external_subscription_id,
                plan,
                period_start,
                period_end,
                cancel_at_period_end,
            } => vec![JournalEntry::Subscription(SubscriptionRecord {
                provider,
                subscription_id: external_subscription_id.clone(),
                user_id: user_id.clone(),
                status: SubscriptionStatus::Active,
                plan: plan.clone(),
                current_period_start: *period_start,
                current_period_end: *period_end,
                cancel_at_period_end: *cancel_at_period_end,
                recorded_at,
            })],
            CanonicalEvent::SubscriptionCanceled {
                user_id,
                external_subscription_id,
            } => vec![JournalEntry::Subscription(status_only(
                provider,
                user_id,
                external_subscription_id,
                SubscriptionStatus::Canceled,
                recorded_at,
            ))],
            CanonicalEvent::SubscriptionPastDue {
                user_id,
                external_subscription_id,
                failure,
            } => {
                let mut entries = vec![JournalEntry::Subscription(status_only(
                    provider,
                    user_id,
                    external_subscription_id,
                    SubscriptionStatus::PastDue,
                    recorded_at,
                ))];
                if let Some(failure) = failure {
                    entries.push(JournalEntry::FailedPayment(FailedPaymentRecord {
                        provider,
                        user_id: user_id.clone(),
                        subscription_id: Some(external_subscription_id.clone()),
                        failure: failure.clone(),
                        recorded_at,
                    }));
                    entries.push(JournalEntry::Notification(renewal_failed_notice(
                        provider,
                        user_id,
                        failure,
                        recorded_at,
                    )));
                }
                entries
            }
            CanonicalEvent::InsurancePurchased {
                user_id,
                payment_id,
                amount,
            } => vec![JournalEntry::Insurance(InsuranceRecord {
                payment_id: payment_id.clone(),
                provider,
                user_id: user_id.clone(),
                amount: Some(amount.clone()),
                active: true,
                recorded_at,
            })],
            CanonicalEvent::InsuranceVoided {
                user_id,
                payment_id,
            } => vec![JournalEntry::Insurance(InsuranceRecord {
                payment_id: payment_id.clone(),
                provider,
                user_id: user_id.clone(),
                amount: None,
                active: false,
                recorded_at,
            })],
            CanonicalEvent::PaymentFailed { user_id, failure } => vec![
                JournalEntry::FailedPayment(FailedPaymentRecord {
                    provider,
                    user_id: user_id.clone(),
                    subscription_id: None,
                    failure: failure.clone(),
                    recorded_at,
                }),
                JournalEntry::Notification(payment_failed_notice(
                    provider,
                    user_id,
                    failure,
                    recorded_at,
                )),
            ],
        }
    }
}

fn status_only(
    provider: Provider,
    user_id: &UserId,
    subscription_id: &str,
    status: SubscriptionStatus,
    recorded_at: Timestamp,
) -> SubscriptionRecord {
    SubscriptionRecord {
        provider,
        subscription_id: subscription_id.to_string(),
        user_id: user_id.clone(),
        status,
        plan: None,
        current_period_start: None,
        current_period_end: None,
        cancel_at_period_end: false,
        recorded_at,
    }
}

fn notification_id(provider: Provider, failure: &PaymentFailure) -> String {
    format!("{}:{}", provider, failure.payment_id)
}

fn payment_failed_notice(
    provider: Provider,
    user_id: &UserId,
    failure: &PaymentFailure,
    created_at: Timestamp,
) -> UserNotification {
    let (title, message, action_label) = match provider {
        Provider::Stripe => (
            "Problema con tu pago",
            "No pudimos procesar tu pago. Por favor, verifica tu método de pago o intenta con otro.",
            "Actualizar método de pago",
        ),
        Provider::Paypal => (
            "Problema con tu pago de PayPal",
            "No pudimos procesar tu pago con PayPal. Por favor, verifica tu cuenta de PayPal o intenta con otro método de pago.",
            "Ver métodos de pago",
        ),
    };

    UserNotification {
        notification_id: notification_id(provider, failure),
        user_id: user_id.clone(),
        title: title.to_string(),
        message: message.to_string(),
        level: NotificationLevel::Error,
        action_url: Some(PAYMENT_SETTINGS_URL.to_string()),
        action_label: Some(action_label.to_string()),
        created_at,
    }
}

fn renewal_failed_notice(
    provider: Provider,
    user_id: &UserId,
    failure: &PaymentFailure,
    created_at: Timestamp,
) -> UserNotification {
    let amount = failure
        .amount
        .as_ref()
        .map(|m| format!(" ({})", m))
        .unwrap_or_default();

    UserNotification {
        notification_id: notification_id(provider, failure),
        user_id: user_id.clone(),
        title: "Renovación de membresía fallida".to_string(),
        message: format!(
            "No pudimos procesar la renovación de tu membresía{}. Tu cuenta está en estado \"vencido\". Por favor, actualiza tu método de pago para mantener el acceso.",
            amount
        ),
        level: NotificationLevel::Error,
        action_url: Some(PAYMENT_SETTINGS_URL.to_string()),
        action_label: Some("Actualizar método de pago".to_string()),
        created_at,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user() -> UserId {
        UserId::new("user123").unwrap()
    }

    fn at() -> Timestamp {
        Timestamp::from_unix_secs(1_700_000_000).unwrap()
    }

    fn failure() -> PaymentFailure {
        PaymentFailure::subscription_invoice(
            "in_1",
            Some(Money::from_minor_units(2999, "eur").unwrap()),
            Some(2),
            None,
        )
    }

    #[test]
    fn activation_writes_one_subscription_record() {
        let event = CanonicalEvent::SubscriptionActivated {
            user_id: user(),
            external_subscription_id: "sub_1".to_string(),
            plan: Some(Money::from_minor_units(2999, "eur").unwrap()),
            period_start: None,
            period_end: None,
            cancel_at_period_end: false,
        };

        let entries = JournalEntry::for_event(Provider::Stripe, &event, at());

        assert_eq!(entries.len(), 1);
        match &entries[0] {
            JournalEntry::Subscription(record) => {
                assert_eq!(record.status, SubscriptionStatus::Active);
                assert_eq!(record.subscription_id, "sub_1");
            }
            other => panic!("unexpected entry: {:?}", other),
        }
    }

    #[test]
    fn past_due_without_failure_writes_only_subscription_record() {
        let event = CanonicalEvent::SubscriptionPastDue {
            user_id: user(),
            external_subscription_id: "sub_1".to_string(),
            failure: None,
        };

        let entries = JournalEntry::for_event(Provider::Stripe, &event, at());

        assert_eq!(entries.len(), 1);
    }

    #[test]
    fn invoice_past_due_writes_failure_and_notification() {
        let event = CanonicalEvent::SubscriptionPastDue {
            user_id: user(),
            external_subscription_id: "sub_1".to_string(),
            failure: Some(failure()),
        };

        let entries = JournalEntry::for_event(Provider::Stripe, &event, at());

        assert_eq!(entries.len(), 3);
        assert!(matches!(entries[1], JournalEntry::FailedPayment(_)));
        match &entries[2] {
            JournalEntry::Notification(n) => {
                assert_eq!(n.notification_id, "stripe:in_1");
                assert!(n.message.contains("29.99 EUR"));
                assert_eq!(n.level, NotificationLevel::Error);
            }
            other => panic!("unexpected entry: {:?}", other),
        }
    }

    #[test]
    fn payment_failed_notice_depends_on_provider() {
        let event = CanonicalEvent::PaymentFailed {
            user_id: user(),
            failure: failure(),
        };

        let entries = JournalEntry::for_event(Provider::Paypal, &event, at());

        match &entries[1] {
            JournalEntry::Notification(n) => {
                assert!(n.title.contains("PayPal"));
                assert_eq!(n.notification_id, "paypal:in_1");
            }
            other => panic!("unexpected entry: {:?}", other),
        }
    }

    #[test]
    fn void_marks_insurance_inactive() {
        let event = CanonicalEvent::InsuranceVoided {
            user_id: user(),
            payment_id: "AUTH-1".to_string(),
        };

        let entries = JournalEntry::for_event(Provider::Paypal, &event, at());

        match &entries[0] {
            JournalEntry::Insurance(record) => {
                assert!(!record.active);
                assert!(record.amount.is_none());
            }
            other => panic!("unexpected entry: {:?}", other),
        }
    }

    #[test]
    fn entries_are_deterministic() {
        let event = CanonicalEvent::PaymentFailed {
            user_id: user(),
            failure: failure(),
        };

        assert_eq!(
            JournalEntry::for_event(Provider::Stripe, &event, at()),
            JournalEntry::for_event(Provider::Stripe, &event, at())
        );
    }
}
