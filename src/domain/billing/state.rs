//! Per-user billing state and its transition rules.
//!
//! `apply` is a pure function of the current state and the event: it never
//! reads the clock, so replaying an event yields the same state.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::canonical_event::CanonicalEvent;
use super::money::Currency;
use super::provider::Provider;
use super::status::SubscriptionStatus;
use crate::domain::foundation::{Timestamp, UserId};

/// Billing fields of a user document.
///
/// Invariants:
/// - `has_active_subscription` implies `subscription_status == Active`
/// - `subscription_status == Canceled` implies `!has_active_subscription`
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserBillingState {
    pub has_active_subscription: bool,
    pub subscription_status: SubscriptionStatus,
    pub subscription_id: Option<String>,
    pub subscription_provider: Option<Provider>,
    pub plan_amount: Option<Decimal>,
    pub plan_currency: Option<Currency>,
    pub current_period_start: Option<Timestamp>,
    pub current_period_end: Option<Timestamp>,
    pub cancel_at_period_end: bool,
    pub has_anti_ghosting_insurance: bool,
    pub insurance_payment_id: Option<String>,
    pub insurance_amount: Option<Decimal>,
    pub insurance_currency: Option<Currency>,
}

impl UserBillingState {
    /// Applies a canonical event. Returns true if any field changed.
    pub fn apply(&mut self, provider: Provider, event: &CanonicalEvent) -> bool {
        let before = self.clone();

        match event {
            CanonicalEvent::SubscriptionActivated {
                external_subscription_id,
                plan,
                period_start,
                period_end,
                cancel_at_period_end,
                ..
            } => {
                self.subscription_status = SubscriptionStatus::Active;
                self.has_active_subscription = true;
                self.subscription_id = Some(external_subscription_id.clone());
                self.subscription_provider = Some(provider);
                if let Some(plan) = plan {
                    self.plan_amount = Some(plan.amount());
                    self.plan_currency = Some(plan.currency().clone());
                }
                if period_start.is_some() {
                    self.current_period_start = *period_start;
                }
                if period_end.is_some() {
                    self.current_period_end = *period_end;
                }
                self.cancel_at_period_end = *cancel_at_period_end;
            }
            CanonicalEvent::SubscriptionCanceled { .. } => {
                self.subscription_status = SubscriptionStatus::Canceled;
                self.has_active_subscription = false;
            }
            CanonicalEvent::SubscriptionPastDue { .. } => {
                self.subscription_status = SubscriptionStatus::PastDue;
                self.has_active_subscription = false;
            }
            CanonicalEvent::InsurancePurchased {
                payment_id, amount, ..
            } => {
                self.has_anti_ghosting_insurance = true;
                self.insurance_payment_id = Some(payment_id.clone());
                self.insurance_amount = Some(amount.amount());
                self.insurance_currency = Some(amount.currency().clone());
            }
            CanonicalEvent::InsuranceVoided { .. } => {
                self.has_anti_ghosting_insurance = false;
            }
            CanonicalEvent::PaymentFailed { .. } => {}
        }

        debug_assert!(self.invariants_hold());
        *self != before
    }

    /// Checks the status/flag invariants.
    pub fn invariants_hold(&self) -> bool {
        let active_implies_status =
            !self.has_active_subscription || self.subscription_status.grants_access();
        let canceled_implies_inactive = self.subscription_status != SubscriptionStatus::Canceled
            || !self.has_active_subscription;
        active_implies_status && canceled_implies_inactive
    }
}

/// A user document as seen by the billing engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BillingUser {
    pub user_id: UserId,
    pub billing: UserBillingState,
    /// `userRole` attribute maintained outside billing.
    pub role: Option<String>,
    /// Display attribute mirrored into claims.
    pub gender: Option<String>,
}

impl BillingUser {
    pub fn new(user_id: UserId) -> Self {
        Self {
            user_id,
            billing: UserBillingState::default(),
            role: None,
            gender: None,
        }
    }

    pub fn with_role(mut self, role: impl Into<String>) -> Self {
        self.role = Some(role.into());
        self
    }

    pub fn with_gender(mut self, gender: impl Into<String>) -> Self {
        self.gender = Some(gender.into());
        self
    }
}
