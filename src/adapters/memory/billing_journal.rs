//! In-memory billing journal.
//!
//! Keeps the same natural keys as the SQL tables, so replays overwrite
//! instead of accumulating.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;

use crate::domain::billing::{
    FailedPaymentRecord, InsuranceRecord, JournalEntry, Provider, SubscriptionRecord,
    UserNotification,
};
use crate::domain::foundation::DomainError;
use crate::ports::BillingJournal;

#[derive(Default)]
struct Tables {
    subscriptions: HashMap<(Provider, String), SubscriptionRecord>,
    insurances: HashMap<String, InsuranceRecord>,
    failed_payments: HashMap<(Provider, String), FailedPaymentRecord>,
    notifications: HashMap<String, UserNotification>,
    writes: usize,
}

#[derive(Default)]
pub struct InMemoryBillingJournal {
    tables: Mutex<Tables>,
}

impl InMemoryBillingJournal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscription(&self, provider: Provider, subscription_id: &str) -> Option<SubscriptionRecord> {
        self.lock()
            .subscriptions
            .get(&(provider, subscription_id.to_string()))
            .cloned()
    }

    pub fn insurance(&self, payment_id: &str) -> Option<InsuranceRecord> {
        self.lock().insurances.get(payment_id).cloned()
    }

    pub fn failed_payments(&self) -> Vec<FailedPaymentRecord> {
        self.lock().failed_payments.values().cloned().collect()
    }

    pub fn notifications_for(&self, user_id: &str) -> Vec<UserNotification> {
        self.lock()
            .notifications
            .values()
            .filter(|n| n.user_id.as_str() == user_id)
            .cloned()
            .collect()
    }

    /// Total number of `append` calls, including overwrites.
    pub fn write_count(&self) -> usize {
        self.lock().writes
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Tables> {
        self.tables.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[async_trait]
impl BillingJournal for InMemoryBillingJournal {
    async fn append(&self, entry: &JournalEntry) -> Result<(), DomainError> {
        let mut tables = self.lock();
        tables.writes += 1;

        match entry {
            JournalEntry::Subscription(record) => {
                let key = (record.provider, record.subscription_id.clone());
                let merged = match tables.subscriptions.get(&key) {
                    Some(existing) => SubscriptionRecord {
                        plan: record.plan.clone().or_else(|| existing.plan.clone()),
                        current_period_start: record
                            .current_period_start
                            .or(existing.current_period_start),
                        current_period_end: record.current_period_end.or(existing.current_period_end),
                        ..record.clone()
                    },
                    None => record.clone(),
                };
                tables.subscriptions.insert(key, merged);
            }
            JournalEntry::Insurance(record) => {
                let amount = record.amount.clone().or_else(|| {
                    tables
                        .insurances
                        .get(&record.payment_id)
                        .and_then(|existing| existing.amount.clone())
                });
                tables.insurances.insert(
                    record.payment_id.clone(),
                    InsuranceRecord {
                        amount,
                        ..record.clone()
                    },
                );
            }
            JournalEntry::FailedPayment(record) => {
                let key = (record.provider, record.failure.payment_id.clone());
                tables.failed_payments.insert(key, record.clone());
            }
            JournalEntry::Notification(notification) => {
                tables
                    .notifications
                    .entry(notification.notification_id.clone())
                    .or_insert_with(|| notification.clone());
            }
        }
        Ok(())
    }
}
