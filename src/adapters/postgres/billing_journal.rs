//! PostgreSQL implementation of BillingJournal.
//!
//! Every write is an upsert keyed by provider identifiers, so replays and
//! retries converge on one row. Status-only subscription updates keep the
//! plan and period columns already on file.

use async_trait::async_trait;
use sqlx::PgPool;

use crate::domain::billing::{
    FailedPaymentRecord, InsuranceRecord, JournalEntry, Money, SubscriptionRecord,
    UserNotification,
};
use crate::domain::foundation::DomainError;
use crate::ports::BillingJournal;

pub struct PostgresBillingJournal {
    pool: PgPool,
}

impl PostgresBillingJournal {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn upsert_subscription(&self, record: &SubscriptionRecord) -> Result<(), DomainError> {
        sqlx::query(
            r#"
            INSERT INTO subscriptions (
                provider, subscription_id, user_id, status, plan_amount, plan_currency,
                current_period_start, current_period_end, cancel_at_period_end, updated_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            ON CONFLICT (provider, subscription_id) DO UPDATE SET
                user_id = EXCLUDED.user_id,
                status = EXCLUDED.status,
                plan_amount = COALESCE(EXCLUDED.plan_amount, subscriptions.plan_amount),
                plan_currency = COALESCE(EXCLUDED.plan_currency, subscriptions.plan_currency),
                current_period_start = COALESCE(EXCLUDED.current_period_start, subscriptions.current_period_start),
                current_period_end = COALESCE(EXCLUDED.current_period_end, subscriptions.current_period_end),
                cancel_at_period_end = CASE
                    WHEN EXCLUDED.status = 'active' THEN EXCLUDED.cancel_at_period_end
                    ELSE subscriptions.cancel_at_period_end
                END,
                updated_at = EXCLUDED.updated_at
            "#,
        )
        .bind(record.provider.as_str())
        .bind(&record.subscription_id)
        .bind(record.user_id.as_str())
        .bind(record.status.as_str())
        .bind(record.plan.as_ref().map(Money::amount))
        .bind(record.plan.as_ref().map(|m| m.currency().as_str()))
        .bind(record.current_period_start.map(|t| *t.as_datetime()))
        .bind(record.current_period_end.map(|t| *t.as_datetime()))
        .bind(record.cancel_at_period_end)
        .bind(record.recorded_at.as_datetime())
        .execute(&self.pool)
        .await
        .map_err(|e| DomainError::database(format!("Failed to upsert subscription: {}", e)))?;

        Ok(())
    }

    async fn upsert_insurance(&self, record: &InsuranceRecord) -> Result<(), DomainError> {
        sqlx::query(
            r#"
            INSERT INTO insurances (payment_id, provider, user_id, amount, currency, active, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            ON CONFLICT (payment_id) DO UPDATE SET
                amount = COALESCE(EXCLUDED.amount, insurances.amount),
                currency = COALESCE(EXCLUDED.currency, insurances.currency),
                active = EXCLUDED.active,
                updated_at = EXCLUDED.updated_at
            "#,
        )
        .bind(&record.payment_id)
        .bind(record.provider.as_str())
        .bind(record.user_id.as_str())
        .bind(record.amount.as_ref().map(Money::amount))
        .bind(record.amount.as_ref().map(|m| m.currency().as_str()))
        .bind(record.active)
        .bind(record.recorded_at.as_datetime())
        .execute(&self.pool)
        .await
        .map_err(|e| DomainError::database(format!("Failed to upsert insurance: {}", e)))?;

        Ok(())
    }

    async fn upsert_failed_payment(&self, record: &FailedPaymentRecord) -> Result<(), DomainError> {
        let failure = &record.failure;
        sqlx::query(
            r#"
            INSERT INTO failed_payments (
                provider, payment_id, user_id, subscription_id, kind, amount, currency,
                reason, error_code, error_message, attempt_count, recorded_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
            ON CONFLICT (provider, payment_id) DO UPDATE SET
                reason = EXCLUDED.reason,
                error_code = EXCLUDED.error_code,
                error_message = EXCLUDED.error_message,
                attempt_count = GREATEST(EXCLUDED.attempt_count, failed_payments.attempt_count),
                recorded_at = EXCLUDED.recorded_at
            "#,
        )
        .bind(record.provider.as_str())
        .bind(&failure.payment_id)
        .bind(record.user_id.as_str())
        .bind(&record.subscription_id)
        .bind(failure.kind.as_str())
        .bind(failure.amount.as_ref().map(Money::amount))
        .bind(failure.amount.as_ref().map(|m| m.currency().as_str()))
        .bind(&failure.reason)
        .bind(&failure.error_code)
        .bind(&failure.error_message)
        .bind(failure.attempt_count.map(|n| i32::try_from(n).unwrap_or(i32::MAX)))
        .bind(record.recorded_at.as_datetime())
        .execute(&self.pool)
        .await
        .map_err(|e| DomainError::database(format!("Failed to upsert failed payment: {}", e)))?;

        Ok(())
    }

    async fn insert_notification(&self, notification: &UserNotification) -> Result<(), DomainError> {
        sqlx::query(
            r#"
            INSERT INTO user_notifications (
                notification_id, user_id, title, message, level, action_url, action_label, created_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            ON CONFLICT (notification_id) DO NOTHING
            "#,
        )
        .bind(&notification.notification_id)
        .bind(notification.user_id.as_str())
        .bind(&notification.title)
        .bind(&notification.message)
        .bind(notification.level.as_str())
        .bind(&notification.action_url)
        .bind(&notification.action_label)
        .bind(notification.created_at.as_datetime())
        .execute(&self.pool)
        .await
        .map_err(|e| DomainError::database(format!("Failed to insert notification: {}", e)))?;

        Ok(())
    }
}

#[async_trait]
impl BillingJournal for PostgresBillingJournal {
    async fn append(&self, entry: &JournalEntry) -> Result<(), DomainError> {
        match entry {
            JournalEntry::Subscription(record) => self.upsert_subscription(record).await,
            JournalEntry::Insurance(record) => self.upsert_insurance(record).await,
            JournalEntry::FailedPayment(record) => self.upsert_failed_payment(record).await,
            JournalEntry::Notification(notification) => {
                self.insert_notification(notification).await
            }
        }
    }
}
