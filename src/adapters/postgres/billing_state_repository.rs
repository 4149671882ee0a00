//! PostgreSQL implementation of BillingStateRepository.
//!
//! Each transition is one transaction: the user row is locked with
//! `SELECT ... FOR UPDATE`, the event is applied in memory, and the row is
//! written back only if something changed. Deliveries for different users
//! never contend.

use std::str::FromStr;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::{PgPool, Postgres, Transaction};

use crate::domain::billing::{
    BillingUser, CanonicalEvent, Currency, Provider, SubscriptionStatus, UserBillingState,
};
use crate::domain::foundation::{DomainError, ErrorCode, Timestamp, UserId};
use crate::ports::{ApplyOutcome, BillingStateRepository};

const SELECT_USER: &str = r#"
    SELECT id, user_role, gender, has_active_subscription, subscription_status,
           subscription_id, subscription_provider, plan_amount, plan_currency,
           current_period_start, current_period_end, cancel_at_period_end,
           has_anti_ghosting_insurance, insurance_payment_id, insurance_amount,
           insurance_currency
    FROM users
    WHERE id = $1
"#;

const SELECT_USER_FOR_UPDATE: &str = r#"
    SELECT id, user_role, gender, has_active_subscription, subscription_status,
           subscription_id, subscription_provider, plan_amount, plan_currency,
           current_period_start, current_period_end, cancel_at_period_end,
           has_anti_ghosting_insurance, insurance_payment_id, insurance_amount,
           insurance_currency
    FROM users
    WHERE id = $1
    FOR UPDATE
"#;

/// PostgreSQL implementation of the BillingStateRepository port.
pub struct PostgresBillingStateRepository {
    pool: PgPool,
}

impl PostgresBillingStateRepository {
    /// Creates a new PostgresBillingStateRepository with the given connection pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn write_back(
        tx: &mut Transaction<'_, Postgres>,
        user: &BillingUser,
    ) -> Result<(), DomainError> {
        let b = &user.billing;
        sqlx::query(
            r#"
            UPDATE users SET
                has_active_subscription = $2,
                subscription_status = $3,
                subscription_id = $4,
                subscription_provider = $5,
                plan_amount = $6,
                plan_currency = $7,
                current_period_start = $8,
                current_period_end = $9,
                cancel_at_period_end = $10,
                has_anti_ghosting_insurance = $11,
                insurance_payment_id = $12,
                insurance_amount = $13,
                insurance_currency = $14,
                updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(user.user_id.as_str())
        .bind(b.has_active_subscription)
        .bind(b.subscription_status.as_str())
        .bind(&b.subscription_id)
        .bind(b.subscription_provider.map(|p| p.as_str()))
        .bind(b.plan_amount)
        .bind(b.plan_currency.as_ref().map(Currency::as_str))
        .bind(b.current_period_start.map(|t| *t.as_datetime()))
        .bind(b.current_period_end.map(|t| *t.as_datetime()))
        .bind(b.cancel_at_period_end)
        .bind(b.has_anti_ghosting_insurance)
        .bind(&b.insurance_payment_id)
        .bind(b.insurance_amount)
        .bind(b.insurance_currency.as_ref().map(Currency::as_str))
        .execute(&mut **tx)
        .await
        .map_err(|e| DomainError::database(format!("Failed to update billing state: {}", e)))?;

        Ok(())
    }
}

/// Database row representation of a user's billing columns.
#[derive(Debug, sqlx::FromRow)]
struct UserRow {
    id: String,
    user_role: Option<String>,
    gender: Option<String>,
    has_active_subscription: bool,
    subscription_status: String,
    subscription_id: Option<String>,
    subscription_provider: Option<String>,
    plan_amount: Option<Decimal>,
    plan_currency: Option<String>,
    current_period_start: Option<DateTime<Utc>>,
    current_period_end: Option<DateTime<Utc>>,
    cancel_at_period_end: bool,
    has_anti_ghosting_insurance: bool,
    insurance_payment_id: Option<String>,
    insurance_amount: Option<Decimal>,
    insurance_currency: Option<String>,
}

impl TryFrom<UserRow> for BillingUser {
    type Error = DomainError;

    fn try_from(row: UserRow) -> Result<Self, Self::Error> {
        let billing = UserBillingState {
            has_active_subscription: row.has_active_subscription,
            subscription_status: SubscriptionStatus::from_str(&row.subscription_status)
                .map_err(corrupt)?,
            subscription_id: row.subscription_id,
            subscription_provider: row
                .subscription_provider
                .as_deref()
                .map(Provider::from_str)
                .transpose()
                .map_err(corrupt)?,
            plan_amount: row.plan_amount,
            plan_currency: parse_currency(row.plan_currency)?,
            current_period_start: row.current_period_start.map(Timestamp::from_datetime),
            current_period_end: row.current_period_end.map(Timestamp::from_datetime),
            cancel_at_period_end: row.cancel_at_period_end,
            has_anti_ghosting_insurance: row.has_anti_ghosting_insurance,
            insurance_payment_id: row.insurance_payment_id,
            insurance_amount: row.insurance_amount,
            insurance_currency: parse_currency(row.insurance_currency)?,
        };

        Ok(BillingUser {
            user_id: UserId::new(row.id).map_err(corrupt)?,
            billing,
            role: row.user_role,
            gender: row.gender,
        })
    }
}

fn parse_currency(raw: Option<String>) -> Result<Option<Currency>, DomainError> {
    raw.as_deref().map(Currency::new).transpose().map_err(corrupt)
}

fn corrupt(err: impl std::fmt::Display) -> DomainError {
    DomainError::new(
        ErrorCode::DatabaseError,
        format!("Invalid billing row: {}", err),
    )
}

#[async_trait]
impl BillingStateRepository for PostgresBillingStateRepository {
    async fn apply_event(
        &self,
        provider: Provider,
        event: &CanonicalEvent,
    ) -> Result<ApplyOutcome, DomainError> {
        let mut tx = self.pool.begin().await.map_err(|e| {
            DomainError::database(format!("Failed to start transaction: {}", e))
        })?;

        let row: Option<UserRow> = sqlx::query_as(SELECT_USER_FOR_UPDATE)
            .bind(event.user_id().as_str())
            .fetch_optional(&mut *tx)
            .await
            .map_err(|e| DomainError::database(format!("Failed to lock user row: {}", e)))?;

        let Some(row) = row else {
            tx.rollback().await.map_err(|e| {
                DomainError::database(format!("Failed to roll back transaction: {}", e))
            })?;
            return Ok(ApplyOutcome::UserMissing);
        };

        let mut user = BillingUser::try_from(row)?;
        let changed = user.billing.apply(provider, event);
        if changed {
            Self::write_back(&mut tx, &user).await?;
        }

        tx.commit().await.map_err(|e| {
            DomainError::database(format!("Failed to commit transaction: {}", e))
        })?;

        Ok(ApplyOutcome::Applied { user, changed })
    }

    async fn find(&self, user_id: &UserId) -> Result<Option<BillingUser>, DomainError> {
        let row: Option<UserRow> = sqlx::query_as(SELECT_USER)
            .bind(user_id.as_str())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| DomainError::database(format!("Failed to find user: {}", e)))?;

        row.map(BillingUser::try_from).transpose()
    }
}
