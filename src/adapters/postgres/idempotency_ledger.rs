//! PostgreSQL implementation of IdempotencyLedger.
//!
//! `webhook_events` has primary key `(provider, external_event_id)`.
//! Reservation is `INSERT ... ON CONFLICT DO UPDATE ... WHERE`: the update
//! only fires for an uncompleted row whose lease has run out, so zero
//! affected rows means another delivery holds or has handled the key.

use std::time::Duration;

use async_trait::async_trait;
use sqlx::PgPool;

use crate::domain::billing::IdempotencyKey;
use crate::domain::foundation::DomainError;
use crate::ports::{IdempotencyLedger, LedgerOutcome, Reservation, DEFAULT_RESERVATION_LEASE};

pub struct PostgresIdempotencyLedger {
    pool: PgPool,
    lease: Duration,
}

impl PostgresIdempotencyLedger {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool,
            lease: DEFAULT_RESERVATION_LEASE,
        }
    }

    pub fn with_lease(mut self, lease: Duration) -> Self {
        self.lease = lease;
        self
    }
}

#[async_trait]
impl IdempotencyLedger for PostgresIdempotencyLedger {
    async fn reserve(
        &self,
        key: &IdempotencyKey,
        event_type: &str,
    ) -> Result<Reservation, DomainError> {
        let result = sqlx::query(
            r#"
            INSERT INTO webhook_events (provider, external_event_id, event_type, received_at)
            VALUES ($1, $2, $3, NOW())
            ON CONFLICT (provider, external_event_id) DO UPDATE SET
                event_type = EXCLUDED.event_type,
                received_at = EXCLUDED.received_at
            WHERE webhook_events.completed_at IS NULL
              AND webhook_events.received_at < NOW() - make_interval(secs => $4)
            "#,
        )
        .bind(key.provider.as_str())
        .bind(&key.external_event_id)
        .bind(event_type)
        .bind(self.lease.as_secs_f64())
        .execute(&self.pool)
        .await
        .map_err(|e| DomainError::database(format!("Failed to reserve webhook event: {}", e)))?;

        if result.rows_affected() == 0 {
            Ok(Reservation::AlreadyProcessed)
        } else {
            Ok(Reservation::Fresh)
        }
    }

    async fn complete(
        &self,
        key: &IdempotencyKey,
        outcome: LedgerOutcome,
    ) -> Result<(), DomainError> {
        sqlx::query(
            r#"
            UPDATE webhook_events
            SET outcome = $3, completed_at = NOW()
            WHERE provider = $1 AND external_event_id = $2
            "#,
        )
        .bind(key.provider.as_str())
        .bind(&key.external_event_id)
        .bind(outcome.as_str())
        .execute(&self.pool)
        .await
        .map_err(|e| DomainError::database(format!("Failed to complete webhook event: {}", e)))?;

        Ok(())
    }

    async fn release(&self, key: &IdempotencyKey) -> Result<(), DomainError> {
        sqlx::query(
            r#"
            DELETE FROM webhook_events
            WHERE provider = $1 AND external_event_id = $2 AND completed_at IS NULL
            "#,
        )
        .bind(key.provider.as_str())
        .bind(&key.external_event_id)
        .execute(&self.pool)
        .await
        .map_err(|e| DomainError::database(format!("Failed to release webhook event: {}", e)))?;

        Ok(())
    }
}
