//! In-memory idempotency ledger.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use crate::domain::billing::IdempotencyKey;
use crate::domain::foundation::{DomainError, Timestamp};
use crate::ports::{
    Clock, IdempotencyLedger, LedgerOutcome, Reservation, SystemClock, DEFAULT_RESERVATION_LEASE,
};

/// Ledger record. `outcome` is `None` while the delivery is in flight.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LedgerRecord {
    pub event_type: String,
    pub outcome: Option<LedgerOutcome>,
    pub reserved_at: Timestamp,
}

pub struct InMemoryIdempotencyLedger {
    records: Mutex<HashMap<IdempotencyKey, LedgerRecord>>,
    clock: Arc<dyn Clock>,
    lease: Duration,
}

impl InMemoryIdempotencyLedger {
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self {
            records: Mutex::new(HashMap::new()),
            clock,
            lease: DEFAULT_RESERVATION_LEASE,
        }
    }

    pub fn with_lease(mut self, lease: Duration) -> Self {
        self.lease = lease;
        self
    }

    pub fn record(&self, key: &IdempotencyKey) -> Option<LedgerRecord> {
        self.records
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .get(key)
            .cloned()
    }

    pub fn len(&self) -> usize {
        self.records.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for InMemoryIdempotencyLedger {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl IdempotencyLedger for InMemoryIdempotencyLedger {
    async fn reserve(
        &self,
        key: &IdempotencyKey,
        event_type: &str,
    ) -> Result<Reservation, DomainError> {
        let now = self.clock.now();
        let lease_secs = i64::try_from(self.lease.as_secs()).unwrap_or(i64::MAX);
        let mut records = self.records.lock().unwrap_or_else(|e| e.into_inner());

        if let Some(existing) = records.get(key) {
            let expired = existing.outcome.is_none()
                && existing.reserved_at.plus_secs(lease_secs).is_before(&now);
            if !expired {
                return Ok(Reservation::AlreadyProcessed);
            }
        }

        records.insert(
            key.clone(),
            LedgerRecord {
                event_type: event_type.to_string(),
                outcome: None,
                reserved_at: now,
            },
        );
        Ok(Reservation::Fresh)
    }

    async fn complete(
        &self,
        key: &IdempotencyKey,
        outcome: LedgerOutcome,
    ) -> Result<(), DomainError> {
        let mut records = self.records.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(record) = records.get_mut(key) {
            record.outcome = Some(outcome);
        }
        Ok(())
    }

    async fn release(&self, key: &IdempotencyKey) -> Result<(), DomainError> {
        let mut records = self.records.lock().unwrap_or_else(|e| e.into_inner());
        if records.get(key).is_some_and(|r| r.outcome.is_none()) {
            records.remove(key);
        }
        Ok(())
    }
}
