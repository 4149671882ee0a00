//! IdempotencyLedger port - Create-if-absent record of handled deliveries.
//!
//! Providers deliver the same webhook more than once (network timeouts,
//! 5xx responses, lost acknowledgements). Every delivery first reserves its
//! `(provider, external_event_id)` key; only the delivery that creates the
//! record goes on to mutate state.
//!
//! A reservation is released when processing fails, so the provider's retry
//! is processed instead of being swallowed as a duplicate. A reservation that
//! is never completed or released (the process died mid-delivery) expires
//! after its lease and the next delivery reclaims it.

use std::time::Duration;

use async_trait::async_trait;

use crate::domain::billing::IdempotencyKey;
use crate::domain::foundation::DomainError;

/// How long an uncompleted reservation blocks other deliveries.
pub const DEFAULT_RESERVATION_LEASE: Duration = Duration::from_secs(300);

/// Result of attempting to reserve a ledger key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reservation {
    /// Record was created, or an expired reservation reclaimed, by this call.
    Fresh,
    /// Record already existed (duplicate, or a concurrent delivery still
    /// inside its lease).
    AlreadyProcessed,
}

/// Final disposition stored on a ledger record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LedgerOutcome {
    Processed,
    Ignored,
}

impl LedgerOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            LedgerOutcome::Processed => "processed",
            LedgerOutcome::Ignored => "ignored",
        }
    }
}

/// Port for the idempotency ledger.
///
/// Implementations must make `reserve` atomic (PRIMARY KEY plus
/// `ON CONFLICT DO NOTHING`, or an equivalent conditional create).
#[async_trait]
pub trait IdempotencyLedger: Send + Sync {
    /// Creates the record if absent. An uncompleted record older than the
    /// lease is taken over and reported as `Fresh`.
    async fn reserve(
        &self,
        key: &IdempotencyKey,
        event_type: &str,
    ) -> Result<Reservation, DomainError>;

    /// Records how a reserved delivery ended.
    async fn complete(&self, key: &IdempotencyKey, outcome: LedgerOutcome)
        -> Result<(), DomainError>;

    /// Removes a reservation after a failed attempt.
    async fn release(&self, key: &IdempotencyKey) -> Result<(), DomainError>;
}
