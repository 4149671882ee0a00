//! PostgreSQL adapters - Database implementations for persistence ports.
//!
//! - `PostgresBillingStateRepository` - Row-locked per-user billing transitions
//! - `PostgresIdempotencyLedger` - Webhook delivery reservations
//! - `PostgresBillingJournal` - Subscription, insurance, failure, and notification records

mod billing_journal;
mod billing_state_repository;
mod idempotency_ledger;

pub use billing_journal::PostgresBillingJournal;
pub use billing_state_repository::PostgresBillingStateRepository;
pub use idempotency_ledger::PostgresIdempotencyLedger;
