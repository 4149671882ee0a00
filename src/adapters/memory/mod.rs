//! In-memory adapters for tests and database-free local runs.

mod billing_journal;
mod billing_store;
mod identity_provider;
mod idempotency_ledger;

pub use billing_journal::InMemoryBillingJournal;
pub use billing_store::InMemoryBillingStore;
pub use identity_provider::InMemoryIdentityProvider;
pub use idempotency_ledger::{InMemoryIdempotencyLedger, LedgerRecord};
