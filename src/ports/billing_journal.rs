//! BillingJournal port - Durable billing metadata.
//!
//! Subscription, insurance, failed-payment, and notification records.
//! Writes are upserts on natural provider keys so replays converge.

use async_trait::async_trait;

use crate::domain::billing::JournalEntry;
use crate::domain::foundation::DomainError;

#[async_trait]
pub trait BillingJournal: Send + Sync {
    /// Writes (or overwrites) one journal entry.
    async fn append(&self, entry: &JournalEntry) -> Result<(), DomainError>;
}
