//! BillingStateRepository port - Per-user atomic read-modify-write.
//!
//! The user document is the only shared mutable billing resource. Writes
//! are serialized per user (row lock or per-document transaction); writes
//! for different users never wait on each other.

use async_trait::async_trait;

use crate::domain::billing::{BillingUser, CanonicalEvent, Provider};
use crate::domain::foundation::{DomainError, UserId};

/// Result of applying an event to a user document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApplyOutcome {
    /// Event applied inside one transaction; `user` is the committed state.
    Applied { user: BillingUser, changed: bool },
    /// No user document exists for the event's user id.
    UserMissing,
}

/// Port for reading and transitioning per-user billing state.
#[async_trait]
pub trait BillingStateRepository: Send + Sync {
    /// Locks the user document, applies `event` via
    /// [`UserBillingState::apply`](crate::domain::billing::UserBillingState::apply),
    /// and commits, all atomically.
    async fn apply_event(
        &self,
        provider: Provider,
        event: &CanonicalEvent,
    ) -> Result<ApplyOutcome, DomainError>;

    /// Loads the current user document.
    async fn find(&self, user_id: &UserId) -> Result<Option<BillingUser>, DomainError>;
}
