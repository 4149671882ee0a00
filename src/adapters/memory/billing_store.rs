//! In-memory billing state store.
//!
//! Each user document sits behind its own async mutex, so transitions for
//! one user are serialized while different users proceed independently.
//! Used by integration tests and local runs without a database.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::domain::billing::{BillingUser, CanonicalEvent, Provider};
use crate::domain::foundation::{DomainError, UserId};
use crate::ports::{ApplyOutcome, BillingStateRepository};

#[derive(Default)]
pub struct InMemoryBillingStore {
    users: RwLock<HashMap<String, Arc<Mutex<BillingUser>>>>,
}

impl InMemoryBillingStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts or replaces a user document.
    pub fn seed(&self, user: BillingUser) {
        let mut users = self.users.write().unwrap_or_else(|e| e.into_inner());
        users.insert(user.user_id.as_str().to_string(), Arc::new(Mutex::new(user)));
    }

    /// Snapshot of a user document.
    pub async fn get(&self, user_id: &str) -> Option<BillingUser> {
        let slot = self.slot(user_id)?;
        let user = slot.lock().await;
        Some(user.clone())
    }

    fn slot(&self, user_id: &str) -> Option<Arc<Mutex<BillingUser>>> {
        let users = self.users.read().unwrap_or_else(|e| e.into_inner());
        users.get(user_id).cloned()
    }
}

#[async_trait]
impl BillingStateRepository for InMemoryBillingStore {
    async fn apply_event(
        &self,
        provider: Provider,
        event: &CanonicalEvent,
    ) -> Result<ApplyOutcome, DomainError> {
        let Some(slot) = self.slot(event.user_id().as_str()) else {
            return Ok(ApplyOutcome::UserMissing);
        };

        let mut user = slot.lock().await;
        let changed = user.billing.apply(provider, event);
        Ok(ApplyOutcome::Applied {
            user: user.clone(),
            changed,
        })
    }

    async fn find(&self, user_id: &UserId) -> Result<Option<BillingUser>, DomainError> {
        Ok(self.get(user_id.as_str()).await)
    }
}
