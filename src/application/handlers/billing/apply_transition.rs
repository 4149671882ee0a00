//! StateTransitionEngine - Applies canonical events to per-user billing state.
//!
//! The user document is updated in one atomic read-modify-write, then the
//! journal entries implied by the event are written. Journal writes are
//! upserts, so a retry after a journal failure converges.

use std::sync::Arc;

use tracing::{info, warn};

use crate::domain::billing::{BillingUser, CanonicalEvent, JournalEntry, Provider, WebhookError};
use crate::domain::foundation::Timestamp;
use crate::ports::{ApplyOutcome, BillingJournal, BillingStateRepository};

/// Result of a transition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Transition {
    /// State committed; `changed` is false for replays and non-mutating events.
    Applied { user: BillingUser, changed: bool },
    /// User document missing; only the journal was written.
    UserMissing,
}

pub struct StateTransitionEngine {
    repository: Arc<dyn BillingStateRepository>,
    journal: Arc<dyn BillingJournal>,
}

impl StateTransitionEngine {
    pub fn new(
        repository: Arc<dyn BillingStateRepository>,
        journal: Arc<dyn BillingJournal>,
    ) -> Self {
        Self {
            repository,
            journal,
        }
    }

    /// Applies `event` for `provider`, stamping journal entries with `recorded_at`.
    pub async fn apply(
        &self,
        provider: Provider,
        event: &CanonicalEvent,
        recorded_at: Timestamp,
    ) -> Result<Transition, WebhookError> {
        let user_id = event.user_id();

        let outcome = self
            .repository
            .apply_event(provider, event)
            .await
            .map_err(|e| WebhookError::StateTransition(e.to_string()))?;

        let transition = match outcome {
            ApplyOutcome::Applied { user, changed } => {
                info!(
                    user_id = %user_id,
                    provider = %provider,
                    event = event.kind(),
                    changed,
                    status = %user.billing.subscription_status,
                    insured = user.billing.has_anti_ghosting_insurance,
                    "Billing state transition applied"
                );
                Transition::Applied { user, changed }
            }
            ApplyOutcome::UserMissing => {
                warn!(
                    user_id = %user_id,
                    provider = %provider,
                    event = event.kind(),
                    "User document not found, recording billing metadata only"
                );
                Transition::UserMissing
            }
        };

        for entry in JournalEntry::for_event(provider, event, recorded_at) {
            self.journal
                .append(&entry)
                .await
                .map_err(|e| WebhookError::StateTransition(e.to_string()))?;
        }

        Ok(transition)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::billing::{Money, SubscriptionStatus};
    use crate::domain::foundation::{DomainError, UserId};
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::Mutex;

    // ══════════════════════════════════════════════════════════════
    // Mock Implementations
    // ══════════════════════════════════════════════════════════════

    #[derive(Default)]
    struct MockRepository {
        users: Mutex<HashMap<UserId, BillingUser>>,
        fail: bool,
    }

    impl MockRepository {
        fn with_user(user_id: &str) -> Self {
            let repo = Self::default();
            let id = UserId::new(user_id).unwrap();
            repo.users
                .lock()
                .unwrap()
                .insert(id.clone(), BillingUser::new(id));
            repo
        }

        fn failing() -> Self {
            Self {
                fail: true,
                ..Default::default()
            }
        }
    }

    #[async_trait]
    impl BillingStateRepository for MockRepository {
        async fn apply_event(
            &self,
            provider: Provider,
            event: &CanonicalEvent,
        ) -> Result<ApplyOutcome, DomainError> {
            if self.fail {
                return Err(DomainError::database("connection refused"));
            }
            let mut users = self.users.lock().unwrap();
            match users.get_mut(event.user_id()) {
                Some(user) => {
                    let changed = user.billing.apply(provider, event);
                    Ok(ApplyOutcome::Applied {
                        user: user.clone(),
                        changed,
                    })
                }
                None => Ok(ApplyOutcome::UserMissing),
            }
        }

        async fn find(&self, user_id: &UserId) -> Result<Option<BillingUser>, DomainError> {
            Ok(self.users.lock().unwrap().get(user_id).cloned())
        }
    }

    #[derive(Default)]
    struct MockJournal {
        entries: Mutex<Vec<JournalEntry>>,
        fail: bool,
    }

    #[async_trait]
    impl BillingJournal for MockJournal {
        async fn append(&self, entry: &JournalEntry) -> Result<(), DomainError> {
            if self.fail {
                return Err(DomainError::database("journal unavailable"));
            }
            self.entries.lock().unwrap().push(entry.clone());
            Ok(())
        }
    }

    fn activated() -> CanonicalEvent {
        CanonicalEvent::SubscriptionActivated {
            user_id: UserId::new("user123").unwrap(),
            external_subscription_id: "sub_1".to_string(),
            plan: Some(Money::from_minor_units(2999, "eur").unwrap()),
            period_start: None,
            period_end: None,
            cancel_at_period_end: false,
        }
    }

    fn at() -> Timestamp {
        Timestamp::from_unix_secs(1_700_000_000).unwrap()
    }

    // ══════════════════════════════════════════════════════════════
    // Tests
    // ══════════════════════════════════════════════════════════════

    #[tokio::test]
    async fn applies_event_and_journals_it() {
        let repo = Arc::new(MockRepository::with_user("user123"));
        let journal = Arc::new(MockJournal::default());
        let engine = StateTransitionEngine::new(repo.clone(), journal.clone());

        let result = engine.apply(Provider::Stripe, &activated(), at()).await.unwrap();

        match result {
            Transition::Applied { user, changed } => {
                assert!(changed);
                assert_eq!(user.billing.subscription_status, SubscriptionStatus::Active);
            }
            other => panic!("unexpected transition: {:?}", other),
        }
        assert_eq!(journal.entries.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn replay_reports_unchanged() {
        let repo = Arc::new(MockRepository::with_user("user123"));
        let engine = StateTransitionEngine::new(repo, Arc::new(MockJournal::default()));

        engine.apply(Provider::Stripe, &activated(), at()).await.unwrap();
        let second = engine.apply(Provider::Stripe, &activated(), at()).await.unwrap();

        assert!(matches!(second, Transition::Applied { changed: false, .. }));
    }

    #[tokio::test]
    async fn missing_user_still_journals() {
        let journal = Arc::new(MockJournal::default());
        let engine = StateTransitionEngine::new(Arc::new(MockRepository::default()), journal.clone());

        let result = engine.apply(Provider::Stripe, &activated(), at()).await.unwrap();

        assert_eq!(result, Transition::UserMissing);
        assert_eq!(journal.entries.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn repository_failure_is_state_transition_error() {
        let journal = Arc::new(MockJournal::default());
        let engine = StateTransitionEngine::new(Arc::new(MockRepository::failing()), journal.clone());

        let result = engine.apply(Provider::Stripe, &activated(), at()).await;

        assert!(matches!(result, Err(WebhookError::StateTransition(_))));
        assert!(journal.entries.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn journal_failure_is_state_transition_error() {
        let journal = Arc::new(MockJournal {
            fail: true,
            ..Default::default()
        });
        let engine =
            StateTransitionEngine::new(Arc::new(MockRepository::with_user("user123")), journal);

        let result = engine.apply(Provider::Stripe, &activated(), at()).await;

        assert!(matches!(result, Err(WebhookError::StateTransition(_))));
    }
}
