//! ProcessWebhookHandler - End-to-end handling of one webhook delivery.
//!
//! Sequence: authenticate, reserve the ledger key, normalize, apply the
//! transition, push claims, complete the ledger record. A failure after the
//! reservation releases it so the provider's retry is processed.

use std::sync::Arc;

use tracing::{error, info, warn};

use super::apply_transition::{StateTransitionEngine, Transition};
use super::authenticate_webhook::{ProcessWebhookCommand, WebhookAuthenticator};
use super::normalize_event::EventNormalizer;
use super::sync_claims::{ClaimsSync, ClaimsSynchronizer};
use crate::domain::billing::{CanonicalEvent, Normalized, PaymentEvent, Provider, WebhookError};
use crate::ports::{IdempotencyLedger, LedgerOutcome, Reservation};

/// How a delivery was handled. Every variant is acknowledged with 200.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WebhookOutcome {
    /// A canonical event was applied.
    Processed {
        provider: Provider,
        event_id: String,
        /// `None` when no push was due (failed payment or missing user).
        claims: Option<ClaimsSync>,
        user_missing: bool,
    },
    /// Authentic but unresolvable: unknown type or no user id.
    Ignored { reason: String },
    /// The ledger already holds this delivery.
    AlreadyProcessed,
}

pub struct ProcessWebhookHandler {
    authenticator: WebhookAuthenticator,
    ledger: Arc<dyn IdempotencyLedger>,
    normalizer: EventNormalizer,
    engine: StateTransitionEngine,
    claims: ClaimsSynchronizer,
}

impl ProcessWebhookHandler {
    pub fn new(
        authenticator: WebhookAuthenticator,
        ledger: Arc<dyn IdempotencyLedger>,
        normalizer: EventNormalizer,
        engine: StateTransitionEngine,
        claims: ClaimsSynchronizer,
    ) -> Self {
        Self {
            authenticator,
            ledger,
            normalizer,
            engine,
            claims,
        }
    }

    pub async fn handle(&self, cmd: ProcessWebhookCommand) -> Result<WebhookOutcome, WebhookError> {
        // 1. Authenticate; rejections leave no trace
        let event = self.authenticator.authenticate(&cmd).await?;
        let key = event.idempotency_key();

        // 2. Reserve the delivery
        let reservation = self
            .ledger
            .reserve(&key, &event.event_type)
            .await
            .map_err(|e| WebhookError::StateTransition(e.to_string()))?;

        if reservation == Reservation::AlreadyProcessed {
            info!(
                provider = %event.provider,
                event_id = %event.external_event_id,
                event_type = %event.event_type,
                "Duplicate webhook delivery acknowledged"
            );
            return Ok(WebhookOutcome::AlreadyProcessed);
        }

        // 3. Process, releasing the reservation on failure
        match self.process(&event).await {
            Ok(outcome) => {
                let ledger_outcome = match outcome {
                    WebhookOutcome::Ignored { .. } => LedgerOutcome::Ignored,
                    _ => LedgerOutcome::Processed,
                };
                if let Err(e) = self.ledger.complete(&key, ledger_outcome).await {
                    warn!(key = %key, error = %e, "Failed to record webhook outcome");
                }
                Ok(outcome)
            }
            Err(e) => {
                if let Err(release_err) = self.ledger.release(&key).await {
                    error!(
                        key = %key,
                        error = %release_err,
                        "Failed to release ledger reservation, retries will be treated as duplicates"
                    );
                }
                warn!(
                    provider = %event.provider,
                    event_id = %event.external_event_id,
                    event_type = %event.event_type,
                    error = %e,
                    "Webhook processing failed, provider will retry"
                );
                Err(e)
            }
        }
    }

    async fn process(&self, event: &PaymentEvent) -> Result<WebhookOutcome, WebhookError> {
        let canonical = match self.normalizer.normalize(event).await? {
            Normalized::Canonical(canonical) => canonical,
            Normalized::Ignored(reason) => {
                info!(
                    provider = %event.provider,
                    event_id = %event.external_event_id,
                    event_type = %event.event_type,
                    reason = %reason,
                    "Webhook ignored"
                );
                return Ok(WebhookOutcome::Ignored { reason });
            }
        };

        let transition = self
            .engine
            .apply(event.provider, &canonical, event.received_at)
            .await?;

        let (claims, user_missing) = match transition {
            Transition::Applied { user, .. } => {
                let claims = match canonical {
                    // Failed payments do not touch entitlements
                    CanonicalEvent::PaymentFailed { .. } => None,
                    _ => Some(self.claims.sync(&user).await),
                };
                (claims, false)
            }
            Transition::UserMissing => (None, true),
        };

        Ok(WebhookOutcome::Processed {
            provider: event.provider,
            event_id: event.external_event_id.clone(),
            claims,
            user_missing,
        })
    }
}
