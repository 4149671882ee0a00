//! ClaimsSynchronizer - Projects billing state into identity custom claims.
//!
//! Billing state is authoritative. A failed push is logged and reported as
//! a degraded outcome; the next transition or a `reconcile` call heals it.

use std::sync::Arc;

use tracing::{info, warn};

use crate::domain::billing::{AuthorizationClaims, BillingUser};
use crate::domain::foundation::{DomainError, ErrorCode, UserId};
use crate::ports::{BillingStateRepository, IdentityProvider};

/// Outcome of a claims push.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClaimsSync {
    Synced(AuthorizationClaims),
    /// The identity provider has no account for this user.
    IdentityMissing,
    /// Push failed; state stays committed.
    Failed(String),
}

impl ClaimsSync {
    pub fn is_synced(&self) -> bool {
        matches!(self, ClaimsSync::Synced(_))
    }
}

pub struct ClaimsSynchronizer {
    identity: Arc<dyn IdentityProvider>,
    repository: Arc<dyn BillingStateRepository>,
}

impl ClaimsSynchronizer {
    pub fn new(
        identity: Arc<dyn IdentityProvider>,
        repository: Arc<dyn BillingStateRepository>,
    ) -> Self {
        Self {
            identity,
            repository,
        }
    }

    /// Recomputes claims for `user` and pushes them. Never fails.
    pub async fn sync(&self, user: &BillingUser) -> ClaimsSync {
        match self.push(user).await {
            Ok(sync) => sync,
            Err(e) => {
                warn!(
                    user_id = %user.user_id,
                    error = %e,
                    "Custom claims push failed, billing state remains authoritative"
                );
                ClaimsSync::Failed(e.to_string())
            }
        }
    }

    /// Recomputes claims from the persisted state of `user_id`.
    ///
    /// Entry point for a periodic reconciliation sweep.
    pub async fn reconcile(&self, user_id: &UserId) -> Result<ClaimsSync, DomainError> {
        let user = self.repository.find(user_id).await?.ok_or_else(|| {
            DomainError::new(ErrorCode::UserNotFound, "No billing document for user")
                .with_detail("user_id", user_id.as_str())
        })?;
        Ok(self.sync(&user).await)
    }

    async fn push(&self, user: &BillingUser) -> Result<ClaimsSync, DomainError> {
        let Some(existing) = self.identity.get_custom_claims(&user.user_id).await? else {
            warn!(user_id = %user.user_id, "Identity account not found, claims not pushed");
            return Ok(ClaimsSync::IdentityMissing);
        };

        let claims = AuthorizationClaims::derive(user, &existing);
        let merged = claims.merge_into(existing);
        self.identity
            .set_custom_claims(&user.user_id, &merged)
            .await?;

        info!(
            user_id = %user.user_id,
            role = %claims.role,
            has_active_subscription = claims.has_active_subscription,
            has_anti_ghosting_insurance = claims.has_anti_ghosting_insurance,
            "Custom claims updated"
        );
        Ok(ClaimsSync::Synced(claims))
    }
}
