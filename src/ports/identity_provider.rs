//! IdentityProvider port - Custom claims on the identity token.

use async_trait::async_trait;
use serde_json::{Map, Value};

use crate::domain::foundation::{DomainError, UserId};

/// Port for the identity provider's admin surface.
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Current custom claims of a user.
    ///
    /// Returns `None` if the identity provider has no such user.
    async fn get_custom_claims(
        &self,
        user_id: &UserId,
    ) -> Result<Option<Map<String, Value>>, DomainError>;

    /// Replaces the custom claims of a user.
    async fn set_custom_claims(
        &self,
        user_id: &UserId,
        claims: &Map<String, Value>,
    ) -> Result<(), DomainError>;
}
