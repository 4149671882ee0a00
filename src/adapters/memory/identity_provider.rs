//! In-memory identity provider holding custom claims per account.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use serde_json::{Map, Value};

use crate::domain::foundation::{DomainError, ErrorCode, UserId};
use crate::ports::IdentityProvider;

#[derive(Default)]
pub struct InMemoryIdentityProvider {
    accounts: Mutex<HashMap<String, Map<String, Value>>>,
    push_count: Mutex<usize>,
    unavailable: Mutex<bool>,
}

impl InMemoryIdentityProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers an account with the given claims.
    pub fn add_account(&self, user_id: &str, claims: Map<String, Value>) {
        self.accounts
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(user_id.to_string(), claims);
    }

    pub fn claims_of(&self, user_id: &str) -> Option<Map<String, Value>> {
        self.accounts
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .get(user_id)
            .cloned()
    }

    /// Number of successful `set_custom_claims` calls.
    pub fn push_count(&self) -> usize {
        *self.push_count.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Makes every call fail with an identity provider error.
    pub fn set_unavailable(&self, unavailable: bool) {
        *self.unavailable.lock().unwrap_or_else(|e| e.into_inner()) = unavailable;
    }

    fn check_available(&self) -> Result<(), DomainError> {
        if *self.unavailable.lock().unwrap_or_else(|e| e.into_inner()) {
            return Err(DomainError::new(
                ErrorCode::IdentityProviderError,
                "Identity provider unavailable",
            ));
        }
        Ok(())
    }
}

#[async_trait]
impl IdentityProvider for InMemoryIdentityProvider {
    async fn get_custom_claims(
        &self,
        user_id: &UserId,
    ) -> Result<Option<Map<String, Value>>, DomainError> {
        self.check_available()?;
        Ok(self.claims_of(user_id.as_str()))
    }

    async fn set_custom_claims(
        &self,
        user_id: &UserId,
        claims: &Map<String, Value>,
    ) -> Result<(), DomainError> {
        self.check_available()?;
        let mut accounts = self.accounts.lock().unwrap_or_else(|e| e.into_inner());
        let Some(account) = accounts.get_mut(user_id.as_str()) else {
            return Err(DomainError::new(
                ErrorCode::IdentityProviderError,
                format!("No identity account for {}", user_id),
            ));
        };
        *account = claims.clone();
        *self.push_count.lock().unwrap_or_else(|e| e.into_inner()) += 1;
        Ok(())
    }
}
