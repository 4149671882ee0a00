//! Firebase Auth custom claims over the Identity Toolkit REST API.
//!
//! Custom claims travel as a JSON-encoded string in `customAttributes`.

use std::sync::Arc;

use async_trait::async_trait;
use secrecy::ExposeSecret;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::service_account::{identity_error, AccessTokenSource};
use crate::domain::foundation::{DomainError, UserId};
use crate::ports::IdentityProvider;

const DEFAULT_API_BASE_URL: &str = "https://identitytoolkit.googleapis.com";

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct LookupRequest<'a> {
    local_id: [&'a str; 1],
}

#[derive(Deserialize)]
struct LookupResponse {
    #[serde(default)]
    users: Vec<AccountInfo>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct AccountInfo {
    #[serde(default)]
    custom_attributes: Option<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct UpdateRequest<'a> {
    local_id: &'a str,
    custom_attributes: String,
}

pub struct FirebaseIdentityProvider {
    http_client: reqwest::Client,
    api_base_url: String,
    project_id: String,
    tokens: Arc<dyn AccessTokenSource>,
}

impl FirebaseIdentityProvider {
    pub fn new(
        http_client: reqwest::Client,
        project_id: impl Into<String>,
        tokens: Arc<dyn AccessTokenSource>,
    ) -> Self {
        Self {
            http_client,
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
            project_id: project_id.into(),
            tokens,
        }
    }

    /// Set a custom API base URL (for testing or the Auth emulator).
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.api_base_url = url.into().trim_end_matches('/').to_string();
        self
    }

    fn accounts_url(&self, operation: &str) -> String {
        format!(
            "{}/v1/projects/{}/accounts:{}",
            self.api_base_url, self.project_id, operation
        )
    }

    async fn post<T: Serialize>(
        &self,
        operation: &str,
        body: &T,
    ) -> Result<reqwest::Response, DomainError> {
        let token = self.tokens.access_token().await?;

        let response = self
            .http_client
            .post(self.accounts_url(operation))
            .bearer_auth(token.expose_secret())
            .json(body)
            .send()
            .await
            .map_err(|e| identity_error(format!("Identity Toolkit unreachable: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(identity_error(format!(
                "accounts:{} returned {}: {}",
                operation, status, error_text
            )));
        }
        Ok(response)
    }
}

#[async_trait]
impl IdentityProvider for FirebaseIdentityProvider {
    async fn get_custom_claims(
        &self,
        user_id: &UserId,
    ) -> Result<Option<Map<String, Value>>, DomainError> {
        let response = self
            .post(
                "lookup",
                &LookupRequest {
                    local_id: [user_id.as_str()],
                },
            )
            .await?;

        let body: LookupResponse = response
            .json()
            .await
            .map_err(|e| identity_error(format!("Failed to parse accounts:lookup: {}", e)))?;

        let Some(account) = body.users.into_iter().next() else {
            return Ok(None);
        };

        let claims = match account.custom_attributes.as_deref() {
            None | Some("") => Map::new(),
            Some(raw) => serde_json::from_str(raw)
                .map_err(|e| identity_error(format!("Malformed customAttributes: {}", e)))?,
        };
        Ok(Some(claims))
    }

    async fn set_custom_claims(
        &self,
        user_id: &UserId,
        claims: &Map<String, Value>,
    ) -> Result<(), DomainError> {
        let custom_attributes = serde_json::to_string(claims)
            .map_err(|e| identity_error(format!("Failed to encode claims: {}", e)))?;

        self.post(
            "update",
            &UpdateRequest {
                local_id: user_id.as_str(),
                custom_attributes,
            },
        )
        .await?;
        Ok(())
    }
}
