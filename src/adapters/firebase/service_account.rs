//! Google service-account token source.
//!
//! Signs an RS256 JWT assertion with the service account key and exchanges
//! it at the OAuth token endpoint (`jwt-bearer` grant). Tokens are cached
//! until shortly before they expire.

use std::sync::Arc;

use async_trait::async_trait;
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::debug;

use crate::domain::foundation::{DomainError, ErrorCode, Timestamp};
use crate::ports::Clock;

const JWT_BEARER_GRANT: &str = "urn:ietf:params:oauth:grant-type:jwt-bearer";
const SCOPES: &str =
    "https://www.googleapis.com/auth/identitytoolkit https://www.googleapis.com/auth/cloud-platform";
const ASSERTION_LIFETIME_SECS: i64 = 3600;
const EXPIRY_SKEW_SECS: i64 = 60;

/// Source of bearer tokens for Google APIs.
#[async_trait]
pub trait AccessTokenSource: Send + Sync {
    async fn access_token(&self) -> Result<SecretString, DomainError>;
}

#[derive(Debug, Serialize)]
struct AssertionClaims<'a> {
    iss: &'a str,
    scope: &'a str,
    aud: &'a str,
    iat: i64,
    exp: i64,
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_in: i64,
}

struct CachedToken {
    access_token: SecretString,
    expires_at: Timestamp,
}

pub struct ServiceAccountTokenSource {
    http_client: reqwest::Client,
    client_email: String,
    token_uri: String,
    signing_key: EncodingKey,
    clock: Arc<dyn Clock>,
    cached: Mutex<Option<CachedToken>>,
}

impl ServiceAccountTokenSource {
    /// Builds a token source from the PEM-encoded service account key.
    pub fn new(
        http_client: reqwest::Client,
        client_email: impl Into<String>,
        private_key_pem: &SecretString,
        token_uri: impl Into<String>,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, DomainError> {
        let signing_key = EncodingKey::from_rsa_pem(private_key_pem.expose_secret().as_bytes())
            .map_err(|e| {
                DomainError::new(
                    ErrorCode::IdentityProviderError,
                    format!("Invalid service account private key: {}", e),
                )
            })?;

        Ok(Self {
            http_client,
            client_email: client_email.into(),
            token_uri: token_uri.into(),
            signing_key,
            clock,
            cached: Mutex::new(None),
        })
    }

    fn sign_assertion(&self, now: Timestamp) -> Result<String, DomainError> {
        let iat = now.as_unix_secs();
        let claims = AssertionClaims {
            iss: &self.client_email,
            scope: SCOPES,
            aud: &self.token_uri,
            iat,
            exp: iat + ASSERTION_LIFETIME_SECS,
        };

        encode(&Header::new(Algorithm::RS256), &claims, &self.signing_key).map_err(|e| {
            DomainError::new(
                ErrorCode::IdentityProviderError,
                format!("Failed to sign service account assertion: {}", e),
            )
        })
    }

    async fn fetch(&self, now: Timestamp) -> Result<CachedToken, DomainError> {
        let assertion = self.sign_assertion(now)?;

        let response = self
            .http_client
            .post(&self.token_uri)
            .form(&[("grant_type", JWT_BEARER_GRANT), ("assertion", assertion.as_str())])
            .send()
            .await
            .map_err(|e| identity_error(format!("Token endpoint unreachable: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(identity_error(format!(
                "Token endpoint returned {}: {}",
                status, error_text
            )));
        }

        let body: TokenResponse = response
            .json()
            .await
            .map_err(|e| identity_error(format!("Failed to parse token response: {}", e)))?;

        debug!(expires_in = body.expires_in, "Service account token refreshed");

        Ok(CachedToken {
            access_token: SecretString::new(body.access_token),
            expires_at: now.plus_secs(body.expires_in),
        })
    }
}

#[async_trait]
impl AccessTokenSource for ServiceAccountTokenSource {
    async fn access_token(&self) -> Result<SecretString, DomainError> {
        let mut cached = self.cached.lock().await;
        let now = self.clock.now();

        if let Some(token) = cached.as_ref() {
            if now < token.expires_at.plus_secs(-EXPIRY_SKEW_SECS) {
                return Ok(token.access_token.clone());
            }
        }

        let fresh = self.fetch(now).await?;
        let token = fresh.access_token.clone();
        *cached = Some(fresh);
        Ok(token)
    }
}

pub(super) fn identity_error(message: impl Into<String>) -> DomainError {
    DomainError::new(ErrorCode::IdentityProviderError, message)
}
