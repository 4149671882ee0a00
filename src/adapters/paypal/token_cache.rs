//! PayPal OAuth token source with expiry-checked caching.
//!
//! One token is shared by all requests of the process. It is refreshed when
//! it is within `EXPIRY_SKEW_SECS` of expiring, or when a caller reports it
//! was rejected.

use std::sync::Arc;

use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use tokio::sync::Mutex;
use tracing::debug;

use crate::domain::foundation::Timestamp;
use crate::ports::{Clock, PaymentError};

/// Tokens are refreshed this long before PayPal would expire them.
const EXPIRY_SKEW_SECS: i64 = 60;

#[derive(Debug, Clone)]
struct CachedToken {
    access_token: SecretString,
    expires_at: Timestamp,
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_in: i64,
}

pub struct PayPalTokenSource {
    http_client: reqwest::Client,
    api_base_url: String,
    client_id: String,
    secret: SecretString,
    clock: Arc<dyn Clock>,
    cached: Mutex<Option<CachedToken>>,
}

impl PayPalTokenSource {
    pub fn new(
        http_client: reqwest::Client,
        api_base_url: impl Into<String>,
        client_id: impl Into<String>,
        secret: SecretString,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            http_client,
            api_base_url: api_base_url.into(),
            client_id: client_id.into(),
            secret,
            clock,
            cached: Mutex::new(None),
        }
    }

    /// Returns a valid access token, fetching a new one if needed.
    ///
    /// The lock is held across the fetch so concurrent callers share one
    /// refresh.
    pub async fn access_token(&self) -> Result<SecretString, PaymentError> {
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

    /// Drops the cached token after PayPal rejected it.
    pub async fn invalidate(&self) {
        *self.cached.lock().await = None;
    }

    async fn fetch(&self, now: Timestamp) -> Result<CachedToken, PaymentError> {
        let url = format!("{}/v1/oauth2/token", self.api_base_url);

        let response = self
            .http_client
            .post(&url)
            .basic_auth(&self.client_id, Some(self.secret.expose_secret()))
            .form(&[("grant_type", "client_credentials")])
            .send()
            .await
            .map_err(|e| PaymentError::network(e.to_string()))?;

        let status = response.status();
        if status == reqwest::StatusCode::UNAUTHORIZED {
            return Err(PaymentError::authentication(
                "PayPal rejected the client credentials",
            ));
        }
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(PaymentError::provider(format!(
                "PayPal OAuth error ({}): {}",
                status, error_text
            )));
        }

        let body: TokenResponse = response.json().await.map_err(|e| {
            PaymentError::invalid_response(format!("Failed to parse PayPal token: {}", e))
        })?;

        debug!(expires_in = body.expires_in, "PayPal access token refreshed");

        Ok(CachedToken {
            access_token: SecretString::new(body.access_token),
            expires_at: now.plus_secs(body.expires_in),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::Mutex as StdMutex;
    use wiremock::matchers::{body_string_contains, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    struct ManualClock(StdMutex<Timestamp>);

    impl ManualClock {
        fn at(secs: i64) -> Self {
            Self(StdMutex::new(Timestamp::from_unix_secs(secs).unwrap()))
        }

        fn advance(&self, secs: i64) {
            let mut now = self.0.lock().unwrap();
            *now = now.plus_secs(secs);
        }
    }

    impl Clock for ManualClock {
        fn now(&self) -> Timestamp {
            *self.0.lock().unwrap()
        }
    }

    async fn token_server(expires_in: i64) -> MockServer {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/oauth2/token"))
            .and(body_string_contains("grant_type=client_credentials"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "access_token": "A21AA-token",
                "token_type": "Bearer",
                "expires_in": expires_in
            })))
            .mount(&server)
            .await;
        server
    }

    fn source(server: &MockServer, clock: Arc<ManualClock>) -> PayPalTokenSource {
        PayPalTokenSource::new(
            reqwest::Client::new(),
            server.uri(),
            "client-id",
            SecretString::new("client-secret".to_string()),
            clock,
        )
    }

    #[tokio::test]
    async fn caches_token_until_near_expiry() {
        let server = token_server(3600).await;
        let clock = Arc::new(ManualClock::at(1_700_000_000));
        let tokens = source(&server, clock.clone());

        let first = tokens.access_token().await.unwrap();
        clock.advance(3000);
        tokens.access_token().await.unwrap();

        assert_eq!(first.expose_secret(), "A21AA-token");
        assert_eq!(server.received_requests().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn refreshes_inside_expiry_skew() {
        let server = token_server(3600).await;
        let clock = Arc::new(ManualClock::at(1_700_000_000));
        let tokens = source(&server, clock.clone());

        tokens.access_token().await.unwrap();
        clock.advance(3600 - EXPIRY_SKEW_SECS);
        tokens.access_token().await.unwrap();

        assert_eq!(server.received_requests().await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn invalidate_forces_refresh() {
        let server = token_server(3600).await;
        let tokens = source(&server, Arc::new(ManualClock::at(1_700_000_000)));

        tokens.access_token().await.unwrap();
        tokens.invalidate().await;
        tokens.access_token().await.unwrap();

        assert_eq!(server.received_requests().await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn rejected_credentials_are_authentication_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/oauth2/token"))
            .respond_with(ResponseTemplate::new(401))
            .mount(&server)
            .await;
        let tokens = source(&server, Arc::new(ManualClock::at(1_700_000_000)));

        let err = tokens.access_token().await.unwrap_err();

        assert_eq!(err.code, crate::ports::PaymentErrorCode::AuthenticationError);
    }
}
