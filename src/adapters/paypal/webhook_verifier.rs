//! PayPal webhook signature verification via the REST API.
//!
//! `POST /v1/notifications/verify-webhook-signature` with the transmission
//! headers, the configured webhook id, and the event body. Transport
//! failures and 5xx responses are retried with a linear backoff; a `401`
//! refreshes the OAuth token once.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use secrecy::ExposeSecret;
use serde::{Deserialize, Serialize};
use serde_json::value::RawValue;
use tracing::{debug, warn};

use super::token_cache::PayPalTokenSource;
use crate::ports::{PayPalTransmission, PayPalWebhookVerifier, PaymentError};

const VERIFIED: &str = "SUCCESS";

#[derive(Serialize)]
struct VerifyRequest<'a> {
    auth_algo: &'a str,
    cert_url: &'a str,
    transmission_id: &'a str,
    transmission_sig: &'a str,
    transmission_time: &'a str,
    webhook_id: &'a str,
    webhook_event: &'a RawValue,
}

#[derive(Deserialize)]
struct VerifyResponse {
    verification_status: String,
}

/// Verifier settings.
#[derive(Debug, Clone)]
pub struct PayPalVerifierConfig {
    pub api_base_url: String,
    pub webhook_id: String,
    pub max_attempts: u32,
    pub retry_backoff: Duration,
}

pub struct PayPalSignatureVerifier {
    http_client: reqwest::Client,
    tokens: Arc<PayPalTokenSource>,
    config: PayPalVerifierConfig,
}

enum Attempt {
    Done(Result<bool, PaymentError>),
    Retry(PaymentError),
    Unauthorized,
}

impl PayPalSignatureVerifier {
    pub fn new(
        http_client: reqwest::Client,
        tokens: Arc<PayPalTokenSource>,
        config: PayPalVerifierConfig,
    ) -> Self {
        Self {
            http_client,
            tokens,
            config,
        }
    }

    async fn attempt(
        &self,
        transmission: &PayPalTransmission,
        webhook_event: &RawValue,
    ) -> Attempt {
        let token = match self.tokens.access_token().await {
            Ok(token) => token,
            Err(e) if e.retryable => return Attempt::Retry(e),
            Err(e) => return Attempt::Done(Err(e)),
        };

        let url = format!(
            "{}/v1/notifications/verify-webhook-signature",
            self.config.api_base_url
        );
        let request = VerifyRequest {
            auth_algo: &transmission.auth_algo,
            cert_url: &transmission.cert_url,
            transmission_id: &transmission.transmission_id,
            transmission_sig: &transmission.transmission_sig,
            transmission_time: &transmission.transmission_time,
            webhook_id: &self.config.webhook_id,
            webhook_event,
        };

        let response = match self
            .http_client
            .post(&url)
            .bearer_auth(token.expose_secret())
            .json(&request)
            .send()
            .await
        {
            Ok(response) => response,
            Err(e) => return Attempt::Retry(PaymentError::network(e.to_string())),
        };

        let status = response.status();
        if status == reqwest::StatusCode::UNAUTHORIZED {
            return Attempt::Unauthorized;
        }
        if status.is_server_error() {
            return Attempt::Retry(PaymentError::provider(format!(
                "PayPal verification returned {}",
                status
            )));
        }
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Attempt::Done(Err(PaymentError::invalid_response(format!(
                "PayPal verification rejected ({}): {}",
                status, error_text
            ))));
        }

        let result = response
            .json::<VerifyResponse>()
            .await
            .map(|body| body.verification_status == VERIFIED)
            .map_err(|e| {
                PaymentError::invalid_response(format!("Failed to parse verification reply: {}", e))
            });
        Attempt::Done(result)
    }
}

#[async_trait]
impl PayPalWebhookVerifier for PayPalSignatureVerifier {
    async fn verify(
        &self,
        transmission: &PayPalTransmission,
        webhook_event: &RawValue,
    ) -> Result<bool, PaymentError> {
        let max_attempts = self.config.max_attempts.max(1);
        let mut refreshed = false;
        let mut attempt = 1;

        loop {
            match self.attempt(transmission, webhook_event).await {
                Attempt::Done(result) => {
                    if let Ok(verified) = result {
                        debug!(
                            transmission_id = %transmission.transmission_id,
                            verified,
                            "PayPal signature verification completed"
                        );
                    }
                    return result;
                }
                Attempt::Unauthorized if !refreshed => {
                    debug!("PayPal rejected the access token, refreshing");
                    self.tokens.invalidate().await;
                    refreshed = true;
                }
                Attempt::Unauthorized => {
                    return Err(PaymentError::authentication(
                        "PayPal rejected a freshly issued access token",
                    ));
                }
                Attempt::Retry(e) if attempt < max_attempts => {
                    warn!(
                        transmission_id = %transmission.transmission_id,
                        attempt,
                        error = %e,
                        "PayPal verification attempt failed, retrying"
                    );
                    tokio::time::sleep(self.config.retry_backoff * attempt).await;
                    attempt += 1;
                }
                Attempt::Retry(e) => return Err(e),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::foundation::Timestamp;
    use crate::ports::{Clock, PaymentErrorCode};
    use secrecy::SecretString;
    use serde_json::json;
    use wiremock::matchers::{body_partial_json, body_string_contains, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    struct FixedClock;

    impl Clock for FixedClock {
        fn now(&self) -> Timestamp {
            Timestamp::from_unix_secs(1_700_000_000).unwrap()
        }
    }

    async fn mount_token(server: &MockServer) {
        Mock::given(method("POST"))
            .and(path("/v1/oauth2/token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "access_token": "A21AA-token",
                "expires_in": 32400
            })))
            .mount(server)
            .await;
    }

    fn verifier(server: &MockServer, max_attempts: u32) -> PayPalSignatureVerifier {
        let http = reqwest::Client::new();
        let tokens = Arc::new(PayPalTokenSource::new(
            http.clone(),
            server.uri(),
            "client-id",
            SecretString::new("client-secret".to_string()),
            Arc::new(FixedClock),
        ));
        PayPalSignatureVerifier::new(
            http,
            tokens,
            PayPalVerifierConfig {
                api_base_url: server.uri(),
                webhook_id: "WH-CONFIG-1".to_string(),
                max_attempts,
                retry_backoff: Duration::from_millis(1),
            },
        )
    }

    fn transmission() -> PayPalTransmission {
        PayPalTransmission {
            transmission_id: "tx-1".to_string(),
            transmission_time: "2024-01-01T00:00:00Z".to_string(),
            transmission_sig: "sig".to_string(),
            cert_url: "https://api.paypal.com/cert".to_string(),
            auth_algo: "SHA256withRSA".to_string(),
        }
    }

    fn event() -> Box<RawValue> {
        RawValue::from_string(r#"{"id":"WH-1","event_type":"PAYMENT.SALE.COMPLETED"}"#.to_string())
            .unwrap()
    }

    // ══════════════════════════════════════════════════════════════
    // Verification Tests
    // ══════════════════════════════════════════════════════════════

    #[tokio::test]
    async fn success_status_verifies() {
        let server = MockServer::start().await;
        mount_token(&server).await;
        Mock::given(method("POST"))
            .and(path("/v1/notifications/verify-webhook-signature"))
            .and(header("authorization", "Bearer A21AA-token"))
            .and(body_partial_json(json!({
                "webhook_id": "WH-CONFIG-1",
                "transmission_id": "tx-1",
                "webhook_event": { "id": "WH-1" }
            })))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({ "verification_status": "SUCCESS" })),
            )
            .mount(&server)
            .await;

        let verified = verifier(&server, 3).verify(&transmission(), &event()).await.unwrap();

        assert!(verified);
    }

    #[tokio::test]
    async fn event_body_is_forwarded_verbatim() {
        let server = MockServer::start().await;
        mount_token(&server).await;
        let raw = r#"{"id":"WH-1","event_type":"PAYMENT.SALE.COMPLETED","resource":{"total":1.10}}"#;
        Mock::given(method("POST"))
            .and(path("/v1/notifications/verify-webhook-signature"))
            .and(body_string_contains(format!("\"webhook_event\":{}", raw)))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({ "verification_status": "SUCCESS" })),
            )
            .expect(1)
            .mount(&server)
            .await;
        let event = RawValue::from_string(raw.to_string()).unwrap();

        let verified = verifier(&server, 1).verify(&transmission(), &event).await.unwrap();

        assert!(verified);
    }

    #[tokio::test]
    async fn failure_status_does_not_verify() {
        let server = MockServer::start().await;
        mount_token(&server).await;
        Mock::given(method("POST"))
            .and(path("/v1/notifications/verify-webhook-signature"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({ "verification_status": "FAILURE" })),
            )
            .mount(&server)
            .await;

        let verified = verifier(&server, 3).verify(&transmission(), &event()).await.unwrap();

        assert!(!verified);
    }

    #[tokio::test]
    async fn server_errors_are_retried_then_surface() {
        let server = MockServer::start().await;
        mount_token(&server).await;
        Mock::given(method("POST"))
            .and(path("/v1/notifications/verify-webhook-signature"))
            .respond_with(ResponseTemplate::new(503))
            .expect(3)
            .mount(&server)
            .await;

        let err = verifier(&server, 3)
            .verify(&transmission(), &event())
            .await
            .unwrap_err();

        assert_eq!(err.code, PaymentErrorCode::ProviderError);
    }

    #[tokio::test]
    async fn retry_recovers_after_transient_error() {
        let server = MockServer::start().await;
        mount_token(&server).await;
        Mock::given(method("POST"))
            .and(path("/v1/notifications/verify-webhook-signature"))
            .respond_with(ResponseTemplate::new(502))
            .up_to_n_times(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/v1/notifications/verify-webhook-signature"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({ "verification_status": "SUCCESS" })),
            )
            .mount(&server)
            .await;

        let verified = verifier(&server, 3).verify(&transmission(), &event()).await.unwrap();

        assert!(verified);
    }

    #[tokio::test]
    async fn unauthorized_refreshes_token_once() {
        let server = MockServer::start().await;
        mount_token(&server).await;
        Mock::given(method("POST"))
            .and(path("/v1/notifications/verify-webhook-signature"))
            .respond_with(ResponseTemplate::new(401))
            .up_to_n_times(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/v1/notifications/verify-webhook-signature"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({ "verification_status": "SUCCESS" })),
            )
            .mount(&server)
            .await;

        let verified = verifier(&server, 1).verify(&transmission(), &event()).await.unwrap();

        assert!(verified);
        let token_calls = server
            .received_requests()
            .await
            .unwrap()
            .iter()
            .filter(|r| r.url.path() == "/v1/oauth2/token")
            .count();
        assert_eq!(token_calls, 2);
    }

    #[tokio::test]
    async fn persistent_unauthorized_is_authentication_error() {
        let server = MockServer::start().await;
        mount_token(&server).await;
        Mock::given(method("POST"))
            .and(path("/v1/notifications/verify-webhook-signature"))
            .respond_with(ResponseTemplate::new(401))
            .mount(&server)
            .await;

        let err = verifier(&server, 3)
            .verify(&transmission(), &event())
            .await
            .unwrap_err();

        assert_eq!(err.code, PaymentErrorCode::AuthenticationError);
    }

    #[tokio::test]
    async fn client_error_is_not_retried() {
        let server = MockServer::start().await;
        mount_token(&server).await;
        Mock::given(method("POST"))
            .and(path("/v1/notifications/verify-webhook-signature"))
            .respond_with(ResponseTemplate::new(400).set_body_string("INVALID_REQUEST"))
            .expect(1)
            .mount(&server)
            .await;

        let err = verifier(&server, 3)
            .verify(&transmission(), &event())
            .await
            .unwrap_err();

        assert_eq!(err.code, PaymentErrorCode::InvalidResponse);
    }
}
