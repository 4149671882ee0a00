//! Integration tests for the webhook HTTP surface.
//!
//! Drives the full router (authentication, ledger, normalization, state
//! transition, claims push) over the in-memory adapters.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use rust_decimal::Decimal;
use secrecy::SecretString;
use serde_json::value::RawValue;
use serde_json::{json, Map, Value};
use tower::ServiceExt;

use tucitasegura_billing::adapters::http::{billing_router, WebhookAppState};
use tucitasegura_billing::adapters::memory::{
    InMemoryBillingJournal, InMemoryBillingStore, InMemoryIdempotencyLedger,
    InMemoryIdentityProvider,
};
use tucitasegura_billing::application::handlers::billing::{
    ClaimsSynchronizer, EventNormalizer, PayPalVerification, ProcessWebhookCommand,
    ProcessWebhookHandler, StateTransitionEngine, WebhookAuthenticator, WebhookOutcome,
};
use tucitasegura_billing::domain::billing::{
    sign_payload, BillingUser, Currency, IdempotencyKey, Provider, StripeSignatureVerifier,
    StripeSubscription, SubscriptionStatus,
};
use tucitasegura_billing::domain::foundation::UserId;
use tucitasegura_billing::ports::{
    PayPalTransmission, PayPalWebhookVerifier, PaymentError, SubscriptionLookup, SystemClock,
};

const WEBHOOK_SECRET: &str = "whsec_integration";

// =============================================================================
// Test Infrastructure
// =============================================================================

/// Accepts PayPal deliveries whose transmission signature is "valid".
struct FakePayPalVerifier;

#[async_trait]
impl PayPalWebhookVerifier for FakePayPalVerifier {
    async fn verify(
        &self,
        transmission: &PayPalTransmission,
        _webhook_event: &RawValue,
    ) -> Result<bool, PaymentError> {
        Ok(transmission.transmission_sig == "valid")
    }
}

struct NoSubscriptions;

#[async_trait]
impl SubscriptionLookup for NoSubscriptions {
    async fn get_subscription(
        &self,
        _subscription_id: &str,
    ) -> Result<Option<StripeSubscription>, PaymentError> {
        Ok(None)
    }
}

struct TestApp {
    router: Router,
    processor: Arc<ProcessWebhookHandler>,
    store: Arc<InMemoryBillingStore>,
    ledger: Arc<InMemoryIdempotencyLedger>,
    journal: Arc<InMemoryBillingJournal>,
    identity: Arc<InMemoryIdentityProvider>,
}

impl TestApp {
    fn new() -> Self {
        let store = Arc::new(InMemoryBillingStore::new());
        let ledger = Arc::new(InMemoryIdempotencyLedger::new());
        let journal = Arc::new(InMemoryBillingJournal::new());
        let identity = Arc::new(InMemoryIdentityProvider::new());

        let processor = Arc::new(ProcessWebhookHandler::new(
            WebhookAuthenticator::new(
                StripeSignatureVerifier::new(SecretString::new(WEBHOOK_SECRET.to_string())),
                PayPalVerification::Remote(Arc::new(FakePayPalVerifier)),
                Arc::new(SystemClock),
            ),
            ledger.clone(),
            EventNormalizer::new(Arc::new(NoSubscriptions)),
            StateTransitionEngine::new(store.clone(), journal.clone()),
            ClaimsSynchronizer::new(identity.clone(), store.clone()),
        ));
        let router = billing_router(
            WebhookAppState::new(processor.clone()),
            Duration::from_secs(30),
        );

        Self {
            router,
            processor,
            store,
            ledger,
            journal,
            identity,
        }
    }

    /// Registers a user document and its identity account.
    fn with_user(self, user_id: &str) -> Self {
        self.store
            .seed(BillingUser::new(UserId::new(user_id).unwrap()));
        self.identity.add_account(user_id, Map::new());
        self
    }

    async fn post_stripe(&self, body: &Value) -> (StatusCode, Value) {
        let payload = serde_json::to_vec(body).unwrap();
        let signature = sign_payload(WEBHOOK_SECRET, chrono::Utc::now().timestamp(), &payload);
        self.send(
            Request::builder()
                .method("POST")
                .uri("/webhooks/stripe")
                .header("stripe-signature", signature)
                .header("content-type", "application/json")
                .body(Body::from(payload))
                .unwrap(),
        )
        .await
    }

    async fn post_paypal(&self, body: &Value, transmission_sig: &str) -> (StatusCode, Value) {
        self.send(
            Request::builder()
                .method("POST")
                .uri("/webhooks/paypal")
                .header("paypal-transmission-id", "tx-1")
                .header("paypal-transmission-time", "2024-01-01T00:00:00Z")
                .header("paypal-transmission-sig", transmission_sig)
                .header("paypal-cert-url", "https://api.paypal.com/v1/notifications/certs/x")
                .header("paypal-auth-algo", "SHA256withRSA")
                .header("content-type", "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
        )
        .await
    }

    async fn send(&self, request: Request<Body>) -> (StatusCode, Value) {
        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, body)
    }

    async fn user(&self, user_id: &str) -> BillingUser {
        self.store.get(user_id).await.unwrap()
    }
}

fn stripe_subscription_event(event_id: &str, event_type: &str, status: &str, user: Value) -> Value {
    json!({
        "id": event_id,
        "type": event_type,
        "data": { "object": {
            "id": "sub_123",
            "status": status,
            "current_period_start": 1_704_067_200,
            "current_period_end": 1_706_745_600,
            "cancel_at_period_end": false,
            "metadata": user,
            "items": { "data": [
                { "price": { "unit_amount": 2999, "currency": "eur" } }
            ]}
        }}
    })
}

fn received() -> Value {
    json!({ "received": true })
}

// =============================================================================
// Stripe
// =============================================================================

#[tokio::test]
async fn stripe_subscription_created_activates_and_pushes_claims() {
    let app = TestApp::new().with_user("user123");

    let (status, body) = app
        .post_stripe(&stripe_subscription_event(
            "evt_1",
            "customer.subscription.created",
            "active",
            json!({ "userId": "user123" }),
        ))
        .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, received());
    let user = app.user("user123").await;
    assert!(user.billing.has_active_subscription);
    assert_eq!(user.billing.subscription_status, SubscriptionStatus::Active);
    assert_eq!(user.billing.plan_amount, Some(Decimal::new(2999, 2)));
    let claims = app.identity.claims_of("user123").unwrap();
    assert_eq!(claims["hasActiveSubscription"], json!(true));
    assert_eq!(claims["role"], json!("regular"));
}

#[tokio::test]
async fn duplicate_delivery_mutates_and_pushes_once() {
    let app = TestApp::new().with_user("user123");
    let event = stripe_subscription_event(
        "evt_dup",
        "customer.subscription.created",
        "active",
        json!({ "userId": "user123" }),
    );

    let (first, _) = app.post_stripe(&event).await;
    let (second, body) = app.post_stripe(&event).await;

    assert_eq!(first, StatusCode::OK);
    assert_eq!(second, StatusCode::OK);
    assert_eq!(body, received());
    assert_eq!(app.identity.push_count(), 1);
    assert_eq!(app.ledger.len(), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn concurrent_duplicate_deliveries_mutate_once() {
    let app = TestApp::new().with_user("user123");
    let payload = serde_json::to_vec(&stripe_subscription_event(
        "evt_race",
        "customer.subscription.created",
        "active",
        json!({ "userId": "user123" }),
    ))
    .unwrap();
    let cmd = ProcessWebhookCommand::Stripe {
        signature: Some(sign_payload(
            WEBHOOK_SECRET,
            chrono::Utc::now().timestamp(),
            &payload,
        )),
        payload,
    };

    let first = tokio::spawn({
        let processor = app.processor.clone();
        let cmd = cmd.clone();
        async move { processor.handle(cmd).await }
    });
    let second = tokio::spawn({
        let processor = app.processor.clone();
        async move { processor.handle(cmd).await }
    });
    let (first, second) = tokio::join!(first, second);
    let outcomes = [first.unwrap().unwrap(), second.unwrap().unwrap()];

    let processed = outcomes
        .iter()
        .filter(|o| matches!(o, WebhookOutcome::Processed { .. }))
        .count();
    let duplicates = outcomes
        .iter()
        .filter(|o| **o == WebhookOutcome::AlreadyProcessed)
        .count();
    assert_eq!(processed, 1);
    assert_eq!(duplicates, 1);
    assert_eq!(app.journal.write_count(), 1);
    assert_eq!(app.identity.push_count(), 1);
    assert_eq!(app.ledger.len(), 1);
    assert!(app.user("user123").await.billing.has_active_subscription);
}

#[tokio::test]
async fn stripe_subscription_deleted_cancels() {
    let app = TestApp::new().with_user("user123");
    app.post_stripe(&stripe_subscription_event(
        "evt_1",
        "customer.subscription.created",
        "active",
        json!({ "userId": "user123" }),
    ))
    .await;

    let (status, _) = app
        .post_stripe(&stripe_subscription_event(
            "evt_2",
            "customer.subscription.deleted",
            "canceled",
            json!({ "userId": "user123" }),
        ))
        .await;

    assert_eq!(status, StatusCode::OK);
    let user = app.user("user123").await;
    assert!(!user.billing.has_active_subscription);
    assert_eq!(user.billing.subscription_status, SubscriptionStatus::Canceled);
    assert_eq!(
        app.identity.claims_of("user123").unwrap()["hasActiveSubscription"],
        json!(false)
    );
    let record = app.journal.subscription(Provider::Stripe, "sub_123").unwrap();
    assert_eq!(record.status, SubscriptionStatus::Canceled);
    assert!(record.plan.is_some());
}

#[tokio::test]
async fn stripe_insurance_payment_sets_insurance() {
    let app = TestApp::new().with_user("user123");

    let (status, _) = app
        .post_stripe(&json!({
            "id": "evt_ins",
            "type": "payment_intent.succeeded",
            "data": { "object": {
                "id": "pi_1",
                "amount": 12000,
                "currency": "eur",
                "metadata": { "userId": "user123", "paymentType": "insurance" }
            }}
        }))
        .await;

    assert_eq!(status, StatusCode::OK);
    let user = app.user("user123").await;
    assert!(user.billing.has_anti_ghosting_insurance);
    assert_eq!(user.billing.insurance_amount, Some(Decimal::new(12000, 2)));
    assert_eq!(user.billing.insurance_currency, Some(Currency::eur()));
    assert_eq!(
        app.identity.claims_of("user123").unwrap()["hasAntiGhostingInsurance"],
        json!(true)
    );
}

#[tokio::test]
async fn event_without_user_id_is_acknowledged_without_writes() {
    let app = TestApp::new().with_user("user123");
    let before = app.user("user123").await;

    let (status, body) = app
        .post_stripe(&stripe_subscription_event(
            "evt_anon",
            "customer.subscription.created",
            "active",
            json!({}),
        ))
        .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, received());
    assert_eq!(app.user("user123").await, before);
    assert_eq!(app.journal.write_count(), 0);
    assert_eq!(app.identity.push_count(), 0);
}

#[tokio::test]
async fn invalid_stripe_signature_is_rejected_without_trace() {
    let app = TestApp::new().with_user("user123");
    let payload = serde_json::to_vec(&stripe_subscription_event(
        "evt_forged",
        "customer.subscription.created",
        "active",
        json!({ "userId": "user123" }),
    ))
    .unwrap();
    let forged = sign_payload("whsec_wrong", chrono::Utc::now().timestamp(), &payload);

    let (status, body) = app
        .send(
            Request::builder()
                .method("POST")
                .uri("/webhooks/stripe")
                .header("stripe-signature", forged)
                .body(Body::from(payload))
                .unwrap(),
        )
        .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body, json!({ "error": "invalid_signature" }));
    assert!(app.ledger.is_empty());
    assert!(!app.user("user123").await.billing.has_active_subscription);
}

#[tokio::test]
async fn stale_stripe_timestamp_is_rejected() {
    let app = TestApp::new().with_user("user123");
    let payload = serde_json::to_vec(&json!({ "id": "evt_old", "type": "x", "data": { "object": {} } }))
        .unwrap();
    let signature = sign_payload(WEBHOOK_SECRET, chrono::Utc::now().timestamp() - 3600, &payload);

    let (status, _) = app
        .send(
            Request::builder()
                .method("POST")
                .uri("/webhooks/stripe")
                .header("stripe-signature", signature)
                .body(Body::from(payload))
                .unwrap(),
        )
        .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(app.ledger.is_empty());
}

#[tokio::test]
async fn missing_user_document_is_acknowledged_and_journaled() {
    let app = TestApp::new();

    let (status, _) = app
        .post_stripe(&stripe_subscription_event(
            "evt_ghost",
            "customer.subscription.created",
            "active",
            json!({ "userId": "ghost" }),
        ))
        .await;

    assert_eq!(status, StatusCode::OK);
    assert!(app.journal.subscription(Provider::Stripe, "sub_123").is_some());
    assert_eq!(app.identity.push_count(), 0);
}

#[tokio::test]
async fn unrelated_claims_survive_the_push() {
    let app = TestApp::new().with_user("user123");
    let mut existing = Map::new();
    existing.insert("betaTester".to_string(), json!(true));
    existing.insert("role".to_string(), json!("admin"));
    app.identity.add_account("user123", existing);

    app.post_stripe(&stripe_subscription_event(
        "evt_1",
        "customer.subscription.created",
        "active",
        json!({ "userId": "user123" }),
    ))
    .await;

    let claims = app.identity.claims_of("user123").unwrap();
    assert_eq!(claims["betaTester"], json!(true));
    assert_eq!(claims["role"], json!("admin"));
    assert_eq!(claims["hasActiveSubscription"], json!(true));
}

#[tokio::test]
async fn identity_outage_is_degraded_success() {
    let app = TestApp::new().with_user("user123");
    app.identity.set_unavailable(true);

    let (status, _) = app
        .post_stripe(&stripe_subscription_event(
            "evt_1",
            "customer.subscription.created",
            "active",
            json!({ "userId": "user123" }),
        ))
        .await;

    assert_eq!(status, StatusCode::OK);
    assert!(app.user("user123").await.billing.has_active_subscription);
}

// =============================================================================
// PayPal
// =============================================================================

#[tokio::test]
async fn paypal_sale_matches_stripe_insurance_amount() {
    let stripe = TestApp::new().with_user("user123");
    stripe
        .post_stripe(&json!({
            "id": "evt_ins",
            "type": "payment_intent.succeeded",
            "data": { "object": {
                "id": "pi_1",
                "amount": 12000,
                "currency": "eur",
                "metadata": { "userId": "user123", "paymentType": "insurance" }
            }}
        }))
        .await;

    let paypal = TestApp::new().with_user("user123");
    let (status, body) = paypal
        .post_paypal(
            &json!({
                "id": "WH-SALE-1",
                "event_type": "PAYMENT.SALE.COMPLETED",
                "resource": {
                    "id": "SALE-1",
                    "custom": "user123",
                    "description": "insurance",
                    "amount": { "total": "120.00", "currency": "EUR" }
                }
            }),
            "valid",
        )
        .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, received());
    let from_paypal = paypal.user("user123").await.billing;
    let from_stripe = stripe.user("user123").await.billing;
    assert_eq!(from_paypal.insurance_amount, Some(Decimal::new(12000, 2)));
    assert_eq!(from_paypal.insurance_amount, from_stripe.insurance_amount);
    assert_eq!(from_paypal.insurance_currency, from_stripe.insurance_currency);
}

#[tokio::test]
async fn paypal_subscription_activation_uses_default_plan() {
    let app = TestApp::new().with_user("user123");

    let (status, _) = app
        .post_paypal(
            &json!({
                "id": "WH-SUB-1",
                "event_type": "BILLING.SUBSCRIPTION.ACTIVATED",
                "create_time": "2024-01-01T00:00:00Z",
                "resource": { "id": "I-SUB1", "status": "ACTIVE", "custom_id": "user123" }
            }),
            "valid",
        )
        .await;

    assert_eq!(status, StatusCode::OK);
    let user = app.user("user123").await;
    assert_eq!(user.billing.subscription_provider, Some(Provider::Paypal));
    assert_eq!(user.billing.plan_amount, Some(Decimal::new(2999, 2)));
}

#[tokio::test]
async fn paypal_failed_verification_is_rejected_without_trace() {
    let app = TestApp::new().with_user("user123");

    let (status, body) = app
        .post_paypal(
            &json!({
                "id": "WH-FORGED",
                "event_type": "BILLING.SUBSCRIPTION.ACTIVATED",
                "resource": { "id": "I-SUB1", "status": "ACTIVE", "custom_id": "user123" }
            }),
            "forged",
        )
        .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body, json!({ "error": "invalid_signature" }));
    assert!(app.ledger.is_empty());
    assert!(!app.user("user123").await.billing.has_active_subscription);
}

#[tokio::test]
async fn paypal_envelope_without_id_is_keyed_by_body_digest() {
    let app = TestApp::new().with_user("user123");
    let event = json!({
        "event_type": "BILLING.SUBSCRIPTION.CANCELLED",
        "resource": { "id": "I-SUB1", "custom_id": "user123" }
    });

    app.post_paypal(&event, "valid").await;
    app.post_paypal(&event, "valid").await;

    assert_eq!(app.ledger.len(), 1);
    let key = IdempotencyKey::from_body_digest(Provider::Paypal, event.to_string().as_bytes());
    assert!(app.ledger.record(&key).is_some());
}
