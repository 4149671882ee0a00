//! TuCitaSegura Billing service entry point.

use std::error::Error;
use std::sync::Arc;

use secrecy::ExposeSecret;
use tokio::signal;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use tucitasegura_billing::adapters::http::{billing_router, WebhookAppState};
use tucitasegura_billing::adapters::{
    FirebaseIdentityProvider, PayPalSignatureVerifier, PayPalTokenSource, PayPalVerifierConfig,
    PostgresBillingJournal, PostgresBillingStateRepository, PostgresIdempotencyLedger,
    ServiceAccountTokenSource, StripeConfig, StripeSubscriptionClient,
};
use tucitasegura_billing::application::handlers::billing::{
    ClaimsSynchronizer, EventNormalizer, PayPalVerification, ProcessWebhookHandler,
    StateTransitionEngine, WebhookAuthenticator,
};
use tucitasegura_billing::config::{AppConfig, ServerConfig};
use tucitasegura_billing::domain::billing::StripeSignatureVerifier;
use tucitasegura_billing::ports::{Clock, SystemClock};

fn init_tracing(server: &ServerConfig) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&server.log_level));

    if server.is_production() {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_current_span(false)
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received, draining in-flight webhooks");
}

fn paypal_verification(
    config: &AppConfig,
    clock: Arc<dyn Clock>,
) -> Result<PayPalVerification, Box<dyn Error>> {
    let paypal = &config.paypal;

    if config.paypal_bypass_effective() {
        warn!("PayPal signature verification is bypassed (test environment)");
        return Ok(PayPalVerification::Bypass);
    }
    if paypal.skip_signature_verification {
        warn!(
            environment = ?config.server.environment,
            "PayPal skip_signature_verification is set but ignored outside the test environment"
        );
    }

    let http = reqwest::Client::builder().timeout(paypal.timeout()).build()?;
    let tokens = Arc::new(PayPalTokenSource::new(
        http.clone(),
        paypal.api_base_url(),
        paypal.client_id.clone(),
        paypal.secret.clone(),
        clock,
    ));
    let verifier = PayPalSignatureVerifier::new(
        http,
        tokens,
        PayPalVerifierConfig {
            api_base_url: paypal.api_base_url().to_string(),
            webhook_id: paypal.webhook_id.clone(),
            max_attempts: paypal.max_verify_attempts,
            retry_backoff: paypal.retry_backoff(),
        },
    );

    info!(mode = ?paypal.mode, "PayPal remote signature verification enabled");
    Ok(PayPalVerification::Remote(Arc::new(verifier)))
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    let config = AppConfig::load().map_err(|e| {
        eprintln!("Failed to load configuration: {}", e);
        e
    })?;
    config.validate().map_err(|e| {
        eprintln!("Invalid configuration: {}", e);
        e
    })?;

    init_tracing(&config.server);
    info!(
        version = env!("CARGO_PKG_VERSION"),
        environment = ?config.server.environment,
        stripe_test_mode = config.payment.is_test_mode(),
        "Starting tucitasegura-billing"
    );

    // Persistence
    let pool = config
        .database
        .pool_options()
        .connect(config.database.url.expose_secret())
        .await?;
    if config.database.run_migrations {
        sqlx::migrate!("./migrations").run(&pool).await?;
        info!("Database migrations applied");
    }

    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let repository = Arc::new(PostgresBillingStateRepository::new(pool.clone()));
    let ledger = Arc::new(
        PostgresIdempotencyLedger::new(pool.clone()).with_lease(config.database.ledger_lease()),
    );
    let journal = Arc::new(PostgresBillingJournal::new(pool));

    // Providers
    let stripe_lookup = StripeSubscriptionClient::new(
        StripeConfig::new(config.payment.stripe_api_key.clone())
            .with_base_url(config.payment.stripe_api_base_url.clone())
            .with_timeout(config.payment.lookup_timeout()),
    )?;
    let stripe_verifier =
        StripeSignatureVerifier::new(config.payment.stripe_webhook_secret.clone())
            .with_tolerance_secs(config.payment.stripe_signature_tolerance_secs);
    let paypal = paypal_verification(&config, clock.clone())?;

    // Identity
    let identity_http = reqwest::Client::builder()
        .timeout(config.identity.timeout())
        .build()?;
    let service_account = ServiceAccountTokenSource::new(
        identity_http.clone(),
        config.identity.service_account_email.clone(),
        &config.identity.private_key_pem(),
        config.identity.token_uri.clone(),
        clock.clone(),
    )?;
    let identity = Arc::new(
        FirebaseIdentityProvider::new(
            identity_http,
            config.identity.project_id.clone(),
            Arc::new(service_account),
        )
        .with_base_url(config.identity.api_base_url.clone()),
    );

    let processor = ProcessWebhookHandler::new(
        WebhookAuthenticator::new(stripe_verifier, paypal, clock),
        ledger,
        EventNormalizer::new(Arc::new(stripe_lookup)),
        StateTransitionEngine::new(repository.clone(), journal),
        ClaimsSynchronizer::new(identity, repository),
    );

    let app = billing_router(
        WebhookAppState::new(Arc::new(processor)),
        config.server.request_timeout(),
    );

    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(%addr, "Listening for webhooks");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server stopped");
    Ok(())
}
