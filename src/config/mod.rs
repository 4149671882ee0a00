//! Application configuration module
//!
//! Type-safe configuration loaded from environment variables using the
//! `config` and `dotenvy` crates. Variables use the `TUCITASEGURA_BILLING`
//! prefix and `__` between nested keys.
//!
//! # Example
//!
//! ```no_run
//! use tucitasegura_billing::config::AppConfig;
//!
//! let config = AppConfig::load().expect("Failed to load configuration");
//! config.validate().expect("Invalid configuration");
//! ```

mod database;
mod error;
mod identity;
mod payment;
mod paypal;
mod server;

pub use database::DatabaseConfig;
pub use error::{ConfigError, ValidationError};
pub use identity::IdentityConfig;
pub use payment::PaymentConfig;
pub use paypal::{PayPalConfig, PayPalMode};
pub use server::{Environment, ServerConfig};

use serde::Deserialize;

/// Root application configuration
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    /// Server configuration (host, port, environment)
    #[serde(default)]
    pub server: ServerConfig,

    /// Database configuration (PostgreSQL connection)
    pub database: DatabaseConfig,

    /// Stripe configuration
    pub payment: PaymentConfig,

    /// PayPal configuration
    #[serde(default)]
    pub paypal: PayPalConfig,

    /// Identity provider configuration (custom claims)
    pub identity: IdentityConfig,
}

impl AppConfig {
    /// Load configuration from environment variables
    ///
    /// 1. Loads `.env` file if present (for development)
    /// 2. Reads environment variables with `TUCITASEGURA_BILLING` prefix
    /// 3. Uses `__` (double underscore) to separate nested values
    ///
    /// # Environment Variable Format
    ///
    /// - `TUCITASEGURA_BILLING__SERVER__PORT=8080` -> `server.port = 8080`
    /// - `TUCITASEGURA_BILLING__PAYPAL__WEBHOOK_ID=...` -> `paypal.webhook_id = ...`
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if required variables are missing or a value
    /// cannot be parsed into its expected type.
    pub fn load() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let config = config::Config::builder()
            .add_source(
                config::Environment::default()
                    .prefix("TUCITASEGURA_BILLING")
                    .separator("__"),
            )
            .build()?
            .try_deserialize()?;

        Ok(config)
    }

    /// Validate all configuration values
    ///
    /// # Errors
    ///
    /// Returns `ValidationError` for the first invalid value found.
    pub fn validate(&self) -> Result<(), ValidationError> {
        let production = self.is_production();
        self.server.validate()?;
        self.database.validate()?;
        self.payment.validate(production)?;
        self.paypal.validate(self.server.environment)?;
        self.identity.validate(production)?;
        if self.database.ledger_lease_secs <= self.server.request_timeout_secs {
            return Err(ValidationError::LedgerLeaseTooShort);
        }
        Ok(())
    }

    /// Check if running in production environment
    pub fn is_production(&self) -> bool {
        self.server.is_production()
    }

    /// Whether PayPal deliveries are accepted without remote verification.
    pub fn paypal_bypass_effective(&self) -> bool {
        self.paypal.bypass_effective(self.server.environment)
    }
}

/// Checks that `url` is http(s), and https when `production` is set.
pub(crate) fn validate_url(
    name: &'static str,
    url: &str,
    production: bool,
) -> Result<(), ValidationError> {
    if url.starts_with("https://") {
        return Ok(());
    }
    if url.starts_with("http://") {
        if production {
            return Err(ValidationError::MustBeHttps(name));
        }
        return Ok(());
    }
    Err(ValidationError::InvalidUrl(name))
}
