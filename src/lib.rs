//! TuCitaSegura Billing - Payment webhook ingestion and billing state engine
//!
//! This crate receives Stripe and PayPal webhooks, deduplicates them, applies
//! them to per-user subscription and anti-ghosting insurance state, and keeps
//! the identity provider's custom claims in step with that state.

pub mod adapters;
pub mod application;
pub mod config;
pub mod domain;
pub mod ports;
