//! Application handlers.
//!
//! Command handlers that orchestrate domain operations.

pub mod billing;

pub use billing::{
    // Pipeline
    ProcessWebhookCommand, ProcessWebhookHandler, WebhookOutcome,
    // Stages
    ClaimsSync, ClaimsSynchronizer, EventNormalizer, PayPalVerification, StateTransitionEngine,
    Transition, WebhookAuthenticator,
};
