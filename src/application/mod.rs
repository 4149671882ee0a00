//! Application layer - Commands and Handlers.
//!
//! This layer orchestrates domain operations and coordinates between ports.

pub mod handlers;

pub use handlers::{
    ClaimsSync, ClaimsSynchronizer, EventNormalizer, PayPalVerification, ProcessWebhookCommand,
    ProcessWebhookHandler, StateTransitionEngine, Transition, WebhookAuthenticator, WebhookOutcome,
};
