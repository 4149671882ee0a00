//! Domain layer containing business logic and domain types.
//!
//! # Module Organization
//!
//! - `foundation` - Shared domain primitives (IDs, timestamps, errors)
//! - `billing` - Payment events, billing state transitions, and claims

pub mod billing;
pub mod foundation;
