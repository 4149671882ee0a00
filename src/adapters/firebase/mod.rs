//! Firebase Auth adapter.
//!
//! Implements the `IdentityProvider` port over the Identity Toolkit REST API,
//! authenticated with a service-account JWT assertion.

mod identity_toolkit;
mod service_account;

pub use identity_toolkit::FirebaseIdentityProvider;
pub use service_account::{AccessTokenSource, ServiceAccountTokenSource};
