//! Response bodies for the webhook endpoints.
//!
//! Bodies never carry internal error text; providers only act on the status.

use serde::{Deserialize, Serialize};

/// Acknowledgement returned for every accepted delivery.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReceivedResponse {
    pub received: bool,
}

impl ReceivedResponse {
    pub fn ok() -> Self {
        Self { received: true }
    }
}

/// Error body for rejected or failed deliveries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}

impl ErrorResponse {
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
}
