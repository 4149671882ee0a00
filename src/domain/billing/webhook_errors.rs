//! Webhook error types for payment provider webhook handling.
//!
//! Defines all error conditions that can occur during webhook processing,
//! with HTTP status code mapping and retryability semantics. Unresolvable
//! and duplicate deliveries are not errors; they surface as outcomes of the
//! processor and are acknowledged.

use axum::http::StatusCode;
use thiserror::Error;

/// Errors that occur during webhook processing.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WebhookError {
    /// Signature missing, malformed, or not matching.
    #[error("Invalid signature: {0}")]
    InvalidSignature(String),

    /// Signed timestamp is older than the tolerance window.
    #[error("Timestamp out of range")]
    TimestampOutOfRange,

    /// Signed timestamp is in the future beyond clock skew tolerance.
    #[error("Invalid timestamp")]
    InvalidTimestamp,

    /// Authenticated body is not a valid provider envelope.
    #[error("Parse error: {0}")]
    ParseError(String),

    /// Provider API, OAuth, or network failure.
    #[error("Transient dependency failure: {0}")]
    TransientDependency(String),

    /// Billing state or ledger write failed.
    #[error("State transition failed: {0}")]
    StateTransition(String),
}

impl WebhookError {
    /// Returns true if the provider should retry delivering this webhook.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            WebhookError::TransientDependency(_) | WebhookError::StateTransition(_)
        )
    }

    /// Returns true if the request failed authentication and must leave no trace.
    pub fn is_rejection(&self) -> bool {
        matches!(
            self,
            WebhookError::InvalidSignature(_)
                | WebhookError::TimestampOutOfRange
                | WebhookError::InvalidTimestamp
                | WebhookError::ParseError(_)
        )
    }

    /// Maps the error to an appropriate HTTP status code.
    ///
    /// Status codes determine the provider's retry behavior:
    /// - 4xx: Rejected, no retry
    /// - 5xx: Server error, will retry
    pub fn status_code(&self) -> StatusCode {
        match self {
            WebhookError::InvalidSignature(_)
            | WebhookError::TimestampOutOfRange
            | WebhookError::InvalidTimestamp
            | WebhookError::ParseError(_) => StatusCode::BAD_REQUEST,

            WebhookError::TransientDependency(_) | WebhookError::StateTransition(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // ══════════════════════════════════════════════════════════════
    // Error Display Tests
    // ══════════════════════════════════════════════════════════════

    #[test]
    fn invalid_signature_displays_reason() {
        let err = WebhookError::InvalidSignature("no v1 entry".to_string());
        assert_eq!(format!("{}", err), "Invalid signature: no v1 entry");
    }

    #[test]
    fn timestamp_out_of_range_displays_correctly() {
        let err = WebhookError::TimestampOutOfRange;
        assert_eq!(format!("{}", err), "Timestamp out of range");
    }

    #[test]
    fn transient_dependency_displays_message() {
        let err = WebhookError::TransientDependency("paypal oauth timed out".to_string());
        assert_eq!(
            format!("{}", err),
            "Transient dependency failure: paypal oauth timed out"
        );
    }

    // ══════════════════════════════════════════════════════════════
    // Status Code Tests
    // ══════════════════════════════════════════════════════════════

    #[test]
    fn authentication_failures_return_400() {
        for err in [
            WebhookError::InvalidSignature("mismatch".to_string()),
            WebhookError::TimestampOutOfRange,
            WebhookError::InvalidTimestamp,
            WebhookError::ParseError("bad json".to_string()),
        ] {
            assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
            assert!(err.is_rejection());
            assert!(!err.is_retryable());
        }
    }

    #[test]
    fn dependency_and_state_failures_return_500_and_retry() {
        for err in [
            WebhookError::TransientDependency("timeout".to_string()),
            WebhookError::StateTransition("deadlock".to_string()),
        ] {
            assert_eq!(err.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
            assert!(err.is_retryable());
            assert!(!err.is_rejection());
        }
    }
}
