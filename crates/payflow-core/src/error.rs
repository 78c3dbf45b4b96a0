//! Payment Error Types

use thiserror::Error;

/// Result type alias
pub type Result<T> = std::result::Result<T, PaymentError>;

/// Errors raised by payment adapters
#[derive(Error, Debug)]
pub enum PaymentError {
    /// Missing or invalid credentials, or an unknown provider discriminator
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Signature or hash did not verify
    #[error("Authentication failed: {0}")]
    Authentication(String),

    /// Event verified but its type maps to no payment outcome
    #[error("Unsupported event type: {0}")]
    UnsupportedEvent(String),

    /// Upstream PSP call failed
    #[error("Provider API error: {0}")]
    ProviderApi(String),

    /// Malformed input, or a verified payload missing a required field
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Optional capability this provider does not implement
    #[error("Operation not supported: {0}")]
    NotSupported(String),
}

impl PaymentError {
    /// Check if this error is retryable
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::ProviderApi(_))
    }

    /// Whether a webhook caller should acknowledge (2xx) and move on
    pub const fn is_acknowledgeable(&self) -> bool {
        matches!(self, Self::UnsupportedEvent(_))
    }

    /// Get user-friendly message
    pub const fn user_message(&self) -> &str {
        match self {
            Self::Configuration(_) => "Payment service is not configured.",
            Self::Authentication(_) => "Payment notification could not be verified.",
            Self::UnsupportedEvent(_) => "Payment notification ignored.",
            Self::ProviderApi(_) => "Payment provider is unavailable. Please try again.",
            Self::InvalidRequest(_) => "Invalid payment request.",
            Self::NotSupported(_) => "This operation is not available for the selected provider.",
        }
    }
}

impl From<serde_json::Error> for PaymentError {
    fn from(err: serde_json::Error) -> Self {
        Self::InvalidRequest(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_provider_errors_are_retryable() {
        assert!(PaymentError::ProviderApi("timeout".into()).is_retryable());
        assert!(!PaymentError::Authentication("bad hash".into()).is_retryable());
        assert!(!PaymentError::Configuration("missing key".into()).is_retryable());
    }

    #[test]
    fn test_unsupported_event_is_acknowledgeable() {
        assert!(PaymentError::UnsupportedEvent("charge.updated".into()).is_acknowledgeable());
        assert!(!PaymentError::Authentication("bad".into()).is_acknowledgeable());
    }

    #[test]
    fn test_json_error_maps_to_invalid_request() {
        let err: PaymentError = serde_json::from_str::<serde_json::Value>("{").unwrap_err().into();
        assert!(matches!(err, PaymentError::InvalidRequest(_)));
    }
}
