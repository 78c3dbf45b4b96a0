//! Payment Adapter Strategy Pattern
//!
//! Defines a common interface for all payment service providers (Stripe,
//! PayTR, Iyzico) so checkout and webhook handling never branch on the PSP.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use payflow_core::{PaymentAdapter, WebhookOutcome};
//!
//! let started = adapter.init_payment(input).await?;
//! // persist started.provider_ref() against the order
//!
//! match adapter.handle_webhook(&request).await? {
//!     WebhookOutcome::Processed(result) => apply(result),
//!     WebhookOutcome::Ignored { .. } => {}
//! }
//! ```

use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::{PaymentError, Result};
use crate::types::{
    PaymentInitInput, PaymentInitResult, PaymentWebhookResult, RefundResult, WebhookOutcome,
    WebhookRequest,
};

/// Provider discriminator used by the adapter factory
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    Stripe,
    PayTr,
    Iyzico,
}

impl ProviderKind {
    pub const ALL: [Self; 3] = [Self::Stripe, Self::PayTr, Self::Iyzico];

    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Stripe => "stripe",
            Self::PayTr => "paytr",
            Self::Iyzico => "iyzico",
        }
    }
}

impl std::fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ProviderKind {
    type Err = PaymentError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "stripe" => Ok(Self::Stripe),
            "paytr" => Ok(Self::PayTr),
            "iyzico" => Ok(Self::Iyzico),
            other => Err(PaymentError::Configuration(format!(
                "unknown payment provider: {other:?}"
            ))),
        }
    }
}

/// Strategy trait for payment service providers
///
/// Implementations hold only immutable configuration, so one instance can
/// serve concurrent requests for unrelated orders.
#[async_trait]
pub trait PaymentAdapter: Send + Sync {
    /// Which provider this adapter talks to
    fn kind(&self) -> ProviderKind;

    /// Start a payment; returns a redirect URL or a client secret
    async fn init_payment(&self, input: PaymentInitInput) -> Result<PaymentInitResult>;

    /// Authenticate and normalize an inbound webhook.
    ///
    /// Never returns a result for an unverified payload. Verified events
    /// with no mapped status raise [`PaymentError::UnsupportedEvent`].
    async fn verify_webhook(&self, request: &WebhookRequest) -> Result<PaymentWebhookResult>;

    /// Current status as reported by the provider
    async fn get_payment_status(&self, provider_ref: &str) -> Result<PaymentWebhookResult>;

    /// Refund all of a payment, or `amount` major units of it
    async fn refund(&self, provider_ref: &str, amount: Option<Decimal>) -> Result<RefundResult> {
        let _ = (provider_ref, amount);
        Err(PaymentError::NotSupported(format!(
            "{} does not support refunds",
            self.kind()
        )))
    }

    /// Verify a webhook, turning unmapped event types into `Ignored`
    async fn handle_webhook(&self, request: &WebhookRequest) -> Result<WebhookOutcome> {
        match self.verify_webhook(request).await {
            Ok(result) => Ok(WebhookOutcome::Processed(result)),
            Err(PaymentError::UnsupportedEvent(event_type)) => {
                tracing::debug!(provider = %self.kind(), event_type = %event_type, "Ignoring webhook event");
                Ok(WebhookOutcome::Ignored { event_type })
            }
            Err(e) => Err(e),
        }
    }
}
