//! Payment Types
//!
//! Requests and normalized results shared by every adapter. Wire names are
//! camelCase so the checkout frontend and the server speak the same shape.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Request to start a payment
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentInitInput {
    /// Caller's order identifier, stable and correlatable
    pub order_id: String,

    /// Amount in major units
    pub amount: Decimal,

    /// ISO 4217 code
    pub currency: String,

    /// Paying customer
    pub customer: Customer,

    /// Redirect-mode success URL
    #[serde(default)]
    pub success_url: Option<String>,

    /// Redirect-mode cancel URL
    #[serde(default)]
    pub cancel_url: Option<String>,

    /// Billing address. Accepted and kept with the request; none of the
    /// bundled adapters sends it to its PSP.
    #[serde(default)]
    pub billing: Option<BillingAddress>,

    /// Provider-opaque passthrough
    #[serde(default)]
    pub metadata: HashMap<String, String>,
}

impl PaymentInitInput {
    /// Both redirect URLs are present
    pub const fn wants_redirect(&self) -> bool {
        self.success_url.is_some() && self.cancel_url.is_some()
    }
}

/// Customer details. Adapters send `email` to the PSP; `name` and `phone`
/// ride along for callers and adapters that use them.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Customer {
    pub email: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
}

/// Billing address
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BillingAddress {
    #[serde(default)]
    pub line1: Option<String>,
    #[serde(default)]
    pub line2: Option<String>,
    #[serde(default)]
    pub city: Option<String>,
    #[serde(default)]
    pub postal_code: Option<String>,
    #[serde(default)]
    pub country: Option<String>,
}

/// Outcome of initiation.
///
/// Carries exactly one of a redirect URL or a client secret; the only way
/// to build one is through [`PaymentInitResult::redirect`] or
/// [`PaymentInitResult::client_secret`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentInitResult {
    provider_ref: String,
    requires_redirect: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    redirect_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    client_secret: Option<String>,
}

impl PaymentInitResult {
    /// Browser must be sent to `url`
    pub fn redirect(provider_ref: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            provider_ref: provider_ref.into(),
            requires_redirect: true,
            redirect_url: Some(url.into()),
            client_secret: None,
        }
    }

    /// Client-side widget confirms with `secret`
    pub fn client_secret(provider_ref: impl Into<String>, secret: impl Into<String>) -> Self {
        Self {
            provider_ref: provider_ref.into(),
            requires_redirect: false,
            redirect_url: None,
            client_secret: Some(secret.into()),
        }
    }

    /// Provider's transaction/session identifier
    pub fn provider_ref(&self) -> &str {
        &self.provider_ref
    }

    pub const fn requires_redirect(&self) -> bool {
        self.requires_redirect
    }

    pub fn redirect_url(&self) -> Option<&str> {
        self.redirect_url.as_deref()
    }

    pub fn secret(&self) -> Option<&str> {
        self.client_secret.as_deref()
    }
}

/// Normalized payment status
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum PaymentStatus {
    Paid,
    Failed,
    Pending,
    Refunded,
}

impl PaymentStatus {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Paid => "PAID",
            Self::Failed => "FAILED",
            Self::Pending => "PENDING",
            Self::Refunded => "REFUNDED",
        }
    }
}

impl std::fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Normalized, authenticated outcome of a webhook or status query
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentWebhookResult {
    pub order_id: String,
    pub status: PaymentStatus,
    pub provider_ref: String,

    /// Major units
    pub amount: Decimal,

    /// Uppercase ISO 4217
    pub currency: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<HashMap<String, String>>,
}

/// Result of a refund request
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RefundResult {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refund_ref: Option<String>,
}

/// Raw inbound webhook: headers plus the untouched body bytes
#[derive(Clone, Debug, Default)]
pub struct WebhookRequest {
    headers: HashMap<String, String>,
    body: Vec<u8>,
}

impl WebhookRequest {
    pub fn new(body: impl Into<Vec<u8>>) -> Self {
        Self {
            headers: HashMap::new(),
            body: body.into(),
        }
    }

    /// Add a header (names are case-insensitive)
    #[must_use]
    pub fn with_header(mut self, name: &str, value: impl Into<String>) -> Self {
        self.headers.insert(name.to_ascii_lowercase(), value.into());
        self
    }

    /// Case-insensitive header lookup
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .get(&name.to_ascii_lowercase())
            .map(String::as_str)
    }

    pub fn body(&self) -> &[u8] {
        &self.body
    }
}

/// What a caller should do with an inbound webhook
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum WebhookOutcome {
    /// Verified and mapped to a status transition
    Processed(PaymentWebhookResult),

    /// Verified, but nothing to act on; acknowledge with 2xx
    Ignored { event_type: String },
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_init_input_from_checkout_json() {
        let input: PaymentInitInput = serde_json::from_str(
            r#"{"orderId":"ORD-1","amount":100.50,"currency":"TRY","customer":{"email":"a@b.com"}}"#,
        )
        .unwrap();

        assert_eq!(input.order_id, "ORD-1");
        assert_eq!(input.amount, dec!(100.50));
        assert!(input.metadata.is_empty());
        assert!(!input.wants_redirect());
    }

    #[test]
    fn test_redirect_mode_needs_both_urls() {
        let mut input: PaymentInitInput = serde_json::from_str(
            r#"{"orderId":"ORD-1","amount":"10","currency":"TRY","customer":{"email":"a@b.com"},"successUrl":"https://shop/ok"}"#,
        )
        .unwrap();
        assert!(!input.wants_redirect());

        input.cancel_url = Some("https://shop/cancel".into());
        assert!(input.wants_redirect());
    }

    #[test]
    fn test_init_result_carries_exactly_one_action() {
        let redirect = PaymentInitResult::redirect("cs_1", "https://pay/cs_1");
        assert!(redirect.requires_redirect());
        assert_eq!(redirect.redirect_url(), Some("https://pay/cs_1"));
        assert_eq!(redirect.secret(), None);

        let embedded = PaymentInitResult::client_secret("pi_1", "pi_1_secret_x");
        assert!(!embedded.requires_redirect());
        assert_eq!(embedded.redirect_url(), None);
        assert_eq!(embedded.secret(), Some("pi_1_secret_x"));
    }

    #[test]
    fn test_init_result_wire_shape() {
        let json = serde_json::to_value(PaymentInitResult::client_secret("pi_1", "sec")).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"providerRef": "pi_1", "requiresRedirect": false, "clientSecret": "sec"})
        );
    }

    #[test]
    fn test_status_wire_names() {
        assert_eq!(serde_json::to_string(&PaymentStatus::Refunded).unwrap(), "\"REFUNDED\"");
        assert_eq!(PaymentStatus::Paid.to_string(), "PAID");
    }

    #[test]
    fn test_header_lookup_is_case_insensitive() {
        let req = WebhookRequest::new(b"{}".to_vec()).with_header("Stripe-Signature", "t=1,v1=ab");
        assert_eq!(req.header("stripe-signature"), Some("t=1,v1=ab"));
        assert_eq!(req.header("STRIPE-SIGNATURE"), Some("t=1,v1=ab"));
        assert_eq!(req.header("content-type"), None);
    }
}
