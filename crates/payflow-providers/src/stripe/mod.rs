//! Stripe Adapter
//!
//! Two initiation modes, picked from the input shape alone:
//!
//! - both `success_url` and `cancel_url` set: hosted Checkout Session,
//!   `provider_ref` is the session id (`cs_…`)
//! - otherwise: PaymentIntent for in-page confirmation, `provider_ref` is the
//!   intent id (`pi_…`)
//!
//! Webhooks are authenticated against the raw body before the event envelope
//! is parsed.

pub mod api;
pub mod signature;

use async_trait::async_trait;
use chrono::Utc;
use rust_decimal::Decimal;
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::Arc;

use payflow_core::money::{from_minor_units, normalize_currency, to_minor_units};
use payflow_core::{
    PaymentAdapter, PaymentError, PaymentInitInput, PaymentInitResult, PaymentStatus,
    PaymentWebhookResult, ProviderKind, RefundResult, Result, WebhookRequest,
};

use crate::config::{Credential, StripeConfig};

pub use api::{
    IntentParams, SdkStripeApi, SessionParams, StripeApi, StripeIntent, StripeRefund,
    StripeSession,
};
pub use signature::SIGNATURE_HEADER;

/// Metadata key carrying our order id on Stripe objects
pub const ORDER_ID_KEY: &str = "orderId";

const CHECKOUT_SESSION_PREFIX: &str = "cs_";

/// Raw event envelope; `data.object` is only decoded for mapped types
#[derive(Debug, Deserialize)]
struct EventEnvelope {
    id: String,
    #[serde(rename = "type")]
    event_type: String,
    data: EventData,
}

#[derive(Debug, Deserialize)]
struct EventData {
    object: serde_json::Value,
}

/// Fields shared by the session and intent objects we map
#[derive(Debug, Default, Deserialize)]
struct EventObject {
    id: String,
    #[serde(default)]
    amount: Option<i64>,
    #[serde(default)]
    amount_total: Option<i64>,
    #[serde(default)]
    currency: Option<String>,
    #[serde(default)]
    metadata: Option<HashMap<String, String>>,
    #[serde(default)]
    client_reference_id: Option<String>,
    #[serde(default)]
    payment_status: Option<String>,
}

/// Stripe implementation of [`PaymentAdapter`]
pub struct StripeAdapter {
    api: Arc<dyn StripeApi>,
    webhook_secret: Credential,
    tolerance_secs: i64,
}

impl StripeAdapter {
    /// Adapter backed by the Stripe API
    pub fn new(config: StripeConfig) -> Self {
        let api = Arc::new(SdkStripeApi::new(&config.secret_key));
        Self::with_api(config, api)
    }

    /// Adapter backed by any [`StripeApi`]
    pub fn with_api(config: StripeConfig, api: Arc<dyn StripeApi>) -> Self {
        Self {
            api,
            webhook_secret: config.webhook_secret,
            tolerance_secs: config.webhook_tolerance_secs,
        }
    }

    fn map_event(event: EventEnvelope) -> Result<PaymentWebhookResult> {
        let status = match event.event_type.as_str() {
            "checkout.session.completed" | "payment_intent.succeeded" => PaymentStatus::Paid,
            "payment_intent.payment_failed" => PaymentStatus::Failed,
            _ => return Err(PaymentError::UnsupportedEvent(event.event_type)),
        };

        let object: EventObject = serde_json::from_value(event.data.object)?;

        // Async payment methods complete the session before funds arrive
        let status = if object.payment_status.as_deref() == Some("unpaid") {
            PaymentStatus::Pending
        } else {
            status
        };

        let metadata = object.metadata.unwrap_or_default();
        let order_id = correlate(&metadata, object.client_reference_id.as_deref())?;
        let minor = object.amount_total.or(object.amount).ok_or_else(|| {
            PaymentError::InvalidRequest(format!("event {} carries no amount", event.id))
        })?;
        let currency = object.currency.ok_or_else(|| {
            PaymentError::InvalidRequest(format!("event {} carries no currency", event.id))
        })?;

        tracing::info!(
            event_id = %event.id,
            event_type = %event.event_type,
            order_id = %order_id,
            status = %status,
            "Verified Stripe webhook"
        );

        Ok(PaymentWebhookResult {
            order_id,
            status,
            provider_ref: object.id,
            amount: from_minor_units(minor),
            currency: normalize_currency(&currency)?,
            metadata: Some(metadata),
        })
    }

    async fn session_status(&self, id: &str) -> Result<PaymentWebhookResult> {
        let session = self.api.retrieve_checkout_session(id).await?;

        let status = match (session.payment_status.as_str(), session.status.as_deref()) {
            ("paid" | "no_payment_required", _) => PaymentStatus::Paid,
            (_, Some("expired")) => PaymentStatus::Failed,
            _ => PaymentStatus::Pending,
        };

        Ok(PaymentWebhookResult {
            order_id: correlate(&session.metadata, session.client_reference_id.as_deref())?,
            status,
            provider_ref: session.id,
            amount: from_minor_units(session.amount_total.unwrap_or_default()),
            currency: normalize_currency(session.currency.as_deref().unwrap_or_default())?,
            metadata: Some(session.metadata),
        })
    }

    async fn intent_status(&self, id: &str) -> Result<PaymentWebhookResult> {
        let intent = self.api.retrieve_payment_intent(id).await?;

        Ok(PaymentWebhookResult {
            order_id: correlate(&intent.metadata, None)?,
            status: intent_status(&intent.status),
            provider_ref: intent.id,
            amount: from_minor_units(intent.amount),
            currency: normalize_currency(&intent.currency)?,
            metadata: Some(intent.metadata),
        })
    }
}

/// Map a PaymentIntent status string
fn intent_status(status: &str) -> PaymentStatus {
    match status {
        "succeeded" => PaymentStatus::Paid,
        "canceled" | "payment_failed" => PaymentStatus::Failed,
        _ => PaymentStatus::Pending,
    }
}

/// Order id from metadata, falling back to `client_reference_id`
fn correlate(metadata: &HashMap<String, String>, client_reference_id: Option<&str>) -> Result<String> {
    metadata
        .get(ORDER_ID_KEY)
        .map(String::as_str)
        .or(client_reference_id)
        .filter(|id| !id.is_empty())
        .map(str::to_string)
        .ok_or_else(|| PaymentError::InvalidRequest("Stripe object carries no orderId".into()))
}

fn is_session_ref(provider_ref: &str) -> bool {
    provider_ref.starts_with(CHECKOUT_SESSION_PREFIX)
}

#[async_trait]
impl PaymentAdapter for StripeAdapter {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Stripe
    }

    async fn init_payment(&self, input: PaymentInitInput) -> Result<PaymentInitResult> {
        if input.order_id.trim().is_empty() {
            return Err(PaymentError::InvalidRequest("order id is empty".into()));
        }
        let amount_minor = to_minor_units(input.amount)?;
        let currency = normalize_currency(&input.currency)?.to_ascii_lowercase();

        let mut metadata = input.metadata;
        metadata.insert(ORDER_ID_KEY.into(), input.order_id.clone());

        if let (Some(success_url), Some(cancel_url)) = (input.success_url, input.cancel_url) {
            let session = self
                .api
                .create_checkout_session(SessionParams {
                    product_name: format!("Order {}", input.order_id),
                    order_id: input.order_id.clone(),
                    amount_minor,
                    currency,
                    customer_email: input.customer.email,
                    success_url,
                    cancel_url,
                    metadata,
                })
                .await
                .inspect_err(|e| tracing::error!(order_id = %input.order_id, error = %e, "Stripe checkout session failed"))?;

            let url = session
                .url
                .ok_or_else(|| PaymentError::ProviderApi("No checkout URL returned".into()))?;

            tracing::info!(order_id = %input.order_id, provider_ref = %session.id, "Created Stripe checkout session");
            Ok(PaymentInitResult::redirect(session.id, url))
        } else {
            let intent = self
                .api
                .create_payment_intent(IntentParams {
                    amount_minor,
                    currency,
                    receipt_email: input.customer.email,
                    metadata,
                })
                .await
                .inspect_err(|e| tracing::error!(order_id = %input.order_id, error = %e, "Stripe payment intent failed"))?;

            let secret = intent
                .client_secret
                .filter(|s| !s.is_empty())
                .ok_or_else(|| PaymentError::ProviderApi("No client secret returned".into()))?;

            tracing::info!(order_id = %input.order_id, provider_ref = %intent.id, "Created Stripe payment intent");
            Ok(PaymentInitResult::client_secret(intent.id, secret))
        }
    }

    async fn verify_webhook(&self, request: &WebhookRequest) -> Result<PaymentWebhookResult> {
        let secret = self.webhook_secret.require()?;
        let header = request.header(SIGNATURE_HEADER).ok_or_else(|| {
            PaymentError::Authentication(format!("missing {SIGNATURE_HEADER} header"))
        })?;

        signature::verify(
            request.body(),
            header,
            secret,
            self.tolerance_secs,
            Utc::now().timestamp(),
        )
        .inspect_err(|e| tracing::warn!(provider = "stripe", error = %e, "Rejected webhook"))?;

        let event: EventEnvelope = serde_json::from_slice(request.body())?;
        Self::map_event(event)
    }

    async fn get_payment_status(&self, provider_ref: &str) -> Result<PaymentWebhookResult> {
        if is_session_ref(provider_ref) {
            self.session_status(provider_ref).await
        } else {
            self.intent_status(provider_ref).await
        }
    }

    async fn refund(&self, provider_ref: &str, amount: Option<Decimal>) -> Result<RefundResult> {
        let amount_minor = amount.map(to_minor_units).transpose()?;

        let intent_id = if is_session_ref(provider_ref) {
            self.api
                .retrieve_checkout_session(provider_ref)
                .await?
                .payment_intent
                .ok_or_else(|| {
                    PaymentError::InvalidRequest(format!(
                        "checkout session {provider_ref} has no payment intent"
                    ))
                })?
        } else {
            provider_ref.to_string()
        };

        let refund = self.api.create_refund(&intent_id, amount_minor).await?;
        let success = refund.status.as_deref() == Some("succeeded");

        tracing::info!(
            provider_ref = %provider_ref,
            refund_ref = %refund.id,
            success,
            "Stripe refund requested"
        );

        Ok(RefundResult {
            success,
            refund_ref: Some(refund.id),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use payflow_core::{Customer, WebhookOutcome};
    use rust_decimal_macros::dec;
    use serde_json::json;
    use std::sync::Mutex;

    const WEBHOOK_SECRET: &str = "whsec_test_secret";

    struct FakeStripeApi {
        sessions: Mutex<Vec<SessionParams>>,
        intents: Mutex<Vec<IntentParams>>,
        refunds: Mutex<Vec<(String, Option<i64>)>>,
        intent_status: &'static str,
        session_payment_status: &'static str,
        refund_status: Option<&'static str>,
    }

    impl FakeStripeApi {
        fn new() -> Self {
            Self {
                sessions: Mutex::new(Vec::new()),
                intents: Mutex::new(Vec::new()),
                refunds: Mutex::new(Vec::new()),
                intent_status: "succeeded",
                session_payment_status: "paid",
                refund_status: Some("succeeded"),
            }
        }
    }

    #[async_trait]
    impl StripeApi for FakeStripeApi {
        async fn create_checkout_session(&self, params: SessionParams) -> Result<StripeSession> {
            self.sessions.lock().unwrap().push(params);
            Ok(StripeSession {
                id: "cs_test_1".into(),
                url: Some("https://checkout.stripe.com/c/pay/cs_test_1".into()),
                ..Default::default()
            })
        }

        async fn create_payment_intent(&self, params: IntentParams) -> Result<StripeIntent> {
            self.intents.lock().unwrap().push(params);
            Ok(StripeIntent {
                id: "pi_test_1".into(),
                client_secret: Some("pi_test_1_secret_abc".into()),
                ..Default::default()
            })
        }

        async fn retrieve_checkout_session(&self, id: &str) -> Result<StripeSession> {
            Ok(StripeSession {
                id: id.into(),
                status: Some("complete".into()),
                payment_status: self.session_payment_status.into(),
                amount_total: Some(10050),
                currency: Some("try".into()),
                client_reference_id: Some("ORD-1".into()),
                payment_intent: Some("pi_from_session".into()),
                ..Default::default()
            })
        }

        async fn retrieve_payment_intent(&self, id: &str) -> Result<StripeIntent> {
            Ok(StripeIntent {
                id: id.into(),
                status: self.intent_status.into(),
                amount: 10050,
                currency: "try".into(),
                metadata: HashMap::from([(ORDER_ID_KEY.to_string(), "ORD-1".to_string())]),
                ..Default::default()
            })
        }

        async fn create_refund(
            &self,
            payment_intent_id: &str,
            amount_minor: Option<i64>,
        ) -> Result<StripeRefund> {
            self.refunds
                .lock()
                .unwrap()
                .push((payment_intent_id.into(), amount_minor));
            Ok(StripeRefund {
                id: "re_test_1".into(),
                status: self.refund_status.map(str::to_string),
            })
        }
    }

    fn adapter(api: Arc<FakeStripeApi>) -> StripeAdapter {
        StripeAdapter::with_api(StripeConfig::new("sk_test_123", WEBHOOK_SECRET), api)
    }

    fn input(urls: bool) -> PaymentInitInput {
        PaymentInitInput {
            order_id: "ORD-1".into(),
            amount: dec!(100.50),
            currency: "TRY".into(),
            customer: Customer {
                email: "a@b.com".into(),
                name: None,
                phone: None,
            },
            success_url: urls.then(|| "https://shop.example/ok".into()),
            cancel_url: urls.then(|| "https://shop.example/cancel".into()),
            billing: None,
            metadata: HashMap::new(),
        }
    }

    fn event(event_type: &str, object: serde_json::Value) -> Vec<u8> {
        serde_json::to_vec(&json!({
            "id": "evt_test_1",
            "object": "event",
            "type": event_type,
            "data": { "object": object },
        }))
        .unwrap()
    }

    fn signed(body: Vec<u8>) -> WebhookRequest {
        let header = signature::sign(&body, WEBHOOK_SECRET, Utc::now().timestamp()).unwrap();
        WebhookRequest::new(body).with_header("Stripe-Signature", header)
    }

    fn succeeded_intent() -> Vec<u8> {
        event(
            "payment_intent.succeeded",
            json!({
                "id": "pi_test_1",
                "object": "payment_intent",
                "amount": 10050,
                "currency": "try",
                "metadata": { "orderId": "ORD-1" },
            }),
        )
    }

    #[tokio::test]
    async fn test_init_without_urls_returns_client_secret() {
        let api = Arc::new(FakeStripeApi::new());
        let result = adapter(api.clone()).init_payment(input(false)).await.unwrap();

        assert!(!result.requires_redirect());
        assert!(!result.secret().unwrap().is_empty());
        assert!(result.redirect_url().is_none());
        assert_eq!(result.provider_ref(), "pi_test_1");

        let intents = api.intents.lock().unwrap();
        assert_eq!(intents[0].amount_minor, 10050);
        assert_eq!(intents[0].currency, "try");
        assert_eq!(intents[0].receipt_email, "a@b.com");
        assert_eq!(intents[0].metadata[ORDER_ID_KEY], "ORD-1");
        assert!(api.sessions.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_init_with_urls_returns_redirect() {
        let api = Arc::new(FakeStripeApi::new());
        let result = adapter(api.clone()).init_payment(input(true)).await.unwrap();

        assert!(result.requires_redirect());
        assert!(!result.redirect_url().unwrap().is_empty());
        assert!(result.secret().is_none());
        assert_eq!(result.provider_ref(), "cs_test_1");

        let sessions = api.sessions.lock().unwrap();
        assert_eq!(sessions[0].amount_minor, 10050);
        assert_eq!(sessions[0].customer_email, "a@b.com");
        assert_eq!(sessions[0].order_id, "ORD-1");
        assert_eq!(sessions[0].metadata[ORDER_ID_KEY], "ORD-1");
        assert!(api.intents.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_init_rejects_non_positive_amount() {
        let mut request = input(false);
        request.amount = Decimal::ZERO;
        let err = adapter(Arc::new(FakeStripeApi::new()))
            .init_payment(request)
            .await
            .unwrap_err();
        assert!(matches!(err, PaymentError::InvalidRequest(_)));
    }

    #[tokio::test]
    async fn test_missing_secret_key_is_configuration_error() {
        let config = StripeConfig {
            secret_key: Credential::missing("STRIPE_SECRET_KEY"),
            webhook_secret: Credential::missing("STRIPE_WEBHOOK_SECRET"),
            webhook_tolerance_secs: 300,
        };
        let adapter = StripeAdapter::new(config);

        let err = adapter.init_payment(input(false)).await.unwrap_err();
        assert!(matches!(err, PaymentError::Configuration(_)));

        let err = adapter.verify_webhook(&signed(succeeded_intent())).await.unwrap_err();
        assert!(matches!(err, PaymentError::Configuration(ref m) if m.contains("STRIPE_WEBHOOK_SECRET")));
    }

    #[tokio::test]
    async fn test_verify_succeeded_intent() {
        let result = adapter(Arc::new(FakeStripeApi::new()))
            .verify_webhook(&signed(succeeded_intent()))
            .await
            .unwrap();

        assert_eq!(result.order_id, "ORD-1");
        assert_eq!(result.status, PaymentStatus::Paid);
        assert_eq!(result.provider_ref, "pi_test_1");
        assert_eq!(result.amount, dec!(100.50));
        assert_eq!(result.currency, "TRY");
    }

    #[tokio::test]
    async fn test_missing_signature_header_rejected() {
        let request = WebhookRequest::new(succeeded_intent());
        let err = adapter(Arc::new(FakeStripeApi::new()))
            .verify_webhook(&request)
            .await
            .unwrap_err();
        assert!(matches!(err, PaymentError::Authentication(_)));
    }

    #[tokio::test]
    async fn test_any_flipped_body_byte_is_rejected() {
        let adapter = adapter(Arc::new(FakeStripeApi::new()));
        let body = succeeded_intent();
        let header = signature::sign(&body, WEBHOOK_SECRET, Utc::now().timestamp()).unwrap();

        for i in 0..body.len() {
            let mut tampered = body.clone();
            tampered[i] ^= 0x01;
            let request = WebhookRequest::new(tampered).with_header(SIGNATURE_HEADER, header.clone());
            let err = adapter.verify_webhook(&request).await.unwrap_err();
            assert!(
                matches!(err, PaymentError::Authentication(_)),
                "byte {i} flipped but got {err:?}"
            );
        }
    }

    #[tokio::test]
    async fn test_unknown_event_is_unsupported() {
        let adapter = adapter(Arc::new(FakeStripeApi::new()));
        let body = event("charge.refunded", json!({ "id": "ch_1", "object": "charge" }));

        let err = adapter.verify_webhook(&signed(body.clone())).await.unwrap_err();
        assert!(matches!(err, PaymentError::UnsupportedEvent(ref t) if t == "charge.refunded"));

        let outcome = adapter.handle_webhook(&signed(body)).await.unwrap();
        assert_eq!(
            outcome,
            WebhookOutcome::Ignored { event_type: "charge.refunded".into() }
        );
    }

    #[tokio::test]
    async fn test_failed_intent_maps_to_failed() {
        let body = event(
            "payment_intent.payment_failed",
            json!({
                "id": "pi_test_2",
                "amount": 500,
                "currency": "usd",
                "metadata": { "orderId": "ORD-2" },
            }),
        );
        let result = adapter(Arc::new(FakeStripeApi::new()))
            .verify_webhook(&signed(body))
            .await
            .unwrap();
        assert_eq!(result.status, PaymentStatus::Failed);
        assert_eq!(result.order_id, "ORD-2");
        assert_eq!(result.currency, "USD");
    }

    #[tokio::test]
    async fn test_completed_session_correlates_by_client_reference() {
        let adapter = adapter(Arc::new(FakeStripeApi::new()));
        let session = |payment_status: &str| {
            event(
                "checkout.session.completed",
                json!({
                    "id": "cs_test_1",
                    "object": "checkout.session",
                    "amount_total": 10050,
                    "currency": "try",
                    "client_reference_id": "shop_ORD_9",
                    "metadata": {},
                    "payment_status": payment_status,
                }),
            )
        };

        let paid = adapter.verify_webhook(&signed(session("paid"))).await.unwrap();
        assert_eq!(paid.status, PaymentStatus::Paid);
        assert_eq!(paid.order_id, "shop_ORD_9");
        assert_eq!(paid.provider_ref, "cs_test_1");

        let unpaid = adapter.verify_webhook(&signed(session("unpaid"))).await.unwrap();
        assert_eq!(unpaid.status, PaymentStatus::Pending);
    }

    #[tokio::test]
    async fn test_mapped_event_without_order_id_is_invalid() {
        let body = event(
            "payment_intent.succeeded",
            json!({ "id": "pi_x", "amount": 100, "currency": "usd", "metadata": {} }),
        );
        let err = adapter(Arc::new(FakeStripeApi::new()))
            .verify_webhook(&signed(body))
            .await
            .unwrap_err();
        assert!(matches!(err, PaymentError::InvalidRequest(_)));
    }

    #[tokio::test]
    async fn test_intent_status_mapping() {
        assert_eq!(intent_status("succeeded"), PaymentStatus::Paid);
        assert_eq!(intent_status("canceled"), PaymentStatus::Failed);
        assert_eq!(intent_status("payment_failed"), PaymentStatus::Failed);
        assert_eq!(intent_status("processing"), PaymentStatus::Pending);
        assert_eq!(intent_status("requires_action"), PaymentStatus::Pending);

        let mut api = FakeStripeApi::new();
        api.intent_status = "canceled";
        let result = adapter(Arc::new(api)).get_payment_status("pi_test_1").await.unwrap();
        assert_eq!(result.status, PaymentStatus::Failed);
        assert_eq!(result.order_id, "ORD-1");
        assert_eq!(result.amount, dec!(100.5));
    }

    #[tokio::test]
    async fn test_session_status() {
        let result = adapter(Arc::new(FakeStripeApi::new()))
            .get_payment_status("cs_test_1")
            .await
            .unwrap();
        assert_eq!(result.status, PaymentStatus::Paid);
        assert_eq!(result.order_id, "ORD-1");
        assert_eq!(result.currency, "TRY");

        let mut api = FakeStripeApi::new();
        api.session_payment_status = "unpaid";
        let result = adapter(Arc::new(api)).get_payment_status("cs_test_1").await.unwrap();
        assert_eq!(result.status, PaymentStatus::Pending);
    }

    #[tokio::test]
    async fn test_partial_refund_converts_to_minor_units() {
        let api = Arc::new(FakeStripeApi::new());
        let result = adapter(api.clone())
            .refund("pi_test_1", Some(dec!(10.255)))
            .await
            .unwrap();

        assert!(result.success);
        assert_eq!(result.refund_ref.as_deref(), Some("re_test_1"));
        assert_eq!(
            api.refunds.lock().unwrap()[0],
            ("pi_test_1".to_string(), Some(1026))
        );
    }

    #[tokio::test]
    async fn test_refund_of_session_resolves_intent() {
        let api = Arc::new(FakeStripeApi::new());
        adapter(api.clone()).refund("cs_test_1", None).await.unwrap();
        assert_eq!(
            api.refunds.lock().unwrap()[0],
            ("pi_from_session".to_string(), None)
        );
    }

    #[tokio::test]
    async fn test_pending_refund_is_not_success() {
        let mut api = FakeStripeApi::new();
        api.refund_status = Some("pending");
        let result = adapter(Arc::new(api)).refund("pi_test_1", None).await.unwrap();
        assert!(!result.success);
    }
}
