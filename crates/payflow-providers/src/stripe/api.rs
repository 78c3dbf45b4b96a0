//! Stripe API Access
//!
//! The adapter talks to Stripe through [`StripeApi`] so tests can swap in an
//! in-memory fake. [`SdkStripeApi`] is the real implementation on top of
//! `async-stripe`.

use async_trait::async_trait;
use std::collections::HashMap;
use ::stripe::{
    CheckoutSession, CheckoutSessionId, CheckoutSessionMode, Client, CreateCheckoutSession,
    CreateCheckoutSessionLineItems, CreateCheckoutSessionLineItemsPriceData,
    CreateCheckoutSessionLineItemsPriceDataProductData, CreateCheckoutSessionPaymentIntentData,
    CreatePaymentIntent, CreatePaymentIntentAutomaticPaymentMethods, CreateRefund, Currency,
    PaymentIntent, PaymentIntentId, Refund, StripeError,
};

use payflow_core::{PaymentError, Result};

use crate::config::Credential;

/// Parameters for a redirect-mode Checkout Session
#[derive(Clone, Debug)]
pub struct SessionParams {
    pub order_id: String,

    /// Single line item unit price, minor units
    pub amount_minor: i64,

    /// Lowercase ISO code, as Stripe expects
    pub currency: String,

    pub customer_email: String,
    pub success_url: String,
    pub cancel_url: String,
    pub product_name: String,

    /// Embedded on the session and on its PaymentIntent
    pub metadata: HashMap<String, String>,
}

/// Parameters for a client-confirmed PaymentIntent
#[derive(Clone, Debug)]
pub struct IntentParams {
    pub amount_minor: i64,
    pub currency: String,
    pub receipt_email: String,
    pub metadata: HashMap<String, String>,
}

/// The parts of a Checkout Session this crate reads
#[derive(Clone, Debug, Default)]
pub struct StripeSession {
    pub id: String,
    pub url: Option<String>,

    /// `open` | `complete` | `expired`
    pub status: Option<String>,

    /// `paid` | `unpaid` | `no_payment_required`
    pub payment_status: String,

    pub amount_total: Option<i64>,
    pub currency: Option<String>,
    pub client_reference_id: Option<String>,
    pub metadata: HashMap<String, String>,
    pub payment_intent: Option<String>,
}

/// The parts of a PaymentIntent this crate reads
#[derive(Clone, Debug, Default)]
pub struct StripeIntent {
    pub id: String,
    pub status: String,
    pub amount: i64,
    pub currency: String,
    pub client_secret: Option<String>,
    pub metadata: HashMap<String, String>,
}

/// The parts of a Refund this crate reads
#[derive(Clone, Debug, Default)]
pub struct StripeRefund {
    pub id: String,
    pub status: Option<String>,
}

/// Stripe operations used by the adapter
#[async_trait]
pub trait StripeApi: Send + Sync {
    async fn create_checkout_session(&self, params: SessionParams) -> Result<StripeSession>;

    async fn create_payment_intent(&self, params: IntentParams) -> Result<StripeIntent>;

    async fn retrieve_checkout_session(&self, id: &str) -> Result<StripeSession>;

    async fn retrieve_payment_intent(&self, id: &str) -> Result<StripeIntent>;

    /// Refund a PaymentIntent, fully or by `amount_minor`
    async fn create_refund(
        &self,
        payment_intent_id: &str,
        amount_minor: Option<i64>,
    ) -> Result<StripeRefund>;
}

/// `async-stripe` backed implementation
pub struct SdkStripeApi {
    client: Option<Client>,
}

impl SdkStripeApi {
    /// Build from the secret key; a missing key fails on first call
    pub fn new(secret_key: &Credential) -> Self {
        Self {
            client: secret_key.require().ok().map(Client::new),
        }
    }

    fn client(&self) -> Result<&Client> {
        self.client
            .as_ref()
            .ok_or_else(|| PaymentError::Configuration("STRIPE_SECRET_KEY not set".into()))
    }
}

fn api_error(err: StripeError) -> PaymentError {
    PaymentError::ProviderApi(err.to_string())
}

/// `Currency` deserializes from its lowercase ISO code
fn parse_currency(code: &str) -> Result<Currency> {
    serde_json::from_value(serde_json::Value::String(code.to_ascii_lowercase()))
        .map_err(|_| PaymentError::InvalidRequest(format!("currency not supported by Stripe: {code}")))
}

fn parse_id<T: std::str::FromStr>(id: &str, kind: &str) -> Result<T> {
    id.parse()
        .map_err(|_| PaymentError::InvalidRequest(format!("not a {kind} id: {id:?}")))
}

impl From<CheckoutSession> for StripeSession {
    fn from(session: CheckoutSession) -> Self {
        Self {
            id: session.id.to_string(),
            url: session.url,
            status: session.status.map(|s| s.as_str().to_string()),
            payment_status: session.payment_status.as_str().to_string(),
            amount_total: session.amount_total,
            currency: session.currency.map(|c| c.to_string()),
            client_reference_id: session.client_reference_id,
            metadata: session.metadata.unwrap_or_default(),
            payment_intent: session.payment_intent.map(|pi| pi.id().to_string()),
        }
    }
}

impl From<PaymentIntent> for StripeIntent {
    fn from(intent: PaymentIntent) -> Self {
        Self {
            id: intent.id.to_string(),
            status: intent.status.as_str().to_string(),
            amount: intent.amount,
            currency: intent.currency.to_string(),
            client_secret: intent.client_secret,
            metadata: intent.metadata,
        }
    }
}

#[async_trait]
impl StripeApi for SdkStripeApi {
    async fn create_checkout_session(&self, params: SessionParams) -> Result<StripeSession> {
        let client = self.client()?;
        let currency = parse_currency(&params.currency)?;

        let mut create = CreateCheckoutSession::new();
        create.mode = Some(CheckoutSessionMode::Payment);
        create.customer_email = Some(&params.customer_email);
        create.success_url = Some(&params.success_url);
        create.cancel_url = Some(&params.cancel_url);
        create.client_reference_id = Some(&params.order_id);
        create.metadata = Some(params.metadata.clone());
        create.payment_intent_data = Some(CreateCheckoutSessionPaymentIntentData {
            metadata: Some(params.metadata.clone()),
            ..Default::default()
        });
        create.line_items = Some(vec![CreateCheckoutSessionLineItems {
            quantity: Some(1),
            price_data: Some(CreateCheckoutSessionLineItemsPriceData {
                currency,
                unit_amount: Some(params.amount_minor),
                product_data: Some(CreateCheckoutSessionLineItemsPriceDataProductData {
                    name: params.product_name.clone(),
                    ..Default::default()
                }),
                ..Default::default()
            }),
            ..Default::default()
        }]);

        let session = CheckoutSession::create(client, create)
            .await
            .map_err(api_error)?;
        Ok(session.into())
    }

    async fn create_payment_intent(&self, params: IntentParams) -> Result<StripeIntent> {
        let client = self.client()?;
        let currency = parse_currency(&params.currency)?;

        let mut create = CreatePaymentIntent::new(params.amount_minor, currency);
        create.automatic_payment_methods = Some(CreatePaymentIntentAutomaticPaymentMethods {
            enabled: true,
            ..Default::default()
        });
        create.receipt_email = Some(&params.receipt_email);
        create.metadata = Some(params.metadata.clone());

        let intent = PaymentIntent::create(client, create)
            .await
            .map_err(api_error)?;
        Ok(intent.into())
    }

    async fn retrieve_checkout_session(&self, id: &str) -> Result<StripeSession> {
        let client = self.client()?;
        let id: CheckoutSessionId = parse_id(id, "checkout session")?;

        let session = CheckoutSession::retrieve(client, &id, &[])
            .await
            .map_err(api_error)?;
        Ok(session.into())
    }

    async fn retrieve_payment_intent(&self, id: &str) -> Result<StripeIntent> {
        let client = self.client()?;
        let id: PaymentIntentId = parse_id(id, "payment intent")?;

        let intent = PaymentIntent::retrieve(client, &id, &[])
            .await
            .map_err(api_error)?;
        Ok(intent.into())
    }

    async fn create_refund(
        &self,
        payment_intent_id: &str,
        amount_minor: Option<i64>,
    ) -> Result<StripeRefund> {
        let client = self.client()?;
        let id: PaymentIntentId = parse_id(payment_intent_id, "payment intent")?;

        let mut create = CreateRefund::new();
        create.payment_intent = Some(id);
        create.amount = amount_minor;

        let refund = Refund::create(client, create).await.map_err(api_error)?;
        Ok(StripeRefund {
            id: refund.id.to_string(),
            status: refund.status,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_missing_secret_key_fails_on_first_call() {
        let api = SdkStripeApi::new(&Credential::missing("STRIPE_SECRET_KEY"));
        let err = api.retrieve_payment_intent("pi_123").await.unwrap_err();
        assert!(matches!(err, PaymentError::Configuration(_)));
    }

    #[test]
    fn test_currency_parsing() {
        assert_eq!(parse_currency("TRY").unwrap(), Currency::TRY);
        assert_eq!(parse_currency("usd").unwrap(), Currency::USD);
        assert!(parse_currency("XXQ").is_err());
    }
}
