//! PayTR Adapter
//!
//! Redirects to PayTR's hosted page and verifies the form-encoded callback
//! PayTR posts back:
//!
//! ```text
//! merchant_oid=ORDER_<order>_<ms>&status=success&total_amount=10050&hash=<base64>
//! hash = base64(SHA-256(merchant_id ‖ merchant_key ‖ merchant_oid ‖ total_amount ‖ status ‖ salt))
//! ```

use async_trait::async_trait;
use chrono::Utc;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use payflow_core::money::{normalize_currency, parse_minor_units, to_minor_units};
use payflow_core::{
    PaymentAdapter, PaymentError, PaymentInitInput, PaymentInitResult, PaymentStatus,
    PaymentWebhookResult, ProviderKind, Result, WebhookRequest,
};

use crate::config::{Deployment, PayTrConfig};
use crate::hashed::{HashEncoding, HashScheme};

/// `ORDER_{order_id}_{ms}`, base64 digests
pub const SCHEME: HashScheme = HashScheme::new("ORDER", HashEncoding::Base64);

/// PayTR settles in Turkish lira only
pub const CURRENCY: &str = "TRY";

pub const STATUS_SUCCESS: &str = "success";
pub const STATUS_FAILED: &str = "failed";

const HOSTED_PAGE: &str = "https://www.paytr.com/odeme/guvenli";

/// Fields of PayTR's callback form
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct PayTrCallback {
    #[serde(default)]
    pub merchant_oid: String,
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub total_amount: String,
    #[serde(default)]
    pub hash: String,
}

/// PayTR implementation of [`PaymentAdapter`]
pub struct PayTrAdapter {
    config: PayTrConfig,
    deployment: Deployment,
}

impl PayTrAdapter {
    pub const fn new(config: PayTrConfig, deployment: Deployment) -> Self {
        Self { config, deployment }
    }

    fn hosted_page(&self) -> String {
        if self.deployment.environment.is_production() {
            HOSTED_PAGE.to_string()
        } else {
            self.deployment.mock_endpoint(ProviderKind::PayTr.as_str())
        }
    }

    fn callback_hash(&self, merchant_oid: &str, total_amount: &str, status: &str) -> Result<String> {
        let merchant_id = self.config.merchant_id.require()?;
        let merchant_key = self.config.merchant_key.require()?;
        let salt = self.config.merchant_salt.require()?;

        Ok(SCHEME.digest(
            &[merchant_id, merchant_key, merchant_oid, total_amount, status],
            salt,
        ))
    }

    /// Form body PayTR would post for `merchant_oid`, correctly signed
    pub fn sign_callback(&self, merchant_oid: &str, status: &str, total_amount_minor: i64) -> Result<Vec<u8>> {
        let total_amount = total_amount_minor.to_string();
        let callback = PayTrCallback {
            hash: self.callback_hash(merchant_oid, &total_amount, status)?,
            merchant_oid: merchant_oid.to_string(),
            status: status.to_string(),
            total_amount,
        };

        serde_urlencoded::to_string(&callback)
            .map(String::into_bytes)
            .map_err(|e| PaymentError::InvalidRequest(e.to_string()))
    }
}

fn map_status(status: &str) -> PaymentStatus {
    match status {
        STATUS_SUCCESS => PaymentStatus::Paid,
        STATUS_FAILED => PaymentStatus::Failed,
        _ => PaymentStatus::Pending,
    }
}

#[async_trait]
impl PaymentAdapter for PayTrAdapter {
    fn kind(&self) -> ProviderKind {
        ProviderKind::PayTr
    }

    async fn init_payment(&self, input: PaymentInitInput) -> Result<PaymentInitResult> {
        let merchant_id = self.config.merchant_id.require()?;
        let merchant_key = self.config.merchant_key.require()?;
        let salt = self.config.merchant_salt.require()?;

        let currency = normalize_currency(&input.currency)?;
        if currency != CURRENCY {
            return Err(PaymentError::InvalidRequest(format!(
                "PayTR only accepts {CURRENCY}, got {currency}"
            )));
        }
        let amount_minor = to_minor_units(input.amount)?;

        let merchant_oid = SCHEME.reference(&input.order_id, Utc::now().timestamp_millis())?;
        let amount = amount_minor.to_string();
        let token = SCHEME.digest(&[merchant_id, merchant_key, &merchant_oid, &amount], salt);
        let url = SCHEME.hosted_url(&self.hosted_page(), &merchant_oid, amount_minor, &token)?;

        tracing::info!(order_id = %input.order_id, provider_ref = %merchant_oid, "Created PayTR payment");
        Ok(PaymentInitResult::redirect(merchant_oid, url))
    }

    async fn verify_webhook(&self, request: &WebhookRequest) -> Result<PaymentWebhookResult> {
        let callback: PayTrCallback = serde_urlencoded::from_bytes(request.body())
            .map_err(|e| PaymentError::InvalidRequest(format!("malformed PayTR callback: {e}")))?;

        let salt = self.config.merchant_salt.require()?;
        let expected_fields = [
            self.config.merchant_id.require()?,
            self.config.merchant_key.require()?,
            callback.merchant_oid.as_str(),
            callback.total_amount.as_str(),
            callback.status.as_str(),
        ];
        SCHEME
            .verify(&expected_fields, salt, &callback.hash)
            .inspect_err(|e| tracing::warn!(provider = "paytr", error = %e, "Rejected webhook"))?;

        let order_id = SCHEME.order_id(&callback.merchant_oid)?;
        let status = map_status(&callback.status);
        tracing::info!(order_id = %order_id, provider_ref = %callback.merchant_oid, status = %status, "Verified PayTR callback");

        Ok(PaymentWebhookResult {
            order_id,
            status,
            amount: parse_minor_units(&callback.total_amount)?,
            provider_ref: callback.merchant_oid,
            currency: CURRENCY.into(),
            metadata: None,
        })
    }

    /// Stub: no live PayTR status query is wired in.
    ///
    /// Always reports `Pending` with a zero amount; only the order id is
    /// meaningful, recovered from the reference.
    async fn get_payment_status(&self, provider_ref: &str) -> Result<PaymentWebhookResult> {
        Ok(PaymentWebhookResult {
            order_id: SCHEME.order_id(provider_ref)?,
            status: PaymentStatus::Pending,
            provider_ref: provider_ref.to_string(),
            amount: Decimal::ZERO,
            currency: CURRENCY.into(),
            metadata: None,
        })
    }
}
