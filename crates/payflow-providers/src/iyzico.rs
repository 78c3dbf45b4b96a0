//! Iyzico Adapter
//!
//! Same shape as PayTR with a JSON callback and hex digests:
//!
//! ```text
//! {"conversationId":"CONV_<order>_<ms>","paymentStatus":"SUCCESS","paidPrice":"10050","hash":"<hex>"}
//! hash = hex(SHA-256(api_key ‖ conversationId ‖ paidPrice ‖ paymentStatus ‖ secret_key))
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

use crate::config::{Deployment, IyzicoConfig};
use crate::hashed::{HashEncoding, HashScheme};

/// `CONV_{order_id}_{ms}`, hex digests
pub const SCHEME: HashScheme = HashScheme::new("CONV", HashEncoding::Hex);

/// Callback amounts are not tagged with a currency
pub const CURRENCY: &str = "TRY";

pub const STATUS_SUCCESS: &str = "SUCCESS";
pub const STATUS_FAILURE: &str = "FAILURE";

const HOSTED_PAGE: &str = "https://cpp.iyzipay.com";

/// Iyzico's JSON callback
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IyzicoCallback {
    #[serde(default)]
    pub conversation_id: String,
    #[serde(default)]
    pub payment_status: String,
    #[serde(default)]
    pub paid_price: String,
    #[serde(default)]
    pub hash: String,
}

/// Iyzico implementation of [`PaymentAdapter`]
pub struct IyzicoAdapter {
    config: IyzicoConfig,
    deployment: Deployment,
}

impl IyzicoAdapter {
    pub const fn new(config: IyzicoConfig, deployment: Deployment) -> Self {
        Self { config, deployment }
    }

    fn hosted_page(&self) -> String {
        if self.deployment.environment.is_production() {
            HOSTED_PAGE.to_string()
        } else {
            self.deployment.mock_endpoint(ProviderKind::Iyzico.as_str())
        }
    }

    /// JSON body Iyzico would post for `conversation_id`, correctly signed
    pub fn sign_callback(
        &self,
        conversation_id: &str,
        payment_status: &str,
        paid_price_minor: i64,
    ) -> Result<Vec<u8>> {
        let api_key = self.config.api_key.require()?;
        let secret_key = self.config.secret_key.require()?;
        let paid_price = paid_price_minor.to_string();

        let callback = IyzicoCallback {
            hash: SCHEME.digest(&[api_key, conversation_id, &paid_price, payment_status], secret_key),
            conversation_id: conversation_id.to_string(),
            payment_status: payment_status.to_string(),
            paid_price,
        };
        Ok(serde_json::to_vec(&callback)?)
    }
}

fn map_status(status: &str) -> PaymentStatus {
    match status {
        STATUS_SUCCESS => PaymentStatus::Paid,
        STATUS_FAILURE => PaymentStatus::Failed,
        _ => PaymentStatus::Pending,
    }
}

#[async_trait]
impl PaymentAdapter for IyzicoAdapter {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Iyzico
    }

    async fn init_payment(&self, input: PaymentInitInput) -> Result<PaymentInitResult> {
        let api_key = self.config.api_key.require()?;
        let secret_key = self.config.secret_key.require()?;

        let currency = normalize_currency(&input.currency)?;
        if currency != CURRENCY {
            return Err(PaymentError::InvalidRequest(format!(
                "Iyzico integration only accepts {CURRENCY}, got {currency}"
            )));
        }
        let amount_minor = to_minor_units(input.amount)?;

        let conversation_id = SCHEME.reference(&input.order_id, Utc::now().timestamp_millis())?;
        let token = SCHEME.digest(
            &[api_key, &conversation_id, &amount_minor.to_string()],
            secret_key,
        );
        let url = SCHEME.hosted_url(&self.hosted_page(), &conversation_id, amount_minor, &token)?;

        tracing::info!(order_id = %input.order_id, provider_ref = %conversation_id, "Created Iyzico payment");
        Ok(PaymentInitResult::redirect(conversation_id, url))
    }

    async fn verify_webhook(&self, request: &WebhookRequest) -> Result<PaymentWebhookResult> {
        let callback: IyzicoCallback = serde_json::from_slice(request.body())?;

        let api_key = self.config.api_key.require()?;
        let secret_key = self.config.secret_key.require()?;
        SCHEME
            .verify(
                &[
                    api_key,
                    &callback.conversation_id,
                    &callback.paid_price,
                    &callback.payment_status,
                ],
                secret_key,
                &callback.hash,
            )
            .inspect_err(|e| tracing::warn!(provider = "iyzico", error = %e, "Rejected webhook"))?;

        let order_id = SCHEME.order_id(&callback.conversation_id)?;
        let status = map_status(&callback.payment_status);
        tracing::info!(order_id = %order_id, provider_ref = %callback.conversation_id, status = %status, "Verified Iyzico callback");

        Ok(PaymentWebhookResult {
            order_id,
            status,
            amount: parse_minor_units(&callback.paid_price)?,
            provider_ref: callback.conversation_id,
            currency: CURRENCY.into(),
            metadata: None,
        })
    }

    /// Stub: no live Iyzico retrieve call is wired in.
    ///
    /// Always `Pending` with a zero amount; the order id comes from the
    /// conversation id.
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Credential;
    use payflow_core::Customer;
    use rust_decimal_macros::dec;
    use std::collections::HashMap;

    fn adapter() -> IyzicoAdapter {
        IyzicoAdapter::new(IyzicoConfig::new("api_key", "secret_key"), Deployment::development())
    }

    fn input(order_id: &str) -> PaymentInitInput {
        PaymentInitInput {
            order_id: order_id.into(),
            amount: dec!(100.50),
            currency: "TRY".into(),
            customer: Customer {
                email: "a@b.com".into(),
                name: None,
                phone: Some("+905551112233".into()),
            },
            success_url: None,
            cancel_url: None,
            billing: None,
            metadata: HashMap::new(),
        }
    }

    #[test]
    fn test_callback_golden_vector() {
        let body = adapter()
            .sign_callback("CONV_ORD-1_1700000000000", STATUS_SUCCESS, 10050)
            .unwrap();
        let callback: IyzicoCallback = serde_json::from_slice(&body).unwrap();
        assert_eq!(
            callback.hash,
            "3da771560287a07bacc2cf2e395d0ddfa499ef132a9181324c5327ab715d5753"
        );
        assert_eq!(callback.paid_price, "10050");
    }

    #[tokio::test]
    async fn test_init_redirects_with_conversation_id() {
        let result = adapter().init_payment(input("ORD-1")).await.unwrap();

        assert!(result.requires_redirect());
        assert!(result.secret().is_none());
        assert!(result.provider_ref().starts_with("CONV_ORD-1_"));
        assert!(result
            .redirect_url()
            .unwrap()
            .starts_with("http://localhost:3000/api/payments/mock/iyzico?ref=CONV_ORD-1_"));
    }

    #[tokio::test]
    async fn test_round_trip_recovers_order_id() {
        let adapter = adapter();
        for order_id in ["ORD-1", "a_b_c"] {
            let started = adapter.init_payment(input(order_id)).await.unwrap();
            let body = adapter
                .sign_callback(started.provider_ref(), STATUS_SUCCESS, 10050)
                .unwrap();

            let result = adapter.verify_webhook(&WebhookRequest::new(body)).await.unwrap();
            assert_eq!(result.order_id, order_id);
            assert_eq!(result.status, PaymentStatus::Paid);
            assert_eq!(result.amount, dec!(100.5));
            assert_eq!(result.currency, "TRY");
        }
    }

    #[tokio::test]
    async fn test_status_vocabulary() {
        assert_eq!(map_status(STATUS_SUCCESS), PaymentStatus::Paid);
        assert_eq!(map_status(STATUS_FAILURE), PaymentStatus::Failed);
        assert_eq!(map_status("INIT_THREEDS"), PaymentStatus::Pending);

        let adapter = adapter();
        let body = adapter
            .sign_callback("CONV_ORD-1_1700000000000", STATUS_FAILURE, 10050)
            .unwrap();
        let result = adapter.verify_webhook(&WebhookRequest::new(body)).await.unwrap();
        assert_eq!(result.status, PaymentStatus::Failed);
    }

    #[tokio::test]
    async fn test_altered_amount_rejected() {
        let adapter = adapter();
        let body = adapter
            .sign_callback("CONV_ORD-1_1700000000000", STATUS_SUCCESS, 10050)
            .unwrap();
        let mut callback: IyzicoCallback = serde_json::from_slice(&body).unwrap();
        callback.paid_price = "1".into();

        let forged = serde_json::to_vec(&callback).unwrap();
        let err = adapter
            .verify_webhook(&WebhookRequest::new(forged))
            .await
            .unwrap_err();
        assert!(matches!(err, PaymentError::Authentication(_)));
    }

    #[tokio::test]
    async fn test_wrong_secret_rejected() {
        let other = IyzicoAdapter::new(
            IyzicoConfig::new("api_key", "another_secret"),
            Deployment::development(),
        );
        let body = other
            .sign_callback("CONV_ORD-1_1700000000000", STATUS_SUCCESS, 10050)
            .unwrap();
        let err = adapter()
            .verify_webhook(&WebhookRequest::new(body))
            .await
            .unwrap_err();
        assert!(matches!(err, PaymentError::Authentication(_)));
    }

    #[tokio::test]
    async fn test_non_json_body_is_invalid() {
        let err = adapter()
            .verify_webhook(&WebhookRequest::new("conversationId=x"))
            .await
            .unwrap_err();
        assert!(matches!(err, PaymentError::InvalidRequest(_)));
    }

    #[tokio::test]
    async fn test_missing_api_key_is_configuration_error() {
        let config = IyzicoConfig {
            api_key: Credential::missing("IYZICO_API_KEY"),
            secret_key: Credential::new("IYZICO_SECRET_KEY", "secret_key"),
        };
        let adapter = IyzicoAdapter::new(config, Deployment::development());
        let err = adapter.init_payment(input("ORD-1")).await.unwrap_err();
        assert!(matches!(err, PaymentError::Configuration(ref m) if m.contains("IYZICO_API_KEY")));
    }

    #[tokio::test]
    async fn test_status_stub_is_pending() {
        let result = adapter()
            .get_payment_status("CONV_ORD-1_1700000000000")
            .await
            .unwrap();
        assert_eq!(result.order_id, "ORD-1");
        assert_eq!(result.status, PaymentStatus::Pending);

        let err = adapter().get_payment_status("garbage").await.unwrap_err();
        assert!(matches!(err, PaymentError::InvalidRequest(_)));
    }
}
