//! HTTP Handlers

use axum::{
    Json,
    body::Bytes,
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::future::Future;

use payflow_core::money::{normalize_currency, to_minor_units};
use payflow_core::{
    PaymentError, PaymentInitInput, PaymentInitResult, PaymentStatus, PaymentWebhookResult,
    ProviderKind, RefundResult, WebhookOutcome, WebhookRequest,
};
use payflow_providers::{iyzico, paytr};

use crate::orders::{Order, OrderError, OrderStore, Transition};
use crate::state::AppState;

// ============================================================================
// Request / Response Types
// ============================================================================

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub environment: &'static str,
    pub providers: Vec<&'static str>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RefundRequest {
    pub provider_ref: String,

    /// Major units; full refund when absent
    #[serde(default)]
    pub amount: Option<Decimal>,
}

/// Query of the development-only mock hosted page. The amount in the
/// redirect link is display-only; callbacks are signed for the stored order.
#[derive(Debug, Deserialize)]
pub struct MockCallbackQuery {
    #[serde(rename = "ref")]
    pub reference: String,

    /// `success` (default) or `failed`
    #[serde(default)]
    pub status: Option<String>,
}

/// Body returned to PSPs (other than PayTR) and to the mock page
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WebhookAck {
    pub received: bool,

    /// `applied` | `unchanged` | `rejected` | `duplicate` | `ignored` |
    /// `unknown_order` | `reference_mismatch` | `amount_mismatch`
    pub outcome: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub order_id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<PaymentStatus>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub event_type: Option<String>,
}

impl WebhookAck {
    fn ignored(event_type: String) -> Self {
        Self {
            received: true,
            outcome: "ignored".into(),
            order_id: None,
            status: None,
            event_type: Some(event_type),
        }
    }

    fn processed(result: &PaymentWebhookResult, outcome: &str) -> Self {
        Self {
            received: true,
            outcome: outcome.into(),
            order_id: Some(result.order_id.clone()),
            status: Some(result.status),
            event_type: None,
        }
    }
}

pub type ApiError = (StatusCode, Json<ErrorResponse>);

// ============================================================================
// Error Mapping
// ============================================================================

fn reject(status: StatusCode, error: impl Into<String>, code: &str) -> ApiError {
    (
        status,
        Json(ErrorResponse {
            error: error.into(),
            code: code.into(),
        }),
    )
}

fn payment_error(err: &PaymentError) -> ApiError {
    match err {
        PaymentError::Configuration(_) => reject(
            StatusCode::INTERNAL_SERVER_ERROR,
            err.user_message(),
            "CONFIGURATION_ERROR",
        ),
        PaymentError::Authentication(_) => {
            reject(StatusCode::BAD_REQUEST, err.user_message(), "AUTHENTICATION_FAILED")
        }
        PaymentError::UnsupportedEvent(_) => {
            reject(StatusCode::OK, err.user_message(), "IGNORED")
        }
        PaymentError::ProviderApi(_) => {
            reject(StatusCode::BAD_GATEWAY, err.user_message(), "PROVIDER_ERROR")
        }
        PaymentError::InvalidRequest(_) => {
            reject(StatusCode::BAD_REQUEST, err.to_string(), "INVALID_REQUEST")
        }
        PaymentError::NotSupported(_) => {
            reject(StatusCode::NOT_IMPLEMENTED, err.to_string(), "NOT_SUPPORTED")
        }
    }
}

/// PSPs retry on non-2xx; upstream trouble asks for a retry
fn webhook_error(err: &PaymentError) -> ApiError {
    if err.is_retryable() {
        reject(StatusCode::SERVICE_UNAVAILABLE, err.user_message(), "PROVIDER_ERROR")
    } else {
        payment_error(err)
    }
}

fn order_error(err: &OrderError) -> ApiError {
    match err {
        OrderError::NotFound(_) => reject(StatusCode::NOT_FOUND, err.to_string(), "ORDER_NOT_FOUND"),
        OrderError::Settled { .. } => reject(StatusCode::CONFLICT, err.to_string(), "ORDER_SETTLED"),
        OrderError::ReferenceMismatch { .. } => {
            reject(StatusCode::BAD_REQUEST, "Reference does not match order", "REFERENCE_MISMATCH")
        }
        OrderError::AmountMismatch { .. } => {
            reject(StatusCode::BAD_REQUEST, "Payment does not match order", "AMOUNT_MISMATCH")
        }
        OrderError::Storage(_) => {
            tracing::error!(error = %err, "Order store failure");
            reject(StatusCode::INTERNAL_SERVER_ERROR, "Order store unavailable", "STORAGE_ERROR")
        }
    }
}

fn parse_provider(name: &str) -> Result<ProviderKind, ApiError> {
    name.parse().map_err(|_| {
        reject(
            StatusCode::NOT_FOUND,
            format!("Unknown payment provider: {name}"),
            "UNKNOWN_PROVIDER",
        )
    })
}

/// Run one PSP call under the caller-imposed timeout
async fn call_provider<T>(
    state: &AppState,
    provider: ProviderKind,
    operation: &'static str,
    call: impl Future<Output = payflow_core::Result<T>>,
) -> Result<T, ApiError> {
    match tokio::time::timeout(state.provider_timeout, call).await {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(e)) => {
            if e.is_retryable() {
                tracing::error!(provider = %provider, operation, error = %e, "Payment provider call failed");
            } else {
                tracing::warn!(provider = %provider, operation, error = %e, "Payment request refused");
            }
            Err(payment_error(&e))
        }
        Err(_) => {
            tracing::error!(
                provider = %provider,
                operation,
                timeout_secs = state.provider_timeout.as_secs(),
                "Payment provider timed out"
            );
            Err(reject(
                StatusCode::GATEWAY_TIMEOUT,
                "Payment provider timed out. Please try again.",
                "PROVIDER_TIMEOUT",
            ))
        }
    }
}

// ============================================================================
// Handlers
// ============================================================================

/// Health check endpoint
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let environment = if state.factory.deployment().environment.is_production() {
        "production"
    } else {
        "development"
    };

    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
        environment,
        providers: ProviderKind::ALL.iter().map(ProviderKind::as_str).collect(),
    })
}

/// Start a payment with `provider`
pub async fn init_payment(
    State(state): State<AppState>,
    Path(provider): Path<String>,
    Json(input): Json<PaymentInitInput>,
) -> Result<Json<PaymentInitResult>, ApiError> {
    let kind = parse_provider(&provider)?;
    let currency = normalize_currency(&input.currency).map_err(|e| payment_error(&e))?;

    if let Some(order) = state.orders.get(&input.order_id).map_err(|e| order_error(&e))? {
        if order.is_settled() {
            return Err(order_error(&OrderError::Settled {
                order_id: order.order_id,
                status: order.status,
            }));
        }
    }

    let order = Order::new(input.order_id.clone(), kind, input.amount, currency);
    let adapter = state.factory.get(kind);
    let started = call_provider(&state, kind, "init", adapter.init_payment(input)).await?;

    state
        .orders
        .begin_attempt(order, started.provider_ref())
        .map_err(|e| order_error(&e))?;

    Ok(Json(started))
}

/// Query the provider and reconcile the order with what it reports
pub async fn payment_status(
    State(state): State<AppState>,
    Path((provider, provider_ref)): Path<(String, String)>,
) -> Result<Json<PaymentWebhookResult>, ApiError> {
    let kind = parse_provider(&provider)?;
    let adapter = state.factory.get(kind);
    let result = call_provider(
        &state,
        kind,
        "status",
        adapter.get_payment_status(&provider_ref),
    )
    .await?;

    if matches!(result.status, PaymentStatus::Paid | PaymentStatus::Failed) {
        match state.orders.apply(&result.order_id, result.status) {
            Ok(transition) => {
                tracing::debug!(order_id = %result.order_id, outcome = transition.label(), "Reconciled order");
            }
            Err(OrderError::NotFound(_)) => {}
            Err(e) => return Err(order_error(&e)),
        }
    }

    Ok(Json(result))
}

/// Refund all or part of a payment
pub async fn refund_payment(
    State(state): State<AppState>,
    Path(provider): Path<String>,
    Json(request): Json<RefundRequest>,
) -> Result<Json<RefundResult>, ApiError> {
    let kind = parse_provider(&provider)?;
    let adapter = state.factory.get(kind);
    let result = call_provider(
        &state,
        kind,
        "refund",
        adapter.refund(&request.provider_ref, request.amount),
    )
    .await?;

    // Partial refunds leave the order paid
    if result.success && request.amount.is_none() {
        if let Some(order_id) = state
            .orders
            .order_id_for_ref(&request.provider_ref)
            .map_err(|e| order_error(&e))?
        {
            let transition = state
                .orders
                .apply(&order_id, PaymentStatus::Refunded)
                .map_err(|e| order_error(&e))?;
            tracing::info!(order_id = %order_id, outcome = transition.label(), "Order refunded");
        }
    }

    Ok(Json(result))
}

/// Inbound PSP webhook
pub async fn webhook(
    State(state): State<AppState>,
    Path(provider): Path<String>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Response, ApiError> {
    let kind = parse_provider(&provider)?;

    let request = headers
        .iter()
        .fold(WebhookRequest::new(body.to_vec()), |request, (name, value)| {
            match value.to_str() {
                Ok(value) => request.with_header(name.as_str(), value),
                Err(_) => request,
            }
        });

    let ack = process_webhook(&state, kind, &request).await?;

    Ok(match kind {
        // PayTR keeps retrying until it reads a literal OK
        ProviderKind::PayTr => "OK".into_response(),
        ProviderKind::Stripe | ProviderKind::Iyzico => Json(ack).into_response(),
    })
}

/// Development-only stand-in for the PayTR/Iyzico hosted pages: signs the
/// callback the PSP would send and feeds it through the webhook path
pub async fn mock_callback(
    State(state): State<AppState>,
    Path(provider): Path<String>,
    Query(query): Query<MockCallbackQuery>,
) -> Result<Json<WebhookAck>, ApiError> {
    if state.factory.deployment().environment.is_production() {
        return Err(reject(StatusCode::NOT_FOUND, "Not found", "NOT_FOUND"));
    }

    let kind = parse_provider(&provider)?;
    let failed = query.status.as_deref() == Some("failed");

    let order = match state
        .orders
        .order_id_for_ref(&query.reference)
        .map_err(|e| order_error(&e))?
    {
        Some(order_id) => state.orders.get(&order_id).map_err(|e| order_error(&e))?,
        None => None,
    }
    .ok_or_else(|| reject(StatusCode::NOT_FOUND, "Unknown payment reference", "UNKNOWN_REFERENCE"))?;
    let amount = to_minor_units(order.amount).map_err(|e| payment_error(&e))?;

    let body = match kind {
        ProviderKind::PayTr => {
            let status = if failed { paytr::STATUS_FAILED } else { paytr::STATUS_SUCCESS };
            state.factory.paytr().sign_callback(&query.reference, status, amount)
        }
        ProviderKind::Iyzico => {
            let status = if failed { iyzico::STATUS_FAILURE } else { iyzico::STATUS_SUCCESS };
            state.factory.iyzico().sign_callback(&query.reference, status, amount)
        }
        ProviderKind::Stripe => {
            return Err(reject(
                StatusCode::NOT_FOUND,
                "Stripe hosts its own test checkout",
                "NO_MOCK",
            ));
        }
    }
    .map_err(|e| payment_error(&e))?;

    tracing::info!(provider = %kind, provider_ref = %query.reference, failed, "Simulating PSP callback");
    let ack = process_webhook(&state, kind, &WebhookRequest::new(body)).await?;
    Ok(Json(ack))
}

/// Verify, dedup and apply one webhook
async fn process_webhook(
    state: &AppState,
    kind: ProviderKind,
    request: &WebhookRequest,
) -> Result<WebhookAck, ApiError> {
    let adapter = state.factory.get(kind);

    let result = match adapter.handle_webhook(request).await {
        Ok(WebhookOutcome::Processed(result)) => result,
        Ok(WebhookOutcome::Ignored { event_type }) => return Ok(WebhookAck::ignored(event_type)),
        Err(e) => return Err(webhook_error(&e)),
    };

    match state.orders.apply_event(&result) {
        Ok(transition) => {
            match transition {
                Transition::Rejected { current, requested } => tracing::warn!(
                    provider = %kind,
                    order_id = %result.order_id,
                    current = %current,
                    requested = %requested,
                    "Ignoring out-of-order payment status"
                ),
                Transition::Duplicate => tracing::info!(
                    provider = %kind,
                    provider_ref = %result.provider_ref,
                    status = %result.status,
                    "Duplicate webhook delivery"
                ),
                Transition::Applied { .. } | Transition::Unchanged => tracing::info!(
                    provider = %kind,
                    order_id = %result.order_id,
                    status = %result.status,
                    outcome = transition.label(),
                    "Applied payment webhook"
                ),
            }
            Ok(WebhookAck::processed(&result, transition.label()))
        }
        // Authenticated but unusable: acknowledge so the PSP stops retrying
        Err(OrderError::NotFound(order_id)) => {
            tracing::warn!(provider = %kind, order_id = %order_id, "Webhook for unknown order");
            Ok(WebhookAck::processed(&result, "unknown_order"))
        }
        Err(e @ OrderError::ReferenceMismatch { .. }) => {
            tracing::warn!(provider = %kind, error = %e, "Webhook reference names another order");
            Ok(WebhookAck::processed(&result, "reference_mismatch"))
        }
        Err(e @ OrderError::AmountMismatch { .. }) => {
            tracing::warn!(provider = %kind, error = %e, "Webhook amount does not match order");
            Ok(WebhookAck::processed(&result, "amount_mismatch"))
        }
        Err(e) => Err(order_error(&e)),
    }
}
