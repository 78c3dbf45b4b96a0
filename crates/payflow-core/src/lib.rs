//! # payflow-core
//!
//! Provider-agnostic payment contract: one way to start a charge and one way
//! to turn an asynchronous, signed PSP notification into a normalized outcome.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────┐  init_payment   ┌──────────────────────┐
//! │   Checkout   │────────────────▶│   PaymentAdapter     │
//! └──────────────┘                 │   (Strategy)         │
//! ┌──────────────┐  verify_webhook │  Stripe │ PayTR │ .. │
//! │  PSP webhook │────────────────▶│                      │
//! └──────────────┘                 └──────────┬───────────┘
//!                                             ▼
//!                                  PaymentWebhookResult
//!                                  (caller applies to order store)
//! ```
//!
//! Amounts are major units (`Decimal`) and currencies uppercase ISO 4217
//! everywhere in this crate; see [`money`].

pub mod adapter;
pub mod error;
pub mod money;
pub mod security;
pub mod types;

pub use adapter::{PaymentAdapter, ProviderKind};
pub use error::{PaymentError, Result};
pub use types::{
    BillingAddress, Customer, PaymentInitInput, PaymentInitResult, PaymentStatus,
    PaymentWebhookResult, RefundResult, WebhookOutcome, WebhookRequest,
};
