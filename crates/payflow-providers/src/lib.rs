//! # payflow-providers
//!
//! Concrete [`PaymentAdapter`](payflow_core::PaymentAdapter) implementations
//! and the factory that selects between them.
//!
//! | provider | initiation | webhook auth |
//! |---|---|---|
//! | Stripe | Checkout Session or PaymentIntent | HMAC-SHA256 `stripe-signature` |
//! | PayTR | hosted page redirect | base64 SHA-256 form hash |
//! | Iyzico | hosted page redirect | hex SHA-256 JSON hash |
//!
//! ## Usage
//!
//! ```rust,ignore
//! use payflow_providers::{AdapterFactory, PaymentsConfig};
//!
//! let factory = AdapterFactory::new(PaymentsConfig::from_env());
//! let adapter = factory.create("paytr")?;
//!
//! let started = adapter.init_payment(input).await?;
//! // redirect the browser to started.redirect_url()
//! ```

pub mod config;
pub mod factory;
pub mod hashed;
pub mod iyzico;
pub mod paytr;
pub mod stripe;

pub use config::{
    Credential, Deployment, Environment, IyzicoConfig, PayTrConfig, PaymentsConfig, StripeConfig,
};
pub use factory::AdapterFactory;
pub use iyzico::IyzicoAdapter;
pub use paytr::PayTrAdapter;
pub use stripe::StripeAdapter;
