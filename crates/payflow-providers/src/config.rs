//! Provider Configuration
//!
//! Credentials are read from the environment but never required up front:
//! a missing variable only surfaces as `PaymentError::Configuration` when an
//! operation actually needs it.

use secrecy::{ExposeSecret, SecretString};

use payflow_core::{PaymentError, Result};

/// Default public URL used to build local mock redirect links
const DEFAULT_PUBLIC_BASE_URL: &str = "http://localhost:3000";

/// Default Stripe signature tolerance (matches the Stripe SDKs)
const DEFAULT_WEBHOOK_TOLERANCE_SECS: i64 = 300;

/// Deployment environment.
///
/// Development (and with it the mock hosted pages) must be asked for
/// explicitly; anything else runs as production.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Environment {
    #[default]
    Production,
    Development,
}

impl Environment {
    pub fn from_env() -> Self {
        Self::parse(std::env::var("PAYFLOW_ENV").ok().as_deref())
    }

    /// Map a `PAYFLOW_ENV` value; only `development`/`dev` (any case) opt out
    /// of production
    pub fn parse(value: Option<&str>) -> Self {
        match value.map(|v| v.trim().to_ascii_lowercase()).as_deref() {
            Some("development" | "dev") => Self::Development,
            _ => Self::Production,
        }
    }

    pub const fn is_production(&self) -> bool {
        matches!(self, Self::Production)
    }
}

/// A named credential that may be absent
#[derive(Debug)]
pub struct Credential {
    name: &'static str,
    value: Option<SecretString>,
}

impl Credential {
    pub fn new(name: &'static str, value: impl Into<String>) -> Self {
        let value: String = value.into();
        Self {
            name,
            value: Some(SecretString::new(value.into_boxed_str())),
        }
    }

    pub const fn missing(name: &'static str) -> Self {
        Self { name, value: None }
    }

    /// Read `name` from the environment; empty values count as missing
    pub fn from_env(name: &'static str) -> Self {
        match std::env::var(name) {
            Ok(v) if !v.trim().is_empty() => Self::new(name, v),
            _ => Self::missing(name),
        }
    }

    /// The secret, or a configuration error naming the variable
    pub fn require(&self) -> Result<&str> {
        self.value
            .as_ref()
            .map(|secret| secret.expose_secret())
            .ok_or_else(|| PaymentError::Configuration(format!("{} not set", self.name)))
    }

    pub const fn is_set(&self) -> bool {
        self.value.is_some()
    }
}

/// Stripe credentials
#[derive(Debug)]
pub struct StripeConfig {
    pub secret_key: Credential,
    pub webhook_secret: Credential,

    /// Maximum signature age in seconds
    pub webhook_tolerance_secs: i64,
}

impl StripeConfig {
    pub fn new(secret_key: impl Into<String>, webhook_secret: impl Into<String>) -> Self {
        Self {
            secret_key: Credential::new("STRIPE_SECRET_KEY", secret_key),
            webhook_secret: Credential::new("STRIPE_WEBHOOK_SECRET", webhook_secret),
            webhook_tolerance_secs: DEFAULT_WEBHOOK_TOLERANCE_SECS,
        }
    }

    pub fn from_env() -> Self {
        let webhook_tolerance_secs = std::env::var("STRIPE_WEBHOOK_TOLERANCE_SECS")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(DEFAULT_WEBHOOK_TOLERANCE_SECS);

        Self {
            secret_key: Credential::from_env("STRIPE_SECRET_KEY"),
            webhook_secret: Credential::from_env("STRIPE_WEBHOOK_SECRET"),
            webhook_tolerance_secs,
        }
    }
}

/// PayTR merchant credentials
#[derive(Debug)]
pub struct PayTrConfig {
    pub merchant_id: Credential,
    pub merchant_key: Credential,
    pub merchant_salt: Credential,
}

impl PayTrConfig {
    pub fn new(
        merchant_id: impl Into<String>,
        merchant_key: impl Into<String>,
        merchant_salt: impl Into<String>,
    ) -> Self {
        Self {
            merchant_id: Credential::new("PAYTR_MERCHANT_ID", merchant_id),
            merchant_key: Credential::new("PAYTR_MERCHANT_KEY", merchant_key),
            merchant_salt: Credential::new("PAYTR_MERCHANT_SALT", merchant_salt),
        }
    }

    pub fn from_env() -> Self {
        Self {
            merchant_id: Credential::from_env("PAYTR_MERCHANT_ID"),
            merchant_key: Credential::from_env("PAYTR_MERCHANT_KEY"),
            merchant_salt: Credential::from_env("PAYTR_MERCHANT_SALT"),
        }
    }
}

/// Iyzico API credentials
#[derive(Debug)]
pub struct IyzicoConfig {
    pub api_key: Credential,
    pub secret_key: Credential,
}

impl IyzicoConfig {
    pub fn new(api_key: impl Into<String>, secret_key: impl Into<String>) -> Self {
        Self {
            api_key: Credential::new("IYZICO_API_KEY", api_key),
            secret_key: Credential::new("IYZICO_SECRET_KEY", secret_key),
        }
    }

    pub fn from_env() -> Self {
        Self {
            api_key: Credential::from_env("IYZICO_API_KEY"),
            secret_key: Credential::from_env("IYZICO_SECRET_KEY"),
        }
    }
}

/// Where this service runs and how browsers reach it
#[derive(Clone, Debug)]
pub struct Deployment {
    pub environment: Environment,

    /// Public URL of this service; base of the mock redirect endpoint
    pub public_base_url: String,
}

impl Deployment {
    pub fn from_env() -> Self {
        let public_base_url = std::env::var("PUBLIC_BASE_URL")
            .unwrap_or_else(|_| DEFAULT_PUBLIC_BASE_URL.into())
            .trim_end_matches('/')
            .to_string();

        Self {
            environment: Environment::from_env(),
            public_base_url,
        }
    }

    /// Local development deployment on the default port
    pub fn development() -> Self {
        Self {
            environment: Environment::Development,
            public_base_url: DEFAULT_PUBLIC_BASE_URL.into(),
        }
    }

    /// Mock hosted page of `provider`, used outside production
    pub fn mock_endpoint(&self, provider: &str) -> String {
        format!("{}/api/payments/mock/{provider}", self.public_base_url)
    }
}

/// Everything the adapter factory needs
#[derive(Debug)]
pub struct PaymentsConfig {
    pub deployment: Deployment,
    pub stripe: StripeConfig,
    pub paytr: PayTrConfig,
    pub iyzico: IyzicoConfig,
}

impl PaymentsConfig {
    /// Load from environment variables. Never fails.
    pub fn from_env() -> Self {
        Self {
            deployment: Deployment::from_env(),
            stripe: StripeConfig::from_env(),
            paytr: PayTrConfig::from_env(),
            iyzico: IyzicoConfig::from_env(),
        }
    }
}
