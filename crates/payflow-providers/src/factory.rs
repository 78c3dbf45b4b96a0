//! Adapter Factory
//!
//! Maps a provider discriminator to its adapter. Adapters are built once and
//! shared; they hold only immutable configuration.

use std::sync::Arc;

use payflow_core::{PaymentAdapter, ProviderKind, Result};

use crate::config::{Deployment, PaymentsConfig};
use crate::iyzico::IyzicoAdapter;
use crate::paytr::PayTrAdapter;
use crate::stripe::StripeAdapter;

/// Registry of the configured adapters
pub struct AdapterFactory {
    stripe: Arc<StripeAdapter>,
    paytr: Arc<PayTrAdapter>,
    iyzico: Arc<IyzicoAdapter>,
    deployment: Deployment,
}

impl AdapterFactory {
    pub fn new(config: PaymentsConfig) -> Self {
        let PaymentsConfig {
            deployment,
            stripe,
            paytr,
            iyzico,
        } = config;

        Self {
            stripe: Arc::new(StripeAdapter::new(stripe)),
            paytr: Arc::new(PayTrAdapter::new(paytr, deployment.clone())),
            iyzico: Arc::new(IyzicoAdapter::new(iyzico, deployment.clone())),
            deployment,
        }
    }

    /// Replace the Stripe adapter, e.g. with one on a custom API
    #[must_use]
    pub fn with_stripe(mut self, stripe: StripeAdapter) -> Self {
        self.stripe = Arc::new(stripe);
        self
    }

    /// Adapter for `kind`
    pub fn get(&self, kind: ProviderKind) -> Arc<dyn PaymentAdapter> {
        match kind {
            ProviderKind::Stripe => self.stripe.clone(),
            ProviderKind::PayTr => self.paytr.clone(),
            ProviderKind::Iyzico => self.iyzico.clone(),
        }
    }

    /// Adapter for a string discriminator; unknown names are a
    /// configuration error
    pub fn create(&self, provider: &str) -> Result<Arc<dyn PaymentAdapter>> {
        let kind: ProviderKind = provider.parse()?;
        Ok(self.get(kind))
    }

    pub fn paytr(&self) -> &PayTrAdapter {
        &self.paytr
    }

    pub fn iyzico(&self) -> &IyzicoAdapter {
        &self.iyzico
    }

    pub const fn deployment(&self) -> &Deployment {
        &self.deployment
    }
}
