//! Application State

use std::sync::Arc;
use std::time::Duration;

use payflow_providers::AdapterFactory;

use crate::orders::OrderStore;

/// Default upper bound on a single PSP call made on behalf of a request
pub const DEFAULT_PROVIDER_TIMEOUT: Duration = Duration::from_secs(30);

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    /// Configured payment adapters
    pub factory: Arc<AdapterFactory>,

    /// Orders, reference side table and processed webhooks
    pub orders: Arc<dyn OrderStore>,

    /// Caller-imposed timeout around init/status/refund
    pub provider_timeout: Duration,
}

impl AppState {
    pub fn new(factory: AdapterFactory, orders: Arc<dyn OrderStore>) -> Self {
        Self {
            factory: Arc::new(factory),
            orders,
            provider_timeout: DEFAULT_PROVIDER_TIMEOUT,
        }
    }

    /// Read `PROVIDER_TIMEOUT_SECS`, falling back to the default
    #[must_use]
    pub fn with_timeout_from_env(mut self) -> Self {
        if let Some(secs) = std::env::var("PROVIDER_TIMEOUT_SECS")
            .ok()
            .and_then(|s| s.parse::<u64>().ok())
            .filter(|secs| *secs > 0)
        {
            self.provider_timeout = Duration::from_secs(secs);
        }
        self
    }
}
