//! Order Store
//!
//! Orders, the `providerRef -> orderId` side table, and the set of webhook
//! outcomes already applied. Adapters never touch this; the HTTP layer
//! applies their normalized results here.

use chrono::{DateTime, Utc};
use rust_decimal::{Decimal, RoundingStrategy};
use serde::Serialize;
use std::collections::hash_map::Entry;
use std::collections::{HashMap, HashSet};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use thiserror::Error;

use payflow_core::{PaymentStatus, PaymentWebhookResult, ProviderKind};

/// Result type alias
pub type Result<T> = std::result::Result<T, OrderError>;

/// Order store errors
#[derive(Error, Debug)]
pub enum OrderError {
    #[error("Order not found: {0}")]
    NotFound(String),

    /// Paid or refunded orders take no new payment attempts
    #[error("Order {order_id} is already {status}")]
    Settled {
        order_id: String,
        status: PaymentStatus,
    },

    #[error("Reference {provider_ref} belongs to order {expected}, not {actual}")]
    ReferenceMismatch {
        provider_ref: String,
        expected: String,
        actual: String,
    },

    /// A verified payment that does not cover what the order asks for
    #[error("Order {order_id} expects {expected}, payment reported {actual}")]
    AmountMismatch {
        order_id: String,
        expected: String,
        actual: String,
    },

    #[error("Storage error: {0}")]
    Storage(String),
}

/// An order as seen by the checkout flow
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    pub order_id: String,
    pub provider: ProviderKind,

    /// Major units
    pub amount: Decimal,
    pub currency: String,
    pub status: PaymentStatus,

    /// Every reference issued for this order, oldest first
    pub provider_refs: Vec<String>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Order {
    pub fn new(
        order_id: impl Into<String>,
        provider: ProviderKind,
        amount: Decimal,
        currency: impl Into<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            order_id: order_id.into(),
            provider,
            amount,
            currency: currency.into(),
            status: PaymentStatus::Pending,
            provider_refs: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Money has moved; no new attempts
    pub const fn is_settled(&self) -> bool {
        matches!(self.status, PaymentStatus::Paid | PaymentStatus::Refunded)
    }

    /// Same amount (to the minor unit) and currency as `result`
    pub fn matches_payment(&self, result: &PaymentWebhookResult) -> bool {
        let minor = |amount: Decimal| {
            amount.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
        };
        minor(self.amount) == minor(result.amount)
            && self.currency.eq_ignore_ascii_case(&result.currency)
    }

    fn transition(&mut self, to: PaymentStatus) -> Transition {
        let from = self.status;
        if from == to {
            Transition::Unchanged
        } else if can_transition(from, to) {
            self.status = to;
            self.updated_at = Utc::now();
            Transition::Applied { from, to }
        } else {
            Transition::Rejected {
                current: from,
                requested: to,
            }
        }
    }
}

/// Whether an order in `from` may move to `to`.
///
/// `Failed -> Paid` is allowed: a later attempt on the same order can
/// still succeed.
pub const fn can_transition(from: PaymentStatus, to: PaymentStatus) -> bool {
    use PaymentStatus::{Failed, Paid, Pending, Refunded};
    matches!(
        (from, to),
        (Pending, Paid | Failed) | (Failed, Paid) | (Paid, Refunded)
    )
}

/// What applying a status did
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Transition {
    Applied {
        from: PaymentStatus,
        to: PaymentStatus,
    },

    /// Order was already in the requested state
    Unchanged,

    /// Not a legal move from the current state; order untouched
    Rejected {
        current: PaymentStatus,
        requested: PaymentStatus,
    },

    /// Same `(providerRef, status)` was applied before
    Duplicate,
}

impl Transition {
    pub const fn label(&self) -> &'static str {
        match self {
            Self::Applied { .. } => "applied",
            Self::Unchanged => "unchanged",
            Self::Rejected { .. } => "rejected",
            Self::Duplicate => "duplicate",
        }
    }
}

/// Order storage trait
pub trait OrderStore: Send + Sync {
    /// Register a new payment attempt, creating the order on first use.
    /// Provider, amount and currency follow the latest attempt.
    fn begin_attempt(&self, order: Order, provider_ref: &str) -> Result<Order>;

    /// Get order by id
    fn get(&self, order_id: &str) -> Result<Option<Order>>;

    /// Resolve a provider reference to its order id
    fn order_id_for_ref(&self, provider_ref: &str) -> Result<Option<String>>;

    /// Move an order to `status` if the transition is legal
    fn apply(&self, order_id: &str, status: PaymentStatus) -> Result<Transition>;

    /// Apply a verified webhook outcome at most once per
    /// `(providerRef, status)` (atomic check + apply)
    fn apply_event(&self, result: &PaymentWebhookResult) -> Result<Transition>;
}

#[derive(Debug, Default)]
struct OrderBook {
    orders: HashMap<String, Order>,
    by_ref: HashMap<String, String>,
    processed: HashSet<(String, PaymentStatus)>,
}

impl OrderBook {
    /// Side table wins; a webhook naming a different order is refused
    fn resolve(&self, provider_ref: &str, claimed: &str) -> Result<String> {
        match self.by_ref.get(provider_ref) {
            Some(known) if known != claimed => Err(OrderError::ReferenceMismatch {
                provider_ref: provider_ref.to_string(),
                expected: known.clone(),
                actual: claimed.to_string(),
            }),
            Some(known) => Ok(known.clone()),
            None => Ok(claimed.to_string()),
        }
    }

    fn apply(&mut self, order_id: &str, status: PaymentStatus) -> Result<Transition> {
        self.orders
            .get_mut(order_id)
            .map(|order| order.transition(status))
            .ok_or_else(|| OrderError::NotFound(order_id.to_string()))
    }
}

/// In-memory order store (for development)
#[derive(Debug, Default)]
pub struct MemoryOrderStore {
    book: RwLock<OrderBook>,
}

impl MemoryOrderStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, OrderBook>> {
        self.book
            .read()
            .map_err(|_| OrderError::Storage("order store lock poisoned".into()))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, OrderBook>> {
        self.book
            .write()
            .map_err(|_| OrderError::Storage("order store lock poisoned".into()))
    }
}

impl OrderStore for MemoryOrderStore {
    fn begin_attempt(&self, order: Order, provider_ref: &str) -> Result<Order> {
        let mut book = self.write()?;

        let entry = match book.orders.entry(order.order_id.clone()) {
            Entry::Vacant(slot) => slot.insert(order),
            Entry::Occupied(slot) => {
                let entry = slot.into_mut();
                if entry.is_settled() {
                    return Err(OrderError::Settled {
                        order_id: entry.order_id.clone(),
                        status: entry.status,
                    });
                }
                entry.provider = order.provider;
                entry.amount = order.amount;
                entry.currency = order.currency;
                entry
            }
        };
        entry.provider_refs.push(provider_ref.to_string());
        entry.updated_at = Utc::now();

        let snapshot = entry.clone();
        book.by_ref
            .insert(provider_ref.to_string(), snapshot.order_id.clone());
        Ok(snapshot)
    }

    fn get(&self, order_id: &str) -> Result<Option<Order>> {
        Ok(self.read()?.orders.get(order_id).cloned())
    }

    fn order_id_for_ref(&self, provider_ref: &str) -> Result<Option<String>> {
        Ok(self.read()?.by_ref.get(provider_ref).cloned())
    }

    fn apply(&self, order_id: &str, status: PaymentStatus) -> Result<Transition> {
        self.write()?.apply(order_id, status)
    }

    fn apply_event(&self, result: &PaymentWebhookResult) -> Result<Transition> {
        let mut book = self.write()?;

        let key = (result.provider_ref.clone(), result.status);
        if book.processed.contains(&key) {
            return Ok(Transition::Duplicate);
        }

        let order_id = book.resolve(&result.provider_ref, &result.order_id)?;
        if result.status == PaymentStatus::Paid {
            let order = book
                .orders
                .get(&order_id)
                .ok_or_else(|| OrderError::NotFound(order_id.clone()))?;
            if !order.matches_payment(result) {
                return Err(OrderError::AmountMismatch {
                    order_id,
                    expected: format!("{} {}", order.amount, order.currency),
                    actual: format!("{} {}", result.amount, result.currency),
                });
            }
        }
        let transition = book.apply(&order_id, result.status)?;
        book.processed.insert(key);

        Ok(transition)
    }
}
