//! Money Normalization
//!
//! Amounts cross the adapter boundary in major units (`Decimal`). PSPs that
//! work in minor units convert exactly once through this module.

use rust_decimal::{Decimal, RoundingStrategy};

use crate::error::{PaymentError, Result};

/// Minor units per major unit (kuruş, cents)
const MINOR_PER_MAJOR: i64 = 100;

/// Convert a major-unit amount to minor units, rounding half away from zero.
///
/// Rejects non-positive amounts.
pub fn to_minor_units(amount: Decimal) -> Result<i64> {
    if amount <= Decimal::ZERO {
        return Err(PaymentError::InvalidRequest(format!(
            "amount must be positive, got {amount}"
        )));
    }

    let minor = amount
        .checked_mul(Decimal::from(MINOR_PER_MAJOR))
        .ok_or_else(|| PaymentError::InvalidRequest(format!("amount out of range: {amount}")))?
        .round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero);

    i64::try_from(minor)
        .map_err(|_| PaymentError::InvalidRequest(format!("amount out of range: {amount}")))
}

/// Convert minor units back to a major-unit amount
pub fn from_minor_units(minor: i64) -> Decimal {
    Decimal::new(minor, 2).normalize()
}

/// Parse a minor-unit amount as sent in PSP callbacks (e.g. `"10050"`)
pub fn parse_minor_units(raw: &str) -> Result<Decimal> {
    let minor: i64 = raw
        .trim()
        .parse()
        .map_err(|_| PaymentError::InvalidRequest(format!("invalid minor-unit amount: {raw:?}")))?;
    Ok(from_minor_units(minor))
}

/// Normalize an ISO 4217 code to uppercase
pub fn normalize_currency(code: &str) -> Result<String> {
    let code = code.trim();
    if code.len() != 3 || !code.chars().all(|c| c.is_ascii_alphabetic()) {
        return Err(PaymentError::InvalidRequest(format!(
            "invalid currency code: {code:?}"
        )));
    }
    Ok(code.to_ascii_uppercase())
}
