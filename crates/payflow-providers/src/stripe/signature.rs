//! Stripe Webhook Signatures
//!
//! `stripe-signature: t=<unix>,v1=<hex>[,v1=<hex>…]` where each `v1` is
//! HMAC-SHA256 over `"{t}."` followed by the raw request body.
//!
//! Same algorithm and tolerance as `stripe::Webhook::construct_event`, which
//! cannot be used here: it deserializes the whole event into async-stripe's
//! typed `EventObject` and fails on any object type that enum lacks.

use hmac::{Hmac, Mac};
use sha2::Sha256;

use payflow_core::security::constant_time_eq;
use payflow_core::{PaymentError, Result};

type HmacSha256 = Hmac<Sha256>;

/// Header carrying the signature
pub const SIGNATURE_HEADER: &str = "stripe-signature";

/// Parsed `stripe-signature` header
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SignatureHeader {
    pub timestamp: i64,

    /// Every `v1` entry; more than one during secret rotation
    pub signatures: Vec<Vec<u8>>,
}

impl SignatureHeader {
    pub fn parse(header: &str) -> Result<Self> {
        let mut timestamp = None;
        let mut signatures = Vec::new();

        for part in header.split(',') {
            let Some((key, value)) = part.trim().split_once('=') else {
                return Err(malformed("invalid header format"));
            };
            match key {
                "t" => {
                    timestamp = Some(value.parse().map_err(|_| malformed("invalid timestamp"))?);
                }
                "v1" => {
                    signatures.push(hex::decode(value).map_err(|_| malformed("invalid v1 hex"))?);
                }
                // v0 and future schemes are not trusted
                _ => {}
            }
        }

        let timestamp = timestamp.ok_or_else(|| malformed("missing timestamp"))?;
        if signatures.is_empty() {
            return Err(malformed("missing v1 signature"));
        }

        Ok(Self {
            timestamp,
            signatures,
        })
    }
}

fn malformed(reason: &str) -> PaymentError {
    PaymentError::Authentication(format!("malformed {SIGNATURE_HEADER} header: {reason}"))
}

/// HMAC-SHA256 of `"{timestamp}." ‖ payload`
pub fn compute_signature(secret: &str, timestamp: i64, payload: &[u8]) -> Result<Vec<u8>> {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|e| PaymentError::Configuration(format!("invalid webhook secret: {e}")))?;
    mac.update(timestamp.to_string().as_bytes());
    mac.update(b".");
    mac.update(payload);
    Ok(mac.finalize().into_bytes().to_vec())
}

/// Verify `header` against the raw `payload`.
///
/// Rejects signatures whose timestamp is more than `tolerance_secs` away
/// from `now` in either direction.
pub fn verify(
    payload: &[u8],
    header: &str,
    secret: &str,
    tolerance_secs: i64,
    now: i64,
) -> Result<()> {
    let header = SignatureHeader::parse(header)?;

    if now.abs_diff(header.timestamp) > tolerance_secs.unsigned_abs() {
        return Err(PaymentError::Authentication(format!(
            "signature timestamp {} outside {tolerance_secs}s tolerance",
            header.timestamp
        )));
    }

    let expected = compute_signature(secret, header.timestamp, payload)?;
    if header
        .signatures
        .iter()
        .any(|candidate| constant_time_eq(&expected, candidate))
    {
        Ok(())
    } else {
        Err(PaymentError::Authentication("signature mismatch".into()))
    }
}

/// Produce a header value the way Stripe signs deliveries
pub fn sign(payload: &[u8], secret: &str, timestamp: i64) -> Result<String> {
    let signature = compute_signature(secret, timestamp, payload)?;
    Ok(format!("t={timestamp},v1={}", hex::encode(signature)))
}
