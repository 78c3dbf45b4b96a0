//! Hash-Signed PSP Helper
//!
//! PayTR and Iyzico share one protocol shape: the merchant builds an opaque
//! reference embedding the order id, signs a canonical concatenation of
//! fields with a shared salt, and the PSP later posts a callback carrying the
//! same fields plus a hash. The schemes differ only in prefix and encoding.
//!
//! ```text
//! reference = PREFIX "_" order_id "_" timestamp_ms
//! hash      = encode(SHA-256(field_1 ‖ field_2 ‖ … ‖ salt))
//! ```

use base64::{Engine as _, engine::general_purpose::STANDARD};
use sha2::{Digest, Sha256};

use payflow_core::security::constant_time_eq;
use payflow_core::{PaymentError, Result};

/// Output encoding of the SHA-256 digest
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum HashEncoding {
    Base64,
    Hex,
}

impl HashEncoding {
    fn encode(self, digest: &[u8]) -> String {
        match self {
            Self::Base64 => STANDARD.encode(digest),
            Self::Hex => hex::encode(digest),
        }
    }
}

/// One hash-signed PSP's reference format and digest encoding
#[derive(Clone, Copy, Debug)]
pub struct HashScheme {
    prefix: &'static str,
    encoding: HashEncoding,
}

impl HashScheme {
    pub const fn new(prefix: &'static str, encoding: HashEncoding) -> Self {
        Self { prefix, encoding }
    }

    /// Build the opaque provider-facing reference for an order
    pub fn reference(&self, order_id: &str, timestamp_ms: i64) -> Result<String> {
        if order_id.trim().is_empty() {
            return Err(PaymentError::InvalidRequest("order id is empty".into()));
        }
        Ok(format!("{}_{order_id}_{timestamp_ms}", self.prefix))
    }

    /// Recover the order id from a reference built by [`Self::reference`].
    ///
    /// The order id is everything between the prefix and the last `_`, so ids
    /// that themselves contain underscores survive the round trip.
    pub fn order_id(&self, reference: &str) -> Result<String> {
        let malformed = || PaymentError::InvalidRequest(format!("malformed reference: {reference:?}"));

        let rest = reference
            .strip_prefix(self.prefix)
            .and_then(|r| r.strip_prefix('_'))
            .ok_or_else(malformed)?;
        let (order_id, timestamp) = rest.rsplit_once('_').ok_or_else(malformed)?;

        if order_id.is_empty()
            || timestamp.is_empty()
            || !timestamp.bytes().all(|b| b.is_ascii_digit())
        {
            return Err(malformed());
        }
        Ok(order_id.to_string())
    }

    /// Encoded SHA-256 over the fields in order, followed by the salt
    pub fn digest(&self, fields: &[&str], salt: &str) -> String {
        let mut hasher = Sha256::new();
        for field in fields {
            hasher.update(field.as_bytes());
        }
        hasher.update(salt.as_bytes());
        self.encoding.encode(&hasher.finalize())
    }

    /// Recompute the digest and compare it with `supplied` in constant time
    pub fn verify(&self, fields: &[&str], salt: &str, supplied: &str) -> Result<()> {
        let supplied = supplied.trim();
        if supplied.is_empty() {
            return Err(PaymentError::Authentication("missing hash".into()));
        }

        let expected = self.digest(fields, salt);
        if constant_time_eq(expected.as_bytes(), supplied.as_bytes()) {
            Ok(())
        } else {
            Err(PaymentError::Authentication("hash mismatch".into()))
        }
    }

    /// Hosted-page URL carrying the reference, amount and token as query
    pub fn hosted_url(
        &self,
        base: &str,
        reference: &str,
        amount_minor: i64,
        token: &str,
    ) -> Result<String> {
        let amount = amount_minor.to_string();
        let query = serde_urlencoded::to_string([
            ("ref", reference),
            ("amount", amount.as_str()),
            ("token", token),
        ])
        .map_err(|e| PaymentError::InvalidRequest(e.to_string()))?;
        Ok(format!("{base}?{query}"))
    }
}
