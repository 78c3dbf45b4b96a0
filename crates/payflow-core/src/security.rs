//! Constant-time comparison for signatures and hashes.

use subtle::ConstantTimeEq;

/// Compare two byte strings without early exit on the first differing byte.
///
/// Length is not secret: slices of different length compare unequal at once.
pub fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.ct_eq(b).into()
}
