//! Block fingerprints and content digests.
//!
//! Fingerprints are Karp-Rabin polynomial hashes over the Mersenne prime
//! 2^61-1, so sliding the window one byte costs O(1). They only nominate
//! candidates; every candidate is byte-compared before it becomes a match.
//! Whole-buffer integrity uses SHA-256.

use sha2::{Digest, Sha256};

use crate::types::DIGEST_LEN;

/// Polynomial base for the block fingerprint.
pub const HASH_BASE: u64 = 263;
/// Mersenne prime 2^61-1.
pub const HASH_MOD: u64 = (1 << 61) - 1;

/// Reduce modulo 2^61-1 without division: x mod M = (x >> 61) + (x & M).
#[inline]
pub fn mod_mersenne(x: u128) -> u64 {
    let m = HASH_MOD as u128;
    let mut r = (x >> 61) + (x & m);
    if r >= m {
        r -= m;
    }
    // x >> 61 can itself exceed M for products near 2^122
    let mut r2 = (r >> 61) + (r & m);
    if r2 >= m {
        r2 -= m;
    }
    r2 as u64
}

/// Fingerprint of a whole window.
///
/// F(X) = (x_0 * b^{n-1} + x_1 * b^{n-2} + ... + x_{n-1}) mod (2^61-1)
pub fn fingerprint(window: &[u8]) -> u64 {
    window.iter().fold(0u64, |h, &byte| {
        mod_mersenne(h as u128 * HASH_BASE as u128 + byte as u128)
    })
}

/// HASH_BASE^{n-1} mod HASH_MOD, the weight of the byte leaving the window.
fn leading_weight(n: usize) -> u64 {
    if n == 0 {
        return 1;
    }
    let mut result: u64 = 1;
    let mut base = HASH_BASE;
    let mut exp = n - 1;
    while exp > 0 {
        if exp & 1 == 1 {
            result = mod_mersenne(result as u128 * base as u128);
        }
        base = mod_mersenne(base as u128 * base as u128);
        exp >>= 1;
    }
    result
}

/// Fixed-width fingerprint window that can slide one byte at a time.
#[derive(Clone, Debug)]
pub struct RollingHash {
    value: u64,
    weight: u64,
    width: usize,
}

impl RollingHash {
    /// Start a window over `window`; its length fixes the width.
    pub fn new(window: &[u8]) -> Self {
        RollingHash {
            value: fingerprint(window),
            weight: leading_weight(window.len()),
            width: window.len(),
        }
    }

    /// Restart at a new position without recomputing the leading weight.
    pub fn reset(&mut self, window: &[u8]) {
        debug_assert_eq!(window.len(), self.width);
        self.value = fingerprint(window);
    }

    #[inline]
    pub fn value(&self) -> u64 {
        self.value
    }

    #[inline]
    pub fn width(&self) -> usize {
        self.width
    }

    /// Drop `outgoing` from the left, append `incoming` on the right.
    ///
    /// F(X_{r+1}) = ((F(X_r) - outgoing * b^{n-1}) * b + incoming) mod (2^61-1)
    #[inline]
    pub fn roll(&mut self, outgoing: u8, incoming: u8) -> u64 {
        let sub = mod_mersenne(outgoing as u128 * self.weight as u128);
        let v = if self.value >= sub {
            self.value - sub
        } else {
            HASH_MOD - (sub - self.value)
        };
        self.value = mod_mersenne(v as u128 * HASH_BASE as u128 + incoming as u128);
        self.value
    }
}

/// SHA-256 of a whole buffer, recorded in the patch header.
pub fn content_digest(data: &[u8]) -> [u8; DIGEST_LEN] {
    Sha256::digest(data).into()
}
