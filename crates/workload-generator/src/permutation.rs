//! Keyed format-preserving permutation of `[0, domain)`.
//!
//! A balanced Feistel network permutes the smallest even-width bit space
//! covering the domain. Outputs outside the domain are fed back through
//! the network (cycle walking) until they land inside it. The bit space is
//! less than four times the domain, so the expected walk is short, and the
//! permutation needs no memory beyond its round keys.

use crate::seed::splitmix64;

const ROUNDS: usize = 6;

/// Bijection on `[0, domain)` selected by a 64-bit key.
#[derive(Debug, Clone)]
pub struct Permutation {
    domain: u64,
    half_bits: u32,
    mask: u64,
    round_keys: [u64; ROUNDS],
}

impl Permutation {
    /// Create a permutation over `[0, domain)`. A zero domain is treated
    /// as one element.
    pub fn new(domain: u64, key: u64) -> Self {
        let domain = domain.max(1);
        let bits = 64 - (domain - 1).leading_zeros();
        let half_bits = bits.div_ceil(2).max(1);
        let mask = (1u64 << half_bits) - 1;

        let mut round_keys = [0u64; ROUNDS];
        let mut state = key;
        for round_key in round_keys.iter_mut() {
            state = splitmix64(state);
            *round_key = state;
        }

        Self {
            domain,
            half_bits,
            mask,
            round_keys,
        }
    }

    /// Number of elements permuted.
    pub fn domain(&self) -> u64 {
        self.domain
    }

    /// Image of `index`. `index` must be below [`Permutation::domain`].
    pub fn apply(&self, index: u64) -> u64 {
        debug_assert!(index < self.domain);
        let mut x = index;
        loop {
            x = self.encrypt(x);
            if x < self.domain {
                return x;
            }
        }
    }

    fn encrypt(&self, x: u64) -> u64 {
        let mut left = (x >> self.half_bits) & self.mask;
        let mut right = x & self.mask;
        for key in &self.round_keys {
            let mixed = left ^ (splitmix64(right ^ key) & self.mask);
            left = right;
            right = mixed;
        }
        (left << self.half_bits) | right
    }
}
