//! Seed derivation and per-call random streams.
//!
//! Every generator draws from its own sub-seed, derived from the run seed
//! and the generator's ordinal. Each call then gets an independent ChaCha8
//! stream selected by the call index, so the i-th value never depends on
//! how many values were drawn before it or by whom.

use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

/// Golden-ratio increment used by SplitMix64.
pub const GOLDEN_GAMMA: u64 = 0x9E37_79B9_7F4A_7C15;

/// Domain separator for permutation keys.
const PERMUTATION_SALT: u64 = 0x5EED_FE15_7E1D_0001;

/// SplitMix64 output function.
pub fn splitmix64(value: u64) -> u64 {
    let mut z = value.wrapping_add(GOLDEN_GAMMA);
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
    z ^ (z >> 31)
}

/// Sub-seed of generator `ordinal` within a run.
pub fn sub_seed(run_seed: u64, ordinal: u64) -> u64 {
    splitmix64(splitmix64(run_seed) ^ ordinal.wrapping_mul(GOLDEN_GAMMA))
}

/// Run seed of client `client_index` when clients draw independent streams.
pub fn client_seed(run_seed: u64, client_index: u64) -> u64 {
    splitmix64(run_seed ^ splitmix64(client_index ^ PERMUTATION_SALT))
}

/// Key of the unique-mode permutation for a sub-seed.
pub fn permutation_key(sub_seed: u64) -> u64 {
    splitmix64(sub_seed ^ PERMUTATION_SALT)
}

/// Random stream for one call of one generator.
pub fn call_rng(sub_seed: u64, call_index: u64) -> ChaCha8Rng {
    let mut rng = ChaCha8Rng::seed_from_u64(sub_seed);
    rng.set_stream(call_index);
    rng
}
