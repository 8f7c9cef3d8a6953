//! Deterministic value generation for benchgen workloads.
//!
//! Generators are counter-based: the value of call `i` is a pure function
//! of `(run_seed, ordinal, rule, i)`. Any generator can therefore be
//! rebuilt in another process and resumed at any call index.
//!
//! # Architecture
//!
//! ```text
//! (run_seed, ordinal)
//!        │  SplitMix64
//!        ▼
//!    sub-seed ──► ChaCha8 stream per call ──► Synth::sample
//!        │
//!        └──────► Feistel permutation ──► Synth::value_at   (unique mode)
//!
//! Generator ─┬─► GroupGenerator (lockstep tuples)
//!            └─► UnitInstance::resolve ──► ResolvedUnit | InsertStream
//! ```
//!
//! # Example
//!
//! ```rust
//! use workload_core::GenerationRule;
//! use workload_generator::Generator;
//!
//! let rule = GenerationRule::int32_range(1, 100_000).unique();
//! let mut generator = Generator::new(42, 1, rule).unwrap();
//! let first = generator.next().unwrap();
//!
//! generator.reset();
//! assert_eq!(generator.next().unwrap(), first);
//! ```

pub mod bulk;
pub mod generator;
pub mod group;
pub mod partition;
pub mod permutation;
pub mod resolve;
pub mod seed;
pub mod synth;

// Re-exports for convenience
pub use bulk::{InsertStream, DEFAULT_BATCH_SIZE};
pub use generator::Generator;
pub use group::GroupGenerator;
pub use partition::{describe_partitioning, partition_calls, CallSlice};
pub use permutation::Permutation;
pub use resolve::{QueryInstance, Resolved, UnitInstance};
pub use synth::{FlatAlphabet, Synth};
