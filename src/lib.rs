//! benchgen library
//!
//! Deterministic workload generation for relational database benchmarks.
//!
//! # Features
//!
//! - Reproducible parameters: every value follows from one run seed
//! - Globally unique values over large domains without per-value memory
//! - A versioned wire format for handing operations to external drivers
//! - Multi-client runs that split bulk loads without overlap
//!
//! # Workspace Crates
//!
//! - `workload_core` - Descriptor model, generation rules and wire codec
//! - `workload_generator` - Generators, resolution and bulk-load streams
//! - `workload_driver` - Driver boundary and step runner
//!
//! # CLI Usage
//!
//! ```bash
//! # Check a workload and print its outline
//! benchgen validate --workload workloads/tpcb.yaml
//!
//! # Show five resolved invocations of a unit
//! benchgen preview --workload workloads/tpcc_lite.yaml --unit new_order --count 5
//!
//! # Dump generated rows of an insert
//! benchgen rows --workload workloads/tpcc_lite.yaml --unit load_item --start 0 --end 100
//!
//! # Dry-run the whole workload with four clients
//! benchgen run --workload workloads/tpcb.yaml --clients 4 --iterations 10
//! ```

pub mod config;
pub mod inspect;
pub mod run;

// Re-exports for convenience
pub use config::{RunConfig, RunOverrides};
pub use inspect::{
    decode_payload, describe, encode_workload, load_workload, preview, write_rows, Preview,
};
pub use run::{run_with_driver, run_workload, RunSummary};
