//! Driver boundary and step runner for benchgen workloads.
//!
//! This crate connects resolved operations to whatever executes them:
//!
//! - [`Driver`] - The trait external database drivers implement
//! - [`WorkloadRunner`] - Per-client context running setup, iterations and teardown
//! - [`DryRunDriver`] - Logs operations instead of executing them
//! - [`RecordingDriver`] - Keeps decoded calls in memory for tests and previews
//!
//! # Architecture
//!
//! ```text
//! WorkloadRunner
//!    │  UnitInstance::resolve (workload-generator)
//!    ▼
//! ResolvedUnit / RowBatch ──► wire::encode ──► Driver::run_unit
//!                                          └─► Driver::insert_rows
//! ```
//!
//! # Example
//!
//! ```rust
//! use std::sync::Arc;
//! use workload_core::{GenerationRule, Query, Step, Workload};
//! use workload_driver::{RecordingDriver, RunnerOptions, WorkloadRunner};
//!
//! let mut workload = Workload::new("demo", 42).step(Step::new(
//!     "run",
//!     vec![Query::new("lookup", "SELECT * FROM item WHERE i_id = :id")
//!         .param("id", GenerationRule::int32_range(1, 100_000))
//!         .into()],
//! ));
//! workload.assign_ordinals();
//!
//! let driver = Arc::new(RecordingDriver::new());
//! let mut runner = WorkloadRunner::new(workload, driver.clone(), RunnerOptions::default()).unwrap();
//! tokio_test::block_on(async {
//!     runner.setup().await.unwrap();
//!     runner.iteration().await.unwrap();
//!     runner.teardown().await.unwrap();
//!     assert_eq!(driver.units().await.len(), 1);
//! });
//! ```

pub mod driver;
pub mod dry_run;
pub mod error;
pub mod recording;
pub mod runner;

// Re-exports for convenience
pub use driver::{builtin_driver, Driver, DriverStat, StepStatus};
pub use dry_run::{DryRunDriver, DryRunTotals};
pub use error::DriverError;
pub use recording::{Recorded, RecordingDriver};
pub use runner::{RunMetrics, RunnerOptions, StepReport, UnitOutcome, WorkloadRunner};
