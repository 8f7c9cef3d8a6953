//! Core types for benchgen workloads.
//!
//! This crate holds everything both sides of the driver boundary agree on:
//!
//! - [`GenerationRule`] - How one parameter value is synthesized
//! - [`Value`] - A concrete generated value
//! - [`Workload`] - The descriptor tree `Workload -> Step -> Unit`
//! - [`ResolvedUnit`] / [`RowBatch`] - Concrete operations for a driver
//! - [`wire`] - Versioned binary encoding of all of the above
//!
//! # Architecture
//!
//! ```text
//! workload-core (this crate)
//!    │
//!    ├─── workload-generator  (rules -> values, units -> resolved units)
//!    │
//!    └─── workload-driver     (driver boundary and step runner)
//! ```
//!
//! # Example
//!
//! ```rust
//! use workload_core::{GenerationRule, Query, Step, Workload};
//!
//! let mut workload = Workload::new("demo", 42).step(Step::new(
//!     "run",
//!     vec![Query::new("lookup", "SELECT * FROM item WHERE i_id = :id")
//!         .param("id", GenerationRule::int32_range(1, 100_000))
//!         .into()],
//! ));
//! workload.assign_ordinals();
//! workload.validate().unwrap();
//!
//! let bytes = workload_core::wire::encode(&workload).unwrap();
//! let decoded: Workload = workload_core::wire::decode(&bytes).unwrap();
//! assert_eq!(decoded, workload);
//! ```

pub mod ddl;
pub mod descriptor;
pub mod driver_config;
pub mod error;
pub mod placeholder;
pub mod resolved;
pub mod rule;
pub mod value;
pub mod wire;

// Re-exports for convenience
pub use descriptor::{
    ColumnDef, CreateTable, GroupBinding, IndexDef, Insert, InsertMethod, IsolationLevel,
    ParamBinding, Query, Step, StepPhase, Transaction, Unit, Workload,
};
pub use driver_config::{DriverConfig, DriverType};
pub use error::{Result, WorkloadError};
pub use placeholder::{to_positional, PositionalSql};
pub use resolved::{ResolvedQuery, ResolvedUnit, RowBatch};
pub use rule::{Alphabet, CharRange, Distribution, GenerationRule, RuleKind};
pub use value::Value;
