//! The external driver boundary.
//!
//! Operations cross this boundary as wire-encoded bytes
//! ([`workload_core::wire`]), so a driver may live in another process or
//! plugin and be written against the wire format alone.

use crate::dry_run::DryRunDriver;
use crate::error::DriverError;
use async_trait::async_trait;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;
use workload_core::{DriverConfig, DriverType};

/// Lifecycle notification for a step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepStatus {
    Running,
    Completed,
    Failed,
}

impl fmt::Display for StepStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StepStatus::Running => write!(f, "running"),
            StepStatus::Completed => write!(f, "completed"),
            StepStatus::Failed => write!(f, "failed"),
        }
    }
}

/// What a driver reports back for one call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DriverStat {
    /// Statements executed.
    pub statements: u64,
    /// Rows written.
    pub rows: u64,
    /// Time spent in the driver.
    pub duration: Duration,
}

impl DriverStat {
    /// Add another stat to this one.
    pub fn absorb(&mut self, other: DriverStat) {
        self.statements += other.statements;
        self.rows += other.rows;
        self.duration += other.duration;
    }
}

/// Executes resolved operations.
///
/// Implementations own connections and transactions. The runner shares one
/// handle across concurrently executing units, hence `&self`.
#[async_trait]
pub trait Driver: Send + Sync {
    /// Execute one encoded [`workload_core::ResolvedUnit`].
    async fn run_unit(&self, unit: &[u8]) -> Result<DriverStat, DriverError>;

    /// Load one encoded [`workload_core::RowBatch`] of `row_count` rows.
    async fn insert_rows(&self, batch: &[u8], row_count: u64) -> Result<DriverStat, DriverError>;

    /// Observe a step transition. The default ignores it.
    async fn notify_step(&self, _step: &str, _status: StepStatus) -> Result<(), DriverError> {
        Ok(())
    }
}

/// Driver built into this binary for `config`.
///
/// Database drivers are external; only the dry-run driver ships here.
pub fn builtin_driver(config: &DriverConfig) -> Result<Arc<dyn Driver>, DriverError> {
    match config.driver_type {
        DriverType::Noop => {
            info!(url = %config.redacted_url(), "Using dry-run driver");
            Ok(Arc::new(DryRunDriver::new()))
        }
        other => Err(DriverError::Unsupported(other)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stat_absorb() {
        let mut total = DriverStat::default();
        total.absorb(DriverStat {
            statements: 2,
            rows: 10,
            duration: Duration::from_millis(5),
        });
        total.absorb(DriverStat {
            statements: 1,
            rows: 0,
            duration: Duration::from_millis(1),
        });
        assert_eq!(total.statements, 3);
        assert_eq!(total.rows, 10);
        assert_eq!(total.duration, Duration::from_millis(6));
    }

    #[test]
    fn test_builtin_driver() {
        assert!(builtin_driver(&DriverConfig::default()).is_ok());
        let postgres = DriverConfig::new("postgres://localhost", DriverType::Postgres);
        assert!(matches!(
            builtin_driver(&postgres),
            Err(DriverError::Unsupported(DriverType::Postgres))
        ));
    }

    #[test]
    fn test_status_display() {
        assert_eq!(StepStatus::Completed.to_string(), "completed");
    }
}
