//! Driver that keeps every decoded call in memory.

use crate::driver::{Driver, DriverStat, StepStatus};
use crate::error::DriverError;
use async_trait::async_trait;
use std::collections::HashSet;
use tokio::sync::Mutex;
use workload_core::wire::decode;
use workload_core::{ResolvedUnit, RowBatch};

/// One call observed by a [`RecordingDriver`].
#[derive(Debug, Clone, PartialEq)]
pub enum Recorded {
    Unit(ResolvedUnit),
    Rows(RowBatch),
    Step(String, StepStatus),
}

/// Records calls in arrival order and can be told to fail named units.
#[derive(Debug, Default)]
pub struct RecordingDriver {
    calls: Mutex<Vec<Recorded>>,
    failing: HashSet<String>,
}

impl RecordingDriver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Report a driver error for every unit with this name.
    pub fn failing_unit(mut self, name: impl Into<String>) -> Self {
        self.failing.insert(name.into());
        self
    }

    /// Everything recorded so far.
    pub async fn calls(&self) -> Vec<Recorded> {
        self.calls.lock().await.clone()
    }

    /// Recorded resolved units.
    pub async fn units(&self) -> Vec<ResolvedUnit> {
        self.calls
            .lock()
            .await
            .iter()
            .filter_map(|call| match call {
                Recorded::Unit(unit) => Some(unit.clone()),
                _ => None,
            })
            .collect()
    }

    /// Recorded row batches.
    pub async fn batches(&self) -> Vec<RowBatch> {
        self.calls
            .lock()
            .await
            .iter()
            .filter_map(|call| match call {
                Recorded::Rows(batch) => Some(batch.clone()),
                _ => None,
            })
            .collect()
    }

    /// Recorded step notifications.
    pub async fn steps(&self) -> Vec<(String, StepStatus)> {
        self.calls
            .lock()
            .await
            .iter()
            .filter_map(|call| match call {
                Recorded::Step(name, status) => Some((name.clone(), *status)),
                _ => None,
            })
            .collect()
    }
}

#[async_trait]
impl Driver for RecordingDriver {
    async fn run_unit(&self, unit: &[u8]) -> Result<DriverStat, DriverError> {
        let unit: ResolvedUnit = decode(unit)?;
        if self.failing.contains(unit.name()) {
            return Err(DriverError::driver(40001, format!("{} rejected", unit.name())));
        }
        let statements = unit.statement_count() as u64;
        self.calls.lock().await.push(Recorded::Unit(unit));
        Ok(DriverStat {
            statements,
            ..DriverStat::default()
        })
    }

    async fn insert_rows(&self, batch: &[u8], row_count: u64) -> Result<DriverStat, DriverError> {
        let batch: RowBatch = decode(batch)?;
        self.calls.lock().await.push(Recorded::Rows(batch));
        Ok(DriverStat {
            statements: 1,
            rows: row_count,
            ..DriverStat::default()
        })
    }

    async fn notify_step(&self, step: &str, status: StepStatus) -> Result<(), DriverError> {
        self.calls
            .lock()
            .await
            .push(Recorded::Step(step.to_string(), status));
        Ok(())
    }
}
