//! Driving a workload end to end with the built-in driver.

use crate::config::RunConfig;
use futures::future::try_join_all;
use serde::Serialize;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info};
use workload_core::{Unit, Workload};
use workload_driver::{builtin_driver, Driver, DriverError, RunMetrics, WorkloadRunner};
use workload_generator::{describe_partitioning, partition_calls};

/// Totals of a finished run.
#[derive(Debug, Clone, Default, Serialize)]
pub struct RunSummary {
    pub workload: String,
    pub seed: u64,
    pub clients: usize,
    pub iterations: u64,
    pub units_completed: u64,
    pub units_failed: u64,
    pub statements: u64,
    pub rows_inserted: u64,
    pub duration_secs: f64,
    pub rows_per_second: f64,
}

impl RunSummary {
    fn absorb(&mut self, metrics: &RunMetrics) {
        self.units_completed += metrics.units_completed;
        self.units_failed += metrics.units_failed;
        self.statements += metrics.statements;
        self.rows_inserted += metrics.rows_inserted;
    }

    fn finish(&mut self, elapsed: Duration) {
        self.duration_secs = elapsed.as_secs_f64();
        self.rows_per_second = if self.duration_secs > 0.0 {
            self.rows_inserted as f64 / self.duration_secs
        } else {
            0.0
        };
    }
}

/// Run `workload` with the driver named in `config`.
pub async fn run_workload(mut workload: Workload, config: &RunConfig) -> anyhow::Result<RunSummary> {
    config.apply_seed(&mut workload);
    let driver = builtin_driver(&config.driver)?;
    run_with_driver(workload, config, driver).await
}

/// Run `workload` on an existing driver handle.
///
/// Every local client gets its own runner; the runners share the handle
/// and proceed concurrently.
pub async fn run_with_driver<D: Driver + ?Sized>(
    workload: Workload,
    config: &RunConfig,
    driver: Arc<D>,
) -> anyhow::Result<RunSummary> {
    let start = Instant::now();
    let clients = config.local_clients();

    for unit in workload.units() {
        if let Unit::Insert(insert) = unit {
            let slices = partition_calls(insert.row_count, config.clients);
            debug!(table = %insert.table_name, "{}", describe_partitioning(&slices));
        }
    }

    info!(
        workload = %workload.name,
        seed = workload.seed,
        clients = clients.len(),
        iterations = config.iterations,
        "Starting run"
    );

    let runners = clients
        .iter()
        .map(|&client| {
            WorkloadRunner::new(workload.clone(), driver.clone(), config.runner_options(client))
        })
        .collect::<Result<Vec<_>, _>>()?;

    let iterations = config.iterations;
    let finished = try_join_all(runners.into_iter().map(|mut runner| async move {
        runner.setup().await?;
        for _ in 0..iterations {
            runner.iteration().await?;
        }
        runner.teardown().await?;
        Ok::<_, DriverError>(runner)
    }))
    .await?;

    let mut summary = RunSummary {
        workload: workload.name.clone(),
        seed: workload.seed,
        clients: clients.len(),
        iterations,
        ..RunSummary::default()
    };
    for runner in &finished {
        summary.absorb(runner.metrics());
    }
    summary.finish(start.elapsed());

    info!(
        units = summary.units_completed,
        failed = summary.units_failed,
        rows = summary.rows_inserted,
        "Run finished in {:.2}s ({:.2} rows/sec)",
        summary.duration_secs,
        summary.rows_per_second
    );
    Ok(summary)
}
