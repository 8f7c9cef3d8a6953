//! Runs a workload's steps against a driver handle.
//!
//! The runner is the explicit per-client context: it owns the driver
//! handle, the run seed and one [`UnitInstance`] per unit. The harness
//! calls [`WorkloadRunner::setup`] once, [`WorkloadRunner::iteration`] as
//! often as its schedule demands, and [`WorkloadRunner::teardown`] once.

use crate::driver::{Driver, DriverStat, StepStatus};
use crate::error::DriverError;
use futures::future::join_all;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};
use workload_core::wire::encode;
use workload_core::{StepPhase, Unit, Workload};
use workload_generator::seed::client_seed;
use workload_generator::{partition_calls, Resolved, UnitInstance, DEFAULT_BATCH_SIZE};

/// Per-client runner settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunnerOptions {
    /// Rows per insert batch.
    pub batch_size: usize,
    /// Index of this client among `client_count`.
    pub client_index: usize,
    /// Number of clients sharing the workload.
    pub client_count: usize,
}

impl Default for RunnerOptions {
    fn default() -> Self {
        Self {
            batch_size: DEFAULT_BATCH_SIZE,
            client_index: 0,
            client_count: 1,
        }
    }
}

/// Result of one unit invocation.
#[derive(Debug)]
pub enum UnitOutcome {
    /// The driver accepted the operation; its stat is passed through.
    Completed { unit: String, stat: DriverStat },
    /// Generation or the driver failed; the invocation produced nothing.
    Failed { unit: String, error: DriverError },
    /// Another client is responsible for this unit.
    Skipped { unit: String },
}

impl UnitOutcome {
    /// Name of the unit.
    pub fn unit(&self) -> &str {
        match self {
            UnitOutcome::Completed { unit, .. }
            | UnitOutcome::Failed { unit, .. }
            | UnitOutcome::Skipped { unit } => unit,
        }
    }

    /// Whether the invocation failed.
    pub fn is_failed(&self) -> bool {
        matches!(self, UnitOutcome::Failed { .. })
    }
}

/// Outcomes of one step execution, in unit order.
#[derive(Debug)]
pub struct StepReport {
    pub step: String,
    pub outcomes: Vec<UnitOutcome>,
}

impl StepReport {
    /// Number of failed invocations.
    pub fn failed(&self) -> usize {
        self.outcomes.iter().filter(|o| o.is_failed()).count()
    }

    /// Sum of the stats of completed invocations.
    pub fn stat(&self) -> DriverStat {
        let mut total = DriverStat::default();
        for outcome in &self.outcomes {
            if let UnitOutcome::Completed { stat, .. } = outcome {
                total.absorb(*stat);
            }
        }
        total
    }
}

/// Totals across every step this runner executed.
#[derive(Debug, Clone, Default)]
pub struct RunMetrics {
    /// Completed unit invocations.
    pub units_completed: u64,
    /// Failed unit invocations.
    pub units_failed: u64,
    /// Statements reported by the driver.
    pub statements: u64,
    /// Rows reported by the driver.
    pub rows_inserted: u64,
    /// Time the driver reported spending.
    pub driver_duration: Duration,
    /// Wall-clock time spent in steps.
    pub total_duration: Duration,
}

impl RunMetrics {
    /// Calculate rows per second.
    pub fn rows_per_second(&self) -> f64 {
        if self.total_duration.as_secs_f64() > 0.0 {
            self.rows_inserted as f64 / self.total_duration.as_secs_f64()
        } else {
            0.0
        }
    }

    fn record(&mut self, report: &StepReport, elapsed: Duration) {
        for outcome in &report.outcomes {
            match outcome {
                UnitOutcome::Completed { stat, .. } => {
                    self.units_completed += 1;
                    self.statements += stat.statements;
                    self.rows_inserted += stat.rows;
                    self.driver_duration += stat.duration;
                }
                UnitOutcome::Failed { .. } => self.units_failed += 1,
                UnitOutcome::Skipped { .. } => {}
            }
        }
        self.total_duration += elapsed;
    }
}

/// Executes a workload for one client.
pub struct WorkloadRunner<D: Driver + ?Sized> {
    driver: Arc<D>,
    workload: Workload,
    options: RunnerOptions,
    /// `instances[i]` holds the units of `workload.steps[i]`
    instances: Vec<Vec<UnitInstance>>,
    iterations: u64,
    metrics: RunMetrics,
}

impl<D: Driver + ?Sized> WorkloadRunner<D> {
    /// Validate the workload and bind generators for every unit.
    ///
    /// Inserts use the run seed on every client, so their row ranges can
    /// be split without overlap. With several clients, queries and
    /// transactions draw from a per-client seed.
    pub fn new(
        workload: Workload,
        driver: Arc<D>,
        options: RunnerOptions,
    ) -> Result<Self, DriverError> {
        if options.client_count == 0 || options.client_index >= options.client_count {
            return Err(DriverError::Config(format!(
                "client index {} is outside a pool of {} clients",
                options.client_index, options.client_count
            )));
        }
        workload.validate()?;

        let query_seed = if options.client_count > 1 {
            client_seed(workload.seed, options.client_index as u64)
        } else {
            workload.seed
        };

        let instances = workload
            .steps
            .iter()
            .map(|step| {
                step.units
                    .iter()
                    .map(|unit| {
                        let seed = match unit {
                            Unit::Insert(_) | Unit::CreateTable(_) => workload.seed,
                            Unit::Query(_) | Unit::Transaction(_) => query_seed,
                        };
                        UnitInstance::new(seed, unit)
                    })
                    .collect::<Result<Vec<_>, _>>()
            })
            .collect::<Result<Vec<_>, _>>()?;

        info!(
            workload = %workload.name,
            seed = workload.seed,
            client = options.client_index,
            clients = options.client_count,
            "Workload runner ready"
        );

        Ok(Self {
            driver,
            workload,
            options,
            instances,
            iterations: 0,
            metrics: RunMetrics::default(),
        })
    }

    /// The driver handle.
    pub fn driver(&self) -> &Arc<D> {
        &self.driver
    }

    /// The workload being run.
    pub fn workload(&self) -> &Workload {
        &self.workload
    }

    /// Totals so far.
    pub fn metrics(&self) -> &RunMetrics {
        &self.metrics
    }

    /// Number of iterations started.
    pub fn iterations(&self) -> u64 {
        self.iterations
    }

    /// Run the setup-phase steps.
    pub async fn setup(&mut self) -> Result<Vec<StepReport>, DriverError> {
        info!(workload = %self.workload.name, "Running setup");
        self.run_phase(StepPhase::Setup).await
    }

    /// Run the workload-phase steps once.
    pub async fn iteration(&mut self) -> Result<Vec<StepReport>, DriverError> {
        self.iterations += 1;
        debug!(iteration = self.iterations, "Running iteration");
        self.run_phase(StepPhase::Workload).await
    }

    /// Run the teardown-phase steps.
    pub async fn teardown(&mut self) -> Result<Vec<StepReport>, DriverError> {
        info!(workload = %self.workload.name, "Running teardown");
        let reports = self.run_phase(StepPhase::Teardown).await?;
        info!(
            units = self.metrics.units_completed,
            failed = self.metrics.units_failed,
            rows = self.metrics.rows_inserted,
            "Run complete: {:.2} rows/sec",
            self.metrics.rows_per_second()
        );
        Ok(reports)
    }

    async fn run_phase(&mut self, phase: StepPhase) -> Result<Vec<StepReport>, DriverError> {
        let indices: Vec<usize> = self
            .workload
            .steps
            .iter()
            .enumerate()
            .filter(|(_, step)| step.phase == phase)
            .map(|(index, _)| index)
            .collect();

        let mut reports = Vec::with_capacity(indices.len());
        for index in indices {
            reports.push(self.run_step(index).await?);
        }
        Ok(reports)
    }

    async fn run_step(&mut self, index: usize) -> Result<StepReport, DriverError> {
        let start = Instant::now();
        let step = &self.workload.steps[index];
        let name = step.name.clone();
        let concurrent = step.concurrent;

        info!(step = %name, units = step.units.len(), concurrent, "Starting step");
        self.driver.notify_step(&name, StepStatus::Running).await?;

        let driver = &*self.driver;
        let options = &self.options;
        let instances = &mut self.instances[index];
        let outcomes = if concurrent {
            join_all(
                instances
                    .iter_mut()
                    .map(|instance| execute_unit(driver, instance, options)),
            )
            .await
        } else {
            let mut outcomes = Vec::with_capacity(instances.len());
            for instance in instances.iter_mut() {
                outcomes.push(execute_unit(driver, instance, options).await);
            }
            outcomes
        };

        let report = StepReport {
            step: name,
            outcomes,
        };
        let status = if report.failed() > 0 {
            StepStatus::Failed
        } else {
            StepStatus::Completed
        };
        self.driver.notify_step(&report.step, status).await?;

        let elapsed = start.elapsed();
        self.metrics.record(&report, elapsed);
        info!(
            step = %report.step,
            status = %status,
            failed = report.failed(),
            "Step finished in {:?}",
            elapsed
        );
        Ok(report)
    }
}

async fn execute_unit<D: Driver + ?Sized>(
    driver: &D,
    instance: &mut UnitInstance,
    options: &RunnerOptions,
) -> UnitOutcome {
    let unit = instance.name().to_string();
    if matches!(instance, UnitInstance::CreateTable(_)) && options.client_index != 0 {
        debug!(unit = %unit, "Schema units run on client 0 only");
        return UnitOutcome::Skipped { unit };
    }

    match dispatch(driver, instance, options).await {
        Ok(stat) => {
            debug!(unit = %unit, statements = stat.statements, rows = stat.rows, "Unit completed");
            UnitOutcome::Completed { unit, stat }
        }
        Err(error) => {
            warn!(unit = %unit, error = %error, "Unit invocation failed");
            UnitOutcome::Failed { unit, error }
        }
    }
}

async fn dispatch<D: Driver + ?Sized>(
    driver: &D,
    instance: &mut UnitInstance,
    options: &RunnerOptions,
) -> Result<DriverStat, DriverError> {
    match instance.resolve()? {
        Resolved::Unit(unit) => {
            let bytes = encode(&unit)?;
            driver.run_unit(&bytes).await
        }
        Resolved::Rows(stream) => {
            let slices = partition_calls(stream.remaining(), options.client_count);
            let slice = slices[options.client_index];
            let stream = stream
                .with_row_range(slice.range())
                .with_batch_size(options.batch_size);

            let mut total = DriverStat::default();
            for batch in stream {
                let batch = batch?;
                let bytes = encode(&batch)?;
                total.absorb(driver.insert_rows(&bytes, batch.len() as u64).await?);
            }
            Ok(total)
        }
    }
}
