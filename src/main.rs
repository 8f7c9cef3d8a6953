//! Command-line interface for benchgen
//!
//! # Usage Examples
//!
//! ## Inspecting Workloads
//! ```bash
//! # Validate and outline a workload
//! benchgen validate --workload workloads/tpcb.yaml
//!
//! # Encode a workload (or one unit) to the wire format and back
//! benchgen encode --workload workloads/tpcb.yaml --output tpcb.bgw
//! benchgen decode --input tpcb.bgw
//!
//! # Preview resolved operations with a different seed
//! benchgen preview --workload workloads/tpcc_lite.yaml --unit new_order --count 5 --seed 7
//!
//! # Dump rows 1000..2000 of an insert
//! benchgen rows --workload workloads/tpcc_lite.yaml --unit load_item --start 1000 --end 2000
//! ```
//!
//! ## Running
//! ```bash
//! # Dry-run with settings from a TOML file, overriding the client count
//! benchgen run --workload workloads/tpcb.yaml --config run.toml --clients 4
//!
//! # Run client 2 of 4 only (one process per client)
//! benchgen run --workload workloads/tpcb.yaml --clients 4 --client-index 2
//! ```
//!
//! Log verbosity follows `RUST_LOG` (default `info`).

use anyhow::Context;
use benchgen::{
    decode_payload, describe, encode_workload, load_workload, preview, run_workload, write_rows,
    Preview, RunConfig, RunOverrides,
};
use clap::{Parser, Subcommand};
use std::io::Write;
use std::path::PathBuf;
use workload_core::{DriverType, Workload};

#[derive(Parser)]
#[command(name = "benchgen")]
#[command(about = "Deterministic workload generation for relational database benchmarks")]
#[command(long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Load a workload, check it and print its outline
    Validate {
        #[command(flatten)]
        source: WorkloadArgs,
    },

    /// Encode a workload, or one of its units, to the wire format
    Encode {
        #[command(flatten)]
        source: WorkloadArgs,

        /// Encode only this unit
        #[arg(long)]
        unit: Option<String>,

        /// Output file
        #[arg(long, value_name = "PATH")]
        output: PathBuf,
    },

    /// Print any wire payload as YAML
    Decode {
        /// Encoded payload file
        #[arg(long, value_name = "PATH")]
        input: PathBuf,
    },

    /// Print resolved invocations of a unit as JSON
    Preview {
        #[command(flatten)]
        source: WorkloadArgs,

        /// Unit name
        #[arg(long)]
        unit: String,

        /// Invocations to resolve (rows for an insert)
        #[arg(long, default_value = "3")]
        count: u64,
    },

    /// Print generated rows of an insert as tab-separated text
    Rows {
        #[command(flatten)]
        source: WorkloadArgs,

        /// Insert unit name (its table name unless named)
        #[arg(long)]
        unit: String,

        /// First row
        #[arg(long, default_value = "0")]
        start: u64,

        /// End of the row range (exclusive); defaults to the row count
        #[arg(long)]
        end: Option<u64>,

        /// Rows generated per batch
        #[arg(long, default_value = "1000")]
        batch_size: usize,
    },

    /// Run setup, iterations and teardown against the configured driver
    Run {
        #[command(flatten)]
        source: WorkloadArgs,

        /// Run configuration file (TOML)
        #[arg(long, value_name = "PATH", env = "BENCHGEN_CONFIG")]
        config: Option<PathBuf>,

        /// Workload-phase iterations per client
        #[arg(long)]
        iterations: Option<u64>,

        /// Number of clients sharing the workload
        #[arg(long)]
        clients: Option<usize>,

        /// Run only this client of the pool
        #[arg(long)]
        client_index: Option<usize>,

        /// Rows per insert batch
        #[arg(long)]
        batch_size: Option<usize>,

        /// Driver connection URL
        #[arg(long, env = "BENCHGEN_DRIVER_URL")]
        driver_url: Option<String>,

        /// Driver type (noop, postgres, picodata)
        #[arg(long)]
        driver_type: Option<DriverType>,
    },
}

/// Where the workload comes from.
#[derive(clap::Args)]
struct WorkloadArgs {
    /// Workload file (YAML)
    #[arg(long, value_name = "PATH", env = "BENCHGEN_WORKLOAD")]
    workload: PathBuf,

    /// Replace the workload's seed
    #[arg(long, env = "BENCHGEN_SEED")]
    seed: Option<u64>,
}

impl WorkloadArgs {
    fn load(&self) -> anyhow::Result<Workload> {
        let mut workload = load_workload(&self.workload)?;
        if let Some(seed) = self.seed {
            workload.seed = seed;
        }
        Ok(workload)
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    if let Err(e) = run().await {
        eprintln!("Error: {e:#}");
        std::process::exit(1);
    }
    Ok(())
}

async fn run() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Validate { source } => {
            let workload = source.load()?;
            print!("{}", describe(&workload));
            tracing::info!("Workload '{}' is valid", workload.name);
        }
        Commands::Encode {
            source,
            unit,
            output,
        } => {
            let workload = source.load()?;
            let bytes = encode_workload(&workload, unit.as_deref())?;
            std::fs::write(&output, &bytes)
                .with_context(|| format!("Failed to write {output:?}"))?;
            tracing::info!("Wrote {} bytes to {:?}", bytes.len(), output);
        }
        Commands::Decode { input } => {
            let bytes =
                std::fs::read(&input).with_context(|| format!("Failed to read {input:?}"))?;
            let yaml = decode_payload(&bytes)
                .with_context(|| format!("Failed to decode payload in {input:?}"))?;
            print!("{yaml}");
        }
        Commands::Preview {
            source,
            unit,
            count,
        } => {
            let workload = source.load()?;
            let json = match preview(&workload, &unit, count)? {
                Preview::Units(units) => serde_json::to_string_pretty(&units)?,
                Preview::Rows(batch) => serde_json::to_string_pretty(&batch)?,
            };
            println!("{json}");
        }
        Commands::Rows {
            source,
            unit,
            start,
            end,
            batch_size,
        } => {
            let workload = source.load()?;
            let stdout = std::io::stdout();
            let mut out = std::io::BufWriter::new(stdout.lock());
            let written = write_rows(&workload, &unit, start, end, batch_size, &mut out)?;
            out.flush()?;
            tracing::debug!("Wrote {written} rows");
        }
        Commands::Run {
            source,
            config,
            iterations,
            clients,
            client_index,
            batch_size,
            driver_url,
            driver_type,
        } => {
            let workload = source.load()?;
            let base = match &config {
                Some(path) => RunConfig::from_file(path)?,
                None => RunConfig::default(),
            };
            let config = base.with_overrides(RunOverrides {
                seed: source.seed,
                batch_size,
                iterations,
                clients,
                client_index,
                driver_url,
                driver_type,
            })?;

            let summary = run_workload(workload, &config).await?;
            println!("{}", serde_json::to_string_pretty(&summary)?);
            if summary.units_failed > 0 {
                anyhow::bail!("{} unit invocations failed", summary.units_failed);
            }
        }
    }

    Ok(())
}
