//! Run configuration.
//!
//! A run is described by a TOML file such as:
//!
//! ```toml
//! seed = 42
//! batch_size = 500
//! iterations = 10
//! clients = 4
//!
//! [driver]
//! url = "postgres://bench@localhost/bench"
//! driver_type = "postgres"
//!
//! [driver.options]
//! application_name = "benchgen"
//! ```
//!
//! Every field is optional. Command-line flags override the file.

use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::path::Path;
use workload_core::{DriverConfig, DriverType, Workload};
use workload_driver::RunnerOptions;
use workload_generator::DEFAULT_BATCH_SIZE;

/// Settings for one `benchgen run`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    /// Replaces the workload's own seed
    #[serde(skip_serializing_if = "Option::is_none")]
    pub seed: Option<u64>,

    /// Rows per insert batch
    pub batch_size: usize,

    /// Workload-phase iterations per client
    pub iterations: u64,

    /// Number of clients sharing the workload
    pub clients: usize,

    /// Run only this client instead of the whole pool
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_index: Option<usize>,

    /// Driver selection and connection settings
    pub driver: DriverConfig,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            seed: None,
            batch_size: DEFAULT_BATCH_SIZE,
            iterations: 1,
            clients: 1,
            client_index: None,
            driver: DriverConfig::default(),
        }
    }
}

/// Values given on the command line; `None` keeps the configured value.
#[derive(Debug, Clone, Default)]
pub struct RunOverrides {
    pub seed: Option<u64>,
    pub batch_size: Option<usize>,
    pub iterations: Option<u64>,
    pub clients: Option<usize>,
    pub client_index: Option<usize>,
    pub driver_url: Option<String>,
    pub driver_type: Option<DriverType>,
}

impl RunConfig {
    /// Load from a TOML file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read run config {path:?}"))?;
        Self::from_toml(&content).with_context(|| format!("Invalid run config {path:?}"))
    }

    /// Parse TOML.
    pub fn from_toml(content: &str) -> anyhow::Result<Self> {
        let config: RunConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Apply command-line overrides.
    pub fn with_overrides(mut self, overrides: RunOverrides) -> anyhow::Result<Self> {
        if let Some(seed) = overrides.seed {
            self.seed = Some(seed);
        }
        if let Some(batch_size) = overrides.batch_size {
            self.batch_size = batch_size;
        }
        if let Some(iterations) = overrides.iterations {
            self.iterations = iterations;
        }
        if let Some(clients) = overrides.clients {
            self.clients = clients;
        }
        if let Some(client_index) = overrides.client_index {
            self.client_index = Some(client_index);
        }
        if let Some(url) = overrides.driver_url {
            self.driver.url = url;
        }
        if let Some(driver_type) = overrides.driver_type {
            self.driver.driver_type = driver_type;
        }
        self.validate()?;
        Ok(self)
    }

    /// Check ranges.
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.batch_size == 0 {
            anyhow::bail!("batch_size must be at least 1");
        }
        if self.clients == 0 {
            anyhow::bail!("clients must be at least 1");
        }
        if let Some(index) = self.client_index {
            if index >= self.clients {
                anyhow::bail!(
                    "client_index {index} is outside a pool of {} clients",
                    self.clients
                );
            }
        }
        Ok(())
    }

    /// Replace the workload seed when one is configured.
    pub fn apply_seed(&self, workload: &mut Workload) {
        if let Some(seed) = self.seed {
            workload.seed = seed;
        }
    }

    /// Indices of the clients this process runs.
    pub fn local_clients(&self) -> Vec<usize> {
        match self.client_index {
            Some(index) => vec![index],
            None => (0..self.clients).collect(),
        }
    }

    /// Runner options for client `client_index`.
    pub fn runner_options(&self, client_index: usize) -> RunnerOptions {
        RunnerOptions {
            batch_size: self.batch_size,
            client_index,
            client_count: self.clients,
        }
    }
}
