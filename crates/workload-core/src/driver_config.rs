//! Driver configuration handed across the plugin boundary.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Supported driver implementations.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DriverType {
    /// Accepts everything and executes nothing
    #[default]
    Noop,
    Postgres,
    Picodata,
}

impl fmt::Display for DriverType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DriverType::Noop => write!(f, "noop"),
            DriverType::Postgres => write!(f, "postgres"),
            DriverType::Picodata => write!(f, "picodata"),
        }
    }
}

impl std::str::FromStr for DriverType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "noop" | "dry-run" => Ok(DriverType::Noop),
            "postgres" | "postgresql" => Ok(DriverType::Postgres),
            "picodata" => Ok(DriverType::Picodata),
            _ => Err(format!("Unknown driver type: {s}")),
        }
    }
}

/// Connection settings for the external driver.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DriverConfig {
    /// Connection URL
    pub url: String,

    /// Driver implementation
    #[serde(default)]
    pub driver_type: DriverType,

    /// Driver-specific options, opaque to the generation core
    #[serde(default)]
    pub options: BTreeMap<String, String>,
}

impl DriverConfig {
    /// Create a config with no options.
    pub fn new(url: impl Into<String>, driver_type: DriverType) -> Self {
        Self {
            url: url.into(),
            driver_type,
            options: BTreeMap::new(),
        }
    }

    /// Add a driver-specific option.
    pub fn with_option(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.options.insert(key.into(), value.into());
        self
    }

    /// URL with any password replaced, for logging.
    pub fn redacted_url(&self) -> String {
        let Some((scheme, rest)) = self.url.split_once("://") else {
            return self.url.clone();
        };
        let Some((credentials, host)) = rest.split_once('@') else {
            return self.url.clone();
        };
        match credentials.split_once(':') {
            Some((user, _)) => format!("{scheme}://{user}:***@{host}"),
            None => self.url.clone(),
        }
    }
}
