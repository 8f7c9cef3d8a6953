//! Error types for the driver boundary.

use thiserror::Error;
use workload_core::{DriverType, WorkloadError};

/// Errors raised while executing a workload against a driver.
#[derive(Error, Debug)]
pub enum DriverError {
    /// Generating or encoding the operation failed.
    #[error("Generation error: {0}")]
    Generation(#[from] WorkloadError),

    /// The driver reported a failure; the status is passed through as is.
    #[error("Driver error {code}: {message}")]
    Driver { code: i32, message: String },

    /// Invalid runner configuration.
    #[error("Configuration error: {0}")]
    Config(String),

    /// No driver of this type is linked into the binary.
    #[error("Driver '{0}' is not available in this build")]
    Unsupported(DriverType),
}

impl DriverError {
    /// Driver-side failure with an opaque status code.
    pub fn driver(code: i32, message: impl Into<String>) -> Self {
        Self::Driver {
            code,
            message: message.into(),
        }
    }
}
