//! Error taxonomy shared by every benchgen crate.
//!
//! Generation-layer errors are local to one Unit invocation: the caller
//! reports the invocation as failed and moves on. None of them are fatal
//! to the whole run.

/// Error type for rule validation, value generation and descriptor handling.
#[derive(Debug, thiserror::Error)]
pub enum WorkloadError {
    /// Malformed rule bounds or an unsupported flag combination
    #[error("Invalid generation rule: {reason}")]
    InvalidRule { reason: String },

    /// A unique generator was asked for more values than its domain holds
    #[error("Domain exhausted for generator #{ordinal} after {domain_size} unique values")]
    DomainExhausted { ordinal: u64, domain_size: u64 },

    /// A template placeholder has no bound generator
    #[error("Unresolved parameter '{name}' in unit '{unit}'")]
    UnresolvedParameter { unit: String, name: String },

    /// A tuple does not match the declared member count of its group
    #[error("Group '{group}' expects {expected} members, got {actual}")]
    GroupArityMismatch {
        group: String,
        expected: usize,
        actual: usize,
    },

    /// Incompatible or corrupt wire bytes
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Two bindings in one workload share an ordinal
    #[error("Ordinal {ordinal} is bound more than once ('{first}' and '{second}')")]
    DuplicateOrdinal {
        ordinal: u64,
        first: String,
        second: String,
    },

    /// A binding still carries the unassigned ordinal 0
    #[error("Parameter '{name}' has no ordinal assigned")]
    UnassignedOrdinal { name: String },

    /// The same parameter name is bound twice in one unit
    #[error("Parameter '{name}' is bound more than once in unit '{unit}'")]
    DuplicateParameter { unit: String, name: String },

    /// No unit with the given name exists in the workload
    #[error("Unit not found: {0}")]
    UnitNotFound(String),

    /// Error reading a workload file
    #[error("Failed to read workload file: {0}")]
    Io(#[from] std::io::Error),

    /// Error parsing workload YAML
    #[error("Failed to parse YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

impl WorkloadError {
    /// Shorthand for [`WorkloadError::InvalidRule`].
    pub fn invalid_rule(reason: impl Into<String>) -> Self {
        Self::InvalidRule {
            reason: reason.into(),
        }
    }

    /// Whether this error came from value generation rather than loading.
    pub fn is_generation_error(&self) -> bool {
        matches!(
            self,
            Self::InvalidRule { .. }
                | Self::DomainExhausted { .. }
                | Self::UnresolvedParameter { .. }
                | Self::GroupArityMismatch { .. }
        )
    }
}

impl From<rmp_serde::encode::Error> for WorkloadError {
    fn from(err: rmp_serde::encode::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

impl From<rmp_serde::decode::Error> for WorkloadError {
    fn from(err: rmp_serde::decode::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

/// Convenience alias used throughout the workspace.
pub type Result<T, E = WorkloadError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let err = WorkloadError::DomainExhausted {
            ordinal: 7,
            domain_size: 100,
        };
        assert_eq!(
            err.to_string(),
            "Domain exhausted for generator #7 after 100 unique values"
        );

        let err = WorkloadError::UnresolvedParameter {
            unit: "new_order".to_string(),
            name: "w_id".to_string(),
        };
        assert!(err.to_string().contains("'w_id'"));
        assert!(err.is_generation_error());
    }

    #[test]
    fn test_loading_errors_are_not_generation_errors() {
        let err = WorkloadError::UnitNotFound("missing".to_string());
        assert!(!err.is_generation_error());
        assert!(!WorkloadError::Serialization("bad".to_string()).is_generation_error());
    }
}
