use thiserror::Error;

use super::registry::Category;
use crate::core::io::OutputError;
use crate::core::math::MathError;
use crate::core::selection::SelectionError;
use crate::core::trajectory::TrajectoryError;
use std::io;
use std::path::PathBuf;

/// A parameter that could not be accepted.
///
/// `slot` names the configurator slot (or, for registry and environment
/// problems, the offending registration or variable), `kind` its declared
/// kind and `value` the rejected input as written by the user.
#[derive(Debug, Error, Clone, PartialEq)]
#[error("Invalid value for '{slot}' ({kind}): {cause} [value: {value}]")]
pub struct ConfigurationError {
    pub slot: String,
    pub kind: String,
    pub value: String,
    pub cause: String,
}

impl ConfigurationError {
    pub fn new(
        slot: impl Into<String>,
        kind: impl Into<String>,
        value: impl Into<String>,
        cause: impl Into<String>,
    ) -> Self {
        Self {
            slot: slot.into(),
            kind: kind.into(),
            value: value.into(),
            cause: cause.into(),
        }
    }
}

/// Numeric or data failure inside one work unit.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum KernelError {
    #[error("Non-finite value in {0}")]
    NonFinite(String),

    #[error(transparent)]
    Math(#[from] MathError),

    #[error(transparent)]
    Trajectory(#[from] TrajectoryError),

    #[error("{0}")]
    Failed(String),
}

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("Configuration error: {0}")]
    Configuration(#[from] ConfigurationError),

    #[error("Unknown {category} '{name}'")]
    UnknownName { category: Category, name: String },

    #[error("Selection error: {0}")]
    Selection(#[from] SelectionError),

    #[error("Trajectory error: {0}")]
    Trajectory(#[from] TrajectoryError),

    #[error("Work unit {unit_id} failed: {source}")]
    Kernel {
        unit_id: usize,
        #[source]
        source: KernelError,
    },

    #[error("I/O error on '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Run cancelled")]
    Cancelled,

    #[error("Timed out: {0}")]
    Timeout(String),

    #[error("Internal logic error: {0}")]
    Internal(String),
}

impl From<OutputError> for EngineError {
    fn from(error: OutputError) -> Self {
        match error {
            OutputError::Io { path, source } => EngineError::Io { path, source },
            OutputError::Stream(source) => EngineError::Io {
                path: PathBuf::new(),
                source,
            },
            OutputError::Schema(message) => EngineError::Internal(message),
            OutputError::Format { format, message } => EngineError::Io {
                path: PathBuf::new(),
                source: io::Error::other(format!("{format}: {message}")),
            },
        }
    }
}
