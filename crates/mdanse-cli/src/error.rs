use mdanse::core::trajectory::TrajectoryError;
use mdanse::engine::error::EngineError;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, CliError>;

#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Engine(#[from] EngineError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid argument: {0}")]
    Argument(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl CliError {
    /// Process exit code: 1 for rejected input, 2 for failures while
    /// running, 3 for I/O.
    pub fn exit_code(&self) -> i32 {
        match self {
            CliError::Engine(error) => match error {
                EngineError::Configuration(_)
                | EngineError::UnknownName { .. }
                | EngineError::Selection(_) => 1,
                EngineError::Io { .. }
                | EngineError::Trajectory(TrajectoryError::Unreadable { .. }) => 3,
                EngineError::Trajectory(_)
                | EngineError::Kernel { .. }
                | EngineError::Cancelled
                | EngineError::Timeout(_)
                | EngineError::Internal(_) => 2,
            },
            CliError::Argument(_) => 1,
            CliError::Io(_) => 3,
            CliError::Other(_) => 2,
        }
    }
}
