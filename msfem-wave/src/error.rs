//! Error type shared by the whole simulation pipeline.

use thiserror::Error;

/// Errors raised while configuring or running a simulation.
#[derive(Debug, Error)]
pub enum SimulationError {
    /// Invalid or inconsistent user configuration.
    #[error("Configuration error: {0}")]
    Config(String),
    /// Internal invariant violated (partition, DOF numbering, cluster protocol).
    #[error("Consistency error: {0}")]
    Consistency(String),
    /// Operator or vector sizes do not line up.
    #[error("Dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },
    /// Reading media files or writing outputs failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    /// Local spectral problem could not be solved.
    #[error("Eigensolver error: {0}")]
    Eigen(#[from] solvers::EigenError),
}

impl SimulationError {
    pub fn config(message: impl Into<String>) -> Self {
        SimulationError::Config(message.into())
    }

    pub fn consistency(message: impl Into<String>) -> Self {
        SimulationError::Consistency(message.into())
    }
}
