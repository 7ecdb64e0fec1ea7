//! Experiment errors

use gclab_gc::GcError;
use thiserror::Error;

/// Errors that can stop an experiment
#[derive(Debug, Error)]
pub enum ExperimentError {
    /// Writing the report failed
    #[error("output error: {0}")]
    Io(#[from] std::io::Error),

    /// The heap refused an operation
    #[error(transparent)]
    Gc(#[from] GcError),

    /// The async runtime for task-based workloads could not start
    #[error("failed to start async runtime: {0}")]
    Runtime(#[source] std::io::Error),

    /// A worker unwound instead of finishing
    #[error("worker failed: {0}")]
    WorkerFailed(String),
}

/// Result type for experiments
pub type Result<T> = std::result::Result<T, ExperimentError>;
