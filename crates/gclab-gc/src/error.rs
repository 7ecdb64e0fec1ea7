//! Heap errors

use thiserror::Error;

/// Errors raised by the heap and its worker registry
#[derive(Debug, Error)]
pub enum GcError {
    /// Tuning value is neither an integer nor `off`
    #[error("invalid gc percent {0:?}: expected an integer or \"off\"")]
    InvalidPercent(String),

    /// The OS refused to start a worker thread
    #[error("failed to spawn worker {name}: {source}")]
    Spawn {
        /// Worker name
        name: String,
        /// Underlying spawn error
        #[source]
        source: std::io::Error,
    },
}

/// Result type for heap operations
pub type Result<T> = std::result::Result<T, GcError>;
