//! Error types for the relay binary.

use pulsar_dispatch::DispatchError;
use relay_config_and_utils::ConfigError;
use thiserror::Error;

/// Relay error type.
#[derive(Error, Debug)]
pub enum RelayError {
    /// Configuration could not be loaded or is invalid
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// The output failed to start or stop
    #[error(transparent)]
    Dispatch(#[from] DispatchError),

    /// IO error (reading input)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// A worker task panicked or was cancelled
    #[error("Worker task failed: {0}")]
    Worker(String),
}

/// Result type for relay operations.
pub type RelayResult<T> = Result<T, RelayError>;
