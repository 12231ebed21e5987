//! Error types for the dispatch core.
//!
//! Only startup and shutdown failures are surfaced as `DispatchError`.
//! Send failures travel as `ProducerError` values inside the dispatcher and
//! are absorbed into the retry protocol.

use relay_config_and_utils::ConfigError;
use thiserror::Error;

/// Failure reported by a producer client.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProducerError {
    /// The client refused the record before it was queued.
    #[error("Send rejected: {0}")]
    Rejected(String),

    /// The broker or client reported a failed send.
    #[error("Send failed: {0}")]
    Send(String),

    /// Connecting to the broker or creating the producer failed.
    #[error("Connection error: {0}")]
    Connection(String),

    /// The producer was already closed.
    #[error("Producer is closed")]
    Closed,
}

/// Result type alias using ProducerError.
pub type ProducerResult<T> = Result<T, ProducerError>;

/// Errors that cross the output's boundary.
#[derive(Error, Debug)]
pub enum DispatchError {
    /// Invalid configuration detected before connecting.
    #[error(transparent)]
    Configuration(#[from] ConfigError),

    /// The producer could not be created from the given configuration.
    #[error("Unable to create producer from given configuration: {0}")]
    ProducerCreation(#[source] ProducerError),

    /// Closing the producer failed.
    #[error("Failed to close producer: {0}")]
    Close(#[source] ProducerError),
}

impl DispatchError {
    /// Whether this error belongs to the startup configuration class.
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            DispatchError::Configuration(_) | DispatchError::ProducerCreation(_)
        )
    }
}

/// Result type alias using DispatchError.
pub type DispatchResult<T> = Result<T, DispatchError>;

/// Event construction error.
#[derive(Error, Debug)]
pub enum EventError {
    /// Events must be JSON objects.
    #[error("Event must be a JSON object, got {0}")]
    NotAnObject(&'static str),

    /// JSON error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type alias using EventError.
pub type EventResult<T> = Result<T, EventError>;

/// Failure turning an event into payload bytes.
#[derive(Error, Debug)]
pub enum CodecError {
    /// JSON error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type alias using CodecError.
pub type CodecResult<T> = Result<T, CodecError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn producer_error_display() {
        let err = ProducerError::Send("timeout".to_string());
        assert_eq!(err.to_string(), "Send failed: timeout");
        assert_eq!(ProducerError::Closed.to_string(), "Producer is closed");
    }

    #[test]
    fn configuration_errors_are_classified() {
        let err: DispatchError = ConfigError::Invalid("bad".to_string()).into();
        assert!(err.is_configuration());
        assert_eq!(err.to_string(), "Configuration error: bad");

        let err = DispatchError::ProducerCreation(ProducerError::Connection("refused".into()));
        assert!(err.is_configuration());

        let err = DispatchError::Close(ProducerError::Closed);
        assert!(!err.is_configuration());
    }
}
