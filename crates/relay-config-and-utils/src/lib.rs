//! Configuration types, filesystem paths, and logging setup for the Pulsar relay.

mod config;
mod error;
mod logging;
mod paths;

pub use config::{
    CodecKind, CompressionType, RelayConfig, DEFAULT_LOG_LEVEL, DEFAULT_RETRY_BACKOFF_MS,
    DEFAULT_SERVICE_URL,
};
pub use error::{ConfigError, ConfigResult};
pub use logging::{init_logging, LogFormat};
pub use paths::Paths;
