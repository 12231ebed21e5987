//! Pulsar Relay: reads newline-delimited events from stdin and publishes them
//! to a Pulsar topic through the batching, retrying dispatch core.
//!
//! Lines are fanned out round-robin over a fixed pool of workers. Each worker
//! is one caller of the output and flushes its own batches.

pub mod cli;
pub mod error;
pub mod pipeline;

pub use cli::{load_config, Args};
pub use error::{RelayError, RelayResult};
pub use pipeline::{parse_line, run, PipelineSettings, PipelineStats};
