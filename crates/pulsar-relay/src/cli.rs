//! Command-line arguments and configuration loading.

use crate::error::RelayResult;
use crate::pipeline::PipelineSettings;
use clap::Parser;
use relay_config_and_utils::{LogFormat, Paths, RelayConfig};
use std::path::PathBuf;
use std::time::Duration;

/// Pulsar Relay: publish newline-delimited events from stdin to Pulsar.
#[derive(Parser, Debug)]
#[command(name = "pulsar-relay")]
#[command(about = "Publish newline-delimited events from stdin to an Apache Pulsar topic")]
pub struct Args {
    /// Path to a JSON config file.
    /// If not provided, reads ~/.pulsar-relay/config.json when present.
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Broker service URL (pulsar:// or pulsar+ssl://).
    #[arg(long)]
    pub service_url: Option<String>,

    /// Destination topic.
    #[arg(long)]
    pub topic: Option<String>,

    /// Number of concurrent workers, each flushing its own batches.
    #[arg(long, env = "PULSAR_RELAY_WORKERS", default_value = "1")]
    pub workers: usize,

    /// Events per batch before a worker flushes.
    #[arg(long, default_value = "100")]
    pub batch_size: usize,

    /// Idle time in milliseconds after which a partial batch is flushed.
    #[arg(long, default_value = "1000")]
    pub batch_delay_ms: u64,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long)]
    pub log_level: Option<String>,

    /// Emit logs as JSON lines.
    #[arg(long)]
    pub log_json: bool,
}

impl Args {
    /// Override `config` with the flags that were given.
    pub fn apply(&self, config: &mut RelayConfig) {
        if let Some(url) = &self.service_url {
            config.service_url = url.clone();
        }
        if let Some(topic) = &self.topic {
            config.topic_id = topic.clone();
        }
        if let Some(level) = &self.log_level {
            config.log_level = level.clone();
        }
    }

    pub fn log_format(&self) -> LogFormat {
        if self.log_json {
            LogFormat::Json
        } else {
            LogFormat::Compact
        }
    }

    /// Worker pool settings. Zero values are raised to one.
    pub fn settings(&self) -> PipelineSettings {
        PipelineSettings {
            workers: self.workers.max(1),
            batch_size: self.batch_size.max(1),
            batch_delay: Duration::from_millis(self.batch_delay_ms),
        }
    }
}

/// Load configuration: file, then environment, then command-line flags.
pub fn load_config(args: &Args) -> RelayResult<RelayConfig> {
    let mut config = match &args.config {
        Some(path) => {
            let mut config = RelayConfig::load_from_file(path)?;
            config.load_from_env();
            config
        }
        None => RelayConfig::load(&Paths::new()?)?,
    };

    args.apply(&mut config);
    Ok(config)
}
