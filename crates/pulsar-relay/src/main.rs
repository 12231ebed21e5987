//! Pulsar Relay binary entry point.
//!
//! Usage: pulsar-relay [--config <path>] [--topic <topic>] [--workers <n>] < events.log
//!
//! Reads events from stdin until EOF or Ctrl-C, then closes the producer.

use clap::Parser;
use pulsar_dispatch::{PulsarConnector, PulsarOutput};
use pulsar_relay::{load_config, run, Args, RelayResult};
use relay_config_and_utils::init_logging;
use std::sync::Arc;
use tokio::io::BufReader;
use tracing::{error, info};

#[tokio::main]
async fn main() -> RelayResult<()> {
    let args = Args::parse();
    let config = load_config(&args)?;

    init_logging(&config.log_level, args.log_format());

    info!(
        service_url = %config.service_url,
        topic = %config.topic_id,
        workers = args.workers,
        "Pulsar relay starting..."
    );

    let output = match PulsarOutput::start(&config, &PulsarConnector::new()).await {
        Ok(output) => Arc::new(output),
        Err(e) => {
            error!(error = %e, "Failed to start Pulsar output");
            return Err(e.into());
        }
    };

    let shutdown = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "Failed to listen for shutdown signal");
            std::future::pending::<()>().await;
        }
    };

    let stdin = BufReader::new(tokio::io::stdin());
    let result = run(output.clone(), stdin, args.settings(), shutdown).await;

    output.shutdown().await?;

    match result {
        Ok(stats) => {
            info!(
                events = stats.events,
                dropped = stats.dropped,
                "Pulsar relay stopped"
            );
            Ok(())
        }
        Err(e) => {
            error!(error = %e, "Pipeline exited with error");
            Err(e)
        }
    }
}
