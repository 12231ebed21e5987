//! Producer client backed by the `pulsar` crate.

use crate::error::{ProducerError, ProducerResult};
use crate::producer::{ProducerClient, ProducerConnector, SendCompletion, SendReceipt};
use crate::record::PendingRecord;
use async_trait::async_trait;
use futures_util::FutureExt;
use pulsar::compression::{Compression, CompressionLz4, CompressionZlib};
use pulsar::{
    producer, Authentication, ConnectionRetryOptions, OperationRetryOptions, Producer,
    ProducerOptions, Pulsar, TokioExecutor,
};
use relay_config_and_utils::{CompressionType, RelayConfig};
use std::collections::BTreeMap;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, info};

impl From<pulsar::Error> for ProducerError {
    fn from(e: pulsar::Error) -> Self {
        ProducerError::Send(e.to_string())
    }
}

/// Connects to a Pulsar cluster and creates one producer per output.
#[derive(Debug, Default, Clone, Copy)]
pub struct PulsarConnector;

impl PulsarConnector {
    pub fn new() -> Self {
        Self
    }

    async fn client(&self, config: &RelayConfig) -> ProducerResult<Pulsar<TokioExecutor>> {
        let url = config.service_url().map_err(|e| ProducerError::Connection(e.to_string()))?;

        let mut builder = Pulsar::builder(url.as_str(), TokioExecutor)
            .with_allow_insecure_connection(config.allow_tls_insecure_connection)
            .with_tls_hostname_verification_enabled(config.enable_tls_hostname_verification)
            .with_operation_retry_options(OperationRetryOptions {
                operation_timeout: Duration::from_secs(config.operation_timeout_secs),
                ..Default::default()
            })
            .with_connection_retry_options(ConnectionRetryOptions {
                keep_alive: Duration::from_millis(config.keep_alive_interval_ms),
                ..Default::default()
            });

        if !config.auth_plugin_class_name.is_empty() {
            builder = builder.with_auth(Authentication {
                name: config.auth_plugin_class_name.clone(),
                data: config.auth_params_string.clone().into_bytes(),
            });
        }

        if let Some(path) = &config.tls_trust_certs_file_path {
            builder = builder
                .with_certificate_chain_file(path)
                .map_err(|e| ProducerError::Connection(format!("{}: {}", path, e)))?;
        }

        builder
            .build()
            .await
            .map_err(|e| ProducerError::Connection(e.to_string()))
    }
}

fn compression(kind: CompressionType) -> Compression {
    match kind {
        CompressionType::None => Compression::None,
        CompressionType::Lz4 => Compression::Lz4(CompressionLz4::default()),
        CompressionType::Zlib => Compression::Zlib(CompressionZlib::default()),
    }
}

fn log_unapplied_options(config: &RelayConfig) {
    debug!(
        connections_per_broker = config.connections_per_broker,
        enable_tcp_no_delay = config.enable_tcp_no_delay,
        num_io_threads = config.num_io_threads,
        num_listener_threads = config.num_listener_threads,
        send_timeout_secs = config.send_timeout_secs,
        encryption_key_set = !config.public_encryption_key.is_empty(),
        "Client options not applied by the Pulsar client"
    );
}

/// Producer options for `config`.
///
/// Batching is bounded by both size and publish delay; without the delay a
/// partial batch would wait until `batch_max_size` records pile up.
fn producer_options(config: &RelayConfig) -> ProducerOptions {
    ProducerOptions {
        batch_size: Some(config.batch_max_size),
        batch_timeout: Some(Duration::from_millis(config.batch_max_publish_delay_ms)),
        block_queue_if_full: config.block_if_queue_full,
        compression: Some(compression(config.compression_type)),
        metadata: config
            .producer_properties
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect::<BTreeMap<_, _>>(),
        ..Default::default()
    }
}

#[async_trait]
impl ProducerConnector for PulsarConnector {
    type Producer = PulsarProducer;

    async fn connect(&self, config: &RelayConfig) -> ProducerResult<PulsarProducer> {
        log_unapplied_options(config);

        let client = self.client(config).await?;
        let options = producer_options(config);

        let producer = client
            .producer()
            .with_topic(&config.topic_id)
            .with_options(options)
            .build()
            .await
            .map_err(|e| ProducerError::Connection(e.to_string()))?;

        info!(topic = %config.topic_id, tls = config.uses_tls(), "Connected Pulsar producer");

        Ok(PulsarProducer {
            producer: Mutex::new(producer),
            topic: config.topic_id.clone(),
        })
    }
}

/// A `pulsar` producer shared between callers.
///
/// Sends are serialized through a mutex only while enqueuing; completions are
/// awaited outside the lock.
pub struct PulsarProducer {
    producer: Mutex<Producer<TokioExecutor>>,
    topic: String,
}

impl PulsarProducer {
    pub fn topic(&self) -> &str {
        &self.topic
    }
}

#[async_trait]
impl ProducerClient for PulsarProducer {
    async fn send_async(&self, record: &PendingRecord) -> ProducerResult<SendCompletion> {
        let message = producer::Message {
            payload: record.payload().to_vec(),
            properties: record.properties().clone(),
            partition_key: record.key().map(str::to_string),
            ..Default::default()
        };

        let pending = {
            let mut producer = self.producer.lock().await;
            producer
                .send_non_blocking(message)
                .await
                .map_err(|e| ProducerError::Rejected(e.to_string()))?
        };

        Ok(async move {
            let receipt = pending.await?;
            Ok(SendReceipt {
                sequence_id: receipt.sequence_id,
                message_id: receipt
                    .message_id
                    .map(|id| format!("{}:{}", id.ledger_id, id.entry_id)),
            })
        }
        .boxed())
    }

    async fn close(&self) -> ProducerResult<()> {
        let mut producer = self.producer.lock().await;
        producer.close().await?;
        Ok(())
    }
}
