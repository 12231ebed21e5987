//! The Pulsar output service.
//!
//! Owns the producer, the per-caller batch store, and the dispatcher. Callers
//! hand in event batches under their own [`CallerId`]; each call encodes and
//! accumulates the events, then flushes that caller's batch before returning.

use crate::batch_store::{BatchStore, CallerId};
use crate::codec::Codec;
use crate::dispatcher::{DispatchOutcome, Dispatcher, RetryBudget};
use crate::error::{DispatchError, DispatchResult};
use crate::event::Event;
use crate::producer::{ProducerClient, ProducerConnector};
use crate::record::RecordBuilder;
use relay_config_and_utils::RelayConfig;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// Batching, retrying output bound to one topic.
pub struct PulsarOutput<P: ProducerClient + 'static> {
    producer: Arc<P>,
    dispatcher: Dispatcher<P>,
    batches: BatchStore,
    records: RecordBuilder,
    codec: Codec,
    topic: String,
    shutting_down: AtomicBool,
    closed: AtomicBool,
}

impl<P: ProducerClient + 'static> PulsarOutput<P> {
    /// Validate `config` and create the producer through `connector`.
    ///
    /// Configuration problems are reported before the connector is touched.
    pub async fn start<C>(config: &RelayConfig, connector: &C) -> DispatchResult<Self>
    where
        C: ProducerConnector<Producer = P>,
    {
        config.validate()?;
        let budget = RetryBudget::from_retries(config.retries)?;
        let backoff = Duration::from_millis(config.retry_backoff_ms);

        let producer = match connector.connect(config).await {
            Ok(producer) => Arc::new(producer),
            Err(e) => {
                error!(
                    error = %e,
                    topic = %config.topic_id,
                    "Unable to create Pulsar producer from given configuration"
                );
                return Err(DispatchError::ProducerCreation(e));
            }
        };

        info!(
            topic = %config.topic_id,
            service_url = %config.service_url,
            retries = ?config.retries,
            backoff_ms = config.retry_backoff_ms,
            "Pulsar output started"
        );

        Ok(Self {
            dispatcher: Dispatcher::new(producer.clone(), budget, backoff),
            producer,
            batches: BatchStore::new(),
            records: RecordBuilder::from_config(config),
            codec: Codec::from_config(config),
            topic: config.topic_id.clone(),
            shutting_down: AtomicBool::new(false),
            closed: AtomicBool::new(false),
        })
    }

    /// Accept a batch of events from `caller` and deliver it.
    ///
    /// Returns the flush outcome, or `None` when nothing was flushed. Waits
    /// through every retry round and backoff of the flush.
    pub async fn on_event_batch(
        &self,
        caller: &CallerId,
        events: &[Event],
    ) -> Option<DispatchOutcome> {
        if self.is_shutting_down() {
            debug!(caller = %caller, events = events.len(), "Output is shutting down, skipping batch");
            return None;
        }

        for (index, event) in events.iter().enumerate() {
            if self.is_shutting_down() {
                debug!(
                    caller = %caller,
                    skipped = events.len() - index,
                    "Output is shutting down, skipping remaining events"
                );
                break;
            }

            let payload = match self.codec.encode(event) {
                Ok(payload) => payload,
                Err(e) => {
                    warn!(caller = %caller, error = %e, "Failed to encode event, skipping it");
                    continue;
                }
            };

            let record = self.records.build(self.producer.as_ref(), event, payload);
            self.batches.append(caller, record);
        }

        let batch = self.batches.take_and_clear(caller);
        if batch.is_empty() {
            return None;
        }

        debug!(caller = %caller, topic = %self.topic, records = batch.len(), "Flushing batch");
        Some(self.dispatcher.flush(batch).await)
    }

    /// Stop accepting events. Flushes already running finish normally.
    pub fn begin_shutdown(&self) {
        if !self.shutting_down.swap(true, Ordering::SeqCst) {
            info!(topic = %self.topic, "Pulsar output shutting down");
        }
    }

    pub fn is_shutting_down(&self) -> bool {
        self.shutting_down.load(Ordering::SeqCst)
    }

    /// Begin shutdown and close the producer. Only the first call closes.
    pub async fn shutdown(&self) -> DispatchResult<()> {
        self.begin_shutdown();

        if self.closed.swap(true, Ordering::SeqCst) {
            warn!(topic = %self.topic, "Pulsar producer already closed");
            return Ok(());
        }

        self.producer.close().await.map_err(DispatchError::Close)?;
        info!(topic = %self.topic, "Pulsar producer closed");
        Ok(())
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }

    pub fn producer(&self) -> &Arc<P> {
        &self.producer
    }

    pub fn batches(&self) -> &BatchStore {
        &self.batches
    }

    pub fn dispatcher(&self) -> &Dispatcher<P> {
        &self.dispatcher
    }
}
