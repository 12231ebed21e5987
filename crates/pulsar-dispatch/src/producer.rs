//! Broker client seams.
//!
//! The dispatch core never talks to the network itself. It hands records to a
//! [`ProducerClient`] and awaits the [`SendCompletion`] each send returns.
//! Producers are created once at startup through a [`ProducerConnector`].

use crate::error::ProducerResult;
use crate::record::PendingRecord;
use async_trait::async_trait;
use futures_util::future::BoxFuture;
use relay_config_and_utils::RelayConfig;
use std::collections::HashMap;

/// Broker acknowledgment for one record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SendReceipt {
    /// Producer-assigned sequence number.
    pub sequence_id: u64,
    /// Broker message id, when the client reports one.
    pub message_id: Option<String>,
}

/// Completion of one send: resolves once the broker acknowledges or the send
/// fails.
pub type SendCompletion = BoxFuture<'static, ProducerResult<SendReceipt>>;

/// A long-lived producer bound to one topic.
///
/// Implementations must allow `send_async` to be called concurrently from
/// several callers.
#[async_trait]
pub trait ProducerClient: Send + Sync {
    /// Construct a pending record. No I/O happens here.
    fn build_record(
        &self,
        key: Option<String>,
        payload: Vec<u8>,
        properties: HashMap<String, String>,
    ) -> PendingRecord {
        PendingRecord::new(key, payload, properties)
    }

    /// Start sending `record`.
    ///
    /// Returns `Err` when the client rejects the record before queuing it.
    /// May wait while the client's send queue is full.
    async fn send_async(&self, record: &PendingRecord) -> ProducerResult<SendCompletion>;

    /// Release broker resources. Called once, after the last send.
    async fn close(&self) -> ProducerResult<()>;
}

/// Creates a producer from a configuration snapshot.
#[async_trait]
pub trait ProducerConnector: Send + Sync {
    type Producer: ProducerClient + 'static;

    /// Connect to the broker and create the producer for `config.topic_id`.
    async fn connect(&self, config: &RelayConfig) -> ProducerResult<Self::Producer>;
}
