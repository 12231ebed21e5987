//! Pulsar Dispatch: per-caller batching and retrying delivery of events to a
//! Pulsar producer.
//!
//! Events are encoded, turned into pending records, and accumulated per
//! caller. Each caller flushes its own batch; the dispatcher resends only the
//! records that failed, after a fixed backoff, until they are acknowledged or
//! the retry budget runs out.
//!
//! # Delivery Guarantees
//!
//! 1. **At-Least-Once**: With no retry limit, a record is resent until the
//!    broker acknowledges it
//! 2. **Bounded Loss**: With `retries = N`, a record is attempted at most
//!    N + 1 times, then dropped with an info log
//! 3. **Failure Isolation**: A retry round resends only the failed records
//! 4. **Caller Isolation**: Concurrent callers never see each other's records
//!
//! # Architecture
//!
//! ```text
//! Event -> Codec -> RecordBuilder -> BatchStore -> Dispatcher -> ProducerClient
//!                                                     ^               |
//!                                                     |__ failures __|
//! ```

pub mod batch_store;
pub mod codec;
pub mod dispatcher;
pub mod error;
pub mod event;
pub mod output;
pub mod producer;
#[cfg(feature = "pulsar")]
pub mod pulsar_client;
pub mod record;

#[cfg(test)]
mod tests;

pub use batch_store::{BatchStore, CallerId};
pub use codec::{Codec, DEFAULT_PLAIN_FORMAT};
pub use dispatcher::{DispatchOutcome, Dispatcher, RetryBudget};
pub use error::{
    CodecError, CodecResult, DispatchError, DispatchResult, EventError, EventResult,
    ProducerError, ProducerResult,
};
pub use event::{Event, Template, MESSAGE_FIELD, TIMESTAMP_FIELD};
pub use output::PulsarOutput;
pub use producer::{ProducerClient, ProducerConnector, SendCompletion, SendReceipt};
#[cfg(feature = "pulsar")]
pub use pulsar_client::{PulsarConnector, PulsarProducer};
pub use record::{PendingRecord, RecordBuilder};
