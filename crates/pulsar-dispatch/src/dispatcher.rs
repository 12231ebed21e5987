//! Batch dispatch with fixed-backoff retry of failed records.
//!
//! A flush runs in rounds. Each round sends every record of the working set,
//! waits for all completions, and keeps only the failures as the next working
//! set. Rounds repeat after a fixed backoff until nothing fails or the retry
//! budget is spent, in which case the remaining records are dropped with a log
//! line. Nothing is ever returned to the caller as an error.
//!
//! # Retry budget
//!
//! A budget of `Limited(n)` allows `n` retries after the first attempt, so a
//! record that always fails is sent exactly `n + 1` times. The remaining
//! counter is checked before it is decremented; keep that order when touching
//! the loop.

use crate::producer::{ProducerClient, SendCompletion};
use crate::record::PendingRecord;
use futures_util::future::join_all;
use relay_config_and_utils::{ConfigError, ConfigResult};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// How many times a failed record may be resent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryBudget {
    /// Retry until the broker accepts the record.
    Unlimited,
    /// Retry at most this many times after the first attempt.
    Limited(u32),
}

impl RetryBudget {
    /// Build a budget from the configured retry count.
    ///
    /// `None` means unlimited; negative counts are a configuration error.
    pub fn from_retries(retries: Option<i64>) -> ConfigResult<Self> {
        match retries {
            None => Ok(Self::Unlimited),
            Some(n) if n < 0 => Err(ConfigError::Invalid(format!(
                "A negative retry count ({}) is not valid. Must be a value >= 0",
                n
            ))),
            Some(n) => u32::try_from(n).map(Self::Limited).map_err(|_| {
                ConfigError::Invalid(format!("retry count {} is too large", n))
            }),
        }
    }

    /// Total send attempts a failing record gets, `None` when unlimited.
    pub fn max_attempts(&self) -> Option<u64> {
        match self {
            Self::Unlimited => None,
            Self::Limited(n) => Some(u64::from(*n) + 1),
        }
    }

    fn initial_remaining(&self) -> Option<i64> {
        match self {
            Self::Unlimited => None,
            Self::Limited(n) => Some(i64::from(*n)),
        }
    }
}

/// Terminal state of one flush.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// Every record was acknowledged.
    Acknowledged { rounds: u32 },
    /// The budget ran out; `dropped` records were discarded.
    Dropped { rounds: u32, dropped: usize },
}

impl DispatchOutcome {
    pub fn is_acknowledged(&self) -> bool {
        matches!(self, Self::Acknowledged { .. })
    }

    /// Number of send rounds performed.
    pub fn rounds(&self) -> u32 {
        match self {
            Self::Acknowledged { rounds } | Self::Dropped { rounds, .. } => *rounds,
        }
    }
}

/// Sends batches through a shared producer, retrying failures.
pub struct Dispatcher<P: ?Sized> {
    producer: Arc<P>,
    budget: RetryBudget,
    backoff: Duration,
}

impl<P> Dispatcher<P>
where
    P: ProducerClient + ?Sized,
{
    pub fn new(producer: Arc<P>, budget: RetryBudget, backoff: Duration) -> Self {
        Self {
            producer,
            budget,
            backoff,
        }
    }

    pub fn budget(&self) -> RetryBudget {
        self.budget
    }

    pub fn backoff(&self) -> Duration {
        self.backoff
    }

    /// Deliver `batch`, retrying failed records until acknowledged or the
    /// budget is exhausted.
    ///
    /// Blocks the calling task for every round and every backoff pause.
    pub async fn flush(&self, batch: Vec<PendingRecord>) -> DispatchOutcome {
        let mut remaining = self.budget.initial_remaining();
        let mut working = batch;
        let mut rounds: u32 = 0;

        while !working.is_empty() {
            if let Some(left) = remaining {
                if left < 0 {
                    info!(
                        max_retries = ?self.budget.max_attempts().map(|n| n - 1),
                        drop_count = working.len(),
                        "Exhausted configured retry count sending to Pulsar, dropping events"
                    );
                    return DispatchOutcome::Dropped {
                        rounds,
                        dropped: working.len(),
                    };
                }
                remaining = Some(left - 1);
            }

            rounds += 1;
            let batch_size = working.len();
            let failures = self.send_round(working).await;

            if failures.is_empty() {
                debug!(rounds, records = batch_size, "Batch acknowledged");
                break;
            }

            if remaining.map_or(true, |left| left >= 0) {
                info!(
                    batch_size,
                    failures = failures.len(),
                    sleep_ms = self.backoff.as_millis() as u64,
                    "Sending batch to Pulsar failed, will retry after a delay"
                );
                tokio::time::sleep(self.backoff).await;
            }

            working = failures;
        }

        DispatchOutcome::Acknowledged { rounds }
    }

    /// Send every record once and return the ones that failed, in their
    /// original order.
    async fn send_round(&self, working: Vec<PendingRecord>) -> Vec<PendingRecord> {
        let mut failed: Vec<(usize, PendingRecord)> = Vec::new();
        let mut in_flight: Vec<(usize, PendingRecord)> = Vec::with_capacity(working.len());
        let mut completions: Vec<SendCompletion> = Vec::with_capacity(working.len());

        for (index, record) in working.into_iter().enumerate() {
            match self.producer.send_async(&record).await {
                Ok(completion) => {
                    in_flight.push((index, record));
                    completions.push(completion);
                }
                Err(e) => {
                    warn!(error = %e, "Pulsar producer rejected record");
                    failed.push((index, record));
                }
            }
        }

        let results = join_all(completions).await;

        for ((index, record), result) in in_flight.into_iter().zip(results) {
            if let Err(e) = result {
                warn!(error = %e, "Pulsar producer send failed");
                failed.push((index, record));
            }
        }

        failed.sort_by_key(|(index, _)| *index);
        failed.into_iter().map(|(_, record)| record).collect()
    }
}
