//! Line input, worker fan-out, and batch accumulation.
//!
//! The reader parses one event per line and deals events round-robin to the
//! workers. Each worker is one caller of the output: it gathers events until
//! the batch is full or the input goes idle, then hands the batch over and
//! waits for the flush to finish before reading more.

use crate::error::{RelayError, RelayResult};
use pulsar_dispatch::{CallerId, DispatchOutcome, Event, ProducerClient, PulsarOutput};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tokio::sync::mpsc;
use tokio::time::timeout;
use tracing::{debug, error, info, warn};

/// Worker pool shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PipelineSettings {
    pub workers: usize,
    pub batch_size: usize,
    /// Idle time after which a partial batch is flushed.
    pub batch_delay: Duration,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            workers: 1,
            batch_size: 100,
            batch_delay: Duration::from_secs(1),
        }
    }
}

/// Counters reported when the pipeline finishes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PipelineStats {
    /// Events read from the input.
    pub events: usize,
    /// Event batches handed to the output.
    pub batches: usize,
    /// Flushes that ended with every record acknowledged.
    pub acknowledged: usize,
    /// Records dropped after the retry budget ran out.
    pub dropped: usize,
}

impl PipelineStats {
    fn merge(&mut self, other: PipelineStats) {
        self.batches += other.batches;
        self.acknowledged += other.acknowledged;
        self.dropped += other.dropped;
    }

    fn record(&mut self, outcome: Option<DispatchOutcome>) {
        self.batches += 1;
        match outcome {
            Some(DispatchOutcome::Acknowledged { .. }) => self.acknowledged += 1,
            Some(DispatchOutcome::Dropped { dropped, .. }) => self.dropped += dropped,
            None => {}
        }
    }
}

/// Parse one input line.
///
/// A JSON object becomes the event's fields; any other text becomes the
/// event's message. Blank lines yield nothing.
pub fn parse_line(line: &str) -> Option<Event> {
    let trimmed = line.trim();
    if trimmed.is_empty() {
        return None;
    }

    if trimmed.starts_with('{') {
        if let Ok(event) = Event::from_json_str(trimmed) {
            return Some(event);
        }
    }

    Some(Event::new(trimmed))
}

/// Read `input` to the end and publish every event through `output`.
///
/// When `shutdown` resolves first, the output stops accepting events and the
/// workers finish without flushing further.
pub async fn run<P, R, S>(
    output: Arc<PulsarOutput<P>>,
    input: R,
    settings: PipelineSettings,
    shutdown: S,
) -> RelayResult<PipelineStats>
where
    P: ProducerClient + 'static,
    R: AsyncBufRead + Unpin,
    S: Future<Output = ()>,
{
    let workers = settings.workers.max(1);
    let mut senders = Vec::with_capacity(workers);
    let mut handles = Vec::with_capacity(workers);

    for index in 0..workers {
        let (tx, rx) = mpsc::channel(settings.batch_size.max(1) * 2);
        let caller = CallerId::new(format!("worker-{}", index));
        handles.push(tokio::spawn(worker(output.clone(), caller, rx, settings)));
        senders.push(tx);
    }

    let mut stats = PipelineStats::default();
    let mut input = input;
    let mut next = 0usize;
    let mut read_error = None;
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            biased;
            _ = &mut shutdown => {
                info!("Received shutdown signal, stopping input");
                output.begin_shutdown();
                break;
            }
            line = read_line(&mut input) => {
                let line = match line {
                    Ok(Some(line)) => line,
                    Ok(None) => {
                        debug!(events = stats.events, "Input exhausted");
                        break;
                    }
                    Err(e) => {
                        error!(error = %e, events = stats.events, "Failed to read input, stopping");
                        read_error = Some(e);
                        break;
                    }
                };
                let Some(event) = parse_line(&line) else {
                    continue;
                };

                stats.events += 1;
                if senders[next].send(event).await.is_err() {
                    warn!(worker = next, "Worker stopped early, dropping event");
                }
                next = (next + 1) % workers;
            }
        }
    }

    drop(senders);

    let mut worker_error = None;
    for handle in handles {
        match handle.await {
            Ok(worker_stats) => stats.merge(worker_stats),
            Err(e) => {
                error!(error = %e, "Worker task failed");
                worker_error.get_or_insert(RelayError::Worker(e.to_string()));
            }
        }
    }

    info!(
        events = stats.events,
        batches = stats.batches,
        acknowledged = stats.acknowledged,
        dropped = stats.dropped,
        "Pipeline finished"
    );

    if let Some(e) = read_error {
        return Err(e.into());
    }
    match worker_error {
        Some(e) => Err(e),
        None => Ok(stats),
    }
}

/// Read one line, replacing invalid UTF-8 instead of failing on it.
///
/// Returns `None` at end of input.
async fn read_line<R>(input: &mut R) -> std::io::Result<Option<String>>
where
    R: AsyncBufRead + Unpin,
{
    let mut buf = Vec::new();
    if input.read_until(b'\n', &mut buf).await? == 0 {
        return Ok(None);
    }

    match String::from_utf8(buf) {
        Ok(line) => Ok(Some(line)),
        Err(e) => {
            warn!("Input line is not valid UTF-8, replacing invalid bytes");
            Ok(Some(String::from_utf8_lossy(e.as_bytes()).into_owned()))
        }
    }
}

async fn worker<P>(
    output: Arc<PulsarOutput<P>>,
    caller: CallerId,
    mut events: mpsc::Receiver<Event>,
    settings: PipelineSettings,
) -> PipelineStats
where
    P: ProducerClient + 'static,
{
    let batch_size = settings.batch_size.max(1);
    let mut stats = PipelineStats::default();
    let mut batch: Vec<Event> = Vec::with_capacity(batch_size);

    loop {
        let received = if batch.is_empty() {
            events.recv().await
        } else {
            match timeout(settings.batch_delay, events.recv()).await {
                Ok(received) => received,
                Err(_) => {
                    stats.record(output.on_event_batch(&caller, &batch).await);
                    batch.clear();
                    continue;
                }
            }
        };

        match received {
            Some(event) => {
                batch.push(event);
                if batch.len() >= batch_size {
                    stats.record(output.on_event_batch(&caller, &batch).await);
                    batch.clear();
                }
            }
            None => {
                if !batch.is_empty() {
                    stats.record(output.on_event_batch(&caller, &batch).await);
                }
                break;
            }
        }
    }

    let leftovers = output.batches().retire(&caller);
    if !leftovers.is_empty() {
        warn!(caller = %caller, records = leftovers.len(), "Worker retired with unsent records");
    }

    debug!(caller = %caller, batches = stats.batches, "Worker finished");
    stats
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use futures_util::FutureExt;
    use pulsar_dispatch::{
        PendingRecord, ProducerConnector, ProducerError, ProducerResult, SendCompletion,
        SendReceipt,
    };
    use relay_config_and_utils::RelayConfig;
    use std::io;
    use std::pin::Pin;
    use std::sync::Mutex;
    use std::task::{Context, Poll};
    use tokio::io::{AsyncRead, AsyncReadExt, BufReader, ReadBuf};

    /// Input source that fails every read.
    struct BrokenInput;

    impl AsyncRead for BrokenInput {
        fn poll_read(
            self: Pin<&mut Self>,
            _cx: &mut Context<'_>,
            _buf: &mut ReadBuf<'_>,
        ) -> Poll<io::Result<()>> {
            Poll::Ready(Err(io::Error::new(io::ErrorKind::BrokenPipe, "stdin closed")))
        }
    }

    /// Records every payload and acknowledges everything except `failing`.
    #[derive(Default)]
    struct RecordingProducer {
        sent: Mutex<Vec<String>>,
        failing: Option<String>,
    }

    impl RecordingProducer {
        fn payloads(&self) -> Vec<String> {
            self.sent.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl ProducerClient for RecordingProducer {
        async fn send_async(&self, record: &PendingRecord) -> ProducerResult<SendCompletion> {
            let payload = String::from_utf8_lossy(record.payload()).into_owned();
            self.sent.lock().unwrap().push(payload.clone());

            let fail = self.failing.as_deref() == Some(payload.as_str());
            Ok(async move {
                if fail {
                    Err(ProducerError::Send("broker unavailable".to_string()))
                } else {
                    Ok(SendReceipt {
                        sequence_id: 0,
                        message_id: None,
                    })
                }
            }
            .boxed())
        }

        async fn close(&self) -> ProducerResult<()> {
            Ok(())
        }
    }

    struct RecordingConnector {
        failing: Option<String>,
    }

    #[async_trait]
    impl ProducerConnector for RecordingConnector {
        type Producer = RecordingProducer;

        async fn connect(&self, _config: &RelayConfig) -> ProducerResult<RecordingProducer> {
            Ok(RecordingProducer {
                failing: self.failing.clone(),
                ..Default::default()
            })
        }
    }

    async fn start_output(
        retries: Option<i64>,
        failing: Option<&str>,
    ) -> Arc<PulsarOutput<RecordingProducer>> {
        let mut config = RelayConfig::for_topic("events");
        config.retries = retries;
        config.retry_backoff_ms = 1;
        config.codec_format = Some("%{message}".to_string());
        let connector = RecordingConnector {
            failing: failing.map(str::to_string),
        };
        Arc::new(PulsarOutput::start(&config, &connector).await.unwrap())
    }

    fn settings(workers: usize, batch_size: usize) -> PipelineSettings {
        PipelineSettings {
            workers,
            batch_size,
            batch_delay: Duration::from_millis(50),
        }
    }

    #[test]
    fn test_parse_line_variants() {
        assert!(parse_line("").is_none());
        assert!(parse_line("   \t").is_none());

        let text = parse_line("  disk almost full ").unwrap();
        assert_eq!(text.message(), Some("disk almost full"));

        let json = parse_line(r#"{"message":"up","host":"db-2"}"#).unwrap();
        assert_eq!(json.message(), Some("up"));
        assert_eq!(json.get("host"), Some(&serde_json::json!("db-2")));
        assert!(json.timestamp().is_some());

        let broken = parse_line("{not json").unwrap();
        assert_eq!(broken.message(), Some("{not json"));
    }

    #[tokio::test]
    async fn test_run_delivers_every_line() {
        let output = start_output(None, None).await;
        let input: &[u8] = b"one\ntwo\n\nthree\nfour\nfive\n";

        let stats = run(output.clone(), input, settings(2, 2), std::future::pending())
            .await
            .unwrap();

        assert_eq!(stats.events, 5);
        assert_eq!(stats.dropped, 0);
        assert_eq!(stats.acknowledged, stats.batches);

        let mut payloads = output.producer().payloads();
        payloads.sort();
        assert_eq!(payloads, vec!["five", "four", "one", "three", "two"]);
        assert_eq!(output.batches().caller_count(), 0);
    }

    #[tokio::test]
    async fn test_run_batches_by_size() {
        let output = start_output(None, None).await;
        let input: &[u8] = b"a\nb\nc\nd\ne\n";

        let stats = run(output.clone(), input, settings(1, 2), std::future::pending())
            .await
            .unwrap();

        assert_eq!(stats.events, 5);
        assert_eq!(stats.batches, 3);
        assert_eq!(output.producer().payloads(), vec!["a", "b", "c", "d", "e"]);
    }

    #[tokio::test]
    async fn test_run_reports_dropped_records() {
        let output = start_output(Some(0), Some("bad")).await;
        let input: &[u8] = b"good\nbad\n";

        let stats = run(output.clone(), input, settings(1, 10), std::future::pending())
            .await
            .unwrap();

        assert_eq!(stats.batches, 1);
        assert_eq!(stats.acknowledged, 0);
        assert_eq!(stats.dropped, 1);
    }

    #[tokio::test]
    async fn test_shutdown_stops_input() {
        let output = start_output(None, None).await;
        let input: &[u8] = b"never\nsent\n";

        let stats = run(output.clone(), input, settings(2, 1), async {})
            .await
            .unwrap();

        assert_eq!(stats.events, 0);
        assert!(output.is_shutting_down());
        assert!(output.producer().payloads().is_empty());
    }

    #[tokio::test]
    async fn test_invalid_utf8_line_does_not_stop_input() {
        let output = start_output(None, None).await;
        let input: &[u8] = b"ok-1\nok-2\n\xff\xfe\nafter\n";

        let stats = run(output.clone(), input, settings(1, 10), std::future::pending())
            .await
            .unwrap();

        assert_eq!(stats.events, 4);
        assert_eq!(
            output.producer().payloads(),
            vec!["ok-1", "ok-2", "\u{FFFD}\u{FFFD}", "after"]
        );
    }

    #[tokio::test]
    async fn test_read_error_drains_workers_before_returning() {
        let output = start_output(None, None).await;
        let input = BufReader::new((&b"a\nb\n"[..]).chain(BrokenInput));

        let result = run(output.clone(), input, settings(2, 10), std::future::pending()).await;

        assert!(matches!(result, Err(RelayError::Io(_))));
        let mut payloads = output.producer().payloads();
        payloads.sort();
        assert_eq!(payloads, vec!["a", "b"]);
        assert_eq!(output.batches().caller_count(), 0);
    }
}
