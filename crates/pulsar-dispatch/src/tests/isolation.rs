//! Partial-failure and per-caller isolation.

use super::harness::{dispatcher, message_config, records, ScriptedConnector, ScriptedProducer};
use crate::batch_store::CallerId;
use crate::dispatcher::DispatchOutcome;
use crate::event::Event;
use crate::output::PulsarOutput;
use std::sync::Arc;

#[tokio::test(start_paused = true)]
async fn retry_round_resends_only_failed_records() {
    let producer = Arc::new(ScriptedProducer::new());
    producer.fail_async("2", 1);
    producer.reject("4", 1);
    let dispatcher = dispatcher(&producer, Some(3), 20);

    let outcome = dispatcher.flush(records(&["1", "2", "3", "4", "5"])).await;

    assert_eq!(outcome, DispatchOutcome::Acknowledged { rounds: 2 });
    // the retry keeps batch order even though "4" failed before "2" completed
    assert_eq!(
        producer.sent_payloads(),
        vec!["1", "2", "3", "4", "5", "2", "4"]
    );
}

#[tokio::test(start_paused = true)]
async fn acknowledged_records_are_never_resent() {
    let producer = Arc::new(ScriptedProducer::new());
    producer.fail_async("c", 2);
    let dispatcher = dispatcher(&producer, None, 5);

    let outcome = dispatcher.flush(records(&["a", "b", "c", "d"])).await;

    assert_eq!(outcome, DispatchOutcome::Acknowledged { rounds: 3 });
    for payload in ["a", "b", "d"] {
        assert_eq!(producer.attempts_for(payload), 1);
    }
    assert_eq!(producer.attempts_for("c"), 3);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn concurrent_callers_deliver_only_their_own_records() {
    let connector = ScriptedConnector::new();
    let output = Arc::new(
        PulsarOutput::start(&message_config(None), &connector)
            .await
            .unwrap(),
    );

    let tasks: Vec<_> = ["left", "right"]
        .into_iter()
        .map(|name| {
            let output = output.clone();
            tokio::spawn(async move {
                let caller = CallerId::new(name);
                let events: Vec<Event> = (0..100)
                    .map(|i| Event::new(format!("{}-{}", name, i)))
                    .collect();
                output.on_event_batch(&caller, &events).await
            })
        })
        .collect();

    for task in tasks {
        let outcome = task.await.unwrap();
        assert_eq!(outcome, Some(DispatchOutcome::Acknowledged { rounds: 1 }));
    }

    let sent = output.producer().sent_payloads();
    assert_eq!(sent.len(), 200);
    for name in ["left", "right"] {
        let prefix = format!("{}-", name);
        let own: Vec<String> = sent
            .iter()
            .filter(|p| p.starts_with(&prefix))
            .cloned()
            .collect();
        let expected: Vec<String> = (0..100).map(|i| format!("{}-{}", name, i)).collect();
        assert_eq!(own, expected);
    }

    for name in ["left", "right"] {
        assert_eq!(output.batches().pending_count(&CallerId::new(name)), 0);
    }
    assert_eq!(output.batches().caller_count(), 2);
}

#[tokio::test(start_paused = true)]
async fn one_callers_failures_do_not_delay_another_callers_records() {
    let producer = ScriptedProducer::new();
    producer.fail_async("slow-0", 3);
    let connector = ScriptedConnector::with_producer(producer);
    let mut config = message_config(None);
    config.retry_backoff_ms = 100;
    let output = Arc::new(PulsarOutput::start(&config, &connector).await.unwrap());

    let slow = CallerId::new("slow");
    let fast = CallerId::new("fast");
    let slow_events = [Event::new("slow-0")];
    let fast_events = [Event::new("fast-0"), Event::new("fast-1")];

    let (slow_outcome, fast_outcome) = tokio::join!(
        output.on_event_batch(&slow, &slow_events),
        output.on_event_batch(&fast, &fast_events),
    );

    assert_eq!(slow_outcome, Some(DispatchOutcome::Acknowledged { rounds: 4 }));
    assert_eq!(fast_outcome, Some(DispatchOutcome::Acknowledged { rounds: 1 }));
    assert_eq!(output.producer().attempts_for("fast-0"), 1);
    assert_eq!(output.producer().attempts_for("fast-1"), 1);
}
