// tests/aggregator_rounds.rs

mod common;
use crate::common::{bf2, init_tracing, names, pr, summary};

use std::sync::Arc;
use std::time::Duration;

use artifacts_mover::engine::{CloseReason, RoundAggregator};
use artifacts_mover_test_utils::RecordingSink;

fn aggregator(
    types_count: usize,
    bf2demo_only: bool,
    timeout: Option<Duration>,
) -> (RoundAggregator, RecordingSink) {
    let sink = RecordingSink::new();
    let agg = RoundAggregator::new("main", types_count, bf2demo_only, timeout, Arc::new(sink.clone()));
    (agg, sink)
}

#[tokio::test(start_paused = true)]
async fn complete_round_submitted_on_last_arrival() {
    init_tracing();
    let (agg, sink) = aggregator(3, false, Some(Duration::from_secs(60)));

    agg.on_artifact(bf2("/srv/demos/b1"));
    agg.on_artifact(pr("/srv/tracker/p1"));
    assert!(sink.is_empty());

    agg.on_artifact(summary("/srv/summary/s1"));
    let rounds = sink.rounds();
    assert_eq!(rounds.len(), 1);
    assert_eq!(names(&rounds[0].round), vec!["b1", "p1", "s1"]);
    assert_eq!(rounds[0].reason, CloseReason::Complete);
    assert!(!agg.timer_armed());

    // The cancelled timer must not produce anything later.
    tokio::time::sleep(Duration::from_secs(120)).await;
    assert_eq!(sink.len(), 1);
}

#[tokio::test(start_paused = true)]
async fn duplicate_type_flushes_open_round() {
    init_tracing();
    let (agg, sink) = aggregator(3, false, Some(Duration::from_secs(60)));

    agg.on_artifact(bf2("/srv/demos/b1"));
    agg.on_artifact(pr("/srv/tracker/p1"));
    agg.on_artifact(bf2("/srv/demos/b2"));

    let rounds = sink.rounds();
    assert_eq!(rounds.len(), 1);
    assert_eq!(names(&rounds[0].round), vec!["b1", "p1"]);
    assert_eq!(rounds[0].reason, CloseReason::Overlap);
    assert_eq!(names(&agg.current_round()), vec!["b2"]);
}

#[tokio::test(start_paused = true)]
async fn bf2demo_only_server_uploads_each_demo() {
    init_tracing();
    let (agg, sink) = aggregator(1, true, Some(Duration::from_millis(100)));

    agg.on_artifact(bf2("/srv/demos/b1"));
    agg.on_artifact(bf2("/srv/demos/b2"));

    let rounds = sink.rounds();
    assert_eq!(rounds.len(), 2);
    assert_eq!(names(&rounds[0].round), vec!["b1"]);
    assert_eq!(names(&rounds[1].round), vec!["b2"]);
    assert!(agg.current_round().is_empty());
}

#[tokio::test(start_paused = true)]
async fn timeout_closes_incomplete_round() {
    init_tracing();
    let (agg, sink) = aggregator(2, false, Some(Duration::from_millis(100)));

    agg.on_artifact(bf2("/srv/demos/b1"));
    assert!(agg.timer_armed());

    tokio::time::sleep(Duration::from_millis(150)).await;

    let rounds = sink.rounds();
    assert_eq!(rounds.len(), 1);
    assert_eq!(names(&rounds[0].round), vec!["b1"]);
    assert_eq!(rounds[0].reason, CloseReason::Timeout);
    assert!(agg.current_round().is_empty());
    assert!(!agg.timer_armed());
}

#[tokio::test(start_paused = true)]
async fn timer_restarts_for_next_round() {
    init_tracing();
    let (agg, sink) = aggregator(2, false, Some(Duration::from_millis(100)));

    agg.on_artifact(bf2("/srv/demos/b1"));
    tokio::time::sleep(Duration::from_millis(60)).await;
    // Overlap at t=60ms: b1 goes out, b2 starts a new round and a new timer.
    agg.on_artifact(bf2("/srv/demos/b2"));
    assert_eq!(sink.len(), 1);

    // t=110ms: the first timer would have fired here; it was cancelled.
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(sink.len(), 1);
    assert_eq!(names(&agg.current_round()), vec!["b2"]);

    // t=170ms: the second timer fires.
    tokio::time::sleep(Duration::from_millis(60)).await;
    let rounds = sink.rounds();
    assert_eq!(rounds.len(), 2);
    assert_eq!(rounds[1].reason, CloseReason::Timeout);
    assert_eq!(names(&rounds[1].round), vec!["b2"]);
}

#[tokio::test(start_paused = true)]
async fn explicit_close_and_empty_close() {
    init_tracing();
    let (agg, sink) = aggregator(3, false, None);

    agg.close_round(CloseReason::Timeout);
    assert!(sink.is_empty());

    agg.on_artifact(pr("/srv/tracker/p1"));
    agg.close_round(CloseReason::Timeout);
    agg.close_round(CloseReason::Timeout);
    assert_eq!(sink.len(), 1);
}

#[tokio::test(start_paused = true)]
async fn shutdown_keeps_open_round_and_ignores_new_files() {
    init_tracing();
    let (agg, sink) = aggregator(3, false, Some(Duration::from_millis(100)));

    agg.on_artifact(bf2("/srv/demos/b1"));
    agg.shutdown();

    agg.on_artifact(pr("/srv/tracker/p1"));
    agg.on_artifact(summary("/srv/summary/s1"));
    tokio::time::sleep(Duration::from_millis(500)).await;

    assert!(sink.is_empty());
    assert_eq!(names(&agg.current_round()), vec!["b1"]);
    assert!(!agg.timer_armed());
}
