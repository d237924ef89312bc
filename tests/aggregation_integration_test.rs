//! End-to-end tests for the aggregation pipeline: producer writes through
//! the buffering aggregator, heartbeat-driven flushes, and watchdog-gated
//! recovery from store failures.

use pretty_assertions::assert_eq;
use std::sync::Arc;
use std::time::Duration;
use tally::core::{now_millis, EntityId};
use tally::model::{Metric, Metrics};
use tally::num::NumericValue;
use tally::storage::{
    AggregatorResource, BufferedStore, FailureBackoff, HealthCheck, InMemoryStore, MetricStore,
    Watchdog, WatchdogState,
};

const GRANULARITY: Duration = Duration::from_millis(120_000);

fn pipeline() -> (Arc<InMemoryStore>, Arc<BufferedStore>) {
    let store = Arc::new(InMemoryStore::new(GRANULARITY));
    let aggregator = Arc::new(BufferedStore::with_granularity(store.clone(), GRANULARITY));
    (store, aggregator)
}

#[tokio::test]
async fn same_slice_writes_reach_store_as_one_aggregated_record() {
    let (store, aggregator) = pipeline();
    let entity = EntityId::new("two").unwrap();

    aggregator
        .persist(&entity, 10_000, Metrics::of("fluffies", Metric::aggregate(1i32)))
        .await
        .unwrap();
    aggregator
        .persist(&entity, 10_000, Metrics::of("fluffies", Metric::aggregate(1i32)))
        .await
        .unwrap();

    aggregator.flush_expired(150_000).await.unwrap();

    let stored = store.get(&entity, 0).expect("window stored at slice boundary");
    assert_eq!(stored.get("fluffies").unwrap().value(), &NumericValue::Int32(2));
    assert_eq!(store.persist_calls(), 1);
}

#[tokio::test]
async fn mixed_metric_kinds_flow_through_one_window() {
    let (store, aggregator) = pipeline();
    let entity = EntityId::new("sensor-4").unwrap();

    let first = Metrics::of("readings", Metric::aggregate(10i64))
        .with("temperature", Metric::absolute(19.5));
    let second = Metrics::of("readings", Metric::aggregate(5i64))
        .with("temperature", Metric::absolute(21.0));

    aggregator.persist(&entity, 30_000, first).await.unwrap();
    aggregator.persist(&entity, 90_000, second).await.unwrap();
    aggregator.flush_expired(130_000).await.unwrap();

    let stored = store.get(&entity, 0).unwrap();
    assert_eq!(stored.get("readings").unwrap().value(), &NumericValue::Int64(15));
    assert_eq!(stored.get("temperature").unwrap().value(), &NumericValue::Float64(21.0));
}

#[tokio::test]
async fn stored_windows_summarize_across_a_range_query() {
    let (_store, aggregator) = pipeline();
    let entity = EntityId::new("two").unwrap();

    for slice in 0..3i64 {
        let ts = slice * 120_000 + 10_000;
        aggregator
            .persist(&entity, ts, Metrics::of("fluffies", Metric::aggregate(1i32)))
            .await
            .unwrap();
    }
    aggregator.flush_expired(360_000).await.unwrap();

    let slices = aggregator.query_range(&entity, 0, 360_000).await.unwrap();
    assert_eq!(slices.len(), 3);

    let summary =
        Metrics::summarize([slices.into_iter().map(|slice| slice.into_metrics())]).unwrap();
    assert_eq!(summary.get("fluffies").unwrap().value(), &NumericValue::Int32(3));
}

#[tokio::test]
async fn watchdog_pauses_and_resumes_around_store_outage() {
    // Heartbeats flush at wall-clock time, so the window under test must
    // expire on the wall clock too: use short slices and let real time pass.
    const SLICE_MILLIS: i64 = 25;
    let store = Arc::new(InMemoryStore::new(Duration::from_millis(SLICE_MILLIS as u64)));
    let aggregator = Arc::new(BufferedStore::with_granularity(
        store.clone(),
        Duration::from_millis(SLICE_MILLIS as u64),
    ));
    let entity = EntityId::new("two").unwrap();

    let backoff = Arc::new(FailureBackoff::new(
        Duration::from_millis(10),
        Duration::from_millis(100),
    ));
    let resource = AggregatorResource::new(aggregator.clone(), backoff.clone());
    let mut watchdog = Watchdog::new();

    // Healthy tick with nothing buffered: resource starts.
    watchdog.check(backoff.as_ref(), &resource).await;
    assert_eq!(watchdog.state(), WatchdogState::Started);

    // Buffer a window, wait for it to expire, then take the store down. The
    // next heartbeat rolls the window and its flush fails, so the backoff
    // vetoes traffic and the watchdog stops the resource; the window stays
    // buffered.
    let ts = now_millis();
    let slice_start = ts - ts % SLICE_MILLIS;
    aggregator
        .persist(&entity, ts, Metrics::of("fluffies", Metric::aggregate(7i32)))
        .await
        .unwrap();
    tokio::time::sleep(Duration::from_millis(4 * SLICE_MILLIS as u64)).await;
    store.set_failing(true);

    watchdog.check(backoff.as_ref(), &resource).await;
    assert_eq!(watchdog.state(), WatchdogState::Stopped);
    assert!(backoff.is_in_failure_mode());
    assert!(store.get(&entity, slice_start).is_none());

    // Store recovers: the next heartbeat delivers the retained window, the
    // recorded success clears the backoff, and the watchdog restarts the
    // resource in the same tick.
    store.set_failing(false);
    watchdog.check(backoff.as_ref(), &resource).await;

    assert_eq!(watchdog.state(), WatchdogState::Started);
    assert!(!backoff.is_in_failure_mode());
    let stored = store
        .get(&entity, slice_start)
        .expect("retained window flushed after recovery");
    assert_eq!(stored.get("fluffies").unwrap().value(), &NumericValue::Int32(7));
}

#[tokio::test]
async fn flush_failure_is_not_double_counted_after_retry() {
    let (store, aggregator) = pipeline();
    let a = EntityId::new("a").unwrap();
    let b = EntityId::new("b").unwrap();

    aggregator
        .persist(&a, 10_000, Metrics::of("n", Metric::aggregate(1i32)))
        .await
        .unwrap();
    aggregator
        .persist(&b, 10_000, Metrics::of("n", Metric::aggregate(1i32)))
        .await
        .unwrap();

    store.fail_after(1);
    aggregator.flush_expired(130_000).await.unwrap_err();

    store.set_failing(false);
    aggregator.flush_expired(130_000).await.unwrap();

    for entity in [&a, &b] {
        let stored = store.get(entity, 0).unwrap();
        assert_eq!(stored.get("n").unwrap().value(), &NumericValue::Int32(1));
        assert_eq!(store.row_count(entity), 1);
    }
}
