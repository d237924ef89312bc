//! Write-buffering aggregation decorator over a durable store.
//!
//! Holds one in-memory window ("current time slice") per process. Every
//! incoming write is either merged into the window, forwarded past it, or
//! triggers a flush of the window first:
//!
//! - writes older than the current slice bypass the buffer entirely and keep
//!   their original timestamp, so stale data never grows the buffer;
//! - writes at or past the current slice first roll the window forward
//!   (flushing its contents to the durable store at the old slice boundary),
//!   then merge into the buffer;
//! - a periodic [`BufferedStore::heartbeat`] forces the rollover check even
//!   when no writes arrive.
//!
//! Memory stays bounded to one window's worth of entities, and durable-store
//! writes are amortized across the configured granularity.

use crate::core::{now_millis, Config, EntityId, Result};
use crate::model::{Metrics, Timeslice};
use crate::storage::store::MetricStore;
use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;

/// Statistics for buffer monitoring.
#[derive(Debug, Clone)]
pub struct BufferStats {
    /// Entities currently buffered in the active window
    pub buffered_entities: usize,
    /// Start of the active window, if one has been established
    pub current_slice: Option<i64>,
    /// Writes merged into the buffer since start
    pub merged_writes: u64,
    /// Stale writes forwarded directly to the store
    pub bypassed_writes: u64,
    /// Entity windows flushed to the store
    pub flushed_entities: u64,
    /// Flush attempts that failed and left data buffered
    pub flush_failures: u64,
}

/// Buffering aggregator implementing [`MetricStore`] over an inner store.
pub struct BufferedStore {
    inner: Arc<dyn MetricStore>,
    granularity_millis: i64,
    state: Mutex<BufferState>,
    merged_writes: AtomicU64,
    bypassed_writes: AtomicU64,
    flushed_entities: AtomicU64,
    flush_failures: AtomicU64,
}

struct BufferState {
    /// Start of the active window; `None` until the first buffered write.
    current_slice: Option<i64>,
    buffer: HashMap<EntityId, Metrics>,
}

impl BufferedStore {
    /// Create a buffering aggregator from application configuration.
    pub fn new(inner: Arc<dyn MetricStore>, config: &Config) -> Self {
        Self::with_granularity(inner, config.aggregation.granularity)
    }

    /// Create a buffering aggregator with an explicit slice width.
    pub fn with_granularity(inner: Arc<dyn MetricStore>, granularity: Duration) -> Self {
        debug_assert!(!granularity.is_zero(), "granularity is validated at config load");
        Self {
            inner,
            granularity_millis: granularity.as_millis() as i64,
            state: Mutex::new(BufferState {
                current_slice: None,
                buffer: HashMap::new(),
            }),
            merged_writes: AtomicU64::new(0),
            bypassed_writes: AtomicU64::new(0),
            flushed_entities: AtomicU64::new(0),
            flush_failures: AtomicU64::new(0),
        }
    }

    /// Start of the slice containing `timestamp_millis`.
    fn nearest_slice(&self, timestamp_millis: i64) -> i64 {
        timestamp_millis - timestamp_millis % self.granularity_millis
    }

    /// Flush the buffered window if `timestamp_millis` falls past it.
    ///
    /// Invoked by [`BufferedStore::heartbeat`] with wall-clock time and by
    /// `persist` before buffering, so a write far in the future rolls the
    /// window forward before being accepted.
    pub async fn flush_expired(&self, timestamp_millis: i64) -> Result<()> {
        let mut state = self.state.lock().await;
        self.flush_locked(&mut state, self.nearest_slice(timestamp_millis))
            .await
    }

    /// Flush the buffered window using the current wall-clock time.
    pub async fn heartbeat(&self) -> Result<()> {
        self.flush_expired(now_millis()).await
    }

    /// Current buffer statistics.
    pub async fn stats(&self) -> BufferStats {
        let state = self.state.lock().await;
        BufferStats {
            buffered_entities: state.buffer.len(),
            current_slice: state.current_slice,
            merged_writes: self.merged_writes.load(Ordering::Relaxed),
            bypassed_writes: self.bypassed_writes.load(Ordering::Relaxed),
            flushed_entities: self.flushed_entities.load(Ordering::Relaxed),
            flush_failures: self.flush_failures.load(Ordering::Relaxed),
        }
    }

    /// Write every buffered entity to the inner store at the old slice
    /// boundary, then advance the boundary to `nearest_slice`.
    ///
    /// Entities are removed from the buffer immediately before their store
    /// write and re-inserted on failure: entities already durably written
    /// are never re-sent, so aggregate values cannot be double-counted by a
    /// retry. On failure the boundary does not advance and the error
    /// propagates; the next heartbeat or persist re-attempts what remains.
    async fn flush_locked(&self, state: &mut BufferState, nearest_slice: i64) -> Result<()> {
        let old_slice = match state.current_slice {
            Some(current) if nearest_slice > current => current,
            Some(_) => return Ok(()),
            None => {
                state.current_slice = Some(nearest_slice);
                return Ok(());
            },
        };

        let entities: Vec<EntityId> = state.buffer.keys().cloned().collect();
        let mut flushed = 0u64;
        for entity in entities {
            let Some(metrics) = state.buffer.remove(&entity) else {
                continue;
            };
            if let Err(err) = self.inner.persist(&entity, old_slice, metrics.clone()).await {
                state.buffer.insert(entity.clone(), metrics);
                self.flush_failures.fetch_add(1, Ordering::Relaxed);
                tracing::warn!(
                    entity = %entity,
                    slice = old_slice,
                    remaining = state.buffer.len(),
                    "flush failed, window retained for retry: {}",
                    err
                );
                return Err(err);
            }
            flushed += 1;
        }

        self.flushed_entities.fetch_add(flushed, Ordering::Relaxed);
        if flushed > 0 {
            tracing::debug!(slice = old_slice, entities = flushed, "flushed window to store");
        }
        state.current_slice = Some(nearest_slice);
        Ok(())
    }
}

#[async_trait::async_trait]
impl MetricStore for BufferedStore {
    /// Persist with window buffering.
    ///
    /// The whole read-modify-write sequence (boundary check, possible flush,
    /// buffer mutation) holds one lock; store calls made on the bypass and
    /// flush paths happen under that lock, trading producer throughput
    /// during store stalls for exact window boundaries.
    async fn persist(
        &self,
        entity: &EntityId,
        timestamp_millis: i64,
        metrics: Metrics,
    ) -> Result<()> {
        let mut state = self.state.lock().await;
        let nearest = self.nearest_slice(timestamp_millis);

        if let Some(current) = state.current_slice {
            if nearest < current {
                // Out-of-order past write: never aggregated, stored with its
                // original timestamp.
                self.bypassed_writes.fetch_add(1, Ordering::Relaxed);
                return self.inner.persist(entity, timestamp_millis, metrics).await;
            }
        }

        self.flush_locked(&mut state, nearest).await?;

        match state.buffer.entry(entity.clone()) {
            Entry::Occupied(mut slot) => slot.get_mut().merge(metrics)?,
            Entry::Vacant(slot) => {
                slot.insert(metrics);
            },
        }
        self.merged_writes.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    async fn entities(&self) -> Result<Vec<EntityId>> {
        self.inner.entities().await
    }

    async fn query_range(
        &self,
        entity: &EntityId,
        start_millis: i64,
        end_millis: i64,
    ) -> Result<Vec<Timeslice>> {
        self.inner.query_range(entity, start_millis, end_millis).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Metric;
    use crate::num::NumericValue;
    use crate::storage::memory::InMemoryStore;

    const GRANULARITY: Duration = Duration::from_millis(120_000);

    fn entity(id: &str) -> EntityId {
        EntityId::new(id).unwrap()
    }

    fn fluffies(n: i32) -> Metrics {
        Metrics::of("fluffies", Metric::aggregate(n))
    }

    fn buffered() -> (Arc<InMemoryStore>, BufferedStore) {
        let store = Arc::new(InMemoryStore::new(GRANULARITY));
        let aggregator = BufferedStore::with_granularity(store.clone(), GRANULARITY);
        (store, aggregator)
    }

    #[tokio::test]
    async fn test_same_slice_writes_aggregate_into_one_record() {
        let (store, aggregator) = buffered();
        let id = entity("two");

        aggregator.persist(&id, 10_000, fluffies(1)).await.unwrap();
        aggregator.persist(&id, 50_000, fluffies(1)).await.unwrap();

        // Nothing reaches the store until the window rolls.
        assert_eq!(store.persist_calls(), 0);

        aggregator.flush_expired(130_000).await.unwrap();
        assert_eq!(store.persist_calls(), 1);
        assert_eq!(
            store.get(&id, 0).unwrap().get("fluffies").unwrap().value(),
            &NumericValue::Int32(2)
        );
    }

    #[tokio::test]
    async fn test_stale_write_bypasses_buffer() {
        let (store, aggregator) = buffered();
        let id = entity("two");

        aggregator.persist(&id, 250_000, fluffies(1)).await.unwrap();
        // Older than the current slice: stored immediately and separately,
        // original timestamp preserved.
        aggregator.persist(&id, 30_000, fluffies(5)).await.unwrap();

        assert_eq!(store.persist_calls(), 1);
        assert_eq!(
            store.get(&id, 30_000).unwrap().get("fluffies").unwrap().value(),
            &NumericValue::Int32(5)
        );

        let stats = aggregator.stats().await;
        assert_eq!(stats.bypassed_writes, 1);
        assert_eq!(stats.buffered_entities, 1);
    }

    #[tokio::test]
    async fn test_future_write_rolls_window_first() {
        let (store, aggregator) = buffered();
        let id = entity("two");

        aggregator.persist(&id, 10_000, fluffies(1)).await.unwrap();
        // Two slices ahead: the buffered window flushes at its own boundary
        // before the new write is accepted.
        aggregator.persist(&id, 250_000, fluffies(3)).await.unwrap();

        assert_eq!(store.persist_calls(), 1);
        assert_eq!(
            store.get(&id, 0).unwrap().get("fluffies").unwrap().value(),
            &NumericValue::Int32(1)
        );

        let stats = aggregator.stats().await;
        assert_eq!(stats.current_slice, Some(240_000));
        assert_eq!(stats.buffered_entities, 1);
    }

    #[tokio::test]
    async fn test_heartbeat_flushes_once_per_entity_then_clears() {
        let (store, aggregator) = buffered();

        aggregator.persist(&entity("a"), 10_000, fluffies(1)).await.unwrap();
        aggregator.persist(&entity("b"), 20_000, fluffies(2)).await.unwrap();

        aggregator.flush_expired(120_000).await.unwrap();
        assert_eq!(store.persist_calls(), 2);
        assert_eq!(aggregator.stats().await.buffered_entities, 0);

        // An empty buffer flushes nothing on the next rollover.
        aggregator.flush_expired(240_000).await.unwrap();
        assert_eq!(store.persist_calls(), 2);
    }

    #[tokio::test]
    async fn test_flush_within_slice_is_noop() {
        let (store, aggregator) = buffered();
        let id = entity("two");

        aggregator.persist(&id, 10_000, fluffies(1)).await.unwrap();
        aggregator.flush_expired(100_000).await.unwrap();

        assert_eq!(store.persist_calls(), 0);
        assert_eq!(aggregator.stats().await.buffered_entities, 1);
    }

    #[tokio::test]
    async fn test_flush_failure_retains_window_for_retry() {
        let (store, aggregator) = buffered();
        let id = entity("two");

        aggregator.persist(&id, 10_000, fluffies(4)).await.unwrap();
        store.set_failing(true);

        assert!(aggregator.flush_expired(130_000).await.is_err());
        let stats = aggregator.stats().await;
        assert_eq!(stats.buffered_entities, 1);
        assert_eq!(stats.flush_failures, 1);
        // Boundary did not advance.
        assert_eq!(stats.current_slice, Some(0));

        store.set_failing(false);
        aggregator.flush_expired(130_000).await.unwrap();
        assert_eq!(
            store.get(&id, 0).unwrap().get("fluffies").unwrap().value(),
            &NumericValue::Int32(4)
        );
        assert_eq!(aggregator.stats().await.current_slice, Some(120_000));
    }

    #[tokio::test]
    async fn test_partial_flush_failure_does_not_resend_persisted_entities() {
        let (store, aggregator) = buffered();

        aggregator.persist(&entity("a"), 10_000, fluffies(1)).await.unwrap();
        aggregator.persist(&entity("b"), 10_000, fluffies(2)).await.unwrap();

        // First entity persists, second fails mid-loop.
        store.fail_after(1);
        assert!(aggregator.flush_expired(130_000).await.is_err());
        assert_eq!(aggregator.stats().await.buffered_entities, 1);

        store.set_failing(false);
        aggregator.flush_expired(130_000).await.unwrap();

        // Each entity stored exactly once with its exact value: a re-send of
        // the already-persisted entity would have doubled its aggregate.
        assert_eq!(
            store.get(&entity("a"), 0).unwrap().get("fluffies").unwrap().value(),
            &NumericValue::Int32(1)
        );
        assert_eq!(
            store.get(&entity("b"), 0).unwrap().get("fluffies").unwrap().value(),
            &NumericValue::Int32(2)
        );
        assert_eq!(store.persist_calls(), 3);
    }

    #[tokio::test]
    async fn test_read_operations_delegate() {
        let (store, aggregator) = buffered();
        let id = entity("two");

        store.persist(&id, 0, fluffies(9)).await.unwrap();
        let listed = aggregator.entities().await.unwrap();
        assert_eq!(listed, vec![id.clone()]);

        let slices = aggregator.query_range(&id, 0, 240_000).await.unwrap();
        assert_eq!(slices.len(), 1);
    }

    #[tokio::test]
    async fn test_concurrent_writers_one_record_per_slice() {
        let store = Arc::new(InMemoryStore::new(GRANULARITY));
        let aggregator = Arc::new(BufferedStore::with_granularity(store.clone(), GRANULARITY));
        let id = entity("two");

        let mut handles = Vec::new();
        for _ in 0..8 {
            let aggregator = Arc::clone(&aggregator);
            let id = id.clone();
            handles.push(tokio::spawn(async move {
                for _ in 0..50 {
                    aggregator.persist(&id, 60_000, fluffies(1)).await.unwrap();
                }
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        aggregator.flush_expired(130_000).await.unwrap();
        assert_eq!(store.persist_calls(), 1);
        assert_eq!(
            store.get(&id, 0).unwrap().get("fluffies").unwrap().value(),
            &NumericValue::Int32(400)
        );
    }
}
