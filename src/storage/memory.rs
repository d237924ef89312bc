//! In-memory metrics store.
//!
//! Keeps every persisted window in process memory. Used as the test double
//! for the durable store and as a standalone backend for small deployments.

use crate::core::{Config, EntityId, Result, TallyError};
use crate::model::{Metrics, Timeslice};
use crate::storage::store::MetricStore;
use dashmap::DashMap;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};
use std::time::Duration;

/// In-memory implementation of [`MetricStore`].
///
/// Rows are keyed by entity and timestamp; persisting twice at the same
/// timestamp merges the rows via [`Metrics::merge`]. Includes failure
/// injection for exercising flush-retry behavior in tests.
pub struct InMemoryStore {
    rows: DashMap<EntityId, BTreeMap<i64, Metrics>>,
    granularity_millis: i64,
    persist_calls: AtomicU64,
    /// Remaining successful persists before injected failures kick in.
    succeed_budget: AtomicI64,
}

impl InMemoryStore {
    /// Create a store whose query windows span `granularity`.
    pub fn new(granularity: Duration) -> Self {
        Self {
            rows: DashMap::new(),
            granularity_millis: granularity.as_millis() as i64,
            persist_calls: AtomicU64::new(0),
            succeed_budget: AtomicI64::new(i64::MAX),
        }
    }

    /// Create a store from application configuration.
    pub fn from_config(config: &Config) -> Self {
        Self::new(config.aggregation.granularity)
    }

    /// Make every subsequent `persist` fail with a storage error.
    pub fn set_failing(&self, failing: bool) {
        self.succeed_budget
            .store(if failing { 0 } else { i64::MAX }, Ordering::SeqCst);
    }

    /// Allow `n` more successful persists, then fail until reset.
    pub fn fail_after(&self, n: i64) {
        self.succeed_budget.store(n, Ordering::SeqCst);
    }

    /// Total `persist` calls accepted or rejected since creation.
    pub fn persist_calls(&self) -> u64 {
        self.persist_calls.load(Ordering::SeqCst)
    }

    /// Number of stored rows for one entity.
    pub fn row_count(&self, entity: &EntityId) -> usize {
        self.rows.get(entity).map_or(0, |rows| rows.len())
    }

    /// Stored metrics for one entity at one exact timestamp.
    pub fn get(&self, entity: &EntityId, timestamp_millis: i64) -> Option<Metrics> {
        self.rows
            .get(entity)
            .and_then(|rows| rows.get(&timestamp_millis).cloned())
    }
}

#[async_trait::async_trait]
impl MetricStore for InMemoryStore {
    async fn persist(
        &self,
        entity: &EntityId,
        timestamp_millis: i64,
        metrics: Metrics,
    ) -> Result<()> {
        self.persist_calls.fetch_add(1, Ordering::SeqCst);
        if self.succeed_budget.fetch_sub(1, Ordering::SeqCst) <= 0 {
            return Err(TallyError::storage(format!(
                "injected failure persisting entity '{}'",
                entity
            )));
        }

        let mut rows = self.rows.entry(entity.clone()).or_default();
        match rows.get_mut(&timestamp_millis) {
            Some(existing) => existing.merge(metrics)?,
            None => {
                rows.insert(timestamp_millis, metrics);
            },
        }
        Ok(())
    }

    async fn entities(&self) -> Result<Vec<EntityId>> {
        let mut entities: Vec<EntityId> =
            self.rows.iter().map(|entry| entry.key().clone()).collect();
        entities.sort();
        Ok(entities)
    }

    async fn query_range(
        &self,
        entity: &EntityId,
        start_millis: i64,
        end_millis: i64,
    ) -> Result<Vec<Timeslice>> {
        let Some(rows) = self.rows.get(entity) else {
            return Ok(Vec::new());
        };
        rows.range(start_millis..end_millis)
            .map(|(timestamp, metrics)| {
                Timeslice::new(
                    *timestamp,
                    *timestamp + self.granularity_millis,
                    metrics.clone(),
                )
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Metric;
    use crate::num::NumericValue;

    fn entity(id: &str) -> EntityId {
        EntityId::new(id).unwrap()
    }

    #[tokio::test]
    async fn test_persist_and_query() {
        let store = InMemoryStore::new(Duration::from_millis(120_000));
        let id = entity("two");

        store
            .persist(&id, 0, Metrics::of("fluffies", Metric::aggregate(1i32)))
            .await
            .unwrap();

        let slices = store.query_range(&id, 0, 240_000).await.unwrap();
        assert_eq!(slices.len(), 1);
        assert_eq!(slices[0].start(), 0);
        assert_eq!(slices[0].end(), 120_000);
        assert_eq!(
            slices[0].metrics().get("fluffies").unwrap().value(),
            &NumericValue::Int32(1)
        );
    }

    #[tokio::test]
    async fn test_same_timestamp_rows_merge() {
        let store = InMemoryStore::new(Duration::from_millis(120_000));
        let id = entity("two");

        store
            .persist(&id, 0, Metrics::of("fluffies", Metric::aggregate(1i32)))
            .await
            .unwrap();
        store
            .persist(&id, 0, Metrics::of("fluffies", Metric::aggregate(2i32)))
            .await
            .unwrap();

        assert_eq!(store.row_count(&id), 1);
        assert_eq!(
            store.get(&id, 0).unwrap().get("fluffies").unwrap().value(),
            &NumericValue::Int32(3)
        );
    }

    #[tokio::test]
    async fn test_range_is_half_open() {
        let store = InMemoryStore::new(Duration::from_millis(100));
        let id = entity("e");

        for ts in [0i64, 100, 200] {
            store
                .persist(&id, ts, Metrics::of("n", Metric::aggregate(1i32)))
                .await
                .unwrap();
        }

        let slices = store.query_range(&id, 0, 200).await.unwrap();
        assert_eq!(slices.len(), 2);
    }

    #[tokio::test]
    async fn test_failure_injection() {
        let store = InMemoryStore::new(Duration::from_millis(100));
        let id = entity("e");
        store.set_failing(true);

        let err = store
            .persist(&id, 0, Metrics::of("n", Metric::aggregate(1i32)))
            .await
            .unwrap_err();
        assert!(err.is_recoverable());
        assert_eq!(store.persist_calls(), 1);
        assert_eq!(store.row_count(&id), 0);
    }

    #[tokio::test]
    async fn test_entities_listed_sorted() {
        let store = InMemoryStore::new(Duration::from_millis(100));
        for id in ["b", "a", "c"] {
            store
                .persist(&entity(id), 0, Metrics::of("n", Metric::aggregate(1i32)))
                .await
                .unwrap();
        }
        let listed = store.entities().await.unwrap();
        let names: Vec<&str> = listed.iter().map(|e| e.as_str()).collect();
        assert_eq!(names, vec!["a", "b", "c"]);
    }
}
