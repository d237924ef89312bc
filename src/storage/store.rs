//! Durable store contract.

use crate::core::{EntityId, Result};
use crate::model::{Metrics, Timeslice};

/// Contract for a durable metrics store.
///
/// `persist` is the write path the buffering aggregator decorates; the read
/// operations are passed through unchanged by any decorator.
#[async_trait::async_trait]
pub trait MetricStore: Send + Sync {
    /// Persist the metrics for one entity at one timestamp. Fails on I/O
    /// error; callers treat the `Metrics` value as consumed either way.
    async fn persist(&self, entity: &EntityId, timestamp_millis: i64, metrics: Metrics)
        -> Result<()>;

    /// List all entities with stored metrics.
    async fn entities(&self) -> Result<Vec<EntityId>>;

    /// Query stored windows for one entity over `[start, end)`.
    async fn query_range(
        &self,
        entity: &EntityId,
        start_millis: i64,
        end_millis: i64,
    ) -> Result<Vec<Timeslice>>;
}
