use crate::core::{Result, TallyError};
use crate::model::metrics::Metrics;
use serde::{Deserialize, Serialize};

/// A bounded half-open time window `[start, end)` in epoch milliseconds,
/// plus the metrics bucket covering that window. The externally queryable
/// unit returned by range queries.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Timeslice {
    start: i64,
    end: i64,
    metrics: Metrics,
}

impl Timeslice {
    /// Create a timeslice; `start` must precede `end`.
    pub fn new(start_millis: i64, end_millis: i64, metrics: Metrics) -> Result<Self> {
        if start_millis >= end_millis {
            return Err(TallyError::invalid_metric(format!(
                "timeslice start {} must precede end {}",
                start_millis, end_millis
            )));
        }
        Ok(Self {
            start: start_millis,
            end: end_millis,
            metrics,
        })
    }

    /// Inclusive window start in epoch milliseconds.
    pub fn start(&self) -> i64 {
        self.start
    }

    /// Exclusive window end in epoch milliseconds.
    pub fn end(&self) -> i64 {
        self.end
    }

    /// The metrics bucket for this window.
    pub fn metrics(&self) -> &Metrics {
        &self.metrics
    }

    /// Consume the slice, yielding its metrics.
    pub fn into_metrics(self) -> Metrics {
        self.metrics
    }

    /// True when `timestamp_millis` falls within `[start, end)`.
    pub fn contains(&self, timestamp_millis: i64) -> bool {
        timestamp_millis >= self.start && timestamp_millis < self.end
    }

    /// Merge another slice into this one: the boundary expands to the union
    /// of both ranges and the metrics buckets merge.
    pub fn merge(&mut self, other: Timeslice) -> Result<()> {
        self.start = self.start.min(other.start);
        self.end = self.end.max(other.end);
        self.metrics.merge(other.metrics)
    }
}
