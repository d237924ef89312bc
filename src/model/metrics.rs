use crate::core::{Result, TallyError};
use crate::model::metric::Metric;
use serde::{Deserialize, Serialize};
use std::collections::hash_map::Entry;
use std::collections::HashMap;

/// All measurements for one entity at one instant or within one window:
/// a mapping from metric name to [`Metric`], plus an optional timestamp.
///
/// A `Metrics` value is consumed when merged or persisted; callers must not
/// reuse an instance after handing it to the aggregator.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Metrics {
    values: HashMap<String, Metric>,
    timestamp: Option<i64>,
}

impl Metrics {
    /// Create an empty mapping with no associated timestamp.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty mapping associated with an epoch-millis timestamp.
    pub fn at(timestamp_millis: i64) -> Self {
        Self {
            values: HashMap::new(),
            timestamp: Some(timestamp_millis),
        }
    }

    /// Create a single-metric mapping; convenient for producers.
    pub fn of(name: impl Into<String>, metric: Metric) -> Self {
        let mut metrics = Self::new();
        metrics.insert(name, metric);
        metrics
    }

    /// Insert or replace a metric by name.
    pub fn insert(&mut self, name: impl Into<String>, metric: Metric) {
        self.values.insert(name.into(), metric);
    }

    /// Builder-style insert.
    pub fn with(mut self, name: impl Into<String>, metric: Metric) -> Self {
        self.insert(name, metric);
        self
    }

    /// Look up a metric by name.
    pub fn get(&self, name: &str) -> Option<&Metric> {
        self.values.get(name)
    }

    /// Associated timestamp, if any.
    pub fn timestamp(&self) -> Option<i64> {
        self.timestamp
    }

    /// Set the associated timestamp.
    pub fn set_timestamp(&mut self, timestamp_millis: i64) {
        self.timestamp = Some(timestamp_millis);
    }

    /// Number of named metrics.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// True when no metric is present.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Iterate over name/metric pairs.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Metric)> {
        self.values.iter().map(|(name, metric)| (name.as_str(), metric))
    }

    /// Merge a later `Metrics` into this one, consuming it.
    ///
    /// Keys present in both are combined with [`Metric::combine`], the
    /// incoming metric as the later operand; keys present in only one side
    /// are taken as-is. A shared key with mismatched kinds fails with
    /// [`TallyError::KindMismatch`] naming the key.
    pub fn merge(&mut self, later: Metrics) -> Result<()> {
        for (name, incoming) in later.values {
            match self.values.entry(name) {
                Entry::Occupied(mut slot) => {
                    let combined = slot.get().combine(&incoming).map_err(|err| match err {
                        TallyError::KindMismatch { left, right, .. } => TallyError::KindMismatch {
                            name: slot.key().clone(),
                            left,
                            right,
                        },
                        other => other,
                    })?;
                    slot.insert(combined);
                },
                Entry::Vacant(slot) => {
                    slot.insert(incoming);
                },
            }
        }
        if self.timestamp.is_none() {
            self.timestamp = later.timestamp;
        }
        Ok(())
    }

    /// Consuming variant of [`Metrics::merge`].
    pub fn merged(mut self, later: Metrics) -> Result<Metrics> {
        self.merge(later)?;
        Ok(self)
    }

    /// Fold any number of lazy sequences of `Metrics` into one, in stream
    /// order. Typically used to reduce sequential windows read back from
    /// the durable store into a single answer.
    pub fn summarize<I, S>(streams: I) -> Result<Metrics>
    where
        I: IntoIterator<Item = S>,
        S: IntoIterator<Item = Metrics>,
    {
        let mut summary = Metrics::new();
        for stream in streams {
            for metrics in stream {
                summary.merge(metrics)?;
            }
        }
        Ok(summary)
    }
}
