use crate::core::{Result, TallyError};
use crate::num::{last_write_wins, sum, NumericValue};
use serde::{Deserialize, Serialize};

/// Combination semantics of a metric.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MetricKind {
    /// Counter-like: values accumulate additively over time
    Aggregate,
    /// Gauge-like: the latest write replaces prior ones
    Absolute,
}

impl MetricKind {
    /// Short name for errors and logging
    pub fn as_str(&self) -> &'static str {
        match self {
            MetricKind::Aggregate => "aggregate",
            MetricKind::Absolute => "absolute",
        }
    }
}

/// One named numeric observation: a value plus its combination semantics.
///
/// Metrics are value types; [`Metric::combine`] returns a new metric rather
/// than mutating either operand, so a caller can never observe aliased
/// post-merge state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Metric {
    value: NumericValue,
    kind: MetricKind,
}

impl Metric {
    /// Create a metric with explicit kind.
    pub fn new(value: impl Into<NumericValue>, kind: MetricKind) -> Self {
        Self {
            value: value.into(),
            kind,
        }
    }

    /// Create a counter-like metric that accumulates additively.
    pub fn aggregate(value: impl Into<NumericValue>) -> Self {
        Self::new(value, MetricKind::Aggregate)
    }

    /// Create a gauge-like metric where later writes replace earlier ones.
    pub fn absolute(value: impl Into<NumericValue>) -> Self {
        Self::new(value, MetricKind::Absolute)
    }

    /// The observation value.
    pub fn value(&self) -> &NumericValue {
        &self.value
    }

    /// The combination semantics.
    pub fn kind(&self) -> MetricKind {
        self.kind
    }

    /// Combine this metric with a later observation of the same metric.
    ///
    /// A kind mismatch is a programming error, surfaced immediately and
    /// never coerced. Aggregate metrics add; absolute metrics keep the
    /// later operand.
    pub fn combine(&self, later: &Metric) -> Result<Metric> {
        if self.kind != later.kind {
            return Err(TallyError::KindMismatch {
                name: String::new(),
                left: self.kind.as_str(),
                right: later.kind.as_str(),
            });
        }
        let value = match self.kind {
            MetricKind::Aggregate => sum(&self.value, &later.value)?,
            MetricKind::Absolute => last_write_wins(Some(&self.value), Some(&later.value))
                .unwrap_or_else(|| later.value.clone()),
        };
        Ok(Metric {
            value,
            kind: self.kind,
        })
    }
}
