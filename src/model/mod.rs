//! Metric data model: named observations, per-entity mappings, and time
//! windows.

pub mod metric;
pub mod metrics;
pub mod timeslice;

pub use metric::{Metric, MetricKind};
pub use metrics::Metrics;
pub use timeslice::Timeslice;
