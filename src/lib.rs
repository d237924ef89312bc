//! Tally - windowed metrics aggregation and buffering engine.
//!
//! Tally accepts small, frequent numeric measurements tagged to an entity
//! and a metric name, combines them losslessly according to each metric's
//! declared semantics, groups them into fixed-width time windows, and
//! flushes completed windows to a durable store while tolerating that
//! store's transient failures.
//!
//! # Features
//!
//! - **Lossless combination**: additive accumulation widens its numeric
//!   representation instead of overflowing, up to arbitrary precision
//! - **Window buffering**: memory bounded to one window's worth of
//!   entities, durable-store writes amortized across the slice width
//! - **At-least-once delivery**: flush failures keep data buffered for
//!   retry without double-counting what already persisted
//! - **Fail-fast supervision**: a watchdog pauses store traffic on an
//!   external health signal and resumes it after backoff
//!
//! # Architecture
//!
//! - `core`: entity identifiers, configuration, and errors
//! - `num`: the numeric value representation, combination algebra, and
//!   binary codec
//! - `model`: metrics and time-window data model
//! - `storage`: store contract, buffering aggregator, and watchdog
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use tally::core::{Config, EntityId, now_millis};
//! use tally::model::{Metric, Metrics};
//! use tally::storage::{BufferedStore, InMemoryStore, MetricStore};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = Config::new()?;
//!     let store = Arc::new(InMemoryStore::from_config(&config));
//!     let aggregator = BufferedStore::new(store, &config);
//!
//!     let entity = EntityId::new("two")?;
//!     let metrics = Metrics::of("fluffies", Metric::aggregate(1i32));
//!     aggregator.persist(&entity, now_millis(), metrics).await?;
//!     aggregator.heartbeat().await?;
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod core;
pub mod model;
pub mod num;
pub mod storage;

// Re-export core types for convenience
pub use crate::core::{Config, Result};
