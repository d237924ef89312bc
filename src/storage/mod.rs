//! Storage layer: the durable-store contract, the write-buffering
//! aggregation decorator, and the fail-fast supervision loop around the
//! store connection.

pub mod buffered;
pub mod memory;
pub mod store;
pub mod watchdog;

// Re-export commonly used types
pub use buffered::{BufferStats, BufferedStore};
pub use memory::InMemoryStore;
pub use store::MetricStore;
pub use watchdog::{
    AggregatorResource, FailureBackoff, HealthCheck, ManagedResource, Watchdog, WatchdogState,
};
