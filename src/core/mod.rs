//! Core domain types and shared infrastructure.
//!
//! This module contains the fundamental types used throughout the
//! aggregation engine: entity identifiers, configuration, and errors.

#![warn(missing_docs)]

pub mod config;
pub mod error;
pub mod types;

// Re-export commonly used types
pub use config::{init_tracing, Config, ConfigBuilder, LogLevel};
pub use error::{Result, TallyError};
pub use types::{now_millis, EntityId};
