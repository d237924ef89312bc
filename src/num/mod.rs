//! Numeric value representation, combination algebra, and binary codec.

pub mod codec;
pub mod combine;
pub mod value;

pub use combine::{last_write_wins, sum, sum_opt, FrequencyMap, RunningCount};
pub use value::NumericValue;
