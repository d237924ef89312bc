use thiserror::Error;

/// Errors produced by the aggregation engine.
#[derive(Error, Debug)]
pub enum TallyError {
    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Metric kind mismatch for '{name}': cannot combine {left} with {right}")]
    KindMismatch {
        name: String,
        left: &'static str,
        right: &'static str,
    },

    #[error("Invalid metric data: {0}")]
    InvalidMetric(String),

    #[error("Non-finite floating-point value cannot be promoted to decimal")]
    NonFiniteFloat,

    #[error("Decode error: {0}")]
    Decode(String),

    #[error("Entity not found: {0}")]
    EntityNotFound(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Result type alias for engine operations
pub type Result<T> = std::result::Result<T, TallyError>;

impl TallyError {
    /// Creates a new storage error
    pub fn storage<S: Into<String>>(msg: S) -> Self {
        Self::Storage(msg.into())
    }

    /// Creates a new configuration error
    pub fn config<S: Into<String>>(msg: S) -> Self {
        Self::Config(msg.into())
    }

    /// Creates a new decode error
    pub fn decode<S: Into<String>>(msg: S) -> Self {
        Self::Decode(msg.into())
    }

    /// Creates a new invalid-metric error
    pub fn invalid_metric<S: Into<String>>(msg: S) -> Self {
        Self::InvalidMetric(msg.into())
    }

    /// Returns true if this error is recoverable.
    ///
    /// Storage failures are transient: the buffer retains unflushed data and
    /// a later heartbeat re-attempts delivery. Kind mismatches and decode
    /// failures are programming/data errors and are never retried.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::Storage(_) | Self::Io(_))
    }

    /// Returns the error category for metrics/logging
    pub fn category(&self) -> &'static str {
        match self {
            Self::Storage(_) => "storage",
            Self::Config(_) => "config",
            Self::KindMismatch { .. } | Self::InvalidMetric(_) | Self::NonFiniteFloat => {
                "validation"
            },
            Self::Decode(_) => "codec",
            Self::EntityNotFound(_) => "not_found",
            Self::Io(_) => "io",
            Self::Serialization(_) => "serialization",
        }
    }
}
