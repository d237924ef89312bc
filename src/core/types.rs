use crate::core::error::{Result, TallyError};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifier for the subject a set of metrics is attached to,
/// e.g. a dataset or user id.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EntityId(String);

impl EntityId {
    /// Creates a new EntityId after validation
    pub fn new(id: impl Into<String>) -> Result<Self> {
        let id = id.into();
        if id.is_empty() {
            return Err(TallyError::invalid_metric("EntityId cannot be empty"));
        }
        if id.len() > 255 {
            return Err(TallyError::invalid_metric(format!(
                "EntityId cannot exceed 255 characters, got {}",
                id.len()
            )));
        }
        Ok(EntityId(id))
    }

    /// Returns the string representation of the entity id
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns the inner string value
    pub fn into_inner(self) -> String {
        self.0
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Current wall-clock time as milliseconds since the Unix epoch.
pub fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}
