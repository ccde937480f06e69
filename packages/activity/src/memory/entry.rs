use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::types::Json;
use serde_json::Value;

/// A derived, human-readable summary scoped to an owner.
///
/// Created exactly once per memory-worthy event; immutable thereafter and
/// never deleted in normal operation.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct MemoryEntry {
    pub id: i64,
    pub owner_id: Option<i64>,
    pub entity_type: String,
    pub entity_id: String,
    pub content: String,
    pub metadata: Json<Value>,
    pub created_at: DateTime<Utc>,
}

impl MemoryEntry {
    /// Convenience accessor for a string field inside the metadata map.
    pub fn metadata_str(&self, key: &str) -> Option<&str> {
        self.metadata.0.get(key).and_then(|v| v.as_str())
    }
}
