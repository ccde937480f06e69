use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::common::{short_token, Severity};
use crate::events::AlertPayload;

/// A business-rule violation derived from an event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Alert {
    pub id: String,
    pub severity: Severity,
    pub title: String,
    pub description: String,
    /// Id of the event whose evaluation produced this alert.
    pub source_event_id: String,
    pub payload: Value,
    pub created_at: DateTime<Utc>,
}

impl Alert {
    pub fn new(
        severity: Severity,
        title: impl Into<String>,
        description: impl Into<String>,
        source_event_id: impl Into<String>,
        payload: Value,
    ) -> Self {
        Self {
            id: short_token("alt"),
            severity,
            title: title.into(),
            description: description.into(),
            source_event_id: source_event_id.into(),
            payload,
            created_at: Utc::now(),
        }
    }

    /// Payload of the `alert.created` event this alert is persisted as.
    pub fn to_event_payload(&self) -> AlertPayload {
        AlertPayload {
            severity: self.severity,
            title: self.title.clone(),
            description: self.description.clone(),
            source_event_id: self.source_event_id.clone(),
            data: self.payload.clone(),
        }
    }
}
