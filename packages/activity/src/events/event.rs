//! Event value type and typed payload families.
//!
//! Payloads are a closed tagged enum rather than an open string-keyed map:
//! rules and summaries pattern-match over a known set of fields instead of
//! probing speculative keys. Unknown domain fields still ride along in the
//! flattened `extra` map, so upstream producers are not constrained to the
//! probed set.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::common::Severity;

/// An immutable record of a domain occurrence.
///
/// Once stored, an event is never mutated; corrections are new events. The
/// logical `id` is server-assigned at save time when absent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// Dotted taxonomy, e.g. `meeting.completed`, `followup.generated`.
    #[serde(rename = "type")]
    pub event_type: String,
    /// Entity category: meeting, kpi, followup, document, http_request, alert.
    pub entity: String,
    pub entity_id: String,
    /// Free-form subject: `"system"`, `"anonymous"`, `"user_<n>"`, or text.
    pub actor: String,
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub payload: EventPayload,
}

impl Event {
    /// Build a domain event. The timestamp is assigned at construction.
    pub fn domain(
        event_type: impl Into<String>,
        entity: impl Into<String>,
        entity_id: impl Into<String>,
        actor: impl Into<String>,
        payload: DomainPayload,
    ) -> Self {
        Self {
            id: None,
            event_type: event_type.into(),
            entity: entity.into(),
            entity_id: entity_id.into(),
            actor: actor.into(),
            timestamp: Utc::now(),
            payload: EventPayload::Domain(payload),
        }
    }

    /// Build an HTTP traffic event (`http.<method>`) from request middleware.
    pub fn http(actor: impl Into<String>, payload: HttpPayload) -> Self {
        let event_type = format!("http.{}", payload.method.to_lowercase());
        let entity_id = format!("{}:{}", payload.method, payload.path);
        Self {
            id: None,
            event_type,
            entity: "http_request".to_string(),
            entity_id,
            actor: actor.into(),
            timestamp: Utc::now(),
            payload: EventPayload::Http(payload),
        }
    }

    /// Build an `api.error` event for a request that failed before a response
    /// could be produced.
    pub fn http_error(actor: impl Into<String>, payload: HttpPayload) -> Self {
        let entity_id = format!("error:{}:{}", payload.method, payload.path);
        Self {
            id: None,
            event_type: "api.error".to_string(),
            entity: "http_request".to_string(),
            entity_id,
            actor: actor.into(),
            timestamp: Utc::now(),
            payload: EventPayload::Http(payload),
        }
    }

    /// Build the `alert.created` event an alert is persisted as.
    pub fn alert(alert_id: impl Into<String>, payload: AlertPayload) -> Self {
        Self {
            id: None,
            event_type: "alert.created".to_string(),
            entity: "alert".to_string(),
            entity_id: alert_id.into(),
            actor: "system".to_string(),
            timestamp: Utc::now(),
            payload: EventPayload::Alert(payload),
        }
    }

    /// Set a caller-supplied logical id.
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    /// Override the construction-time timestamp.
    pub fn with_timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = timestamp;
        self
    }

    /// Logical id, or empty when the event has not been stored yet.
    pub fn id_str(&self) -> &str {
        self.id.as_deref().unwrap_or("")
    }
}

/// Closed set of payload families, tagged by `kind`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum EventPayload {
    Http(HttpPayload),
    Domain(DomainPayload),
    Alert(AlertPayload),
}

impl Default for EventPayload {
    fn default() -> Self {
        EventPayload::Domain(DomainPayload::default())
    }
}

impl EventPayload {
    pub fn as_http(&self) -> Option<&HttpPayload> {
        match self {
            EventPayload::Http(p) => Some(p),
            _ => None,
        }
    }

    pub fn as_domain(&self) -> Option<&DomainPayload> {
        match self {
            EventPayload::Domain(p) => Some(p),
            _ => None,
        }
    }

    pub fn as_alert(&self) -> Option<&AlertPayload> {
        match self {
            EventPayload::Alert(p) => Some(p),
            _ => None,
        }
    }

    /// Serialized form used for substring matching and log lines.
    pub fn text(&self) -> String {
        serde_json::to_string(self).unwrap_or_default()
    }
}

/// Payload for HTTP-derived events produced by request middleware.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HttpPayload {
    pub method: String,
    pub path: String,
    pub status_code: u16,
    pub response_time_ms: u64,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub query_params: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_agent: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ip_address: Option<String>,
    /// Set when the request aborted with an unhandled error.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl HttpPayload {
    pub fn new(method: impl Into<String>, path: impl Into<String>, status_code: u16) -> Self {
        Self {
            method: method.into(),
            path: path.into(),
            status_code,
            ..Default::default()
        }
    }

    pub fn with_response_time(mut self, ms: u64) -> Self {
        self.response_time_ms = ms;
        self
    }

    pub fn with_error(mut self, error: impl Into<String>) -> Self {
        self.error = Some(error.into());
        self
    }
}

/// Payload for business-action events.
///
/// The named fields are the ones alert rules and summaries probe; anything
/// else a producer attaches lands in `extra`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DomainPayload {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub agenda: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub urgency: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub area: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub responsible: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, Value>,
}

impl DomainPayload {
    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn with_agenda(mut self, agenda: impl Into<String>) -> Self {
        self.agenda = Some(agenda.into());
        self
    }

    pub fn with_urgency(mut self, urgency: impl Into<String>) -> Self {
        self.urgency = Some(urgency.into());
        self
    }

    pub fn with_field(mut self, key: impl Into<String>, value: Value) -> Self {
        self.extra.insert(key.into(), value);
        self
    }
}

/// Payload carried by `alert.created` events. The log is the only alert
/// store, so the full alert rides inside the event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlertPayload {
    pub severity: Severity,
    pub title: String,
    pub description: String,
    /// The event that caused this alert; the causal origin is always
    /// recoverable through it.
    pub source_event_id: String,
    #[serde(default)]
    pub data: Value,
}
