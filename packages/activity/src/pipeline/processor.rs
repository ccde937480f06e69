//! Fan-out consumer: one event in, at most one memory entry and zero or more
//! alerts out.
//!
//! Everything here is best-effort enrichment layered on the durable log. The
//! caller that produced the original event must never observe a failure from
//! this path, so every error is caught, logged, and swallowed.

use std::sync::Arc;

use serde_json::json;

use crate::alerts::AlertEngine;
use crate::common::resolve_owner;
use crate::events::Event;
use crate::memory::{MemoryEntry, MemoryIndex};

/// Longest chat excerpt carried into a memory summary.
const CHAT_EXCERPT_CHARS: usize = 100;

pub struct EventProcessor {
    memory: MemoryIndex,
    alerts: Arc<AlertEngine>,
}

impl EventProcessor {
    pub fn new(memory: MemoryIndex, alerts: Arc<AlertEngine>) -> Self {
        Self { memory, alerts }
    }

    /// Turn an event into agent memory and check it against the alert rules.
    ///
    /// Returns the written entry, or `None` when any enrichment step failed.
    /// Never errors, whatever the event looks like.
    pub async fn process(&self, event: &Event) -> Option<MemoryEntry> {
        let owner_id = resolve_owner(&event.actor);
        let content = summarize(event);
        let metadata = json!({
            "event_type": event.event_type,
            "original_payload": event.payload,
            "processed": true,
            "source": "event_processor",
        });

        let entry = match self
            .memory
            .write(owner_id, &event.entity, &event.entity_id, &content, metadata)
            .await
        {
            Ok(entry) => entry,
            Err(e) => {
                tracing::warn!(event_type = %event.event_type, error = %e, "memory write failed");
                return None;
            }
        };

        if let Err(e) = self.alerts.process_event(event).await {
            tracing::warn!(event_type = %event.event_type, error = %e, "alert evaluation failed");
        }

        tracing::debug!(
            event_type = %event.event_type,
            memory_id = entry.id,
            "event processed"
        );
        Some(entry)
    }
}

/// Human-readable one-liner for the memory index, dispatched on the type
/// prefix. Total: unknown types fall back to a generic sentence.
fn summarize(event: &Event) -> String {
    if event.event_type == "api.error" {
        let (path, error) = match event.payload.as_http() {
            Some(http) => (
                http.path.as_str(),
                http.error.as_deref().unwrap_or("unknown error"),
            ),
            None => ("unknown endpoint", "unknown error"),
        };
        return format!("Error at {}: {}", path, error);
    }

    if event.event_type.starts_with("http.") {
        if let Some(http) = event.payload.as_http() {
            return format!(
                "HTTP {} {} - status {} - {}ms",
                http.method, http.path, http.status_code, http.response_time_ms
            );
        }
    }

    if let Some(action) = event.event_type.strip_prefix("meeting.") {
        let title = event
            .payload
            .as_domain()
            .and_then(|p| p.title.as_deref())
            .unwrap_or("Untitled");
        return match action {
            "created" => format!("Meeting created: '{}'", title),
            "updated" => format!("Meeting updated: '{}'", title),
            "completed" => format!("Meeting completed: '{}'", title),
            other => format!("Meeting {}: '{}'", other, title),
        };
    }

    if event.event_type.starts_with("chat.") {
        let message = event
            .payload
            .as_domain()
            .and_then(|p| p.message.as_deref())
            .unwrap_or("");
        let excerpt: String = message.chars().take(CHAT_EXCERPT_CHARS).collect();
        return format!("Chat: {}...", excerpt);
    }

    format!("Event {} processed", event.event_type)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::{DomainPayload, EventStore, HttpPayload};
    use crate::test_support::test_pool;

    async fn processor() -> EventProcessor {
        let pool = test_pool().await;
        let store = EventStore::new(pool.clone());
        let alerts = Arc::new(AlertEngine::with_default_rules(store));
        EventProcessor::new(MemoryIndex::new(pool), alerts)
    }

    #[tokio::test]
    async fn meeting_event_becomes_owned_memory() {
        let processor = processor().await;
        let event = Event::domain(
            "meeting.created",
            "meeting",
            "m1",
            "user_7",
            DomainPayload::default().with_title("Kickoff"),
        )
        .with_id("evt_1");

        let entry = processor.process(&event).await.unwrap();
        assert_eq!(entry.owner_id, Some(7));
        assert_eq!(entry.content, "Meeting created: 'Kickoff'");
        assert_eq!(entry.metadata_str("event_type"), Some("meeting.created"));
    }

    #[tokio::test]
    async fn http_summary_carries_status_and_latency() {
        let processor = processor().await;
        let event = Event::http(
            "user_2",
            HttpPayload::new("GET", "/api/v1/kpis", 200).with_response_time(42),
        );
        let entry = processor.process(&event).await.unwrap();
        assert_eq!(entry.content, "HTTP GET /api/v1/kpis - status 200 - 42ms");
    }

    #[tokio::test]
    async fn unknown_types_never_error() {
        let processor = processor().await;
        for event_type in ["deploy.finished", "..", "", "weird"] {
            let event = Event::domain(event_type, "misc", "x", "nobody-knows", DomainPayload::default());
            let entry = processor.process(&event).await;
            // Still summarized with the generic fallback, never a panic/error.
            assert!(entry.is_some());
        }
        let entry = processor
            .process(&Event::domain("deploy.finished", "misc", "x", "system", DomainPayload::default()))
            .await
            .unwrap();
        assert_eq!(entry.content, "Event deploy.finished processed");
    }

    #[tokio::test]
    async fn processing_also_runs_alert_rules() {
        let processor = processor().await;
        let event = Event::domain(
            "meeting.completed",
            "meeting",
            "m2",
            "user_1",
            DomainPayload::default(),
        )
        .with_id("evt_9");
        processor.process(&event).await.unwrap();

        let alert_events = processor
            .alerts
            .store()
            .list_by(Some("alert.created"), None, None)
            .await
            .unwrap();
        assert_eq!(alert_events.len(), 1);
        assert_eq!(
            alert_events[0].payload.0.as_alert().unwrap().source_event_id,
            "evt_9"
        );
    }
}
