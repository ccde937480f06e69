//! Scheduled alert rules.
//!
//! Unlike the per-event rule table, scheduled rules poll the log on a timer
//! and can observe the same condition on every run. They must therefore
//! check for an existing alert on the same subject within the window before
//! emitting, or repeated polling would turn one stalled meeting into an
//! alert storm.

use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use chrono::{Duration, Utc};

use crate::common::Severity;
use crate::events::EventStore;

use super::alert::Alert;
use super::engine::AlertEngine;

/// A rule evaluated on a schedule rather than per event.
#[async_trait]
pub trait ScheduledRule: Send + Sync {
    fn name(&self) -> &'static str;

    /// Run one sweep. Returns the alerts actually emitted.
    async fn run(&self) -> Result<Vec<Alert>>;
}

/// Event types that close out a meeting's lifecycle.
const MEETING_TERMINAL_TYPES: &[&str] = &[
    "meeting.started",
    "meeting.completed",
    "meeting.cancelled",
];

/// Flags meetings that were created but never started, completed, or
/// cancelled within a grace period.
pub struct MeetingWatchdog {
    store: EventStore,
    alerts: Arc<AlertEngine>,
    window_days: i64,
    grace: Duration,
}

impl MeetingWatchdog {
    pub fn new(store: EventStore, alerts: Arc<AlertEngine>) -> Self {
        Self {
            store,
            alerts,
            window_days: 7,
            grace: Duration::hours(1),
        }
    }

    /// How long after creation a meeting may stay open before it counts as
    /// stalled, and how far back the sweep looks.
    pub fn with_window(mut self, window_days: i64, grace: Duration) -> Self {
        self.window_days = window_days;
        self.grace = grace;
        self
    }
}

#[async_trait]
impl ScheduledRule for MeetingWatchdog {
    fn name(&self) -> &'static str {
        "meeting_watchdog"
    }

    async fn run(&self) -> Result<Vec<Alert>> {
        let now = Utc::now();
        let since = now - Duration::days(self.window_days);
        let window = self.store.list_since(since).await?;

        let closed: std::collections::HashSet<&str> = window
            .iter()
            .filter(|r| MEETING_TERMINAL_TYPES.contains(&r.event_type.as_str()))
            .map(|r| r.entity_id.as_str())
            .collect();

        let mut emitted = Vec::new();
        for record in window
            .iter()
            .filter(|r| r.event_type == "meeting.created")
            .filter(|r| r.created_at <= now - self.grace)
            .filter(|r| !closed.contains(r.entity_id.as_str()))
        {
            let title = "Meeting not started on time";
            if self
                .store
                .has_recent_alert(title, &record.entity_id, since)
                .await?
            {
                tracing::debug!(meeting = %record.entity_id, "stalled meeting already alerted");
                continue;
            }
            let alert = Alert::new(
                Severity::Critical,
                title,
                format!(
                    "Meeting {} was scheduled and never started.",
                    record.entity_id
                ),
                record.event_id.clone(),
                serde_json::json!({ "entity_id": record.entity_id }),
            );
            self.alerts.emit(&alert).await?;
            emitted.push(alert);
        }
        Ok(emitted)
    }
}
