//! Multi-step automation triggered by completed-event types.
//!
//! Each triggering event runs one bounded check/act sequence whose only
//! durable trace is the events and memories it writes; no saga state
//! survives a restart. A failing step abandons the run: it is logged and
//! dropped, never retried, and never surfaces to whoever produced the
//! trigger.

use std::sync::Arc;

use anyhow::Result;
use chrono::{Duration, Utc};
use serde_json::json;

use crate::alerts::{Alert, AlertEngine};
use crate::common::{resolve_owner, Severity};
use crate::events::Event;
use crate::memory::MemoryIndex;

/// Steps of one automation run. `NoAction` and `Recorded` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AutomationStep {
    Triggered,
    MemoryChecked,
    NoAction,
    AlertedAndFollowupCreated,
    Recorded,
}

/// Where a run ended, for observability and tests.
#[derive(Debug, Clone)]
pub struct AutomationOutcome {
    pub entity_id: String,
    pub terminal: AutomationStep,
}

pub struct AutomationOrchestrator {
    memory: MemoryIndex,
    alerts: Arc<AlertEngine>,
    triggers: Vec<String>,
    lookback: Duration,
    idempotency_guard: bool,
}

impl AutomationOrchestrator {
    pub fn new(memory: MemoryIndex, alerts: Arc<AlertEngine>) -> Self {
        Self {
            memory,
            alerts,
            triggers: vec!["meeting.completed".to_string()],
            lookback: Duration::days(7),
            idempotency_guard: true,
        }
    }

    /// Replace the trigger allow-list.
    pub fn with_triggers(mut self, triggers: Vec<String>) -> Self {
        self.triggers = triggers;
        self
    }

    pub fn with_lookback_days(mut self, days: i64) -> Self {
        self.lookback = Duration::days(days);
        self
    }

    /// Toggle the redelivery guard: when on, a trigger whose automation
    /// already ran for the same entity within the lookback window is a
    /// no-op instead of producing duplicate follow-ups.
    pub fn with_idempotency_guard(mut self, enabled: bool) -> Self {
        self.idempotency_guard = enabled;
        self
    }

    /// Run the automation for a triggering event.
    ///
    /// `None` when the event type is not on the allow-list or the run was
    /// abandoned by a step failure; the failure never propagates.
    pub async fn handle(&self, event: &Event) -> Option<AutomationOutcome> {
        if !self.triggers.iter().any(|t| t == &event.event_type) {
            return None;
        }
        match self.run(event).await {
            Ok(outcome) => Some(outcome),
            Err(e) => {
                tracing::error!(
                    event_type = %event.event_type,
                    entity_id = %event.entity_id,
                    error = %e,
                    "automation run abandoned"
                );
                None
            }
        }
    }

    async fn run(&self, event: &Event) -> Result<AutomationOutcome> {
        let entity_id = event.entity_id.clone();
        let since = Utc::now() - self.lookback;
        tracing::debug!(step = ?AutomationStep::Triggered, %entity_id, "automation triggered");

        if self.idempotency_guard {
            let prior_runs = self
                .memory
                .find_for_entity("automation_log", &entity_id, since)
                .await?;
            if !prior_runs.is_empty() {
                tracing::debug!(%entity_id, "automation already ran; skipping");
                return Ok(AutomationOutcome {
                    entity_id,
                    terminal: AutomationStep::NoAction,
                });
            }
        }

        let minutes = self
            .memory
            .find_for_entity("meeting_minutes", &entity_id, since)
            .await?;
        tracing::debug!(step = ?AutomationStep::MemoryChecked, %entity_id, found = minutes.len(), "minutes check");
        if !minutes.is_empty() {
            return Ok(AutomationOutcome {
                entity_id,
                terminal: AutomationStep::NoAction,
            });
        }

        let title = event
            .payload
            .as_domain()
            .and_then(|p| p.title.clone())
            .unwrap_or_else(|| "Untitled meeting".to_string());

        // The per-event rule table may already have flagged this incident;
        // one missing-minutes alert per source event is enough.
        let alert_title = "Meeting completed without minutes";
        let already_alerted = self
            .alerts
            .store()
            .has_recent_alert(alert_title, event.id_str(), since)
            .await?;
        if already_alerted {
            tracing::debug!(%entity_id, "missing-minutes alert already on record");
        } else {
            let alert = Alert::new(
                Severity::Warning,
                alert_title,
                format!(
                    "Meeting '{}' was completed without minutes on record. A follow-up was created.",
                    title
                ),
                event.id_str(),
                json!({
                    "entity_id": entity_id,
                    "meeting_title": title,
                    "suggested_action": "Record the meeting minutes",
                }),
            );
            self.alerts.emit(&alert).await?;
        }

        let owner_id = resolve_owner(&event.actor);
        let due_date = Utc::now() + Duration::hours(24);
        self.memory
            .write(
                owner_id,
                "follow_up_task",
                &format!("auto_followup_{}", entity_id),
                &format!("Automatic follow-up for meeting: {}", title),
                json!({
                    "automated": true,
                    "meeting_id": entity_id,
                    "due_date": due_date.to_rfc3339(),
                    "priority": "medium",
                }),
            )
            .await?;
        tracing::debug!(
            step = ?AutomationStep::AlertedAndFollowupCreated,
            %entity_id,
            "follow-up task created"
        );

        self.memory
            .write(
                owner_id,
                "automation_log",
                &entity_id,
                &format!("Automation run: missing-minutes follow-up for meeting {}", entity_id),
                json!({
                    "action": "missing_minutes_followup",
                    "status": "completed",
                }),
            )
            .await?;

        tracing::info!(step = ?AutomationStep::Recorded, %entity_id, "automation recorded");
        Ok(AutomationOutcome {
            entity_id,
            terminal: AutomationStep::Recorded,
        })
    }
}
