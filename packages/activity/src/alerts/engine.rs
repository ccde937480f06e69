//! Stateless rule evaluation over single events.
//!
//! Rules are pure: they read one event and decide, with no IO. The engine
//! owns persistence of whatever they produce. Each rule runs isolated: a
//! rule that errors (or panics) is logged and skipped, siblings still run,
//! and the event itself is unaffected.

use std::panic::{catch_unwind, AssertUnwindSafe};

use anyhow::Result;
use serde_json::Value;

use crate::common::Severity;
use crate::events::{Event, EventStore, PersistedEventRecord};

use super::alert::Alert;

/// Response-time threshold for the slow-endpoint rule, in milliseconds.
const SLOW_ENDPOINT_MS: u64 = 5000;

/// A single per-event alert rule.
pub trait AlertRule: Send + Sync {
    fn name(&self) -> &'static str;

    /// Decide whether `event` violates this rule. Pure; no IO.
    fn evaluate(&self, event: &Event) -> Result<Option<Alert>>;
}

/// Evaluates the rule table against events and persists the resulting alerts
/// back into the event log.
pub struct AlertEngine {
    store: EventStore,
    rules: Vec<Box<dyn AlertRule>>,
}

impl AlertEngine {
    /// Engine with no rules installed; useful for tests and custom tables.
    pub fn new(store: EventStore) -> Self {
        Self { store, rules: Vec::new() }
    }

    /// Engine with the standard rule table.
    pub fn with_default_rules(store: EventStore) -> Self {
        let mut engine = Self::new(store);
        engine.register(CriticalFollowupRule);
        engine.register(MeetingCancelledRule);
        engine.register(RegulatoryKpiRule);
        engine.register(MissingMinutesRule);
        engine.register(ApiErrorRule);
        engine.register(SlowEndpointRule);
        engine.register(AuthFailureRule);
        engine
    }

    pub fn register(&mut self, rule: impl AlertRule + 'static) {
        self.rules.push(Box::new(rule));
    }

    /// Run every rule against the event. Zero or more alerts; rule failures
    /// are contained per rule.
    pub fn evaluate(&self, event: &Event) -> Vec<Alert> {
        let mut alerts = Vec::new();
        for rule in &self.rules {
            match catch_unwind(AssertUnwindSafe(|| rule.evaluate(event))) {
                Ok(Ok(Some(alert))) => alerts.push(alert),
                Ok(Ok(None)) => {}
                Ok(Err(e)) => {
                    tracing::warn!(rule = rule.name(), error = %e, "alert rule failed");
                }
                Err(_) => {
                    tracing::warn!(rule = rule.name(), "alert rule panicked");
                }
            }
        }
        alerts
    }

    /// Evaluate and persist: every produced alert becomes an `alert.created`
    /// event in the log.
    pub async fn process_event(&self, event: &Event) -> Result<Vec<Alert>> {
        let alerts = self.evaluate(event);
        for alert in &alerts {
            self.emit(alert).await?;
        }
        Ok(alerts)
    }

    /// Persist one alert as an `alert.created` event. This is the single
    /// emission path; the automation orchestrator reuses it.
    pub async fn emit(&self, alert: &Alert) -> Result<PersistedEventRecord> {
        let record = self
            .store
            .save(&Event::alert(alert.id.as_str(), alert.to_event_payload()))
            .await?;
        tracing::info!(
            alert_id = %alert.id,
            severity = %alert.severity,
            title = %alert.title,
            "alert emitted"
        );
        Ok(record)
    }

    pub fn store(&self) -> &EventStore {
        &self.store
    }
}

fn payload_value(event: &Event) -> Value {
    serde_json::to_value(&event.payload).unwrap_or_default()
}

/// `followup.generated` with high or critical urgency.
struct CriticalFollowupRule;

impl AlertRule for CriticalFollowupRule {
    fn name(&self) -> &'static str {
        "critical_followup"
    }

    fn evaluate(&self, event: &Event) -> Result<Option<Alert>> {
        if event.event_type != "followup.generated" {
            return Ok(None);
        }
        let Some(domain) = event.payload.as_domain() else {
            return Ok(None);
        };
        let urgent = matches!(domain.urgency.as_deref(), Some("high") | Some("critical"));
        if !urgent {
            return Ok(None);
        }
        let responsible = domain.responsible.as_deref().unwrap_or("unassigned");
        Ok(Some(Alert::new(
            Severity::Critical,
            "Critical follow-up generated",
            format!("Critical task assigned to {}", responsible),
            event.id_str(),
            payload_value(event),
        )))
    }
}

/// Any cancelled meeting is worth a heads-up.
struct MeetingCancelledRule;

impl AlertRule for MeetingCancelledRule {
    fn name(&self) -> &'static str {
        "meeting_cancelled"
    }

    fn evaluate(&self, event: &Event) -> Result<Option<Alert>> {
        if event.event_type != "meeting.cancelled" {
            return Ok(None);
        }
        Ok(Some(Alert::new(
            Severity::Warning,
            "Meeting cancelled",
            "A strategic meeting was cancelled.",
            event.id_str(),
            payload_value(event),
        )))
    }
}

/// Regulatory KPIs entering alert or critical state.
struct RegulatoryKpiRule;

impl AlertRule for RegulatoryKpiRule {
    fn name(&self) -> &'static str {
        "regulatory_kpi"
    }

    fn evaluate(&self, event: &Event) -> Result<Option<Alert>> {
        if event.event_type != "kpi.updated" {
            return Ok(None);
        }
        let Some(domain) = event.payload.as_domain() else {
            return Ok(None);
        };
        // Upstream data is bilingual: "Regulatory" and "Regulatório" both count.
        let regulatory = domain
            .area
            .as_deref()
            .map(|a| a.to_lowercase().starts_with("regulat"))
            .unwrap_or(false);
        let breached = matches!(domain.status.as_deref(), Some("alert") | Some("critical"));
        if !(regulatory && breached) {
            return Ok(None);
        }
        Ok(Some(Alert::new(
            Severity::Critical,
            "Regulatory KPI breach",
            "Regulatory indicator in critical state.",
            event.id_str(),
            payload_value(event),
        )))
    }
}

/// A completed meeting must leave minutes behind.
struct MissingMinutesRule;

impl AlertRule for MissingMinutesRule {
    fn name(&self) -> &'static str {
        "missing_minutes"
    }

    fn evaluate(&self, event: &Event) -> Result<Option<Alert>> {
        if event.event_type != "meeting.completed" {
            return Ok(None);
        }
        let agenda = event
            .payload
            .as_domain()
            .and_then(|p| p.agenda.as_deref())
            .unwrap_or("");
        if !agenda.trim().is_empty() {
            return Ok(None);
        }
        Ok(Some(Alert::new(
            Severity::Critical,
            "Meeting completed without minutes",
            format!(
                "Meeting {} was completed without minutes or agenda on record.",
                event.entity_id
            ),
            event.id_str(),
            payload_value(event),
        )))
    }
}

/// Server-side failures on HTTP traffic.
struct ApiErrorRule;

impl AlertRule for ApiErrorRule {
    fn name(&self) -> &'static str {
        "api_error"
    }

    fn evaluate(&self, event: &Event) -> Result<Option<Alert>> {
        let Some(http) = event.payload.as_http() else {
            return Ok(None);
        };
        if http.status_code < 500 {
            return Ok(None);
        }
        Ok(Some(Alert::new(
            Severity::Critical,
            "API error",
            format!("Error {} at {}", http.status_code, http.path),
            event.id_str(),
            payload_value(event),
        )))
    }
}

/// Responses slower than the threshold.
struct SlowEndpointRule;

impl AlertRule for SlowEndpointRule {
    fn name(&self) -> &'static str {
        "slow_endpoint"
    }

    fn evaluate(&self, event: &Event) -> Result<Option<Alert>> {
        let Some(http) = event.payload.as_http() else {
            return Ok(None);
        };
        if http.response_time_ms <= SLOW_ENDPOINT_MS {
            return Ok(None);
        }
        Ok(Some(Alert::new(
            Severity::Warning,
            "Slow endpoint",
            format!("{} responded in {}ms", http.path, http.response_time_ms),
            event.id_str(),
            payload_value(event),
        )))
    }
}

/// Client errors on authentication paths.
struct AuthFailureRule;

impl AlertRule for AuthFailureRule {
    fn name(&self) -> &'static str {
        "auth_failures"
    }

    fn evaluate(&self, event: &Event) -> Result<Option<Alert>> {
        let Some(http) = event.payload.as_http() else {
            return Ok(None);
        };
        let client_error = (400..500).contains(&http.status_code);
        let auth_path = http.path.contains("auth") || http.path.contains("login");
        if !(client_error && auth_path) {
            return Ok(None);
        }
        Ok(Some(Alert::new(
            Severity::Warning,
            "Possible auth issue",
            format!("Error {} on an authentication endpoint", http.status_code),
            event.id_str(),
            payload_value(event),
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::{DomainPayload, HttpPayload};
    use crate::test_support::test_pool;

    async fn engine() -> AlertEngine {
        AlertEngine::with_default_rules(EventStore::new(test_pool().await))
    }

    fn domain_event(event_type: &str, payload: DomainPayload) -> Event {
        Event::domain(event_type, "meeting", "m1", "user_1", payload).with_id("evt_src")
    }

    #[tokio::test]
    async fn urgent_followup_raises_exactly_one_critical_alert() {
        let engine = engine().await;
        let event = domain_event(
            "followup.generated",
            DomainPayload::default().with_urgency("high"),
        );
        let alerts = engine.evaluate(&event);
        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].severity, Severity::Critical);
        assert_eq!(alerts[0].title, "Critical follow-up generated");
        assert_eq!(alerts[0].source_event_id, "evt_src");
    }

    #[tokio::test]
    async fn routine_followup_is_silent() {
        let engine = engine().await;
        let event = domain_event(
            "followup.generated",
            DomainPayload::default().with_urgency("normal"),
        );
        assert!(engine.evaluate(&event).is_empty());
    }

    #[tokio::test]
    async fn cancelled_meeting_warns() {
        let engine = engine().await;
        let alerts = engine.evaluate(&domain_event("meeting.cancelled", DomainPayload::default()));
        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].severity, Severity::Warning);
    }

    #[tokio::test]
    async fn regulatory_kpi_breach_is_critical() {
        let engine = engine().await;
        let breach = DomainPayload {
            area: Some("Regulatory".to_string()),
            status: Some("critical".to_string()),
            ..Default::default()
        };
        let alerts = engine.evaluate(&domain_event("kpi.updated", breach));
        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].title, "Regulatory KPI breach");

        let healthy = DomainPayload {
            area: Some("Regulatory".to_string()),
            status: Some("ok".to_string()),
            ..Default::default()
        };
        assert!(engine.evaluate(&domain_event("kpi.updated", healthy)).is_empty());

        let other_area = DomainPayload {
            area: Some("Finance".to_string()),
            status: Some("critical".to_string()),
            ..Default::default()
        };
        assert!(engine.evaluate(&domain_event("kpi.updated", other_area)).is_empty());
    }

    #[tokio::test]
    async fn completed_meeting_without_minutes_is_critical() {
        let engine = engine().await;
        let blank = domain_event("meeting.completed", DomainPayload::default().with_agenda("  "));
        let alerts = engine.evaluate(&blank);
        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].severity, Severity::Critical);
        assert_eq!(alerts[0].title, "Meeting completed without minutes");

        let documented =
            domain_event("meeting.completed", DomainPayload::default().with_agenda("Decisions: ship it"));
        assert!(engine.evaluate(&documented).is_empty());
    }

    #[tokio::test]
    async fn http_rules_cover_errors_latency_and_auth() {
        let engine = engine().await;

        let server_error = Event::http("user_2", HttpPayload::new("GET", "/api/v1/kpis", 502));
        let alerts = engine.evaluate(&server_error);
        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].title, "API error");

        let slow = Event::http(
            "user_2",
            HttpPayload::new("GET", "/api/v1/meetings", 200).with_response_time(7000),
        );
        let alerts = engine.evaluate(&slow);
        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].title, "Slow endpoint");

        let auth_failure = Event::http("anonymous", HttpPayload::new("POST", "/api/v1/auth/login", 401));
        let alerts = engine.evaluate(&auth_failure);
        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].title, "Possible auth issue");

        let ok = Event::http("user_2", HttpPayload::new("GET", "/api/v1/meetings", 200));
        assert!(engine.evaluate(&ok).is_empty());
    }

    struct FailingRule;
    impl AlertRule for FailingRule {
        fn name(&self) -> &'static str {
            "failing"
        }
        fn evaluate(&self, _event: &Event) -> Result<Option<Alert>> {
            anyhow::bail!("rule exploded")
        }
    }

    struct PanickingRule;
    impl AlertRule for PanickingRule {
        fn name(&self) -> &'static str {
            "panicking"
        }
        fn evaluate(&self, _event: &Event) -> Result<Option<Alert>> {
            panic!("rule panicked")
        }
    }

    #[tokio::test]
    async fn failing_rules_do_not_stop_siblings() {
        let store = EventStore::new(test_pool().await);
        let mut engine = AlertEngine::new(store);
        engine.register(FailingRule);
        engine.register(PanickingRule);
        engine.register(MeetingCancelledRule);

        let alerts = engine.evaluate(&domain_event("meeting.cancelled", DomainPayload::default()));
        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].title, "Meeting cancelled");
    }

    #[tokio::test]
    async fn process_event_persists_alerts_into_the_log() {
        let engine = engine().await;
        let event = domain_event("meeting.cancelled", DomainPayload::default());

        let alerts = engine.process_event(&event).await.unwrap();
        assert_eq!(alerts.len(), 1);

        let records = engine
            .store()
            .list_by(Some("alert.created"), None, None)
            .await
            .unwrap();
        assert_eq!(records.len(), 1);
        let payload = records[0].payload.0.as_alert().unwrap();
        assert_eq!(payload.source_event_id, "evt_src");
        assert_eq!(payload.severity, Severity::Warning);
        assert_eq!(records[0].entity_id, alerts[0].id);
    }
}
