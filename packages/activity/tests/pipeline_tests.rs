//! End-to-end pipeline tests: submit events the way the edge does and
//! observe the log, memories, and alerts the pipeline derives from them.

mod common;

use activity_core::{
    ActivityPipeline, Config, DomainPayload, Event, HttpPayload, Severity,
};
use chrono::{Duration, Utc};

use common::test_pool;

#[tokio::test]
async fn completed_meeting_without_minutes_runs_the_full_automation() {
    let pipeline = ActivityPipeline::new(test_pool().await, &Config::default());

    let created = Event::domain(
        "meeting.created",
        "meeting",
        "m1",
        "user_1",
        DomainPayload::default().with_title("Strategy review"),
    );
    pipeline.submit(created).await.unwrap();

    // Completed with a null agenda: no minutes on record.
    let completed = Event::domain(
        "meeting.completed",
        "meeting",
        "m1",
        "user_1",
        DomainPayload::default().with_title("Strategy review"),
    );
    let completed_record = pipeline.submit(completed).await.unwrap();

    let store = pipeline.store().clone();
    let memory = pipeline.memory().clone();
    pipeline.shutdown().await;

    // Both submitted events are durable.
    let submitted = store.list_by(None, Some("meeting"), None).await.unwrap();
    assert_eq!(submitted.len(), 2);

    // The missing minutes were flagged exactly once for the incident: the
    // per-event rule emitted the critical alert, and the automation saw it
    // on record instead of raising a duplicate.
    let alert_events = store.list_by(Some("alert.created"), None, None).await.unwrap();
    assert_eq!(alert_events.len(), 1);
    let payload = alert_events[0].payload.0.as_alert().unwrap();
    assert_eq!(payload.source_event_id, completed_record.event_id);
    assert_eq!(payload.title, "Meeting completed without minutes");
    assert_eq!(payload.severity, Severity::Critical);

    let since = Utc::now() - Duration::days(1);
    let automation_log = memory
        .find_for_entity("automation_log", "m1", since)
        .await
        .unwrap();
    assert_eq!(automation_log.len(), 1);

    let followups = memory
        .find_for_entity("follow_up_task", "auto_followup_m1", since)
        .await
        .unwrap();
    assert_eq!(followups.len(), 1);
    assert_eq!(followups[0].metadata_str("priority"), Some("medium"));
}

#[tokio::test]
async fn completed_meeting_with_minutes_stays_quiet() {
    let pipeline = ActivityPipeline::new(test_pool().await, &Config::default());

    // Minutes are already on record for this meeting.
    pipeline
        .memory()
        .write(Some(1), "meeting_minutes", "m2", "Minutes: decisions captured", serde_json::json!({}))
        .await
        .unwrap();

    let completed = Event::domain(
        "meeting.completed",
        "meeting",
        "m2",
        "user_1",
        DomainPayload::default()
            .with_title("Ops sync")
            .with_agenda("Decisions captured"),
    );
    pipeline.submit(completed).await.unwrap();

    let store = pipeline.store().clone();
    let memory = pipeline.memory().clone();
    pipeline.shutdown().await;

    let alert_events = store.list_by(Some("alert.created"), None, None).await.unwrap();
    assert!(alert_events.is_empty());

    let followups = memory
        .find_for_entity("follow_up_task", "auto_followup_m2", Utc::now() - Duration::days(1))
        .await
        .unwrap();
    assert!(followups.is_empty());
}

#[tokio::test]
async fn http_traffic_flows_into_memory_and_alerts() {
    let pipeline = ActivityPipeline::new(test_pool().await, &Config::default());

    pipeline
        .submit(Event::http(
            "user_3",
            HttpPayload::new("GET", "/api/v1/meetings", 200).with_response_time(12),
        ))
        .await
        .unwrap();
    pipeline
        .submit(Event::http(
            "user_3",
            HttpPayload::new("POST", "/api/v1/kpis", 503).with_response_time(80),
        ))
        .await
        .unwrap();

    let store = pipeline.store().clone();
    let memory = pipeline.memory().clone();
    pipeline.shutdown().await;

    // Only the 5xx produced an alert.
    let alert_events = store.list_by(Some("alert.created"), None, None).await.unwrap();
    assert_eq!(alert_events.len(), 1);
    assert_eq!(alert_events[0].payload.0.as_alert().unwrap().title, "API error");

    // Both requests are remembered for the owner's context.
    let entries = memory.recent_for_owner(Some(3), 10).await.unwrap();
    assert_eq!(entries.len(), 2);

    // And retrievable through deterministic search.
    let hits = memory.search("meetings", Some(3), None, 10).await.unwrap();
    let again = memory.search("meetings", Some(3), None, 10).await.unwrap();
    let ids = |entries: &[activity_core::MemoryEntry]| {
        entries.iter().map(|e| e.id).collect::<Vec<_>>()
    };
    assert_eq!(ids(&hits), ids(&again));
    assert!(!hits.is_empty());
}

#[tokio::test]
async fn derived_failures_never_reach_the_submitter() {
    // Drop the memories table out from under the pipeline: every enrichment
    // write now fails, but submissions keep succeeding.
    let pool = test_pool().await;
    sqlx::query("DROP TABLE memories").execute(&pool).await.unwrap();

    let pipeline = ActivityPipeline::new(pool, &Config::default());
    let record = pipeline
        .submit(Event::domain(
            "meeting.completed",
            "meeting",
            "m1",
            "user_1",
            DomainPayload::default(),
        ))
        .await
        .unwrap();
    assert!(!record.event_id.is_empty());

    let store = pipeline.store().clone();
    pipeline.shutdown().await;

    // The event made it into the log even though enrichment was crippled.
    let records = store.list_recent(10).await.unwrap();
    assert!(records.iter().any(|r| r.event_id == record.event_id));
}
