//! Aggregate signals computed over a recent event window.
//!
//! These feed the assistant's proactive briefings; they are read-only scans
//! and deliberately cheap.

use std::collections::BTreeMap;

use crate::events::store::PersistedEventRecord;

/// Number of open follow-ups at which a responsible person is considered
/// overloaded.
const FOLLOWUP_PRESSURE_THRESHOLD: usize = 3;

/// Responsible people carrying three or more follow-ups in the window,
/// with their counts.
pub fn followup_pressure(events: &[PersistedEventRecord]) -> BTreeMap<String, usize> {
    let mut counts: BTreeMap<String, usize> = BTreeMap::new();
    for record in events {
        if record.entity != "followup" {
            continue;
        }
        let responsible = record
            .payload
            .0
            .as_domain()
            .and_then(|p| p.responsible.clone());
        if let Some(responsible) = responsible {
            *counts.entry(responsible).or_default() += 1;
        }
    }
    counts.retain(|_, count| *count >= FOLLOWUP_PRESSURE_THRESHOLD);
    counts
}

/// Events whose payload mentions a regulatory subject.
pub fn regulatory_risks(events: &[PersistedEventRecord]) -> Vec<&PersistedEventRecord> {
    events
        .iter()
        .filter(|record| {
            let text = record.payload.0.text().to_lowercase();
            text.contains("regulat") || text.contains("anvisa")
        })
        .collect()
}

/// How many meetings were created in the window.
pub fn meeting_overload(events: &[PersistedEventRecord]) -> usize {
    events
        .iter()
        .filter(|record| record.event_type == "meeting.created")
        .count()
}
