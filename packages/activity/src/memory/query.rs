//! Deterministic filters over a loaded memory window.
//!
//! The engine operates on a slice the caller already bounded (see
//! `MemoryIndex::load_window`), so every filter is a plain in-memory scan
//! with predictable output ordering, the same strategy the retrieval side
//! relies on when assembling LLM context.

use chrono::{DateTime, Utc};

use crate::memory::entry::MemoryEntry;

pub struct QueryEngine<'a> {
    entries: &'a [MemoryEntry],
}

impl<'a> QueryEngine<'a> {
    pub fn new(entries: &'a [MemoryEntry]) -> Self {
        Self { entries }
    }

    pub fn find_by_entity(&self, entity_type: &str) -> Vec<MemoryEntry> {
        self.entries
            .iter()
            .filter(|e| e.entity_type == entity_type)
            .cloned()
            .collect()
    }

    /// Entries whose creation instant falls on the given ISO date
    /// (e.g. `2026-01-04`).
    pub fn find_by_date(&self, iso_date: &str) -> Vec<MemoryEntry> {
        self.entries
            .iter()
            .filter(|e| e.created_at.to_rfc3339().starts_with(iso_date))
            .cloned()
            .collect()
    }

    pub fn find_between(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> Vec<MemoryEntry> {
        self.entries
            .iter()
            .filter(|e| e.created_at >= start && e.created_at <= end)
            .cloned()
            .collect()
    }

    /// Case-insensitive containment over type, identifiers, content, and
    /// metadata text.
    pub fn find_by_keyword(&self, keyword: &str) -> Vec<MemoryEntry> {
        let keyword = keyword.to_lowercase();
        self.entries
            .iter()
            .filter(|e| {
                let haystack = format!(
                    "{} {} {} {}",
                    e.entity_type, e.entity_id, e.content, e.metadata.0
                )
                .to_lowercase();
                haystack.contains(&keyword)
            })
            .cloned()
            .collect()
    }

    /// Route a free-text question to an entity filter when it names a known
    /// subject, falling back to keyword containment. Simple and predictable
    /// on purpose; retrieval quality comes from the event summaries, not
    /// from query cleverness.
    pub fn route_query(&self, question: &str) -> Vec<MemoryEntry> {
        let keyword = question.to_lowercase();

        if keyword.contains("meeting") || keyword.contains("reuni") {
            return self.find_by_entity("meeting");
        }
        if keyword.contains("follow") {
            return self.find_by_entity("followup");
        }
        if keyword.contains("kpi") || keyword.contains("indicator") {
            return self.find_by_entity("kpi");
        }
        if keyword.contains("document") {
            return self.find_by_entity("document");
        }
        self.find_by_keyword(&keyword)
    }
}

/// Render entries into the line-per-memory block handed to the LLM.
pub fn format_for_llm(entries: &[MemoryEntry]) -> String {
    entries
        .iter()
        .map(|e| {
            format!(
                "[{}] {} | {} | {}",
                e.created_at.format("%Y-%m-%d %H:%M:%S"),
                e.entity_type,
                e.entity_id,
                e.content
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}
