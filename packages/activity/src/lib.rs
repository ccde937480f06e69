// Corporate Assistant - Activity Core
//
// This crate is the activity-event pipeline behind the assistant backend: an
// append-only log of domain occurrences fanned out into retrievable memory,
// rule-evaluated alerts, and bounded automations. It is an in-process
// library boundary: HTTP middleware and domain handlers feed events in, the
// chat-context assembler reads memory out.

pub mod alerts;
pub mod common;
pub mod config;
pub mod events;
pub mod memory;
pub mod pipeline;

#[cfg(test)]
pub(crate) mod test_support;

pub use alerts::{Alert, AlertEngine, AlertRule, MeetingWatchdog, ScheduledRule};
pub use common::{resolve_owner, Severity};
pub use config::Config;
pub use events::{
    AlertPayload, DomainPayload, Event, EventPayload, EventStore, HttpPayload,
    PersistedEventRecord, StoreError,
};
pub use events::store::run_migrations;
pub use memory::{format_for_llm, MemoryEntry, MemoryIndex, QueryEngine};
pub use pipeline::{
    ActivityPipeline, AutomationOrchestrator, AutomationOutcome, AutomationStep, EventProcessor,
};
