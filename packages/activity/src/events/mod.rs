// Activity events: the immutable source-of-truth log
//
// An event records a single domain occurrence. Everything else in the
// pipeline (memories, alerts, automations) is derived from events and can be
// rebuilt from them; the log itself is append-only.

pub mod event;
pub mod store;

pub use event::{AlertPayload, DomainPayload, Event, EventPayload, HttpPayload};
pub use store::{EventStore, PersistedEventRecord, StoreError};
