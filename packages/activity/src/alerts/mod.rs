// Rule-evaluated alerts derived from single events
//
// There is no mutable alert table: every alert is re-injected into the event
// log as an `alert.created` event, and its causal origin stays recoverable
// through `source_event_id`.

pub mod alert;
pub mod engine;
pub mod watchdog;

pub use alert::Alert;
pub use engine::{AlertEngine, AlertRule};
pub use watchdog::{MeetingWatchdog, ScheduledRule};
