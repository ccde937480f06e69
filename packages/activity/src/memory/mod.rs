// Institutional memory: derived, queryable summaries of the event log
//
// Memory entries are what the chat-context assembler reads when building LLM
// context. They are derived state: best-effort, eventually consistent with
// the log, and rebuildable from it.

pub mod entry;
pub mod index;
pub mod insight;
pub mod query;

pub use entry::MemoryEntry;
pub use index::MemoryIndex;
pub use query::{format_for_llm, QueryEngine};
