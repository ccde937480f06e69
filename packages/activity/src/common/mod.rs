// Leaf types shared across the pipeline layers
//
// These live here rather than in the component modules to avoid circular
// dependencies between events, alerts, and memory.

pub mod owner;

pub use owner::resolve_owner;

use std::fmt;

use serde::{Deserialize, Serialize};

/// Alert severity, ordered from least to most urgent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Warning,
    Critical,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Info => write!(f, "info"),
            Severity::Warning => write!(f, "warning"),
            Severity::Critical => write!(f, "critical"),
        }
    }
}

/// Short hex token used for logical ids (`evt_1a2b3c4d`, `alt_9f8e7d6c`).
pub(crate) fn short_token(prefix: &str) -> String {
    let hex = uuid::Uuid::new_v4().simple().to_string();
    format!("{}_{}", prefix, &hex[..8])
}
