use anyhow::{Context, Result};
use dotenvy::dotenv;
use std::env;

/// Pipeline configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    /// Recency window (days) for `recent`-flavored memory reads.
    pub memory_window_days: i64,
    /// Recency window (days) for free-text memory queries.
    pub query_window_days: i64,
    /// Capacity of the bounded derived-work queue.
    pub queue_capacity: usize,
    /// Worker tasks draining the derived-work queue.
    pub workers: usize,
    pub automation_lookback_days: i64,
    /// Skip automations that already ran for the same entity in the window.
    pub automation_idempotency_guard: bool,
    /// Event types that trigger the automation orchestrator.
    pub automation_triggers: Vec<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database_url: "sqlite::memory:".to_string(),
            memory_window_days: 30,
            query_window_days: 90,
            queue_capacity: 1024,
            workers: 4,
            automation_lookback_days: 7,
            automation_idempotency_guard: true,
            automation_triggers: vec!["meeting.completed".to_string()],
        }
    }
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        // Load .env file if present (development)
        let _ = dotenv();

        Ok(Self {
            database_url: env::var("DATABASE_URL").context("DATABASE_URL must be set")?,
            memory_window_days: env::var("ACTIVITY_MEMORY_WINDOW_DAYS")
                .unwrap_or_else(|_| "30".to_string())
                .parse()
                .context("ACTIVITY_MEMORY_WINDOW_DAYS must be a valid number")?,
            query_window_days: env::var("ACTIVITY_QUERY_WINDOW_DAYS")
                .unwrap_or_else(|_| "90".to_string())
                .parse()
                .context("ACTIVITY_QUERY_WINDOW_DAYS must be a valid number")?,
            queue_capacity: env::var("ACTIVITY_QUEUE_CAPACITY")
                .unwrap_or_else(|_| "1024".to_string())
                .parse()
                .context("ACTIVITY_QUEUE_CAPACITY must be a valid number")?,
            workers: env::var("ACTIVITY_WORKERS")
                .unwrap_or_else(|_| "4".to_string())
                .parse()
                .context("ACTIVITY_WORKERS must be a valid number")?,
            automation_lookback_days: env::var("ACTIVITY_AUTOMATION_LOOKBACK_DAYS")
                .unwrap_or_else(|_| "7".to_string())
                .parse()
                .context("ACTIVITY_AUTOMATION_LOOKBACK_DAYS must be a valid number")?,
            automation_idempotency_guard: env::var("ACTIVITY_AUTOMATION_IDEMPOTENCY_GUARD")
                .unwrap_or_else(|_| "true".to_string())
                .parse()
                .context("ACTIVITY_AUTOMATION_IDEMPOTENCY_GUARD must be true or false")?,
            automation_triggers: env::var("ACTIVITY_AUTOMATION_TRIGGERS")
                .map(|raw| {
                    raw.split(',')
                        .map(|t| t.trim().to_string())
                        .filter(|t| !t.is_empty())
                        .collect()
                })
                .unwrap_or_else(|_| vec!["meeting.completed".to_string()]),
        })
    }
}
