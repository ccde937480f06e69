//! Durable append-only persistence for activity events.
//!
//! The store is the single source of truth: saving an event is the only
//! operation whose failure reaches the caller that produced it. A save is
//! atomic: an event is either fully durable or not recorded at all.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use sqlx::types::Json;
use sqlx::{QueryBuilder, Sqlite, SqlitePool};
use thiserror::Error;

use crate::common::owner::{actor_for_owner, resolve_owner};
use crate::common::Severity;
use crate::events::event::{Event, EventPayload};

/// Failures that threaten the source-of-truth log. These are the only
/// pipeline errors propagated to the original caller.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("event store operation failed: {0}")]
    Persistence(#[from] sqlx::Error),
    #[error("schema migration failed: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),
    #[error("payload serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Durable projection of an [`Event`] onto storage.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct PersistedEventRecord {
    /// Numeric surrogate key, monotonically increasing with insertion order.
    pub id: i64,
    /// Logical event id; equals the surrogate key rendered as text when the
    /// submitted event carried no id of its own.
    pub event_id: String,
    /// Numeric owner derived from the actor string; pure and reproducible.
    pub owner_id: Option<i64>,
    pub event_type: String,
    pub entity: String,
    pub entity_id: String,
    pub created_at: DateTime<Utc>,
    pub payload: Json<EventPayload>,
}

impl PersistedEventRecord {
    /// Reconstruct the event value this record was projected from. The actor
    /// comes back normalized (`system` / `user_<n>` / `anonymous`).
    pub fn to_event(&self) -> Event {
        Event {
            id: Some(self.event_id.clone()),
            event_type: self.event_type.clone(),
            entity: self.entity.clone(),
            entity_id: self.entity_id.clone(),
            actor: actor_for_owner(self.owner_id),
            timestamp: self.created_at,
            payload: self.payload.0.clone(),
        }
    }
}

/// Append-only event persistence and query over a SQLite pool.
#[derive(Clone)]
pub struct EventStore {
    pool: SqlitePool,
}

/// Apply the crate's schema migrations.
pub async fn run_migrations(pool: &SqlitePool) -> Result<(), StoreError> {
    sqlx::migrate!("./migrations").run(pool).await?;
    Ok(())
}

impl EventStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Durably append an event.
    ///
    /// Runs in a transaction: the insert and the logical-id assignment commit
    /// together or not at all. When the submitted event has no id, the new
    /// surrogate key becomes its logical id.
    pub async fn save(&self, event: &Event) -> Result<PersistedEventRecord, StoreError> {
        let owner_id = resolve_owner(&event.actor);
        let mut tx = self.pool.begin().await?;

        let result = sqlx::query(
            r#"
            INSERT INTO activity_log (event_id, owner_id, event_type, entity, entity_id, created_at, payload)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(event.id.as_deref())
        .bind(owner_id)
        .bind(&event.event_type)
        .bind(&event.entity)
        .bind(&event.entity_id)
        .bind(event.timestamp)
        .bind(Json(&event.payload))
        .execute(&mut *tx)
        .await?;
        let row_id = result.last_insert_rowid();

        if event.id.is_none() {
            sqlx::query("UPDATE activity_log SET event_id = CAST(id AS TEXT) WHERE id = ?")
                .bind(row_id)
                .execute(&mut *tx)
                .await?;
        }

        let record = sqlx::query_as::<_, PersistedEventRecord>(
            "SELECT * FROM activity_log WHERE id = ?",
        )
        .bind(row_id)
        .fetch_one(&mut *tx)
        .await?;
        tx.commit().await?;

        tracing::debug!(
            event_id = %record.event_id,
            event_type = %record.event_type,
            "event saved"
        );
        Ok(record)
    }

    /// Most recent events, newest first, insertion order breaking ties.
    pub async fn list_recent(&self, limit: i64) -> Result<Vec<PersistedEventRecord>, StoreError> {
        let records = sqlx::query_as::<_, PersistedEventRecord>(
            "SELECT * FROM activity_log ORDER BY created_at DESC, id DESC LIMIT ?",
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        Ok(records)
    }

    /// Events at or after `since`, newest first.
    pub async fn list_since(
        &self,
        since: DateTime<Utc>,
    ) -> Result<Vec<PersistedEventRecord>, StoreError> {
        let records = sqlx::query_as::<_, PersistedEventRecord>(
            "SELECT * FROM activity_log WHERE created_at >= ? ORDER BY created_at DESC, id DESC",
        )
        .bind(since)
        .fetch_all(&self.pool)
        .await?;
        Ok(records)
    }

    /// Filtered listing; each filter is optional and they compose with AND.
    pub async fn list_by(
        &self,
        event_type: Option<&str>,
        entity: Option<&str>,
        entity_id: Option<&str>,
    ) -> Result<Vec<PersistedEventRecord>, StoreError> {
        let mut qb: QueryBuilder<Sqlite> = QueryBuilder::new("SELECT * FROM activity_log WHERE 1 = 1");
        if let Some(event_type) = event_type {
            qb.push(" AND event_type = ").push_bind(event_type);
        }
        if let Some(entity) = entity {
            qb.push(" AND entity = ").push_bind(entity);
        }
        if let Some(entity_id) = entity_id {
            qb.push(" AND entity_id = ").push_bind(entity_id);
        }
        qb.push(" ORDER BY created_at DESC, id DESC");
        let records = qb
            .build_query_as::<PersistedEventRecord>()
            .fetch_all(&self.pool)
            .await?;
        Ok(records)
    }

    /// Recent `alert.created` events carrying a critical severity.
    pub async fn list_critical_alerts(
        &self,
        days: i64,
    ) -> Result<Vec<PersistedEventRecord>, StoreError> {
        let since = Utc::now() - Duration::days(days);
        let records = sqlx::query_as::<_, PersistedEventRecord>(
            r#"
            SELECT * FROM activity_log
            WHERE event_type = 'alert.created' AND created_at >= ?
            ORDER BY created_at DESC, id DESC
            "#,
        )
        .bind(since)
        .fetch_all(&self.pool)
        .await?;
        Ok(records
            .into_iter()
            .filter(|r| {
                r.payload
                    .0
                    .as_alert()
                    .map(|a| a.severity == Severity::Critical)
                    .unwrap_or(false)
            })
            .collect())
    }

    /// Whether an alert with this title already exists for the subject within
    /// the window. Scheduled rules consult this before emitting so repeated
    /// polling cannot produce alert storms.
    pub async fn has_recent_alert(
        &self,
        title: &str,
        subject_id: &str,
        since: DateTime<Utc>,
    ) -> Result<bool, StoreError> {
        let records = sqlx::query_as::<_, PersistedEventRecord>(
            "SELECT * FROM activity_log WHERE event_type = 'alert.created' AND created_at >= ?",
        )
        .bind(since)
        .fetch_all(&self.pool)
        .await?;
        Ok(records.iter().any(|r| {
            r.payload.0.as_alert().is_some_and(|a| {
                a.title == title
                    && (a.source_event_id == subject_id
                        || a.data.get("entity_id").and_then(|v| v.as_str()) == Some(subject_id))
            })
        }))
    }
}
