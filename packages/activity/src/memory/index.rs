//! Queryable index over derived memory entries.
//!
//! Search is deliberately plain: case-insensitive substring containment over
//! the entry's type, identifiers, content, and metadata text. No embeddings
//! and no ranking model, so identical inputs always produce identical ordered
//! output, which keeps the retrieval contract deterministic and testable.

use chrono::{DateTime, Duration, Utc};
use serde_json::Value;
use sqlx::types::Json;
use sqlx::{QueryBuilder, Sqlite, SqlitePool};

use crate::events::store::StoreError;
use crate::memory::entry::MemoryEntry;
use crate::memory::query::QueryEngine;

/// Default recency window for `recent`-flavored reads, in days.
const DEFAULT_RECENT_WINDOW_DAYS: i64 = 30;
/// Default recency window for free-text queries, in days.
const DEFAULT_QUERY_WINDOW_DAYS: i64 = 90;

/// Derived memory persistence and retrieval.
#[derive(Clone)]
pub struct MemoryIndex {
    pool: SqlitePool,
    recent_window_days: i64,
    query_window_days: i64,
}

impl MemoryIndex {
    pub fn new(pool: SqlitePool) -> Self {
        Self {
            pool,
            recent_window_days: DEFAULT_RECENT_WINDOW_DAYS,
            query_window_days: DEFAULT_QUERY_WINDOW_DAYS,
        }
    }

    /// Override the bounded recency windows (recent reads, free-text query).
    pub fn with_windows(mut self, recent_days: i64, query_days: i64) -> Self {
        self.recent_window_days = recent_days;
        self.query_window_days = query_days;
        self
    }

    /// Insert a new memory entry. Pure insert; fails only on storage error.
    pub async fn write(
        &self,
        owner_id: Option<i64>,
        entity_type: &str,
        entity_id: &str,
        content: &str,
        metadata: Value,
    ) -> Result<MemoryEntry, StoreError> {
        let entry = sqlx::query_as::<_, MemoryEntry>(
            r#"
            INSERT INTO memories (owner_id, entity_type, entity_id, content, metadata, created_at)
            VALUES (?, ?, ?, ?, ?, ?)
            RETURNING *
            "#,
        )
        .bind(owner_id)
        .bind(entity_type)
        .bind(entity_id)
        .bind(content)
        .bind(Json(metadata))
        .bind(Utc::now())
        .fetch_one(&self.pool)
        .await?;
        tracing::debug!(memory_id = entry.id, entity_type, "memory written");
        Ok(entry)
    }

    /// Substring search, most recent first, stable insertion-order tiebreak.
    ///
    /// `owner_id` and `entity_types` narrow the result when given. `query`
    /// is matched case-insensitively against the concatenation of entity
    /// type, entity id, content, and metadata text.
    pub async fn search(
        &self,
        query: &str,
        owner_id: Option<i64>,
        entity_types: Option<&[&str]>,
        limit: i64,
    ) -> Result<Vec<MemoryEntry>, StoreError> {
        let mut qb: QueryBuilder<Sqlite> = QueryBuilder::new(
            "SELECT * FROM memories WHERE instr(lower(entity_type || ' ' || entity_id || ' ' || content || ' ' || metadata), lower(",
        );
        qb.push_bind(query);
        qb.push(")) > 0");
        if let Some(owner_id) = owner_id {
            qb.push(" AND owner_id = ").push_bind(owner_id);
        }
        if let Some(entity_types) = entity_types {
            if !entity_types.is_empty() {
                qb.push(" AND entity_type IN (");
                let mut separated = qb.separated(", ");
                for entity_type in entity_types {
                    separated.push_bind(*entity_type);
                }
                qb.push(")");
            }
        }
        qb.push(" ORDER BY created_at DESC, id DESC LIMIT ").push_bind(limit);
        let entries = qb
            .build_query_as::<MemoryEntry>()
            .fetch_all(&self.pool)
            .await?;
        Ok(entries)
    }

    /// Most recent entries for one owner, regardless of content.
    pub async fn recent_for_owner(
        &self,
        owner_id: Option<i64>,
        limit: i64,
    ) -> Result<Vec<MemoryEntry>, StoreError> {
        let mut qb: QueryBuilder<Sqlite> = QueryBuilder::new("SELECT * FROM memories WHERE ");
        match owner_id {
            Some(owner_id) => {
                qb.push("owner_id = ").push_bind(owner_id);
            }
            None => {
                qb.push("owner_id IS NULL");
            }
        }
        qb.push(" ORDER BY created_at DESC, id DESC LIMIT ").push_bind(limit);
        let entries = qb
            .build_query_as::<MemoryEntry>()
            .fetch_all(&self.pool)
            .await?;
        Ok(entries)
    }

    /// Entries of one entity type for one entity id, bounded by `since`.
    /// Used by the orchestrator's memory check and the idempotency guard.
    pub async fn find_for_entity(
        &self,
        entity_type: &str,
        entity_id: &str,
        since: DateTime<Utc>,
    ) -> Result<Vec<MemoryEntry>, StoreError> {
        let entries = sqlx::query_as::<_, MemoryEntry>(
            r#"
            SELECT * FROM memories
            WHERE entity_type = ? AND entity_id = ? AND created_at >= ?
            ORDER BY created_at DESC, id DESC
            "#,
        )
        .bind(entity_type)
        .bind(entity_id)
        .bind(since)
        .fetch_all(&self.pool)
        .await?;
        Ok(entries)
    }

    /// Load the bounded query window, newest first. This window is the unit
    /// of context handed to downstream LLM assembly.
    pub async fn load_window(&self, days: i64) -> Result<Vec<MemoryEntry>, StoreError> {
        let since = Utc::now() - Duration::days(days);
        let entries = sqlx::query_as::<_, MemoryEntry>(
            "SELECT * FROM memories WHERE created_at >= ? ORDER BY created_at DESC, id DESC",
        )
        .bind(since)
        .fetch_all(&self.pool)
        .await?;
        Ok(entries)
    }

    /// Entries of one entity type within the recent window.
    pub async fn find_by_entity(&self, entity_type: &str) -> Result<Vec<MemoryEntry>, StoreError> {
        let window = self.load_window(self.recent_window_days).await?;
        Ok(QueryEngine::new(&window).find_by_entity(entity_type))
    }

    /// Entries created on a specific ISO date (`2026-01-04`), within the
    /// query window.
    pub async fn find_by_date(&self, iso_date: &str) -> Result<Vec<MemoryEntry>, StoreError> {
        let window = self.load_window(self.query_window_days).await?;
        Ok(QueryEngine::new(&window).find_by_date(iso_date))
    }

    /// Entries created between two instants, within the query window.
    pub async fn find_between(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<MemoryEntry>, StoreError> {
        let window = self.load_window(self.query_window_days).await?;
        Ok(QueryEngine::new(&window).find_between(start, end))
    }

    /// Free-text question over the query window, routed by keyword.
    pub async fn query(&self, question: &str) -> Result<Vec<MemoryEntry>, StoreError> {
        let window = self.load_window(self.query_window_days).await?;
        Ok(QueryEngine::new(&window).route_query(question))
    }
}
