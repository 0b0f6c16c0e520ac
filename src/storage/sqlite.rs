//! SQLite storage for memory metadata, conversation state and feedback events

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use std::sync::{Arc, Mutex};
use uuid::Uuid;

use crate::config::Config;
use crate::error::{Error, Result};
use crate::memory::{ConfidenceLevel, MemoryItem, MemoryStatus, MemoryType};
use crate::state::ConversationState;

/// SQLite storage backend
pub struct SqliteStorage {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteStorage {
    /// Create a new SQLite storage
    pub fn new(config: &Config) -> Result<Self> {
        let conn = Connection::open(config.sqlite_path())?;

        // Initialize schema
        conn.execute_batch(include_str!("schema.sql"))?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Save a memory record.
    ///
    /// Content is immutable after the first write: on conflict only the
    /// lifecycle status and feedback counters are updated.
    pub fn save_memory(&self, item: &MemoryItem) -> Result<()> {
        let conn = self.conn.lock().map_err(|e| Error::storage(e.to_string()))?;

        conn.execute(
            r#"
            INSERT INTO memories (
                id, owner_id, memory_type, content, summary, structured_data,
                confidence, usage_count, positive_outcomes, negative_outcomes,
                status, related_to, created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)
            ON CONFLICT(id) DO UPDATE SET
                status = excluded.status,
                usage_count = excluded.usage_count,
                positive_outcomes = excluded.positive_outcomes,
                negative_outcomes = excluded.negative_outcomes
            "#,
            params![
                item.id.to_string(),
                item.owner_id,
                item.memory_type.to_string(),
                item.content,
                item.summary,
                item.structured_data
                    .as_ref()
                    .map(serde_json::to_string)
                    .transpose()?,
                item.confidence.to_string(),
                item.usage_count,
                item.positive_outcomes,
                item.negative_outcomes,
                item.status.to_string(),
                serde_json::to_string(&item.related_to)?,
                item.created_at.to_rfc3339(),
            ],
        )?;

        Ok(())
    }

    /// Get a memory by ID
    pub fn get_memory(&self, id: Uuid) -> Result<Option<MemoryItem>> {
        let conn = self.conn.lock().map_err(|e| Error::storage(e.to_string()))?;

        let result = conn
            .query_row(
                &format!("{} WHERE id = ?1", SELECT_MEMORY),
                params![id.to_string()],
                map_memory_row,
            )
            .optional()?;

        result.map(|row| row.into_item()).transpose()
    }

    /// Fetch several memories at once, active rows only
    pub fn get_active_memories(&self, ids: &[Uuid]) -> Result<Vec<MemoryItem>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let conn = self.conn.lock().map_err(|e| Error::storage(e.to_string()))?;

        let placeholders = vec!["?"; ids.len()].join(", ");
        let sql = format!(
            "{} WHERE status = 'active' AND id IN ({})",
            SELECT_MEMORY, placeholders
        );

        let id_strings: Vec<String> = ids.iter().map(Uuid::to_string).collect();
        let params_refs: Vec<&dyn rusqlite::ToSql> =
            id_strings.iter().map(|s| s as &dyn rusqlite::ToSql).collect();

        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(params_refs.as_slice(), map_memory_row)?;

        let mut items = Vec::new();
        for row in rows {
            items.push(row?.into_item()?);
        }

        Ok(items)
    }

    /// List memories for an owner with optional filters
    pub fn list_memories(
        &self,
        owner_id: &str,
        status: Option<MemoryStatus>,
        memory_type: Option<MemoryType>,
    ) -> Result<Vec<MemoryItem>> {
        let conn = self.conn.lock().map_err(|e| Error::storage(e.to_string()))?;

        let mut sql = format!("{} WHERE owner_id = ?", SELECT_MEMORY);
        let mut params_vec: Vec<Box<dyn rusqlite::ToSql>> = vec![Box::new(owner_id.to_string())];

        if let Some(s) = status {
            sql.push_str(" AND status = ?");
            params_vec.push(Box::new(s.to_string()));
        }

        if let Some(t) = memory_type {
            sql.push_str(" AND memory_type = ?");
            params_vec.push(Box::new(t.to_string()));
        }

        sql.push_str(" ORDER BY created_at DESC");

        let mut stmt = conn.prepare(&sql)?;
        let params_refs: Vec<&dyn rusqlite::ToSql> = params_vec.iter().map(|p| p.as_ref()).collect();

        let rows = stmt.query_map(params_refs.as_slice(), map_memory_row)?;

        let mut items = Vec::new();
        for row in rows {
            items.push(row?.into_item()?);
        }

        Ok(items)
    }

    /// Set a memory's lifecycle status
    pub fn set_status(&self, id: Uuid, status: MemoryStatus) -> Result<()> {
        let conn = self.conn.lock().map_err(|e| Error::storage(e.to_string()))?;
        conn.execute(
            "UPDATE memories SET status = ?1 WHERE id = ?2",
            params![status.to_string(), id.to_string()],
        )?;
        Ok(())
    }

    /// Record a recall event for each surfaced memory and bump its
    /// usage counter
    pub fn record_recall(&self, ids: &[Uuid]) -> Result<()> {
        if ids.is_empty() {
            return Ok(());
        }

        let mut conn = self.conn.lock().map_err(|e| Error::storage(e.to_string()))?;
        let tx = conn.transaction()?;
        let now = Utc::now().to_rfc3339();

        for id in ids {
            tx.execute(
                "UPDATE memories SET usage_count = usage_count + 1 WHERE id = ?1",
                params![id.to_string()],
            )?;
            tx.execute(
                "INSERT INTO usage_events (memory_id, kind, created_at) VALUES (?1, 'recalled', ?2)",
                params![id.to_string(), now],
            )?;
        }

        tx.commit()?;
        Ok(())
    }

    /// Record a positive or negative outcome for a surfaced memory
    pub fn record_outcome(&self, id: Uuid, positive: bool) -> Result<()> {
        let conn = self.conn.lock().map_err(|e| Error::storage(e.to_string()))?;

        let (column, kind) = if positive {
            ("positive_outcomes", "positive_outcome")
        } else {
            ("negative_outcomes", "negative_outcome")
        };

        conn.execute(
            &format!("UPDATE memories SET {column} = {column} + 1 WHERE id = ?1"),
            params![id.to_string()],
        )?;
        conn.execute(
            "INSERT INTO usage_events (memory_id, kind, created_at) VALUES (?1, ?2, ?3)",
            params![id.to_string(), kind, Utc::now().to_rfc3339()],
        )?;

        Ok(())
    }

    /// FTS5 BM25 keyword search scoped to one owner's active memories.
    ///
    /// Scores are negated BM25 values (higher = better), unnormalized.
    pub fn keyword_search(
        &self,
        owner_id: &str,
        query: &str,
        limit: usize,
    ) -> Result<Vec<(Uuid, f64)>> {
        let fts_query: String = query
            .split_whitespace()
            .map(|w| format!("\"{}\"", w.replace('"', "")))
            .collect::<Vec<_>>()
            .join(" OR ");

        if fts_query.is_empty() {
            return Ok(Vec::new());
        }

        let conn = self.conn.lock().map_err(|e| Error::storage(e.to_string()))?;

        let mut stmt = conn.prepare(
            r#"
            SELECT m.id, bm25(memories_fts) AS score
            FROM memories_fts f
            JOIN memories m ON m.rowid = f.rowid
            WHERE memories_fts MATCH ?1
              AND m.owner_id = ?2
              AND m.status = 'active'
            ORDER BY score
            LIMIT ?3
            "#,
        )?;

        let rows = stmt.query_map(params![fts_query, owner_id, limit as i64], |row| {
            let id: String = row.get(0)?;
            let score: f64 = row.get(1)?;
            // BM25 scores are negative, lower = better; negate for ranking
            Ok((id, -score))
        })?;

        let mut results = Vec::new();
        for row in rows {
            let (id, score) = row?;
            let id = Uuid::parse_str(&id).map_err(|e| Error::storage(e.to_string()))?;
            results.push((id, score));
        }

        Ok(results)
    }

    /// Get the conversation state for an (owner, conversation) pair
    pub fn get_state(
        &self,
        owner_id: &str,
        conversation_id: &str,
    ) -> Result<Option<ConversationState>> {
        let conn = self.conn.lock().map_err(|e| Error::storage(e.to_string()))?;

        let json: Option<String> = conn
            .query_row(
                "SELECT state FROM conversation_states WHERE owner_id = ?1 AND conversation_id = ?2",
                params![owner_id, conversation_id],
                |row| row.get(0),
            )
            .optional()?;

        json.map(|s| serde_json::from_str(&s).map_err(Error::from))
            .transpose()
    }

    /// Atomic create-or-update of a conversation state, keyed by the
    /// (owner, conversation) primary key
    pub fn upsert_state(&self, state: &ConversationState) -> Result<()> {
        let conn = self.conn.lock().map_err(|e| Error::storage(e.to_string()))?;

        conn.execute(
            r#"
            INSERT INTO conversation_states (owner_id, conversation_id, state, last_updated, ttl_hours)
            VALUES (?1, ?2, ?3, ?4, ?5)
            ON CONFLICT(owner_id, conversation_id) DO UPDATE SET
                state = excluded.state,
                last_updated = excluded.last_updated,
                ttl_hours = excluded.ttl_hours
            "#,
            params![
                state.owner_id,
                state.conversation_id,
                serde_json::to_string(state)?,
                state.last_updated.to_rfc3339(),
                state.ttl_hours,
            ],
        )?;

        Ok(())
    }

    /// Delete conversation states whose age exceeds their own TTL.
    /// Idempotent; safe to run while live upserts are happening.
    pub fn cleanup_expired_states(&self) -> Result<usize> {
        let conn = self.conn.lock().map_err(|e| Error::storage(e.to_string()))?;

        let removed = conn.execute(
            r#"
            DELETE FROM conversation_states
            WHERE (julianday('now') - julianday(last_updated)) * 24.0 > CAST(ttl_hours AS REAL)
            "#,
            [],
        )?;

        Ok(removed)
    }
}

const SELECT_MEMORY: &str = r#"
    SELECT id, owner_id, memory_type, content, summary, structured_data,
           confidence, usage_count, positive_outcomes, negative_outcomes,
           status, related_to, created_at
    FROM memories
"#;

fn map_memory_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<MemoryRow> {
    Ok(MemoryRow {
        id: row.get(0)?,
        owner_id: row.get(1)?,
        memory_type: row.get(2)?,
        content: row.get(3)?,
        summary: row.get(4)?,
        structured_data: row.get(5)?,
        confidence: row.get(6)?,
        usage_count: row.get(7)?,
        positive_outcomes: row.get(8)?,
        negative_outcomes: row.get(9)?,
        status: row.get(10)?,
        related_to: row.get(11)?,
        created_at: row.get(12)?,
    })
}

/// Intermediate struct for reading from SQLite
struct MemoryRow {
    id: String,
    owner_id: String,
    memory_type: String,
    content: String,
    summary: String,
    structured_data: Option<String>,
    confidence: String,
    usage_count: u32,
    positive_outcomes: u32,
    negative_outcomes: u32,
    status: String,
    related_to: String,
    created_at: String,
}

impl MemoryRow {
    fn into_item(self) -> Result<MemoryItem> {
        let memory_type = MemoryType::parse(&self.memory_type)
            .ok_or_else(|| Error::storage(format!("Unknown memory type: {}", self.memory_type)))?;
        let confidence = ConfidenceLevel::parse(&self.confidence)
            .ok_or_else(|| Error::storage(format!("Unknown confidence: {}", self.confidence)))?;
        let status = MemoryStatus::parse(&self.status)
            .ok_or_else(|| Error::storage(format!("Unknown status: {}", self.status)))?;

        Ok(MemoryItem {
            id: Uuid::parse_str(&self.id).map_err(|e| Error::storage(e.to_string()))?,
            owner_id: self.owner_id,
            memory_type,
            content: self.content,
            summary: self.summary,
            structured_data: self
                .structured_data
                .map(|s| serde_json::from_str(&s))
                .transpose()?,
            confidence,
            usage_count: self.usage_count,
            positive_outcomes: self.positive_outcomes,
            negative_outcomes: self.negative_outcomes,
            status,
            related_to: serde_json::from_str(&self.related_to)?,
            embedding: None,
            created_at: parse_timestamp(&self.created_at)?,
        })
    }
}

fn parse_timestamp(s: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| Error::storage(e.to_string()))
}
