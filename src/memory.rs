//! Memory item types and the coordinating store

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::config::Config;
use crate::error::Result;
use crate::message::Turn;
use crate::state::ConversationState;
use crate::storage::{JsonlStorage, SqliteStorage, VectorStorage};

/// Kind of knowledge a memory item holds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MemoryType {
    Fact,
    Decision,
    Principle,
    Rule,
    Hypothesis,
    Reflection,
    Emotion,
    Failure,
    Task,
    Insight,
    Thought,
}

impl MemoryType {
    /// Parse from the storage representation
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "fact" => Some(Self::Fact),
            "decision" => Some(Self::Decision),
            "principle" => Some(Self::Principle),
            "rule" => Some(Self::Rule),
            "hypothesis" => Some(Self::Hypothesis),
            "reflection" => Some(Self::Reflection),
            "emotion" => Some(Self::Emotion),
            "failure" => Some(Self::Failure),
            "task" => Some(Self::Task),
            "insight" => Some(Self::Insight),
            "thought" => Some(Self::Thought),
            _ => None,
        }
    }
}

impl std::fmt::Display for MemoryType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            MemoryType::Fact => "fact",
            MemoryType::Decision => "decision",
            MemoryType::Principle => "principle",
            MemoryType::Rule => "rule",
            MemoryType::Hypothesis => "hypothesis",
            MemoryType::Reflection => "reflection",
            MemoryType::Emotion => "emotion",
            MemoryType::Failure => "failure",
            MemoryType::Task => "task",
            MemoryType::Insight => "insight",
            MemoryType::Thought => "thought",
        };
        write!(f, "{}", s)
    }
}

/// How much the system trusts a memory or a state summary
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConfidenceLevel {
    High,
    Medium,
    Low,
    Unknown,
}

impl ConfidenceLevel {
    /// Glyph shown next to each memory line in the assembled context
    pub fn glyph(&self) -> &'static str {
        match self {
            ConfidenceLevel::High => "🟢",
            ConfidenceLevel::Medium => "🟡",
            ConfidenceLevel::Low => "🔴",
            ConfidenceLevel::Unknown => "⚪",
        }
    }

    /// Parse from the storage representation
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "high" => Some(Self::High),
            "medium" => Some(Self::Medium),
            "low" => Some(Self::Low),
            "unknown" => Some(Self::Unknown),
            _ => None,
        }
    }
}

impl std::fmt::Display for ConfidenceLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ConfidenceLevel::High => "high",
            ConfidenceLevel::Medium => "medium",
            ConfidenceLevel::Low => "low",
            ConfidenceLevel::Unknown => "unknown",
        };
        write!(f, "{}", s)
    }
}

/// Lifecycle status of a memory item. Only active items are retrievable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MemoryStatus {
    Active,
    Archived,
    Aggregated,
    Deleted,
}

impl MemoryStatus {
    /// Parse from the storage representation
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "active" => Some(Self::Active),
            "archived" => Some(Self::Archived),
            "aggregated" => Some(Self::Aggregated),
            "deleted" => Some(Self::Deleted),
            _ => None,
        }
    }
}

impl std::fmt::Display for MemoryStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            MemoryStatus::Active => "active",
            MemoryStatus::Archived => "archived",
            MemoryStatus::Aggregated => "aggregated",
            MemoryStatus::Deleted => "deleted",
        };
        write!(f, "{}", s)
    }
}

/// An atomic unit of long-term memory.
///
/// Content is immutable once written; only `status` and the outcome
/// counters change afterwards.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryItem {
    /// Unique memory ID
    pub id: Uuid,

    /// User this memory belongs to
    pub owner_id: String,

    /// Kind of knowledge
    pub memory_type: MemoryType,

    /// The memory content
    pub content: String,

    /// Short one-line summary
    #[serde(default)]
    pub summary: String,

    /// Optional structured payload
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub structured_data: Option<serde_json::Value>,

    /// Trust level assigned at write time
    pub confidence: ConfidenceLevel,

    /// How many times this memory has been surfaced into a context
    #[serde(default)]
    pub usage_count: u32,

    /// Times a surfaced use of this memory led to a good outcome
    #[serde(default)]
    pub positive_outcomes: u32,

    /// Times a surfaced use of this memory led to a bad outcome
    #[serde(default)]
    pub negative_outcomes: u32,

    /// Lifecycle status
    pub status: MemoryStatus,

    /// Related memory ids, advisory only
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub related_to: Vec<Uuid>,

    /// Embedding vector (populated before vector-store writes)
    #[serde(skip)]
    pub embedding: Option<Vec<f32>>,

    /// When the memory was created
    pub created_at: DateTime<Utc>,
}

impl MemoryItem {
    /// Create a new active memory item
    pub fn new(
        owner_id: impl Into<String>,
        memory_type: MemoryType,
        content: impl Into<String>,
    ) -> Self {
        let content = content.into();
        Self {
            id: Uuid::new_v4(),
            owner_id: owner_id.into(),
            memory_type,
            summary: content.chars().take(120).collect(),
            content,
            structured_data: None,
            confidence: ConfidenceLevel::Unknown,
            usage_count: 0,
            positive_outcomes: 0,
            negative_outcomes: 0,
            status: MemoryStatus::Active,
            related_to: Vec::new(),
            embedding: None,
            created_at: Utc::now(),
        }
    }

    /// Set the summary
    pub fn with_summary(mut self, summary: impl Into<String>) -> Self {
        self.summary = summary.into();
        self
    }

    /// Set the confidence level
    pub fn with_confidence(mut self, confidence: ConfidenceLevel) -> Self {
        self.confidence = confidence;
        self
    }

    /// Attach a structured payload
    pub fn with_structured_data(mut self, data: serde_json::Value) -> Self {
        self.structured_data = Some(data);
        self
    }

    /// Link related memories
    pub fn with_related(mut self, related: Vec<Uuid>) -> Self {
        self.related_to = related;
        self
    }

    /// Set the embedding
    pub fn with_embedding(mut self, embedding: Vec<f32>) -> Self {
        self.embedding = Some(embedding);
        self
    }

    /// Override the creation timestamp
    pub fn with_created_at(mut self, created_at: DateTime<Utc>) -> Self {
        self.created_at = created_at;
        self
    }
}

/// The main store coordinating all storage backends
pub struct MemoryStore {
    config: Config,
    sqlite: SqliteStorage,
    vector: VectorStorage,
    turns: JsonlStorage,
}

impl MemoryStore {
    /// Create a new memory store
    pub async fn new(config: Config) -> Result<Self> {
        config.ensure_dirs()?;

        let sqlite = SqliteStorage::new(&config)?;
        let vector = VectorStorage::new(&config).await?;
        let turns = JsonlStorage::new(&config)?;

        Ok(Self {
            config,
            sqlite,
            vector,
            turns,
        })
    }

    /// Get the configuration
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Get the SQLite storage
    pub fn sqlite(&self) -> &SqliteStorage {
        &self.sqlite
    }

    /// Get the vector storage
    pub fn vector(&self) -> &VectorStorage {
        &self.vector
    }

    /// Get the turn log storage
    pub fn turns(&self) -> &JsonlStorage {
        &self.turns
    }

    /// Save a memory to all relevant stores
    pub async fn save(&self, item: MemoryItem) -> Result<MemoryItem> {
        self.sqlite.save_memory(&item)?;

        if item.embedding.is_some() {
            self.vector.upsert_memory(&item).await?;
        }

        Ok(item)
    }

    /// Get a memory by ID
    pub fn get(&self, id: Uuid) -> Result<Option<MemoryItem>> {
        self.sqlite.get_memory(id)
    }

    /// List memories for an owner with optional filters
    pub fn list(
        &self,
        owner_id: &str,
        status: Option<MemoryStatus>,
        memory_type: Option<MemoryType>,
    ) -> Result<Vec<MemoryItem>> {
        self.sqlite.list_memories(owner_id, status, memory_type)
    }

    /// Change a memory's lifecycle status.
    ///
    /// Non-active items are removed from the vector index so they can
    /// never be surfaced by similarity search.
    pub async fn set_status(&self, id: Uuid, status: MemoryStatus) -> Result<()> {
        self.sqlite.set_status(id, status)?;
        if status != MemoryStatus::Active {
            self.vector.delete_memory(id).await?;
        }
        Ok(())
    }

    /// Record that a set of memories was surfaced into an assembled context
    pub fn record_recall(&self, ids: &[Uuid]) -> Result<()> {
        self.sqlite.record_recall(ids)
    }

    /// Record a positive or negative outcome for a surfaced memory
    pub fn record_outcome(&self, id: Uuid, positive: bool) -> Result<()> {
        self.sqlite.record_outcome(id, positive)
    }

    /// Get the conversation state for an (owner, conversation) pair
    pub fn get_state(
        &self,
        owner_id: &str,
        conversation_id: &str,
    ) -> Result<Option<ConversationState>> {
        self.sqlite.get_state(owner_id, conversation_id)
    }

    /// Atomically create or update a conversation state, refreshing
    /// `last_updated`
    pub fn upsert_state(&self, mut state: ConversationState) -> Result<ConversationState> {
        state.last_updated = Utc::now();
        self.sqlite.upsert_state(&state)?;
        Ok(state)
    }

    /// Delete conversation states past their TTL. Returns the number of
    /// rows removed.
    pub fn cleanup_expired_states(&self) -> Result<usize> {
        self.sqlite.cleanup_expired_states()
    }

    /// Append a turn to the conversation log
    pub fn record_turn(&self, turn: &Turn) -> Result<()> {
        self.turns.append(turn)
    }

    /// Read the last `n` turns of a conversation
    pub fn recent_turns(
        &self,
        owner_id: &str,
        conversation_id: &str,
        n: usize,
    ) -> Result<Vec<Turn>> {
        self.turns.read_last_n(owner_id, conversation_id, n)
    }
}
