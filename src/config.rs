//! Configuration for vesper-memory

use std::path::PathBuf;

/// Configuration for the memory pipeline
#[derive(Debug, Clone)]
pub struct Config {
    /// Base directory for all storage
    pub data_dir: PathBuf,

    /// Embedding model name (for reference, actual model set in embedding.rs)
    pub embedding_model: String,

    /// Embedding dimensions (384 for all-MiniLM-L6-v2)
    pub embedding_dimensions: usize,

    /// Maximum number of memories surfaced per turn
    pub retrieval_limit: usize,

    /// Candidate pool multiplier: the vector and keyword stages each
    /// fetch `retrieval_limit * candidate_multiplier` rows before fusion
    pub candidate_multiplier: usize,

    /// Weight of the vector similarity score in hybrid fusion
    pub vector_weight: f64,

    /// Weight of the keyword score in hybrid fusion
    pub keyword_weight: f64,

    /// Minimum vector similarity for a candidate without a keyword match
    pub min_similarity: f64,

    /// How many recent turns the context window carries
    pub recent_turns_window: usize,

    /// How many active entities are appended during query expansion
    pub query_expansion_entities: usize,

    /// Cap on active entity / object lists held in conversation state
    pub max_active_entities: usize,

    /// Default TTL for conversation state rows, in hours
    pub state_ttl_hours: i64,

    /// Global multiplier applied to every ranked score
    pub base_intent_weight: f64,
}

impl Default for Config {
    fn default() -> Self {
        let data_dir = dirs::data_local_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("vesper-memory");

        Self {
            data_dir,
            embedding_model: "all-MiniLM-L6-v2".to_string(),
            embedding_dimensions: 384, // MiniLM-L6-v2 outputs 384-dim vectors
            retrieval_limit: 10,
            candidate_multiplier: 3,
            vector_weight: 0.7,
            keyword_weight: 0.3,
            min_similarity: 0.35,
            recent_turns_window: 5,
            query_expansion_entities: 3,
            max_active_entities: 10,
            state_ttl_hours: 48,
            base_intent_weight: 1.0,
        }
    }
}

impl Config {
    /// Create a new config with a custom data directory
    pub fn with_data_dir(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
            ..Default::default()
        }
    }

    /// Get the path to the SQLite database
    pub fn sqlite_path(&self) -> PathBuf {
        self.data_dir.join("metadata.db")
    }

    /// Get the path to the vector database
    pub fn vector_db_path(&self) -> PathBuf {
        self.data_dir.join("vectors")
    }

    /// Get the path to the turn log for a conversation
    pub fn conversation_log_path(&self, owner_id: &str, conversation_id: &str) -> PathBuf {
        self.data_dir
            .join("conversations")
            .join(owner_id)
            .join(format!("{}.jsonl", conversation_id))
    }

    /// Ensure all required directories exist
    pub fn ensure_dirs(&self) -> std::io::Result<()> {
        std::fs::create_dir_all(&self.data_dir)?;
        std::fs::create_dir_all(self.data_dir.join("conversations"))?;
        std::fs::create_dir_all(self.vector_db_path())?;
        Ok(())
    }
}
