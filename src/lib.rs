//! # Vesper Memory
//!
//! Memory retrieval, ranking and context assembly for the Vesper
//! assistant.
//!
//! ## Architecture
//!
//! Each incoming message flows through one sequential pipeline:
//! - **State merge** - fold the message into the running conversation
//!   state (delegated to a generative model, guarded against corruption)
//! - **Intent classification** - staged deterministic rules with an
//!   optional generative fallback
//! - **Hybrid retrieval** - vector similarity fused with FTS5 keyword
//!   relevance, scoped to the owner's active memories
//! - **Ranking** - intent-aware type weights, per-type time decay and
//!   effectiveness boosting from recorded outcomes
//! - **Conflict detection** - flags plausibly contradicting pairs among
//!   the surfaced memories
//! - **Context assembly** - one ordered text block handed to the
//!   downstream generation step
//!
//! Surfaced memories are logged back as recall events, closing the
//! feedback loop that drives effectiveness boosting.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use vesper_memory::{Config, ContextPipeline, FastembedEmbedder, GenerativeMerger, MemoryStore};
//!
//! let config = Config::default();
//! let store = Arc::new(MemoryStore::new(config.clone()).await?);
//! let embedder = Arc::new(FastembedEmbedder::new(&config)?);
//! let merger = Arc::new(GenerativeMerger::new(generator, config.max_active_entities));
//!
//! let pipeline = ContextPipeline::new(store, embedder, merger);
//! let outcome = pipeline.process(owner_id, conversation_id, message, &rules).await?;
//! // outcome.context goes to the generation step
//! ```

pub mod config;
pub mod conflict;
pub mod context;
pub mod embedding;
pub mod error;
pub mod intent;
pub mod llm;
pub mod memory;
pub mod merge;
pub mod message;
pub mod orchestrator;
pub mod ranking;
pub mod retrieval;
pub mod state;
pub mod storage;

pub use config::Config;
pub use conflict::{Conflict, ConflictKind, ConflictStrategy, TokenOverlap};
pub use context::ContextAssembler;
pub use embedding::{Embedder, FastembedEmbedder};
pub use error::{Error, Result};
pub use intent::{AmbiguousIntentResolver, Intent, IntentClassifier};
pub use llm::Generator;
pub use memory::{ConfidenceLevel, MemoryItem, MemoryStatus, MemoryStore, MemoryType};
pub use merge::{GenerativeMerger, StateMerger};
pub use message::{Role, Turn};
pub use orchestrator::{ContextPipeline, PipelineOutcome};
pub use ranking::{RankingEngine, ScoredMemory};
pub use retrieval::HybridRetrieval;
pub use state::{ConversationState, DecisionRecord, MergedFields};
