//! Embedding generation behind a provider trait
//!
//! The production provider runs fastembed locally (no API keys). Retrieval
//! treats any provider as fallible: a failed `embed` call degrades hybrid
//! search to keyword-only.

use std::sync::Arc;

use async_trait::async_trait;
use fastembed::{EmbeddingModel, InitOptions, TextEmbedding};
use tokio::sync::Mutex;

use crate::config::Config;
use crate::error::{Error, Result};

/// Text-to-vector provider
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Generate an embedding for a single text
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;

    /// Get the embedding dimensions
    fn dimensions(&self) -> usize;
}

/// Local embedding provider backed by fastembed
pub struct FastembedEmbedder {
    model: Arc<Mutex<TextEmbedding>>,
    dimensions: usize,
}

impl FastembedEmbedder {
    /// Create a new embedder with the local model.
    ///
    /// Uses all-MiniLM-L6-v2 (384 dimensions, fast, good quality). The
    /// model downloads automatically on first use to ~/.cache/fastembed.
    pub fn new(config: &Config) -> Result<Self> {
        let model = TextEmbedding::try_new(
            InitOptions::new(EmbeddingModel::AllMiniLML6V2).with_show_download_progress(true),
        )
        .map_err(|e| Error::embedding(format!("Failed to load embedding model: {}", e)))?;

        Ok(Self {
            model: Arc::new(Mutex::new(model)),
            dimensions: config.embedding_dimensions,
        })
    }
}

#[async_trait]
impl Embedder for FastembedEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let model = self.model.clone();
        let text = text.to_string();

        let mut guard = model.lock().await;
        let embeddings = guard
            .embed(vec![text], None)
            .map_err(|e| Error::embedding(format!("Embedding failed: {}", e)))?;

        embeddings
            .into_iter()
            .next()
            .ok_or_else(|| Error::embedding("No embedding returned"))
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }
}
