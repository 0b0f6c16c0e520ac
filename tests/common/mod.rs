//! Shared test doubles: deterministic embedding and generation providers
#![allow(dead_code)]

use async_trait::async_trait;

use vesper_memory::{Config, Embedder, Error, Generator, Result};

/// Deterministic embedder: same text, same vector. No model download.
pub struct StubEmbedder {
    dims: usize,
}

impl StubEmbedder {
    pub fn new(dims: usize) -> Self {
        Self { dims }
    }
}

#[async_trait]
impl Embedder for StubEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let mut v = vec![0.0f32; self.dims];
        for (i, b) in text.bytes().enumerate() {
            v[i % self.dims] += f32::from(b) / 255.0;
        }
        let norm = v.iter().map(|x| x * x).sum::<f32>().sqrt().max(1e-6);
        Ok(v.into_iter().map(|x| x / norm).collect())
    }

    fn dimensions(&self) -> usize {
        self.dims
    }
}

/// Embedder that always fails, for exercising the keyword-only fallback
pub struct FailingEmbedder;

#[async_trait]
impl Embedder for FailingEmbedder {
    async fn embed(&self, _text: &str) -> Result<Vec<f32>> {
        Err(Error::embedding("provider unavailable"))
    }

    fn dimensions(&self) -> usize {
        0
    }
}

/// Generator returning a fixed reply
pub struct CannedGenerator(pub String);

#[async_trait]
impl Generator for CannedGenerator {
    async fn generate(&self, _prompt: &str) -> Result<String> {
        Ok(self.0.clone())
    }
}

/// Test configuration rooted at a temp directory, with a tiny embedding
/// dimension and no similarity cutoff
pub fn test_config(dir: &std::path::Path) -> Config {
    init_tracing();
    let mut config = Config::with_data_dir(dir);
    config.embedding_dimensions = 8;
    config.min_similarity = 0.0;
    config
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .try_init();
}
