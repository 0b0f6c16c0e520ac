//! Text generation behind a narrow provider trait
//!
//! The state merger (and any injected ambiguous-intent resolver) delegate
//! to an external generative model through this seam. The crate ships no
//! network provider of its own; the surrounding application supplies one,
//! and tests substitute deterministic stubs.

use async_trait::async_trait;

use crate::error::Result;

/// A single-shot prompt-to-text capability
#[async_trait]
pub trait Generator: Send + Sync {
    /// Produce a completion for the given prompt
    async fn generate(&self, prompt: &str) -> Result<String>;
}
