//! Embedding provider selection from the environment.
//!
//! `EMBEDDING_PROVIDER` picks the backend:
//!
//! - `hash` (default): offline feature hashing, no model required
//! - `openai`: an OpenAI-compatible server at `EMBEDDING_URL`, with optional
//!   `EMBEDDING_MODEL` and `EMBEDDING_API_KEY`. Without `EMBEDDING_URL` the
//!   hosted OpenAI API is used and `OPENAI_API_KEY` must be set.
//!
//! Remote embedders share the index client's request timeout.

use std::sync::Arc;
use std::time::Duration;

use anyhow::bail;
use endee_rag::{EmbeddingProvider, HashEmbeddingProvider, OpenAIEmbeddingProvider};

pub fn from_env(
    dimensions: usize,
    timeout: Duration,
) -> anyhow::Result<Arc<dyn EmbeddingProvider>> {
    let provider = std::env::var("EMBEDDING_PROVIDER").unwrap_or_else(|_| "hash".to_string());

    match provider.trim().to_ascii_lowercase().as_str() {
        "hash" => Ok(Arc::new(HashEmbeddingProvider::new(dimensions)?)),
        "openai" => {
            let mut embedder = match std::env::var("EMBEDDING_URL") {
                Ok(url) => OpenAIEmbeddingProvider::new(url, dimensions)?,
                Err(_) => OpenAIEmbeddingProvider::from_env(dimensions)?,
            };
            if let Ok(model) = std::env::var("EMBEDDING_MODEL") {
                embedder = embedder.with_model(model);
            }
            if let Ok(key) = std::env::var("EMBEDDING_API_KEY") {
                embedder = embedder.with_api_key(key);
            }
            Ok(Arc::new(embedder.with_timeout(timeout)?))
        }
        other => bail!("unknown EMBEDDING_PROVIDER '{other}' (expected 'hash' or 'openai')"),
    }
}
