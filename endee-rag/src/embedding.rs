//! Embedding provider trait for generating vector embeddings from text.
//!
//! # Input policy
//!
//! Every provider in this crate treats input text the same way, through
//! [`prepare_input`]:
//!
//! - empty or whitespace-only text is rejected with [`RagError::Validation`];
//! - text longer than the provider's character limit is truncated at a
//!   character boundary before it is embedded.

use async_trait::async_trait;

use crate::error::{RagError, Result};

/// Default character limit applied before text reaches an embedding model.
pub const DEFAULT_MAX_INPUT_CHARS: usize = 8192;

/// A provider that generates vector embeddings from text input.
///
/// Implementations wrap specific embedding backends behind a unified async
/// interface. Output vectors always have [`dimensions`](EmbeddingProvider::dimensions)
/// elements, and identical input yields identical output.
///
/// The default [`embed_batch`](EmbeddingProvider::embed_batch)
/// implementation calls [`embed`](EmbeddingProvider::embed) sequentially;
/// backends that support native batching should override it, keeping the
/// output in input order.
///
/// # Example
///
/// ```rust,ignore
/// use endee_rag::EmbeddingProvider;
///
/// let provider = MyEmbeddingProvider::new();
/// let embedding = provider.embed("hello world").await?;
/// assert_eq!(embedding.len(), provider.dimensions());
/// ```
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Generate an embedding vector for a single text input.
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;

    /// Generate embedding vectors for a batch of text inputs.
    ///
    /// Must be equivalent to calling [`embed`](EmbeddingProvider::embed) on
    /// each input in order.
    async fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        let mut results = Vec::with_capacity(texts.len());
        for text in texts {
            results.push(self.embed(text).await?);
        }
        Ok(results)
    }

    /// Return the dimensionality of embeddings produced by this provider.
    fn dimensions(&self) -> usize;
}

/// Apply the shared input policy: reject blank text, truncate long text to
/// at most `max_chars` characters.
///
/// # Errors
///
/// Returns [`RagError::Validation`] if `text` is empty or whitespace-only.
pub fn prepare_input(text: &str, max_chars: usize) -> Result<&str> {
    if text.trim().is_empty() {
        return Err(RagError::Validation("cannot embed empty text".into()));
    }
    match text.char_indices().nth(max_chars) {
        Some((cut, _)) => Ok(&text[..cut]),
        None => Ok(text),
    }
}
