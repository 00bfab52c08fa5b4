//! Deterministic offline embedding provider.
//!
//! [`HashEmbeddingProvider`] projects text into a fixed-dimension space by
//! feature hashing its lower-cased words. It needs no model or network, so
//! it is the provider used by tests and by the CLI when no embedding
//! server is configured. Texts sharing vocabulary land close together under
//! cosine similarity; identical texts map to identical vectors.

use async_trait::async_trait;
use tracing::debug;

use crate::embedding::{DEFAULT_MAX_INPUT_CHARS, EmbeddingProvider, prepare_input};
use crate::error::{RagError, Result};

const FNV_OFFSET: u64 = 0xcbf2_9ce4_8422_2325;
const FNV_PRIME: u64 = 0x0000_0100_0000_01b3;

/// A feature-hashing [`EmbeddingProvider`].
///
/// # Example
///
/// ```rust,ignore
/// use endee_rag::HashEmbeddingProvider;
///
/// let provider = HashEmbeddingProvider::new(384)?;
/// let embedding = provider.embed("hello world").await?;
/// assert_eq!(embedding.len(), 384);
/// ```
#[derive(Debug, Clone)]
pub struct HashEmbeddingProvider {
    dimensions: usize,
    max_input_chars: usize,
}

impl HashEmbeddingProvider {
    /// Create a provider emitting vectors of `dimensions` elements.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::Configuration`] if `dimensions == 0`.
    pub fn new(dimensions: usize) -> Result<Self> {
        if dimensions == 0 {
            return Err(RagError::Configuration("dimensions must be greater than zero".into()));
        }
        Ok(Self { dimensions, max_input_chars: DEFAULT_MAX_INPUT_CHARS })
    }

    /// Override the character limit applied before hashing.
    pub fn with_max_input_chars(mut self, max_input_chars: usize) -> Self {
        self.max_input_chars = max_input_chars;
        self
    }

    fn hash_token(token: &str) -> u64 {
        token.bytes().fold(FNV_OFFSET, |acc, b| (acc ^ u64::from(b)).wrapping_mul(FNV_PRIME))
    }
}

#[async_trait]
impl EmbeddingProvider for HashEmbeddingProvider {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let text = prepare_input(text, self.max_input_chars)?;
        let mut embedding = vec![0.0f32; self.dimensions];

        for raw in text.split_whitespace() {
            let trimmed = raw.trim_matches(|c: char| !c.is_alphanumeric());
            let token = (if trimmed.is_empty() { raw } else { trimmed }).to_lowercase();
            let hash = Self::hash_token(&token);
            let bucket = (hash % self.dimensions as u64) as usize;
            let sign = if hash >> 63 == 0 { 1.0 } else { -1.0 };
            embedding[bucket] += sign;
        }

        let norm: f32 = embedding.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 {
            embedding.iter_mut().for_each(|x| *x /= norm);
        }

        debug!(provider = "hash", text_len = text.len(), "embedded text");
        Ok(embedding)
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }
}
