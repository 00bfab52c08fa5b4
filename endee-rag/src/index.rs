//! Vector index capability trait.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::config::SpaceType;
use crate::document::{IndexedRecord, SearchResult};
use crate::error::{RagError, Result};

/// The parameters an index is created with.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct IndexSpec {
    /// Vector length every record must have.
    pub dimensions: usize,
    /// Distance metric used for search.
    pub space_type: SpaceType,
}

impl IndexSpec {
    /// Fail with [`RagError::Configuration`] unless `other` matches this spec.
    pub(crate) fn ensure_matches(&self, index: &str, other: &IndexSpec) -> Result<()> {
        if self == other {
            return Ok(());
        }
        Err(RagError::Configuration(format!(
            "index '{index}' exists with dim={} space_type={}, requested dim={} space_type={}",
            self.dimensions, self.space_type, other.dimensions, other.space_type
        )))
    }

    /// Fail with [`RagError::Validation`] unless `vector` has the declared dimension.
    pub(crate) fn ensure_dimensions(&self, index: &str, vector: &[f32]) -> Result<()> {
        if vector.len() == self.dimensions {
            return Ok(());
        }
        Err(RagError::Validation(format!(
            "vector has {} dimensions but index '{index}' expects {}",
            vector.len(),
            self.dimensions
        )))
    }
}

/// A named-index vector store with similarity search.
///
/// This is the seam between the pipelines and the storage service:
/// [`EndeeClient`](crate::EndeeClient) talks to the remote service and
/// [`InMemoryVectorIndex`](crate::InMemoryVectorIndex) keeps everything
/// local. Pipeline code depends only on this trait.
///
/// # Example
///
/// ```rust,ignore
/// use endee_rag::{InMemoryVectorIndex, SpaceType, VectorIndex};
///
/// let index = InMemoryVectorIndex::new();
/// index.create_index("kb", 384, SpaceType::Cosine).await?;
/// index.insert("kb", &record).await?;
/// let result = index.search("kb", &query_embedding, 5).await?;
/// ```
#[async_trait]
pub trait VectorIndex: Send + Sync {
    /// Create a named index.
    ///
    /// Succeeds without change if the index already exists with the same
    /// dimension and space type. Fails with [`RagError::Configuration`] if
    /// it exists with different parameters.
    async fn create_index(&self, name: &str, dimensions: usize, space_type: SpaceType)
    -> Result<()>;

    /// Insert a record. A record with the same id is replaced.
    ///
    /// The vector length must equal the index dimension; a mismatch is a
    /// [`RagError::Validation`] raised before any I/O.
    async fn insert(&self, index: &str, record: &IndexedRecord) -> Result<()>;

    /// Return up to `k` records most similar to `vector`, most similar first.
    ///
    /// An index holding fewer than `k` records returns all of them.
    async fn search(&self, index: &str, vector: &[f32], k: usize) -> Result<SearchResult>;
}

pub(crate) fn ensure_positive_k(k: usize) -> Result<()> {
    if k == 0 {
        return Err(RagError::Validation("k must be greater than zero".into()));
    }
    Ok(())
}
