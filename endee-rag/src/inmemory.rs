//! In-memory vector index.
//!
//! This module provides [`InMemoryVectorIndex`], a local [`VectorIndex`]
//! backed by a `BTreeMap` protected by a `tokio::sync::RwLock`. It enforces
//! the same dimension and space-type contract as the remote service and is
//! suitable for development, testing, and small offline corpora.

use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::config::SpaceType;
use crate::document::{IndexedRecord, SearchHit, SearchResult};
use crate::error::{RagError, Result};
use crate::index::{IndexSpec, VectorIndex, ensure_positive_k};

#[derive(Debug)]
struct Collection {
    spec: IndexSpec,
    records: BTreeMap<String, IndexedRecord>,
}

/// An in-memory vector index with exhaustive similarity search.
///
/// Scores follow the index's [`SpaceType`]:
/// cosine similarity, raw dot product, or `1 / (1 + l2_distance)` for
/// euclidean, so that higher is always more similar. Ties keep record-id order.
///
/// # Example
///
/// ```rust,ignore
/// use endee_rag::{InMemoryVectorIndex, SpaceType, VectorIndex};
///
/// let index = InMemoryVectorIndex::new();
/// index.create_index("kb", 384, SpaceType::Cosine).await?;
/// ```
#[derive(Debug, Default)]
pub struct InMemoryVectorIndex {
    collections: RwLock<HashMap<String, Collection>>,
}

impl InMemoryVectorIndex {
    /// Create a new empty in-memory index store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of records stored in `index`, or `None` if it does not exist.
    pub async fn record_count(&self, index: &str) -> Option<usize> {
        self.collections.read().await.get(index).map(|c| c.records.len())
    }

    fn missing(index: &str) -> RagError {
        RagError::Index {
            index: index.to_string(),
            status: 404,
            message: format!("index '{index}' does not exist"),
        }
    }
}

/// Compute cosine similarity between two vectors.
///
/// Returns 0.0 if either vector has zero magnitude.
fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let dot = dot_product(a, b);
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a * norm_b)
}

fn dot_product(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b.iter()).map(|(x, y)| x * y).sum()
}

fn euclidean_similarity(a: &[f32], b: &[f32]) -> f32 {
    let distance: f32 = a.iter().zip(b.iter()).map(|(x, y)| (x - y) * (x - y)).sum::<f32>().sqrt();
    1.0 / (1.0 + distance)
}

fn score(space_type: SpaceType, a: &[f32], b: &[f32]) -> f32 {
    match space_type {
        SpaceType::Cosine => cosine_similarity(a, b),
        SpaceType::Dot => dot_product(a, b),
        SpaceType::Euclidean => euclidean_similarity(a, b),
    }
}

#[async_trait]
impl VectorIndex for InMemoryVectorIndex {
    async fn create_index(
        &self,
        name: &str,
        dimensions: usize,
        space_type: SpaceType,
    ) -> Result<()> {
        if dimensions == 0 {
            return Err(RagError::Configuration("dimensions must be greater than zero".into()));
        }
        let requested = IndexSpec { dimensions, space_type };
        let mut collections = self.collections.write().await;
        match collections.get(name) {
            Some(existing) => existing.spec.ensure_matches(name, &requested),
            None => {
                collections
                    .insert(name.to_string(), Collection { spec: requested, records: BTreeMap::new() });
                Ok(())
            }
        }
    }

    async fn insert(&self, index: &str, record: &IndexedRecord) -> Result<()> {
        let mut collections = self.collections.write().await;
        let collection = collections.get_mut(index).ok_or_else(|| Self::missing(index))?;
        collection.spec.ensure_dimensions(index, &record.vector)?;
        collection.records.insert(record.id.clone(), record.clone());
        Ok(())
    }

    async fn search(&self, index: &str, vector: &[f32], k: usize) -> Result<SearchResult> {
        ensure_positive_k(k)?;
        let collections = self.collections.read().await;
        let collection = collections.get(index).ok_or_else(|| Self::missing(index))?;
        collection.spec.ensure_dimensions(index, vector)?;

        let mut hits: Vec<SearchHit> = collection
            .records
            .values()
            .map(|record| SearchHit {
                meta: record.meta.clone(),
                score: score(collection.spec.space_type, &record.vector, vector),
            })
            .collect();

        hits.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
        hits.truncate(k);
        Ok(SearchResult::new(hits))
    }
}
