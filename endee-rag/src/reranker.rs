//! Reranker trait for re-scoring search results.
//!
//! Retrieval is a pass-through of the index's ranking by default; a
//! reranker only runs when one is attached to the pipeline.

use async_trait::async_trait;

use crate::document::SearchResult;
use crate::error::Result;

/// A reranker that re-scores and reorders search results.
///
/// Implementations can use cross-encoder models, LLM-based scoring, or
/// other strategies to improve precision beyond initial vector similarity.
#[async_trait]
pub trait Reranker: Send + Sync {
    /// Rerank search results given the original query.
    ///
    /// Returns results in a new order with potentially updated scores.
    async fn rerank(&self, query: &str, result: SearchResult) -> Result<SearchResult>;
}

/// A no-op reranker that returns results unchanged.
///
/// # Example
///
/// ```rust,ignore
/// use endee_rag::NoOpReranker;
///
/// let reranker = NoOpReranker;
/// let reranked = reranker.rerank("query", result).await?;
/// // reranked == result (same order, same scores)
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct NoOpReranker;

#[async_trait]
impl Reranker for NoOpReranker {
    async fn rerank(&self, _query: &str, result: SearchResult) -> Result<SearchResult> {
        Ok(result)
    }
}
