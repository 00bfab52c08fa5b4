//! Ingestion and retrieval orchestration.
//!
//! The [`RagPipeline`] coordinates document ingestion (chunk → embed →
//! insert) and query-time retrieval (embed → search → optional rerank →
//! optional similarity floor) over an [`EmbeddingProvider`], a
//! [`VectorIndex`] and a [`Chunker`].
//!
//! # Example
//!
//! ```rust,ignore
//! use endee_rag::{EndeeClient, HashEmbeddingProvider, RagConfig, RagPipeline};
//!
//! let config = RagConfig::from_env()?;
//! let pipeline = RagPipeline::builder()
//!     .embedding_provider(Arc::new(HashEmbeddingProvider::new(config.dimensions)?))
//!     .index(Arc::new(EndeeClient::from_config(&config)?))
//!     .config(config)
//!     .build()?;
//!
//! pipeline.create_index("kb").await?;
//! let report = pipeline.ingest_batch("kb", &documents).await;
//! let result = pipeline.retrieve("kb", "what is ownership?", 3).await?;
//! ```

use std::fmt;
use std::sync::Arc;

use futures::stream::{self, StreamExt};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::chunking::{Chunker, chunker_for};
use crate::config::{RagConfig, ReingestPolicy};
use crate::document::{Chunk, Document, IndexedRecord, SearchResult};
use crate::embedding::EmbeddingProvider;
use crate::error::{RagError, Result};
use crate::index::VectorIndex;
use crate::reranker::Reranker;

/// Where a document is in the ingestion state machine.
///
/// `Loaded → Chunked → Embedded → Indexed → Done`; any step may end in `Failed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentStage {
    /// Handed to the pipeline, nothing done yet.
    Loaded,
    /// Split into chunks.
    Chunked,
    /// Every chunk has a vector.
    Embedded,
    /// Every chunk has been inserted.
    Indexed,
    /// Finished successfully.
    Done,
    /// Aborted; see the accompanying error.
    Failed,
}

impl fmt::Display for DocumentStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Loaded => "loaded",
            Self::Chunked => "chunked",
            Self::Embedded => "embedded",
            Self::Indexed => "indexed",
            Self::Done => "done",
            Self::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// A document that was fully indexed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentOutcome {
    /// The document's id.
    pub document_id: String,
    /// Number of records inserted for it.
    pub chunk_count: usize,
}

/// A document whose ingestion was aborted.
#[derive(Debug)]
pub struct DocumentFailure {
    /// The document's id.
    pub document_id: String,
    /// The last stage the document completed before failing.
    pub stage: DocumentStage,
    /// The first error encountered.
    pub error: RagError,
}

/// Per-document summary of an ingestion run, in input order.
#[derive(Debug, Default)]
pub struct IngestReport {
    /// Documents fully indexed.
    pub succeeded: Vec<DocumentOutcome>,
    /// Documents that failed, each with its first error.
    pub failed: Vec<DocumentFailure>,
    /// Documents never started because the run was cancelled.
    pub cancelled: Vec<String>,
}

impl IngestReport {
    /// Whether every document was indexed.
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty() && self.cancelled.is_empty()
    }

    /// Total records inserted across successful documents.
    pub fn total_chunks(&self) -> usize {
        self.succeeded.iter().map(|o| o.chunk_count).sum()
    }

    /// The failure recorded for `document_id`, if any.
    pub fn failure(&self, document_id: &str) -> Option<&DocumentFailure> {
        self.failed.iter().find(|f| f.document_id == document_id)
    }
}

/// Tracks one document through the ingestion stages.
struct DocumentRun<'a> {
    document_id: &'a str,
    stage: DocumentStage,
}

impl<'a> DocumentRun<'a> {
    fn start(document_id: &'a str) -> Self {
        debug!(document.id = %document_id, stage = %DocumentStage::Loaded, "document stage");
        Self { document_id, stage: DocumentStage::Loaded }
    }

    fn advance(&mut self, stage: DocumentStage) {
        self.stage = stage;
        debug!(document.id = %self.document_id, %stage, "document stage");
    }

    fn fail(&self, error: RagError) -> DocumentFailure {
        error!(
            document.id = %self.document_id,
            stage = %self.stage,
            error = %error,
            "document ingestion failed"
        );
        DocumentFailure { document_id: self.document_id.to_string(), stage: self.stage, error }
    }
}

enum RunOutcome {
    Succeeded(DocumentOutcome),
    Failed(DocumentFailure),
    Cancelled(String),
}

/// The retrieval pipeline orchestrator.
///
/// Construct one via [`RagPipeline::builder()`]. The pipeline holds no
/// mutable state; concurrent ingestion and query runs share only the index.
pub struct RagPipeline {
    config: RagConfig,
    embedding_provider: Arc<dyn EmbeddingProvider>,
    index: Arc<dyn VectorIndex>,
    chunker: Arc<dyn Chunker>,
    reranker: Option<Arc<dyn Reranker>>,
}

impl RagPipeline {
    /// Create a new [`RagPipelineBuilder`].
    pub fn builder() -> RagPipelineBuilder {
        RagPipelineBuilder::default()
    }

    /// Return a reference to the pipeline configuration.
    pub fn config(&self) -> &RagConfig {
        &self.config
    }

    /// Return a reference to the embedding provider.
    pub fn embedding_provider(&self) -> &Arc<dyn EmbeddingProvider> {
        &self.embedding_provider
    }

    /// Return a reference to the vector index.
    pub fn index(&self) -> &Arc<dyn VectorIndex> {
        &self.index
    }

    /// Create `name` with the configured dimension and space type.
    ///
    /// # Errors
    ///
    /// Propagates the index's error, e.g. [`RagError::Configuration`] when
    /// `name` exists with different parameters.
    pub async fn create_index(&self, name: &str) -> Result<()> {
        self.index
            .create_index(name, self.config.dimensions, self.config.space_type)
            .await
            .inspect_err(|e| error!(index = name, error = %e, "failed to create index"))
    }

    /// Ingest a single document: chunk → embed → insert.
    ///
    /// Embedding happens in one batch call per document. Insertion stops at
    /// the first failing chunk; records already inserted for the document
    /// stay in the index.
    ///
    /// # Errors
    ///
    /// Returns the first error raised while embedding or inserting.
    pub async fn ingest(&self, index: &str, document: &Document) -> Result<DocumentOutcome> {
        self.ingest_document(index, document).await.map_err(|failure| failure.error)
    }

    async fn ingest_document(
        &self,
        index: &str,
        document: &Document,
    ) -> std::result::Result<DocumentOutcome, DocumentFailure> {
        let mut run = DocumentRun::start(&document.id);

        // 1. Chunk; whitespace-only windows carry nothing to embed.
        let chunks: Vec<Chunk> = self
            .chunker
            .chunk(document)
            .into_iter()
            .filter(|c| !c.text.trim().is_empty())
            .collect();
        run.advance(DocumentStage::Chunked);

        if chunks.is_empty() {
            run.advance(DocumentStage::Done);
            info!(document.id = %document.id, chunk_count = 0, "ingested document (empty)");
            return Ok(DocumentOutcome { document_id: document.id.clone(), chunk_count: 0 });
        }

        // 2. Embed all chunks in one batch
        let texts: Vec<&str> = chunks.iter().map(|c| c.text.as_str()).collect();
        let embeddings =
            self.embedding_provider.embed_batch(&texts).await.map_err(|e| run.fail(e))?;
        if embeddings.len() != chunks.len() {
            return Err(run.fail(RagError::Embedding {
                provider: "batch".into(),
                message: format!(
                    "expected {} embeddings, received {}",
                    chunks.len(),
                    embeddings.len()
                ),
            }));
        }
        run.advance(DocumentStage::Embedded);

        // 3. Insert, fail-fast
        for (chunk, vector) in chunks.iter().zip(embeddings) {
            let id = match self.config.reingest_policy {
                ReingestPolicy::Upsert => chunk.record_id(),
                ReingestPolicy::Append => Uuid::new_v4().to_string(),
            };
            let record = IndexedRecord { id, vector, meta: chunk.meta() };
            self.index.insert(index, &record).await.map_err(|e| run.fail(e))?;
        }
        run.advance(DocumentStage::Indexed);

        run.advance(DocumentStage::Done);
        info!(document.id = %document.id, chunk_count = chunks.len(), "ingested document");
        Ok(DocumentOutcome { document_id: document.id.clone(), chunk_count: chunks.len() })
    }

    /// Ingest many documents, continuing past per-document failures.
    ///
    /// Up to `max_concurrency` documents are processed at once. The report
    /// lists every document exactly once, in input order.
    pub async fn ingest_batch(&self, index: &str, documents: &[Document]) -> IngestReport {
        self.ingest_batch_with_cancel(index, documents, &CancellationToken::new()).await
    }

    /// Like [`ingest_batch`](Self::ingest_batch), but stops starting new
    /// documents once `cancel` fires.
    ///
    /// Documents already in flight run to completion (or failure), so every
    /// document is either fully indexed, reported as failed, or untouched and
    /// listed in [`IngestReport::cancelled`].
    pub async fn ingest_batch_with_cancel(
        &self,
        index: &str,
        documents: &[Document],
        cancel: &CancellationToken,
    ) -> IngestReport {
        info!(index, document_count = documents.len(), "starting ingestion run");

        let outcomes: Vec<RunOutcome> = stream::iter(documents.iter().map(|document| async move {
            if cancel.is_cancelled() {
                return RunOutcome::Cancelled(document.id.clone());
            }
            match self.ingest_document(index, document).await {
                Ok(outcome) => RunOutcome::Succeeded(outcome),
                Err(failure) => RunOutcome::Failed(failure),
            }
        }))
        .buffered(self.config.max_concurrency)
        .collect()
        .await;

        let mut report = IngestReport::default();
        for outcome in outcomes {
            match outcome {
                RunOutcome::Succeeded(o) => report.succeeded.push(o),
                RunOutcome::Failed(f) => report.failed.push(f),
                RunOutcome::Cancelled(id) => report.cancelled.push(id),
            }
        }

        if !report.cancelled.is_empty() {
            warn!(index, skipped = report.cancelled.len(), "ingestion run cancelled");
        }
        info!(
            index,
            succeeded = report.succeeded.len(),
            failed = report.failed.len(),
            chunk_count = report.total_chunks(),
            "ingestion run finished"
        );
        report
    }

    /// Retrieve the `k` chunks most similar to `query` from `index`.
    ///
    /// The query is embedded once with [`EmbeddingProvider::embed`]. Ranking
    /// is the index's; the pipeline only reranks or filters when a reranker
    /// or `similarity_threshold` is configured. An empty index yields an
    /// empty result.
    ///
    /// # Errors
    ///
    /// [`RagError::Validation`] if `k == 0`; otherwise embedding and search
    /// errors propagate unchanged.
    pub async fn retrieve(&self, index: &str, query: &str, k: usize) -> Result<SearchResult> {
        if k == 0 {
            return Err(RagError::Validation("k must be greater than zero".into()));
        }

        // 1. Embed the query
        let query_embedding = self
            .embedding_provider
            .embed(query)
            .await
            .inspect_err(|e| error!(error = %e, "embedding failed during query"))?;

        // 2. Search the index
        let result = self
            .index
            .search(index, &query_embedding, k)
            .await
            .inspect_err(|e| error!(index, error = %e, "index search failed"))?;

        // 3. Rerank if a reranker is configured
        let result = match &self.reranker {
            Some(reranker) => reranker
                .rerank(query, result)
                .await
                .inspect_err(|e| error!(error = %e, "reranking failed"))?,
            None => result,
        };

        // 4. Similarity floor
        let result = match self.config.similarity_threshold {
            Some(threshold) => SearchResult::new(
                result.into_iter().filter(|hit| hit.score >= threshold).collect(),
            ),
            None => result,
        };

        info!(index, k, result_count = result.len(), "query completed");
        Ok(result)
    }

    /// [`retrieve`](Self::retrieve) with the configured `top_k`.
    pub async fn query(&self, index: &str, query: &str) -> Result<SearchResult> {
        self.retrieve(index, query, self.config.top_k).await
    }
}

/// Builder for constructing a [`RagPipeline`].
///
/// `config`, `embedding_provider` and `index` are required. The chunker
/// defaults to the one described by the config, and `reranker` is optional.
///
/// # Example
///
/// ```rust,ignore
/// let pipeline = RagPipeline::builder()
///     .config(config)
///     .embedding_provider(Arc::new(embedder))
///     .index(Arc::new(InMemoryVectorIndex::new()))
///     .reranker(Arc::new(reranker))  // optional
///     .build()?;
/// ```
#[derive(Default)]
pub struct RagPipelineBuilder {
    config: Option<RagConfig>,
    embedding_provider: Option<Arc<dyn EmbeddingProvider>>,
    index: Option<Arc<dyn VectorIndex>>,
    chunker: Option<Arc<dyn Chunker>>,
    reranker: Option<Arc<dyn Reranker>>,
}

impl RagPipelineBuilder {
    /// Set the pipeline configuration.
    pub fn config(mut self, config: RagConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Set the embedding provider.
    pub fn embedding_provider(mut self, provider: Arc<dyn EmbeddingProvider>) -> Self {
        self.embedding_provider = Some(provider);
        self
    }

    /// Set the vector index backend.
    pub fn index(mut self, index: Arc<dyn VectorIndex>) -> Self {
        self.index = Some(index);
        self
    }

    /// Override the chunker derived from the config.
    pub fn chunker(mut self, chunker: Arc<dyn Chunker>) -> Self {
        self.chunker = Some(chunker);
        self
    }

    /// Set an optional reranker for post-search result reordering.
    pub fn reranker(mut self, reranker: Arc<dyn Reranker>) -> Self {
        self.reranker = Some(reranker);
        self
    }

    /// Build the [`RagPipeline`].
    ///
    /// # Errors
    ///
    /// Returns [`RagError::Configuration`] if a required field is missing,
    /// the config fails [`RagConfig::validate`], or the embedding provider's
    /// dimension differs from `config.dimensions`.
    pub fn build(self) -> Result<RagPipeline> {
        let config =
            self.config.ok_or_else(|| RagError::Configuration("config is required".into()))?;
        config.validate()?;
        let embedding_provider = self
            .embedding_provider
            .ok_or_else(|| RagError::Configuration("embedding_provider is required".into()))?;
        let index =
            self.index.ok_or_else(|| RagError::Configuration("index is required".into()))?;

        if embedding_provider.dimensions() != config.dimensions {
            return Err(RagError::Configuration(format!(
                "embedding provider produces {} dimensions but config declares {}",
                embedding_provider.dimensions(),
                config.dimensions
            )));
        }

        let chunker = match self.chunker {
            Some(chunker) => chunker,
            None => chunker_for(&config)?,
        };

        Ok(RagPipeline { config, embedding_provider, index, chunker, reranker: self.reranker })
    }
}
