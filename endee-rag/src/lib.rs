//! Document retrieval over the Endee vector index.
//!
//! This crate provides:
//! - Overlapping fixed-window chunking by characters or words
//! - An [`EmbeddingProvider`] seam with an offline hashing provider and an
//!   OpenAI-compatible HTTP provider
//! - [`EndeeClient`], an HTTP+JSON client for the index service with
//!   bounded retry, plus an [`InMemoryVectorIndex`] for local use
//! - [`RagPipeline`], which ingests documents into a named index and
//!   retrieves the top-k chunks for a query
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use endee_rag::{DirectoryLoader, EndeeClient, HashEmbeddingProvider, RagConfig, RagPipeline};
//!
//! let config = RagConfig::from_env()?;
//! let pipeline = RagPipeline::builder()
//!     .embedding_provider(Arc::new(HashEmbeddingProvider::new(config.dimensions)?))
//!     .index(Arc::new(EndeeClient::from_config(&config)?))
//!     .config(config)
//!     .build()?;
//!
//! let index = pipeline.config().index_name.clone();
//! pipeline.create_index(&index).await?;
//! let report = pipeline.ingest_batch(&index, &DirectoryLoader::new("docs").load()?).await;
//! let result = pipeline.query(&index, "How do I rotate keys?").await?;
//! println!("{}", result.context());
//! ```

mod chunking;
mod client;
mod config;
mod context;
mod document;
mod embedding;
mod error;
mod hashing;
mod index;
mod inmemory;
mod loader;
#[cfg(feature = "openai")]
mod openai;
mod pipeline;
mod reranker;
mod retry;

pub use chunking::{Chunker, FixedSizeChunker, WordChunker, chunk, chunker_for};
pub use client::EndeeClient;
pub use config::{
    ChunkUnit, RagConfig, RagConfigBuilder, ReingestPolicy, RetryPolicy, SpaceType,
};
pub use context::{PREVIEW_CHARS, SourceSummary};
pub use document::{
    Chunk, Document, INGESTED_AT_KEY, IndexedRecord, RecordMeta, SOURCE_FILE_KEY, SearchHit,
    SearchResult,
};
pub use embedding::{DEFAULT_MAX_INPUT_CHARS, EmbeddingProvider, prepare_input};
pub use error::{RagError, Result};
pub use hashing::HashEmbeddingProvider;
pub use index::{IndexSpec, VectorIndex};
pub use inmemory::InMemoryVectorIndex;
pub use loader::DirectoryLoader;
#[cfg(feature = "openai")]
pub use openai::OpenAIEmbeddingProvider;
pub use pipeline::{
    DocumentFailure, DocumentOutcome, DocumentStage, IngestReport, RagPipeline,
    RagPipelineBuilder,
};
pub use reranker::{NoOpReranker, Reranker};
