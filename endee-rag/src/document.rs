//! Data types for documents, chunks, indexed records and search results.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Metadata key holding the RFC 3339 time a document was loaded.
pub const INGESTED_AT_KEY: &str = "ingested_at";

/// Metadata key holding the file a document was loaded from.
pub const SOURCE_FILE_KEY: &str = "source_file";

/// A source document containing text content and metadata.
///
/// Documents are immutable once loaded; the pipeline only borrows them.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Document {
    /// Unique identifier for the document (typically its relative path).
    pub id: String,
    /// The raw text content of the document.
    pub text: String,
    /// Key-value metadata associated with the document.
    #[serde(default)]
    pub metadata: HashMap<String, String>,
}

impl Document {
    /// Create a document with no metadata.
    pub fn new(id: impl Into<String>, text: impl Into<String>) -> Self {
        Self { id: id.into(), text: text.into(), metadata: HashMap::new() }
    }

    /// Attach a metadata entry.
    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }
}

/// A contiguous slice of a [`Document`]'s text, sized for embedding.
///
/// `start..end` is the byte range of `text` inside the parent document, so
/// `&document.text[chunk.start..chunk.end] == chunk.text` always holds.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Chunk {
    /// The ID of the parent [`Document`].
    pub document_id: String,
    /// Zero-based sequence index of this chunk within its document.
    pub index: usize,
    /// The chunk text.
    pub text: String,
    /// Byte offset of the first character of the chunk in the document.
    pub start: usize,
    /// Byte offset one past the last character of the chunk in the document.
    pub end: usize,
}

impl Chunk {
    /// The stable record id for this chunk: `{document_id}#{index}`.
    pub fn record_id(&self) -> String {
        format!("{}#{}", self.document_id, self.index)
    }

    /// The metadata persisted alongside this chunk's vector.
    pub fn meta(&self) -> RecordMeta {
        RecordMeta {
            text: self.text.clone(),
            document_id: self.document_id.clone(),
            chunk_index: self.index,
        }
    }
}

/// Metadata stored with every vector in the remote index.
///
/// Together with its vector this forms one indexed record; exactly one
/// record exists per chunk.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RecordMeta {
    /// The chunk text.
    pub text: String,
    /// The ID of the document the chunk came from.
    pub document_id: String,
    /// The chunk's sequence index within its document.
    pub chunk_index: usize,
}

/// The persisted unit in the index: one vector plus its metadata.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct IndexedRecord {
    /// Record id sent to the service. Re-inserting an id replaces the record.
    pub id: String,
    /// The chunk embedding.
    pub vector: Vec<f32>,
    /// Metadata stored alongside the vector.
    pub meta: RecordMeta,
}

/// One retrieved record paired with the similarity score reported by the index.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SearchHit {
    /// The stored record metadata.
    pub meta: RecordMeta,
    /// The similarity score (higher is more similar).
    pub score: f32,
}

/// The ordered result of a top-k query: at most `k` hits, by descending
/// similarity as reported by the index service.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct SearchResult {
    /// The hits, most similar first.
    pub hits: Vec<SearchHit>,
}

impl SearchResult {
    /// Wrap an already-ranked list of hits.
    pub fn new(hits: Vec<SearchHit>) -> Self {
        Self { hits }
    }

    /// Number of hits.
    pub fn len(&self) -> usize {
        self.hits.len()
    }

    /// Whether the query matched nothing.
    pub fn is_empty(&self) -> bool {
        self.hits.is_empty()
    }

    /// The most similar hit, if any.
    pub fn top(&self) -> Option<&SearchHit> {
        self.hits.first()
    }

    /// Iterate the hits in rank order.
    pub fn iter(&self) -> std::slice::Iter<'_, SearchHit> {
        self.hits.iter()
    }
}

impl IntoIterator for SearchResult {
    type Item = SearchHit;
    type IntoIter = std::vec::IntoIter<SearchHit>;

    fn into_iter(self) -> Self::IntoIter {
        self.hits.into_iter()
    }
}

impl<'a> IntoIterator for &'a SearchResult {
    type Item = &'a SearchHit;
    type IntoIter = std::slice::Iter<'a, SearchHit>;

    fn into_iter(self) -> Self::IntoIter {
        self.hits.iter()
    }
}
