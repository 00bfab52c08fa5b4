//! Turning retrieved hits into prompt-ready context.

use serde::Serialize;

use crate::document::{SearchHit, SearchResult};

/// Characters of chunk text kept in a [`SourceSummary`] preview.
pub const PREVIEW_CHARS: usize = 200;

/// A compact description of one retrieved chunk, for display.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SourceSummary {
    /// Document the chunk came from.
    pub document_id: String,
    /// Sequence index of the chunk within its document.
    pub chunk_index: usize,
    /// Similarity score rounded to three decimals.
    pub score: f32,
    /// The chunk text, cut to [`PREVIEW_CHARS`] characters plus `...`.
    pub preview: String,
}

impl From<&SearchHit> for SourceSummary {
    fn from(hit: &SearchHit) -> Self {
        let text = &hit.meta.text;
        let preview = match text.char_indices().nth(PREVIEW_CHARS) {
            Some((cut, _)) => format!("{}...", &text[..cut]),
            None => text.clone(),
        };
        Self {
            document_id: hit.meta.document_id.clone(),
            chunk_index: hit.meta.chunk_index,
            score: (hit.score * 1000.0).round() / 1000.0,
            preview,
        }
    }
}

impl SearchResult {
    /// Render the hits as numbered source blocks separated by blank lines:
    ///
    /// ```text
    /// [Source 1: guide.md]
    /// chunk text
    ///
    /// [Source 2: faq.txt]
    /// chunk text
    /// ```
    ///
    /// Empty results render as an empty string.
    pub fn context(&self) -> String {
        self.hits
            .iter()
            .enumerate()
            .map(|(i, hit)| format!("[Source {}: {}]\n{}", i + 1, hit.meta.document_id, hit.meta.text))
            .collect::<Vec<_>>()
            .join("\n\n")
    }

    /// One [`SourceSummary`] per hit, in rank order.
    pub fn sources(&self) -> Vec<SourceSummary> {
        self.hits.iter().map(SourceSummary::from).collect()
    }
}
