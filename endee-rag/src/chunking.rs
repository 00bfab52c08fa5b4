//! Document chunking strategies.
//!
//! This module provides the [`Chunker`] trait and two implementations:
//!
//! - [`FixedSizeChunker`]: windows of `chunk_size` characters
//! - [`WordChunker`]: windows of `chunk_size` whitespace-separated words
//!
//! Both slide forward by `chunk_size - chunk_overlap` units, so consecutive
//! chunks share exactly `chunk_overlap` units. Every chunk is a contiguous
//! slice of the document text, and the last chunk always reaches the end of
//! the text even when it is shorter than `chunk_size`.

use std::sync::Arc;

use crate::config::{ChunkUnit, RagConfig};
use crate::document::{Chunk, Document};
use crate::error::{RagError, Result};

/// A strategy for splitting documents into chunks.
///
/// Implementations are pure: the same document always yields the same
/// chunks, and a document with empty text yields none.
pub trait Chunker: Send + Sync {
    /// Split a document into ordered chunks.
    fn chunk(&self, document: &Document) -> Vec<Chunk>;
}

/// Build the chunker described by `config`.
///
/// # Errors
///
/// Returns [`RagError::Configuration`] if the size/overlap pair is invalid.
pub fn chunker_for(config: &RagConfig) -> Result<Arc<dyn Chunker>> {
    Ok(match config.chunk_unit {
        ChunkUnit::Characters => {
            Arc::new(FixedSizeChunker::new(config.chunk_size, config.chunk_overlap)?)
        }
        ChunkUnit::Words => Arc::new(WordChunker::new(config.chunk_size, config.chunk_overlap)?),
    })
}

/// Split `document` into character windows of `chunk_size` with `overlap`.
///
/// # Errors
///
/// Returns [`RagError::Configuration`] if `chunk_size == 0` or
/// `overlap >= chunk_size`.
pub fn chunk(document: &Document, chunk_size: usize, overlap: usize) -> Result<Vec<Chunk>> {
    Ok(FixedSizeChunker::new(chunk_size, overlap)?.chunk(document))
}

fn validate(chunk_size: usize, chunk_overlap: usize) -> Result<()> {
    if chunk_size == 0 {
        return Err(RagError::Configuration("chunk_size must be greater than zero".into()));
    }
    if chunk_overlap >= chunk_size {
        return Err(RagError::Configuration(format!(
            "chunk_overlap ({chunk_overlap}) must be less than chunk_size ({chunk_size})"
        )));
    }
    Ok(())
}

/// Slide a window of `size` units with the given `overlap` across `count`
/// units, returning `(first, last_exclusive)` unit ranges.
///
/// The window that reaches `count` is the last one emitted.
fn windows(count: usize, size: usize, overlap: usize) -> Vec<(usize, usize)> {
    let step = size - overlap;
    let mut out = Vec::new();
    let mut start = 0;
    while start < count {
        let end = (start + size).min(count);
        out.push((start, end));
        if end == count {
            break;
        }
        start += step;
    }
    out
}

fn build_chunks(document: &Document, ranges: impl Iterator<Item = (usize, usize)>) -> Vec<Chunk> {
    ranges
        .enumerate()
        .map(|(index, (start, end))| Chunk {
            document_id: document.id.clone(),
            index,
            text: document.text[start..end].to_string(),
            start,
            end,
        })
        .collect()
}

/// Splits text into fixed-size chunks by character count with configurable overlap.
///
/// Sizes count Unicode scalar values, and slicing always lands on character
/// boundaries, so multi-byte text is never split mid-character.
///
/// # Example
///
/// ```rust,ignore
/// use endee_rag::FixedSizeChunker;
///
/// let chunker = FixedSizeChunker::new(256, 32)?;
/// let chunks = chunker.chunk(&document);
/// ```
#[derive(Debug, Clone)]
pub struct FixedSizeChunker {
    chunk_size: usize,
    chunk_overlap: usize,
}

impl FixedSizeChunker {
    /// Create a new `FixedSizeChunker`.
    ///
    /// # Arguments
    ///
    /// * `chunk_size`: maximum number of characters per chunk
    /// * `chunk_overlap`: number of characters shared by consecutive chunks
    ///
    /// # Errors
    ///
    /// Returns [`RagError::Configuration`] unless `0 <= chunk_overlap < chunk_size`.
    pub fn new(chunk_size: usize, chunk_overlap: usize) -> Result<Self> {
        validate(chunk_size, chunk_overlap)?;
        Ok(Self { chunk_size, chunk_overlap })
    }
}

impl Chunker for FixedSizeChunker {
    fn chunk(&self, document: &Document) -> Vec<Chunk> {
        let text = &document.text;
        if text.is_empty() {
            return Vec::new();
        }

        // Byte offset of every character, plus the end of the text.
        let bounds: Vec<usize> =
            text.char_indices().map(|(i, _)| i).chain(std::iter::once(text.len())).collect();
        let char_count = bounds.len() - 1;

        let ranges = windows(char_count, self.chunk_size, self.chunk_overlap)
            .into_iter()
            .map(|(first, last)| (bounds[first], bounds[last]));
        build_chunks(document, ranges)
    }
}

/// Splits text into windows of whitespace-separated words.
///
/// Each chunk spans from the start of its first word to the end of its last
/// word in the original text, so interior whitespace is preserved verbatim.
/// Documents containing only whitespace produce no chunks.
///
/// # Example
///
/// ```rust,ignore
/// use endee_rag::WordChunker;
///
/// let chunker = WordChunker::new(512, 50)?;
/// let chunks = chunker.chunk(&document);
/// ```
#[derive(Debug, Clone)]
pub struct WordChunker {
    chunk_size: usize,
    chunk_overlap: usize,
}

impl WordChunker {
    /// Create a new `WordChunker`.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::Configuration`] unless `0 <= chunk_overlap < chunk_size`.
    pub fn new(chunk_size: usize, chunk_overlap: usize) -> Result<Self> {
        validate(chunk_size, chunk_overlap)?;
        Ok(Self { chunk_size, chunk_overlap })
    }
}

/// Byte spans of every whitespace-delimited word in `text`.
fn word_spans(text: &str) -> Vec<(usize, usize)> {
    let mut spans = Vec::new();
    let mut start = None;
    for (i, c) in text.char_indices() {
        if c.is_whitespace() {
            if let Some(s) = start.take() {
                spans.push((s, i));
            }
        } else if start.is_none() {
            start = Some(i);
        }
    }
    if let Some(s) = start {
        spans.push((s, text.len()));
    }
    spans
}

impl Chunker for WordChunker {
    fn chunk(&self, document: &Document) -> Vec<Chunk> {
        let spans = word_spans(&document.text);
        if spans.is_empty() {
            return Vec::new();
        }

        let ranges = windows(spans.len(), self.chunk_size, self.chunk_overlap)
            .into_iter()
            .map(|(first, last)| (spans[first].0, spans[last - 1].1));
        build_chunks(document, ranges)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn final_short_window_is_kept() {
        let doc = Document::new("d", "abcdefghij");
        let chunks = FixedSizeChunker::new(4, 1).unwrap().chunk(&doc);
        let texts: Vec<&str> = chunks.iter().map(|c| c.text.as_str()).collect();
        assert_eq!(texts, ["abcd", "defg", "ghij"]);

        let chunks = FixedSizeChunker::new(4, 0).unwrap().chunk(&doc);
        let texts: Vec<&str> = chunks.iter().map(|c| c.text.as_str()).collect();
        assert_eq!(texts, ["abcd", "efgh", "ij"]);
    }

    #[test]
    fn multibyte_characters_are_not_split() {
        let doc = Document::new("d", "héllo wörld");
        let chunks = FixedSizeChunker::new(3, 0).unwrap().chunk(&doc);
        assert_eq!(chunks[0].text, "hél");
        assert_eq!(chunks.iter().map(|c| c.text.as_str()).collect::<String>(), doc.text);
    }

    #[test]
    fn word_chunks_preserve_original_spacing() {
        let doc = Document::new("d", "  one two\n\nthree   four five ");
        let chunks = WordChunker::new(3, 1).unwrap().chunk(&doc);
        let texts: Vec<&str> = chunks.iter().map(|c| c.text.as_str()).collect();
        assert_eq!(texts, ["one two\n\nthree", "three   four five"]);
        assert_eq!(chunks[1].index, 1);
        assert_eq!(&doc.text[chunks[1].start..chunks[1].end], chunks[1].text);
    }

    #[test]
    fn whitespace_only_document_has_no_word_chunks() {
        let doc = Document::new("d", " \n\t ");
        assert!(WordChunker::new(5, 0).unwrap().chunk(&doc).is_empty());
    }

    #[test]
    fn degenerate_overlap_is_a_configuration_error() {
        assert!(matches!(FixedSizeChunker::new(5, 5), Err(RagError::Configuration(_))));
        assert!(matches!(WordChunker::new(0, 0), Err(RagError::Configuration(_))));
        assert!(matches!(chunk(&Document::new("d", "x"), 2, 3), Err(RagError::Configuration(_))));
    }
}
