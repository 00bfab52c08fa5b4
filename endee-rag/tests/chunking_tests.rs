//! Property tests for chunking: coverage, overlap and determinism.

use endee_rag::{Chunker, Document, FixedSizeChunker, WordChunker, chunk};
use proptest::prelude::*;

/// Text mixing ASCII, multi-byte characters and assorted whitespace.
fn arb_text() -> impl Strategy<Value = String> {
    "[a-zé😀 \n\t]{0,300}"
}

fn arb_size_and_overlap() -> impl Strategy<Value = (usize, usize)> {
    (1usize..40).prop_flat_map(|size| (Just(size), 0..size))
}

/// **Feature: endee-rag, Property 1: Character chunks reassemble the document**
/// *For any* text and valid (size, overlap), the first chunk followed by every
/// later chunk minus its leading `overlap` characters SHALL equal the text,
/// and no chunk SHALL exceed `size` characters.
mod prop_character_coverage {
    use super::*;

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(100))]

        #[test]
        fn chunks_cover_text_minus_overlap(
            text in arb_text(),
            (size, overlap) in arb_size_and_overlap(),
        ) {
            let doc = Document::new("doc", text.clone());
            let chunks = chunk(&doc, size, overlap).unwrap();

            if text.is_empty() {
                prop_assert!(chunks.is_empty());
                return Ok(());
            }

            let mut rebuilt = String::new();
            for (i, c) in chunks.iter().enumerate() {
                prop_assert_eq!(c.index, i);
                prop_assert_eq!(&c.document_id, "doc");
                prop_assert!(c.text.chars().count() <= size);
                prop_assert_eq!(&text[c.start..c.end], c.text.as_str());
                if i == 0 {
                    rebuilt.push_str(&c.text);
                } else {
                    rebuilt.extend(c.text.chars().skip(overlap));
                }
            }
            prop_assert_eq!(rebuilt, text);
        }
    }
}

/// **Feature: endee-rag, Property 2: Chunking is deterministic**
/// *For any* document, chunking it twice with the same parameters SHALL
/// produce identical chunks.
mod prop_chunking_determinism {
    use super::*;

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(100))]

        #[test]
        fn same_input_same_chunks(
            text in arb_text(),
            (size, overlap) in arb_size_and_overlap(),
        ) {
            let doc = Document::new("doc", text);
            let chars = FixedSizeChunker::new(size, overlap).unwrap();
            prop_assert_eq!(chars.chunk(&doc), chars.chunk(&doc));

            let words = WordChunker::new(size, overlap).unwrap();
            prop_assert_eq!(words.chunk(&doc), words.chunk(&doc));
        }
    }
}

/// **Feature: endee-rag, Property 5: Word chunks respect word boundaries**
/// *For any* text, every word chunk SHALL be a slice of the document that
/// starts and ends on a word, hold at most `size` words, and together the
/// chunks SHALL contain every word of the document in order.
mod prop_word_windows {
    use super::*;

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(100))]

        #[test]
        fn word_chunks_are_word_aligned_slices(
            text in arb_text(),
            (size, overlap) in arb_size_and_overlap(),
        ) {
            let doc = Document::new("doc", text.clone());
            let chunks = WordChunker::new(size, overlap).unwrap().chunk(&doc);

            let mut rebuilt: Vec<&str> = Vec::new();
            for (i, c) in chunks.iter().enumerate() {
                prop_assert_eq!(&text[c.start..c.end], c.text.as_str());
                prop_assert_eq!(c.text.trim(), c.text.as_str());
                let words: Vec<&str> = c.text.split_whitespace().collect();
                prop_assert!(!words.is_empty() && words.len() <= size);
                let skip = if i == 0 { 0 } else { overlap };
                rebuilt.extend(words.into_iter().skip(skip));
            }
            prop_assert_eq!(rebuilt, text.split_whitespace().collect::<Vec<_>>());
        }
    }
}

#[test]
fn overlap_is_shared_between_neighbours() {
    let doc = Document::new("guide.md", "0123456789ABCDEFGHIJ");
    let chunks = chunk(&doc, 8, 3).unwrap();
    for pair in chunks.windows(2) {
        let tail: String = pair[0].text.chars().skip(pair[0].text.chars().count() - 3).collect();
        let head: String = pair[1].text.chars().take(3).collect();
        assert_eq!(tail, head);
    }
    assert_eq!(chunks.last().unwrap().end, doc.text.len());
    assert_eq!(chunks[1].record_id(), "guide.md#1");
}
