//! Sentence-aligned text chunking.
//!
//! [`chunk`] is the pure function the processing pipeline calls to split a
//! converted document's text into overlapping, embeddable pieces. It has no
//! knowledge of documents, users, or collections — it only knows characters.

pub mod error;

pub use error::{ChunkingError, ChunkingResult};

/// Default chunk size in characters, used when a caller has no opinion.
pub const DEFAULT_CHUNK_SIZE: usize = 3000;
/// Default overlap in characters between consecutive chunks.
pub const DEFAULT_OVERLAP: usize = 500;

/// Characters that may end a sentence, in any of the scripts the converter
/// is expected to hand back: ASCII, CJK, and bare newlines (treated as a
/// paragraph boundary, which is as good a place to cut as any).
const SENTENCE_ENDERS: [char; 7] = ['.', '?', '!', '。', '？', '！', '\n'];

/// Split `text` into an ordered sequence of overlapping, sentence-aligned
/// chunks.
///
/// Each chunk is at most `chunk_size` characters (character count, not
/// bytes); consecutive chunks overlap by up to `overlap` characters. Where
/// possible a chunk boundary falls just after a sentence-ending character
/// rather than mid-sentence.
///
/// # Errors
/// Returns [`ChunkingError::InvalidArgument`] if `chunk_size <= overlap`,
/// since that can never make progress.
pub fn chunk(text: &str, chunk_size: usize, overlap: usize) -> ChunkingResult<Vec<String>> {
    if chunk_size <= overlap {
        return Err(ChunkingError::InvalidArgument {
            chunk_size,
            overlap,
        });
    }

    if text.is_empty() {
        return Ok(Vec::new());
    }

    // Work in chars throughout: chunk_size/overlap are character counts and
    // sentence-ender scanning must land on char boundaries, not byte offsets.
    let chars: Vec<char> = text.chars().collect();
    let len = chars.len();

    let mut chunks = Vec::new();
    let mut start = 0usize;

    loop {
        let ideal_end = (start + chunk_size).min(len);
        let end = if ideal_end == len {
            ideal_end
        } else {
            find_sentence_end(&chars, start, ideal_end).unwrap_or(ideal_end)
        };

        if end > start {
            let piece: String = chars[start..end].iter().collect();
            if !piece.is_empty() {
                chunks.push(piece);
            }
        }

        if end >= len {
            break;
        }

        let next_start = end.saturating_sub(overlap);
        start = if next_start > start { next_start } else { start + 1 };
    }

    Ok(chunks)
}

/// Scan backward from `ideal_end - 1` to `start` for a sentence-ender,
/// returning the index just past it (so the punctuation stays in the
/// emitted chunk).
fn find_sentence_end(chars: &[char], start: usize, ideal_end: usize) -> Option<usize> {
    if ideal_end <= start {
        return None;
    }
    let mut i = ideal_end - 1;
    loop {
        if let Some(c) = chars.get(i) {
            if SENTENCE_ENDERS.contains(c) {
                return Some(i + 1);
            }
        }
        if i == start {
            return None;
        }
        i -= 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_input_yields_no_chunks() {
        assert_eq!(chunk("", 100, 10).unwrap(), Vec::<String>::new());
    }

    #[test]
    fn rejects_chunk_size_not_greater_than_overlap() {
        assert!(matches!(
            chunk("hello", 10, 10),
            Err(ChunkingError::InvalidArgument { .. })
        ));
        assert!(matches!(
            chunk("hello", 5, 10),
            Err(ChunkingError::InvalidArgument { .. })
        ));
    }

    #[test]
    fn short_text_is_a_single_chunk() {
        let text = "Hello world. This is a test. Goodbye.";
        let chunks = chunk(text, 3000, 500).unwrap();
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0], text);
    }

    #[test]
    fn non_final_chunks_end_on_sentence_boundary_or_exact_size() {
        let sentence = "This is sentence number. ";
        let text = sentence.repeat(200); // ~5000 chars of 200-char-ish sentences
        let chunks = chunk(&text, 3000, 500).unwrap();
        assert!(chunks.len() > 1);
        for c in &chunks[..chunks.len() - 1] {
            let ends_on_sentence = c
                .chars()
                .last()
                .is_some_and(|last| SENTENCE_ENDERS.contains(&last));
            assert!(ends_on_sentence || c.chars().count() == 3000);
        }
    }

    #[test]
    fn chunks_recover_text_with_bounded_overlap() {
        let text = "A".repeat(50) + "." + &"B".repeat(50) + "." + &"C".repeat(50) + ".";
        let chunks = chunk(&text, 60, 20).unwrap();
        assert!(chunks.len() >= 2);
        let joined: String = chunks.concat();
        assert!(joined.len() >= text.len());
    }

    #[test]
    fn large_document_chunk_count_matches_expected_range() {
        // 200-char "sentences" ending in '.', totalling 20_000 chars.
        let sentence = format!("{}.", "x".repeat(199));
        let text = sentence.repeat(100);
        let chunks = chunk(&text, 3000, 500).unwrap();
        // ceil((20000 - 500) / (3000 - 500)) == 8, allow +/-1 for sentence alignment.
        assert!((7..=9).contains(&chunks.len()), "got {}", chunks.len());
        for c in &chunks[..chunks.len() - 1] {
            assert!(c.ends_with('.'));
        }
    }

    #[test]
    fn terminates_even_when_no_sentence_ender_exists() {
        let text = "a".repeat(10_000);
        let chunks = chunk(&text, 3000, 2999).unwrap();
        assert!(!chunks.is_empty());
        assert!(chunks.len() < 10_000);
    }

    #[test]
    fn chunks_are_emitted_in_reading_order() {
        let text = "one two three four five six seven eight nine ten. ".repeat(100);
        let chunks = chunk(&text, 200, 50).unwrap();
        let reconstructed_prefix: String = chunks
            .iter()
            .scan(0usize, |_, c| Some(c.clone()))
            .next()
            .unwrap();
        assert!(text.starts_with(&reconstructed_prefix));
    }
}
