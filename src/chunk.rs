//! Overlapping word-window text chunker.
//!
//! Splits extracted document text on whitespace into words and produces
//! windows of up to `size` words, advancing by `size - overlap` words per
//! step. Consecutive chunks share exactly `overlap` words while enough
//! words remain; the final chunk may be shorter. Deterministic and
//! stateless between calls.

use anyhow::{bail, Result};

use crate::models::Chunk;

/// Default window size in words.
pub const DEFAULT_CHUNK_SIZE: usize = 500;
/// Default overlap in words between consecutive windows.
pub const DEFAULT_CHUNK_OVERLAP: usize = 50;

/// Split `text` into overlapping word windows.
///
/// For `N` words, produces `ceil(max(N - overlap, 0) / (size - overlap))`
/// chunks (`N > 0`), with contiguous indices starting at 0. Empty text
/// yields no chunks. `overlap >= size` is a configuration error, not an
/// infinite loop.
pub fn chunk_words(filename: &str, text: &str, size: usize, overlap: usize) -> Result<Vec<Chunk>> {
    if size == 0 {
        bail!("chunk size must be > 0");
    }
    if overlap >= size {
        bail!("chunk overlap ({}) must be smaller than chunk size ({})", overlap, size);
    }

    let words: Vec<&str> = text.split_whitespace().collect();
    let step = size - overlap;

    let mut chunks = Vec::new();
    let mut start = 0;
    while start < words.len() {
        let end = (start + size).min(words.len());
        let window = words[start..end].join(" ");
        if !window.is_empty() {
            chunks.push(Chunk {
                filename: filename.to_string(),
                index: chunks.len(),
                text: window,
            });
        }
        // A window reaching the end of the word sequence is the last one;
        // never emit a degenerate trailing chunk past the text bounds.
        if start + size >= words.len() {
            break;
        }
        start += step;
    }

    Ok(chunks)
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;

    fn word_text(n: usize) -> String {
        (0..n).map(|i| format!("w{}", i)).collect::<Vec<_>>().join(" ")
    }

    fn expected_count(n: usize, size: usize, overlap: usize) -> usize {
        if n == 0 {
            return 0;
        }
        let step = size - overlap;
        // Nonempty text always yields at least one window, even when the
        // word count does not exceed the overlap.
        (n.saturating_sub(overlap)).div_ceil(step).max(1)
    }

    #[test]
    fn test_empty_text_no_chunks() {
        let chunks = chunk_words("a.txt", "", 500, 50).unwrap();
        assert!(chunks.is_empty());
    }

    #[test]
    fn test_whitespace_only_no_chunks() {
        let chunks = chunk_words("a.txt", "  \n\t  ", 500, 50).unwrap();
        assert!(chunks.is_empty());
    }

    #[test]
    fn test_short_text_single_chunk() {
        let chunks = chunk_words("a.txt", "one two three", 500, 50).unwrap();
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].index, 0);
        assert_eq!(chunks[0].text, "one two three");
    }

    #[test]
    fn test_1200_words_default_params() {
        // 1200 words at size 500 / overlap 50: windows start at 0, 450, 900.
        let chunks = chunk_words("a.txt", &word_text(1200), 500, 50).unwrap();
        assert_eq!(chunks.len(), 3);
        assert!(chunks[0].text.starts_with("w0 "));
        assert!(chunks[0].text.ends_with(" w499"));
        assert!(chunks[1].text.starts_with("w450 "));
        assert!(chunks[1].text.ends_with(" w949"));
        assert!(chunks[2].text.starts_with("w900 "));
        assert!(chunks[2].text.ends_with(" w1199"));
        for (i, c) in chunks.iter().enumerate() {
            assert_eq!(c.index, i);
        }
    }

    #[test]
    fn test_consecutive_chunks_share_overlap_words() {
        let chunks = chunk_words("a.txt", &word_text(30), 10, 3).unwrap();
        for pair in chunks.windows(2) {
            let left: Vec<&str> = pair[0].text.split(' ').collect();
            let right: Vec<&str> = pair[1].text.split(' ').collect();
            assert_eq!(&left[left.len() - 3..], &right[..3]);
        }
    }

    #[test]
    fn test_exact_multiple_no_trailing_empty_chunk() {
        // 10 words, size 10: a single window covers everything.
        let chunks = chunk_words("a.txt", &word_text(10), 10, 3).unwrap();
        assert_eq!(chunks.len(), 1);
    }

    #[test]
    fn test_overlap_equal_to_size_rejected() {
        assert!(chunk_words("a.txt", "some text", 50, 50).is_err());
    }

    #[test]
    fn test_overlap_greater_than_size_rejected() {
        assert!(chunk_words("a.txt", "some text", 50, 60).is_err());
    }

    #[test]
    fn test_zero_size_rejected() {
        assert!(chunk_words("a.txt", "some text", 0, 0).is_err());
    }

    #[test]
    fn test_deterministic() {
        let text = word_text(137);
        let a = chunk_words("a.txt", &text, 20, 5).unwrap();
        let b = chunk_words("a.txt", &text, 20, 5).unwrap();
        assert_eq!(a, b);
    }

    proptest! {
        #[test]
        fn prop_chunk_count_formula(
            n in 0usize..600,
            size in 2usize..80,
            overlap in 0usize..40,
        ) {
            prop_assume!(overlap < size);
            let chunks = chunk_words("p.txt", &word_text(n), size, overlap).unwrap();
            prop_assert_eq!(chunks.len(), expected_count(n, size, overlap));
        }

        #[test]
        fn prop_every_word_covered_in_order(
            n in 1usize..400,
            size in 2usize..60,
            overlap in 0usize..30,
        ) {
            prop_assume!(overlap < size);
            let chunks = chunk_words("p.txt", &word_text(n), size, overlap).unwrap();
            let step = size - overlap;

            // Reconstruct: chunk i starts at word i*step and is contiguous.
            for (i, chunk) in chunks.iter().enumerate() {
                let start = i * step;
                let words: Vec<&str> = chunk.text.split(' ').collect();
                prop_assert!(words.len() <= size);
                for (j, w) in words.iter().enumerate() {
                    prop_assert_eq!(*w, format!("w{}", start + j));
                }
            }
            // The last chunk ends exactly at the last word.
            let last = chunks.last().unwrap();
            let final_word = format!("w{}", n - 1);
            prop_assert!(last.text.ends_with(&final_word));
        }
    }
}
