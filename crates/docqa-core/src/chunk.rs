//! Overlapping word-window text chunker.
//!
//! Splits extracted document text into windows of `chunk_size` words where
//! consecutive windows share `overlap` words, so an answer that straddles a
//! window boundary still appears whole in at least one chunk.
//!
//! # Algorithm
//!
//! 1. Split text on whitespace into words `W` (length `N`).
//! 2. Emit `W[start .. start + chunk_size]` joined by single spaces,
//!    starting at `start = 0`.
//! 3. Stop after the window that reaches the last word.
//! 4. Otherwise advance `start` by `chunk_size - overlap`, clamped at 0.
//!    If the clamped start does not move forward (`overlap >= chunk_size`),
//!    advance by a single word instead so the loop always terminates.
//!
//! Step 3 means no window is made only of words the previous window already
//! covered. A loop that instead runs while `start < N` emits such a tail:
//! for 10 words with `chunk_size = 4` and `overlap = 1` it yields 4 windows
//! (the last being just `j`), where this chunker yields 3. Likewise a
//! 350-word document at the defaults is one chunk, not two.
//!
//! # Example
//!
//! ```rust
//! use docqa_core::chunk::chunk_text;
//!
//! let chunks = chunk_text("a b c d e f g h i j", 5, 2);
//! assert_eq!(chunks, vec!["a b c d e", "d e f g h", "g h i j"]);
//! ```

use crate::models::Chunk;

/// Split `text` into overlapping word windows.
///
/// Returns an empty vector for text with no words and for `chunk_size == 0`.
/// With `0 <= overlap < chunk_size` the number of windows is
/// `ceil((N - overlap) / (chunk_size - overlap))` for `N > chunk_size`,
/// and exactly one for `N <= chunk_size`.
///
/// When `overlap >= chunk_size` the windows advance one word at a time and
/// repeat most of their content. That is accepted rather than rejected.
pub fn chunk_text(text: &str, chunk_size: usize, overlap: usize) -> Vec<String> {
    let words: Vec<&str> = text.split_whitespace().collect();
    if words.is_empty() || chunk_size == 0 {
        return Vec::new();
    }

    let mut chunks = Vec::new();
    let mut start = 0usize;

    while start < words.len() {
        let end = (start + chunk_size).min(words.len());
        let window = words[start..end].join(" ");
        let window = window.trim();
        if !window.is_empty() {
            chunks.push(window.to_string());
        }
        if end == words.len() {
            break;
        }
        start = next_start(start, chunk_size, overlap);
    }

    chunks
}

/// Split a document into [`Chunk`]s with contiguous indices starting at 0.
pub fn chunk_document(document: &str, text: &str, chunk_size: usize, overlap: usize) -> Vec<Chunk> {
    chunk_text(text, chunk_size, overlap)
        .into_iter()
        .enumerate()
        .map(|(chunk_index, text)| Chunk {
            document: document.to_string(),
            chunk_index,
            text,
        })
        .collect()
}

/// `start + chunk_size - overlap`, clamped at zero, and never behind `start + 1`.
fn next_start(start: usize, chunk_size: usize, overlap: usize) -> usize {
    let next = (start + chunk_size).saturating_sub(overlap);
    if next > start {
        next
    } else {
        start + 1
    }
}
