//! Context assembly: ranked retrieval results → one bounded evidence string.
//!
//! Each result becomes a labeled block:
//!
//! ```text
//! [Source: handbook.pdf, chunk 3]
//! <chunk text>
//!
//! ```
//!
//! Blocks are appended best-first until the next one would exceed the
//! character budget. Accepted blocks are never truncated.

use crate::models::{ChunkMetadata, RetrievalResult};

/// Metadata that can label a context block with its origin.
pub trait SourceTag {
    /// Human-readable source label, e.g. `"handbook.pdf, chunk 3"`.
    fn source_tag(&self) -> String;
}

impl SourceTag for ChunkMetadata {
    fn source_tag(&self) -> String {
        format!("{}, chunk {}", self.file_name, self.chunk_index)
    }
}

/// Format the context block for a single result.
pub fn format_block<M: SourceTag>(result: &RetrievalResult<M>) -> String {
    format!(
        "[Source: {}]\n{}\n\n",
        result.metadata.source_tag(),
        result.text
    )
}

/// Concatenate result blocks in the given order, stopping before the first
/// block that would push the total over `max_chars`.
///
/// Length is measured in `char`s. Returns an empty string for no results or
/// when even the first block is over budget.
pub fn build_context<M: SourceTag>(results: &[RetrievalResult<M>], max_chars: usize) -> String {
    let mut out = String::new();
    let mut total_chars = 0usize;

    for result in results {
        let block = format_block(result);
        let block_chars = block.chars().count();
        if total_chars + block_chars > max_chars {
            break;
        }
        out.push_str(&block);
        total_chars += block_chars;
    }

    out
}
