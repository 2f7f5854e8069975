//! Core data models shared by the indexing and query pipelines.

use serde::{Deserialize, Serialize};

/// A contiguous window of words drawn from one source document.
///
/// Identified by `(document, chunk_index)`. Indices are contiguous from 0
/// within a document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk {
    /// Name of the source document (usually the uploaded file name).
    pub document: String,
    /// Position of this chunk within its document.
    pub chunk_index: usize,
    /// Window text, words joined by single spaces.
    pub text: String,
}

impl Chunk {
    /// The metadata record stored alongside this chunk in the index.
    pub fn metadata(&self) -> ChunkMetadata {
        ChunkMetadata {
            file_name: self.document.clone(),
            chunk_index: self.chunk_index,
        }
    }
}

/// Descriptive fields attached 1:1 to an indexed chunk.
///
/// The vector index never interprets these; they are carried through to
/// [`RetrievalResult`] unchanged.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkMetadata {
    pub file_name: String,
    pub chunk_index: usize,
}

/// A snapshot of one index record plus its distance to a specific query.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RetrievalResult<M = ChunkMetadata> {
    pub text: String,
    pub metadata: M,
    /// Squared Euclidean distance to the query vector. Smaller is closer.
    pub distance: f32,
}
