//! In-memory exact L2 vector index.
//!
//! Stores `(vector, text, metadata)` records in three parallel, append-only
//! sequences and answers k-nearest-neighbor queries by a brute-force scan
//! over every stored vector. Exactness is preferred over speed: the
//! intended corpus is tens of thousands of chunks, where a linear scan of
//! `records × dims` multiply-adds is cheap.
//!
//! # Invariants
//!
//! - `vectors.len() == texts.len() * dims` and `texts.len() == metadatas.len()`.
//! - Position `i` in every sequence is the same logical record.
//! - Records are never removed or reordered.
//!
//! [`VectorIndex::add`] validates a whole batch before touching any
//! sequence, so a rejected batch leaves the index unchanged.

use thiserror::Error;
use tracing::debug;

use crate::embedding::squared_l2;
use crate::models::{ChunkMetadata, RetrievalResult};

/// Validation failures raised by [`VectorIndex`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IndexError {
    #[error("embedding dimension must be greater than zero")]
    ZeroDimension,

    #[error(
        "vectors, texts and metadatas must have the same length \
         (got {vectors} vectors, {texts} texts, {metadatas} metadatas)"
    )]
    LengthMismatch {
        vectors: usize,
        texts: usize,
        metadatas: usize,
    },

    #[error("vector {position} has dimension {actual}, index expects {expected}")]
    VectorDimension {
        position: usize,
        expected: usize,
        actual: usize,
    },

    #[error("query vector has dimension {actual}, index expects {expected}")]
    QueryDimension { expected: usize, actual: usize },
}

/// Exact nearest-neighbor index over fixed-dimension `f32` vectors.
///
/// Metadata is opaque: any `M: Clone` is carried through to search results.
#[derive(Debug, Clone)]
pub struct VectorIndex<M = ChunkMetadata> {
    dims: usize,
    /// Row-major storage: record `i` occupies `vectors[i * dims .. (i + 1) * dims]`.
    vectors: Vec<f32>,
    texts: Vec<String>,
    metadatas: Vec<M>,
}

impl<M: Clone> VectorIndex<M> {
    /// Create an empty index for vectors of `dims` components.
    pub fn new(dims: usize) -> Result<Self, IndexError> {
        if dims == 0 {
            return Err(IndexError::ZeroDimension);
        }
        Ok(Self {
            dims,
            vectors: Vec::new(),
            texts: Vec::new(),
            metadatas: Vec::new(),
        })
    }

    /// The fixed vector dimension of this index.
    pub fn dims(&self) -> usize {
        self.dims
    }

    /// Number of stored records.
    pub fn len(&self) -> usize {
        self.texts.len()
    }

    /// True iff no records are stored.
    pub fn is_empty(&self) -> bool {
        self.texts.is_empty()
    }

    /// Append a batch of records.
    ///
    /// Requires `vectors`, `texts` and `metadatas` to have equal lengths and
    /// every vector to have [`dims`](Self::dims) components. On error the
    /// index is left exactly as it was.
    pub fn add(
        &mut self,
        vectors: Vec<Vec<f32>>,
        texts: Vec<String>,
        metadatas: Vec<M>,
    ) -> Result<(), IndexError> {
        if vectors.len() != texts.len() || texts.len() != metadatas.len() {
            return Err(IndexError::LengthMismatch {
                vectors: vectors.len(),
                texts: texts.len(),
                metadatas: metadatas.len(),
            });
        }
        if let Some((position, v)) = vectors
            .iter()
            .enumerate()
            .find(|(_, v)| v.len() != self.dims)
        {
            return Err(IndexError::VectorDimension {
                position,
                expected: self.dims,
                actual: v.len(),
            });
        }

        let added = texts.len();
        self.vectors.reserve(added * self.dims);
        for v in &vectors {
            self.vectors.extend_from_slice(v);
        }
        self.texts.extend(texts);
        self.metadatas.extend(metadatas);

        debug!(added, total = self.len(), "vector index grew");
        Ok(())
    }

    /// Return up to `top_k` records nearest to `query`, ascending by squared
    /// L2 distance. Equal distances keep insertion order.
    ///
    /// An empty index (or `top_k == 0`) yields an empty result.
    pub fn search(
        &self,
        query: &[f32],
        top_k: usize,
    ) -> Result<Vec<RetrievalResult<M>>, IndexError> {
        if query.len() != self.dims {
            return Err(IndexError::QueryDimension {
                expected: self.dims,
                actual: query.len(),
            });
        }
        if self.is_empty() || top_k == 0 {
            return Ok(Vec::new());
        }

        let mut scored: Vec<(usize, f32)> = self
            .vectors
            .chunks_exact(self.dims)
            .map(|v| squared_l2(query, v))
            .enumerate()
            .collect();

        let by_distance_then_position =
            |a: &(usize, f32), b: &(usize, f32)| a.1.total_cmp(&b.1).then(a.0.cmp(&b.0));

        let k = top_k.min(scored.len());
        if k < scored.len() {
            scored.select_nth_unstable_by(k - 1, by_distance_then_position);
            scored.truncate(k);
        }
        scored.sort_unstable_by(by_distance_then_position);

        debug!(
            records = self.len(),
            returned = scored.len(),
            best = ?scored.first().map(|(_, d)| *d),
            "vector search"
        );

        Ok(scored
            .into_iter()
            .map(|(i, distance)| RetrievalResult {
                text: self.texts[i].clone(),
                metadata: self.metadatas[i].clone(),
                distance,
            })
            .collect())
    }
}
