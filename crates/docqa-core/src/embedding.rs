//! Embedding provider trait and vector utilities.
//!
//! Defines the [`Embedder`] trait that all embedding backends implement,
//! plus the distance function used by the vector index.
//!
//! Concrete providers (OpenAI, Ollama, fastembed) live in the `docqa`
//! app crate.

use anyhow::{anyhow, Result};
use async_trait::async_trait;

/// Trait for embedding providers.
///
/// Every vector an implementation returns must have exactly [`dims`](Embedder::dims)
/// components. Failures are surfaced to the caller; the core never retries.
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Returns the model identifier (e.g. `"all-mpnet-base-v2"`).
    fn model_name(&self) -> &str;

    /// Returns the embedding vector dimensionality (e.g. `768`).
    fn dims(&self) -> usize;

    /// Embed a batch of texts, returning one vector per input in input order.
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;

    /// Embed a single text (e.g. a question).
    async fn embed_one(&self, text: &str) -> Result<Vec<f32>> {
        self.embed(&[text.to_string()])
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| anyhow!("Empty embedding response"))
    }
}

/// Squared Euclidean (L2) distance between two vectors.
///
/// ```text
/// d(a, b) = Σ (aᵢ - bᵢ)²
/// ```
///
/// Callers must pass vectors of equal length; extra components of the
/// longer vector are ignored.
///
/// # Example
///
/// ```rust
/// use docqa_core::embedding::squared_l2;
///
/// assert_eq!(squared_l2(&[0.0, 0.0], &[1.0, 1.0]), 2.0);
/// ```
pub fn squared_l2(a: &[f32], b: &[f32]) -> f32 {
    a.iter()
        .zip(b.iter())
        .map(|(x, y)| {
            let d = x - y;
            d * d
        })
        .sum()
}
