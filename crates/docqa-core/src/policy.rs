//! Retrieval decision policy.
//!
//! Gates answer generation on the single closest match: if even the best
//! retrieved chunk is farther than `distance_threshold`, the evidence is
//! judged untrustworthy and the system abstains with [`FALLBACK_MESSAGE`].
//! Otherwise every retrieved result is passed on, not just the closest.

use tracing::debug;

use crate::models::RetrievalResult;

/// The fixed reply used whenever the system declines to answer.
pub const FALLBACK_MESSAGE: &str = "I don't know based on the provided documents.";

/// Outcome of [`decide`].
#[derive(Debug, Clone, PartialEq)]
pub enum Decision<M> {
    /// Evidence is close enough; carries the full result set.
    Answerable(Vec<RetrievalResult<M>>),
    /// Insufficient evidence. Not an error.
    Abstain,
}

impl<M> Decision<M> {
    pub fn is_abstain(&self) -> bool {
        matches!(self, Decision::Abstain)
    }
}

/// Decide whether `results` are trustworthy enough to answer from.
///
/// - No results → [`Decision::Abstain`].
/// - `min(distance) > distance_threshold` → [`Decision::Abstain`].
/// - Otherwise → [`Decision::Answerable`] with all results. The boundary is
///   inclusive: a minimum distance equal to the threshold is answerable.
pub fn decide<M>(results: Vec<RetrievalResult<M>>, distance_threshold: f32) -> Decision<M> {
    if results.is_empty() {
        debug!("no retrieval results, abstaining");
        return Decision::Abstain;
    }

    let min_distance = results
        .iter()
        .map(|r| r.distance)
        .fold(f32::INFINITY, f32::min);

    if min_distance > distance_threshold {
        debug!(min_distance, distance_threshold, "closest match too far, abstaining");
        return Decision::Abstain;
    }

    debug!(
        min_distance,
        distance_threshold,
        results = results.len(),
        "evidence accepted"
    );
    Decision::Answerable(results)
}
