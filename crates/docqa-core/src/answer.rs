//! Question answering over a [`VectorIndex`].
//!
//! [`answer_question`] runs the query side of the pipeline:
//!
//! 1. Reject blank questions and empty indexes up front.
//! 2. Embed the question via the caller's [`Embedder`].
//! 3. Retrieve the `top_k` nearest chunks.
//! 4. Apply the retrieval decision policy. On abstain, stop here: no
//!    context is built and the generator is never called.
//! 5. Assemble the bounded context and call the caller's [`Generator`].
//!
//! Upstream failures (embedding or generation) become [`Answer::Failed`]
//! with a user-visible message. Nothing in this module returns `Err`, so an
//! abstention, a failure and a real answer all reach the caller the same way.

use anyhow::Result;
use async_trait::async_trait;
use serde::Serialize;
use tracing::{debug, warn};

use crate::context::build_context;
use crate::embedding::Embedder;
use crate::index::VectorIndex;
use crate::models::{ChunkMetadata, RetrievalResult};
use crate::policy::{decide, Decision, FALLBACK_MESSAGE};

/// Trait for answer-generation backends.
#[async_trait]
pub trait Generator: Send + Sync {
    /// Returns the model identifier (e.g. `"llama-3.1-8b-instant"`).
    fn model_name(&self) -> &str;

    /// Produce an answer to `question` using only `context`.
    async fn generate(&self, question: &str, context: &str) -> Result<String>;
}

/// Retrieval tuning parameters, decoupled from application config.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetrievalParams {
    /// Number of chunks to retrieve.
    pub top_k: usize,
    /// Maximum squared L2 distance of the closest chunk (inclusive).
    pub distance_threshold: f32,
    /// Character budget for the assembled context.
    pub max_context_chars: usize,
}

impl Default for RetrievalParams {
    fn default() -> Self {
        Self {
            top_k: 5,
            distance_threshold: 1.5,
            max_context_chars: 6000,
        }
    }
}

/// The outcome of asking one question.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Answer {
    /// The question was blank.
    EmptyQuestion,
    /// Nothing has been indexed yet.
    NotIndexed,
    /// The closest evidence was too far away.
    Abstained,
    /// An answer generated from the retrieved evidence.
    Generated {
        text: String,
        sources: Vec<RetrievalResult<ChunkMetadata>>,
    },
    /// An upstream collaborator failed; `message` is shown to the user.
    Failed { message: String },
}

impl Answer {
    /// The text to show the user for this outcome.
    pub fn message(&self) -> &str {
        match self {
            Answer::EmptyQuestion => "Please enter a question.",
            Answer::NotIndexed => "Upload and index documents first.",
            Answer::Abstained => FALLBACK_MESSAGE,
            Answer::Generated { text, .. } => text,
            Answer::Failed { message } => message,
        }
    }

    /// Retrieved evidence behind a generated answer (empty otherwise).
    pub fn sources(&self) -> &[RetrievalResult<ChunkMetadata>] {
        match self {
            Answer::Generated { sources, .. } => sources,
            _ => &[],
        }
    }
}

/// Answer `question` from the evidence stored in `index`.
pub async fn answer_question<E, G>(
    index: &VectorIndex<ChunkMetadata>,
    embedder: &E,
    generator: &G,
    question: &str,
    params: &RetrievalParams,
) -> Answer
where
    E: Embedder + ?Sized,
    G: Generator + ?Sized,
{
    let question = question.trim();
    if question.is_empty() {
        return Answer::EmptyQuestion;
    }
    if index.is_empty() {
        return Answer::NotIndexed;
    }

    let query_vec = match embedder.embed_one(question).await {
        Ok(v) => v,
        Err(e) => {
            warn!(model = embedder.model_name(), "query embedding failed: {:#}", e);
            return Answer::Failed {
                message: format!("Embedding error: {:#}", e),
            };
        }
    };

    let results = match index.search(&query_vec, params.top_k) {
        Ok(r) => r,
        Err(e) => {
            warn!(model = embedder.model_name(), "query rejected by index: {}", e);
            return Answer::Failed {
                message: format!("Embedding error: {}", e),
            };
        }
    };

    let sources = match decide(results, params.distance_threshold) {
        Decision::Abstain => return Answer::Abstained,
        Decision::Answerable(results) => results,
    };

    let context = build_context(&sources, params.max_context_chars);
    debug!(
        sources = sources.len(),
        context_chars = context.chars().count(),
        "generating answer"
    );

    match generator.generate(question, &context).await {
        Ok(text) => Answer::Generated {
            text: text.trim().to_string(),
            sources,
        },
        Err(e) => {
            warn!(model = generator.model_name(), "generation failed: {:#}", e);
            Answer::Failed {
                message: format!("Generation error: {:#}", e),
            }
        }
    }
}
