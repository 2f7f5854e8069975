//! # docqa core
//!
//! I/O-free retrieval logic for docqa: data models, the word-window
//! chunker, the exact L2 vector index, context assembly, the retrieval
//! decision policy, and the collaborator traits (`Embedder`, `Generator`).
//!
//! This crate contains no tokio, HTTP, filesystem, or document-format
//! dependencies. Embedding and generation backends are supplied by the
//! caller through the traits in [`embedding`] and [`answer`].
//!
//! # Query flow
//!
//! ```text
//! question ─▶ Embedder::embed_one ─▶ VectorIndex::search ─▶ policy::decide
//!                                                             │
//!                                  Abstain ◀──────────────────┤
//!                                                             ▼
//!                                   context::build_context ─▶ Generator::generate
//! ```

pub mod answer;
pub mod chunk;
pub mod context;
pub mod embedding;
pub mod index;
pub mod models;
pub mod policy;

pub use answer::{answer_question, Answer, Generator, RetrievalParams};
pub use embedding::Embedder;
pub use index::{IndexError, VectorIndex};
pub use models::{Chunk, ChunkMetadata, RetrievalResult};
pub use policy::{decide, Decision, FALLBACK_MESSAGE};
