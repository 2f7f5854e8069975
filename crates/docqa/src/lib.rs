//! # docqa
//!
//! **Grounded question answering over your own documents.**
//!
//! Documents are extracted to plain text, split into overlapping word
//! windows, embedded, and stored in an in-memory exact L2 index owned by a
//! [`session::Session`]. A question is embedded the same way; when the
//! nearest chunk is close enough, the retrieved chunks become the only
//! context a chat model may answer from. Otherwise the session abstains
//! with a fixed "I don't know" message and the model is never called.
//!
//! ```text
//! files ─▶ extract ─▶ chunk ─▶ embed ─▶ VectorIndex
//!                                          │
//! question ─▶ embed ─▶ search ─▶ decide ───┴─▶ context ─▶ generate
//! ```
//!
//! The retrieval logic itself lives in `docqa-core`, which has no I/O.
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing and validation |
//! | [`logging`] | `tracing` subscriber setup |
//! | [`extract`] | Plain-text extraction for pdf, txt, md, csv and docx |
//! | [`embedding`] | OpenAI, Ollama and local (fastembed) embedders |
//! | [`generate`] | OpenAI-compatible chat-completions generator |
//! | [`session`] | Per-user index, batch indexing and question answering |
//! | [`ingest`] | File collection and the `index` command |
//! | [`ask`] | The `ask` and `chat` commands |

pub mod ask;
pub mod config;
pub mod embedding;
pub mod extract;
pub mod generate;
pub mod ingest;
pub mod logging;
pub mod session;

pub use session::{IndexedDocument, IngestError, Session, SourceFile};
