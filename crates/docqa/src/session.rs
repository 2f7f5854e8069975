//! One user's question-answering session.
//!
//! A [`Session`] owns the vector index built from the documents indexed so
//! far, plus the embedder and generator used to index and answer. Sessions
//! are independent values; nothing is shared between them.

use std::collections::BTreeSet;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use docqa_core::chunk::chunk_document;
use docqa_core::{
    answer_question, Answer, Embedder, Generator, IndexError, RetrievalParams, VectorIndex,
};
use serde::Serialize;
use sha2::{Digest, Sha256};
use thiserror::Error;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::config::Config;
use crate::extract::{extract_text, ExtractError};

/// A document as uploaded: its display name and raw bytes.
#[derive(Debug, Clone)]
pub struct SourceFile {
    pub name: String,
    pub bytes: Vec<u8>,
}

impl SourceFile {
    pub fn new(name: impl Into<String>, bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            name: name.into(),
            bytes: bytes.into(),
        }
    }
}

/// Summary of a successfully indexed document.
#[derive(Debug, Clone, Serialize)]
pub struct IndexedDocument {
    pub name: String,
    /// SHA-256 of the uploaded bytes, lowercase hex.
    pub digest: String,
    pub chunks: usize,
    pub indexed_at: DateTime<Utc>,
}

/// Why a single document was not indexed.
#[derive(Debug, Error)]
pub enum IngestError {
    #[error("{name}: {source}")]
    Read {
        name: String,
        #[source]
        source: std::io::Error,
    },
    #[error("{name}: {source}")]
    Extract {
        name: String,
        #[source]
        source: ExtractError,
    },
    #[error("{name}: no extractable text")]
    EmptyText { name: String },
    #[error("{name}: embedding failed: {message}")]
    Embedding { name: String, message: String },
    #[error("{name}: {source}")]
    Index {
        name: String,
        #[source]
        source: IndexError,
    },
}

impl IngestError {
    pub fn file_name(&self) -> &str {
        match self {
            IngestError::Read { name, .. }
            | IngestError::Extract { name, .. }
            | IngestError::EmptyText { name }
            | IngestError::Embedding { name, .. }
            | IngestError::Index { name, .. } => name,
        }
    }
}

pub struct Session {
    id: Uuid,
    created_at: DateTime<Utc>,
    config: Config,
    embedder: Arc<dyn Embedder>,
    generator: Arc<dyn Generator>,
    index: VectorIndex,
    documents: Vec<IndexedDocument>,
}

impl Session {
    /// Fails only when the embedder reports a zero dimension.
    pub fn new(
        config: Config,
        embedder: Arc<dyn Embedder>,
        generator: Arc<dyn Generator>,
    ) -> Result<Self, IndexError> {
        let index = VectorIndex::new(embedder.dims())?;
        let session = Self {
            id: Uuid::new_v4(),
            created_at: Utc::now(),
            config,
            embedder,
            generator,
            index,
            documents: Vec::new(),
        };
        debug!(
            session = %session.id,
            embedder = session.embedder.model_name(),
            generator = session.generator.model_name(),
            dims = session.index.dims(),
            "session created"
        );
        Ok(session)
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn index(&self) -> &VectorIndex {
        &self.index
    }

    pub fn documents(&self) -> &[IndexedDocument] {
        &self.documents
    }

    /// Distinct names of indexed documents, sorted.
    pub fn indexed_files(&self) -> Vec<String> {
        self.documents
            .iter()
            .map(|d| d.name.clone())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    /// Index each file independently; one bad file never affects the others.
    pub async fn index_files(
        &mut self,
        files: &[SourceFile],
    ) -> Vec<Result<IndexedDocument, IngestError>> {
        let mut outcomes = Vec::with_capacity(files.len());
        for file in files {
            outcomes.push(self.index_file(file).await);
        }
        outcomes
    }

    /// Index one file, logging the outcome.
    pub async fn index_file(&mut self, file: &SourceFile) -> Result<IndexedDocument, IngestError> {
        let outcome = self.embed_and_add(file).await;
        match &outcome {
            Ok(doc) => info!(file = %doc.name, chunks = doc.chunks, "indexed"),
            Err(e) => warn!("skipped {}", e),
        }
        outcome
    }

    async fn embed_and_add(&mut self, file: &SourceFile) -> Result<IndexedDocument, IngestError> {
        let name = file.name.clone();
        let text = extract_text(&file.bytes, &name).map_err(|source| IngestError::Extract {
            name: name.clone(),
            source,
        })?;
        if text.trim().is_empty() {
            return Err(IngestError::EmptyText { name });
        }

        let digest = format!("{:x}", Sha256::digest(&file.bytes));
        if self.documents.iter().any(|d| d.digest == digest) {
            info!(file = %name, %digest, "identical content already indexed; indexing again");
        }

        let chunking = &self.config.chunking;
        let chunks = chunk_document(&name, &text, chunking.chunk_size, chunking.overlap);

        let mut vectors = Vec::with_capacity(chunks.len());
        for batch in chunks.chunks(self.config.embedding.batch_size.max(1)) {
            let texts: Vec<String> = batch.iter().map(|c| c.text.clone()).collect();
            let embedded = self
                .embedder
                .embed(&texts)
                .await
                .map_err(|e| IngestError::Embedding {
                    name: name.clone(),
                    message: format!("{:#}", e),
                })?;
            if embedded.len() != texts.len() {
                return Err(IngestError::Embedding {
                    name,
                    message: format!(
                        "sent {} texts, got {} vectors",
                        texts.len(),
                        embedded.len()
                    ),
                });
            }
            vectors.extend(embedded);
        }

        let texts = chunks.iter().map(|c| c.text.clone()).collect();
        let metadatas = chunks.iter().map(|c| c.metadata()).collect();
        self.index
            .add(vectors, texts, metadatas)
            .map_err(|source| IngestError::Index {
                name: name.clone(),
                source,
            })?;

        let doc = IndexedDocument {
            name,
            digest,
            chunks: chunks.len(),
            indexed_at: Utc::now(),
        };
        self.documents.push(doc.clone());
        Ok(doc)
    }

    /// Answer with the configured retrieval parameters.
    pub async fn ask(&self, question: &str) -> Answer {
        let params = self.config.retrieval.params();
        self.ask_with(question, &params).await
    }

    pub async fn ask_with(&self, question: &str, params: &RetrievalParams) -> Answer {
        answer_question(
            &self.index,
            self.embedder.as_ref(),
            self.generator.as_ref(),
            question,
            params,
        )
        .await
    }
}
