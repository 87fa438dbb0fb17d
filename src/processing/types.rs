//! Core data types and error definitions for the upload and question pipelines.

use crate::{
    document::ExtractionError, embedding::EmbeddingClientError,
    generation::GenerationClientError, index::IndexError,
};
use serde::Serialize;
use thiserror::Error;

/// Errors produced while turning page text into chunks.
#[derive(Debug, Error)]
pub enum ChunkingError {
    /// Ingestion configured an impossible chunk budget.
    #[error("chunk size must be greater than zero")]
    InvalidChunkSize,
    /// Overlap would leave no room for new text in a chunk.
    #[error("chunk overlap {overlap} must be smaller than chunk size {chunk_size}")]
    OverlapTooLarge {
        /// Requested overlap in characters.
        overlap: usize,
        /// Requested chunk size in characters.
        chunk_size: usize,
    },
}

/// Errors raised while assembling the service at startup.
#[derive(Debug, Error)]
pub enum InitError {
    /// Splitter settings were rejected.
    #[error(transparent)]
    Chunking(#[from] ChunkingError),
    /// Retrieval depth was zero.
    #[error("retrieval top_k must be greater than zero")]
    InvalidTopK,
    /// Embedding client could not be constructed.
    #[error("Failed to initialize embedding client: {0}")]
    Embedding(#[from] EmbeddingClientError),
    /// Chat client could not be constructed.
    #[error("Failed to initialize chat client: {0}")]
    Generation(#[from] GenerationClientError),
}

/// Errors emitted by the upload pipeline. Any of them leaves the live index untouched.
#[derive(Debug, Error)]
pub enum UploadError {
    /// Uploaded bytes could not be read from the request.
    #[error("Failed to read upload: {0}")]
    Read(String),
    /// Uploaded bytes could not be written to temporary storage.
    #[error("Failed to stage upload: {0}")]
    Storage(#[from] std::io::Error),
    /// Text extraction failed.
    #[error(transparent)]
    Extraction(#[from] ExtractionError),
    /// Document produced more chunks than allowed.
    #[error("Document produced {count} chunks, limit is {limit}")]
    TooManyChunks {
        /// Chunks produced by the splitter.
        count: usize,
        /// Configured maximum.
        limit: usize,
    },
    /// Embedding provider failed to produce vectors for the chunks.
    #[error("Failed to generate embeddings: {0}")]
    Embedding(#[from] EmbeddingClientError),
    /// Vectors returned by the provider could not form an index.
    #[error("Failed to build index: {0}")]
    Index(#[from] IndexError),
    /// Blocking extraction task panicked or was cancelled.
    #[error("Extraction task failed: {0}")]
    Task(String),
}

/// Errors emitted while answering a question.
#[derive(Debug, Error)]
pub enum AskError {
    /// No document has been indexed yet.
    #[error("Upload a document first")]
    NoIndex,
    /// Question text was blank.
    #[error("Question must not be empty")]
    EmptyQuestion,
    /// Embedding provider failed to embed the question.
    #[error("Failed to embed question: {0}")]
    Embedding(#[from] EmbeddingClientError),
    /// Embedding provider returned no vector for the question.
    #[error("Embedding provider returned no vector for the question")]
    EmptyEmbedding,
    /// Question vector did not match the index.
    #[error("Failed to search index: {0}")]
    Index(#[from] IndexError),
    /// Chat model failed to produce an answer.
    #[error("Failed to generate answer: {0}")]
    Generation(#[from] GenerationClientError),
}

/// Summary of a successful upload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UploadOutcome {
    /// Identifier assigned to the indexed document.
    pub document_id: String,
    /// Number of pages extracted.
    pub pages: usize,
    /// Number of chunks in the new index.
    pub chunks: usize,
    /// Hex-encoded SHA-256 digest of the uploaded bytes.
    pub digest: String,
}

/// Retrieved chunk reference returned alongside an answer.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SourceRef {
    /// 1-based page of the chunk.
    pub page: u32,
    /// Chunk position in the document.
    pub ordinal: usize,
    /// Cosine similarity to the question.
    pub score: f32,
}

/// Answer synthesized for a question.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Answer {
    /// Raw model response.
    pub text: String,
    /// Chunks used as context, in rank order.
    pub sources: Vec<SourceRef>,
}
