//! Document pipeline: chunking, embedding, indexing, and grounded answering.

pub mod chunking;
pub mod prompt;
mod service;
pub mod types;

pub use chunking::{Chunk, TextSplitter};
pub use service::{PipelineSettings, RagApi, RagService};
pub use types::{
    Answer, AskError, ChunkingError, InitError, SourceRef, UploadError, UploadOutcome,
};
