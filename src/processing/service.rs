//! Service coordinating extraction, chunking, embedding, indexing, and answer synthesis.

use crate::{
    config::Config,
    document::{DocumentLoader, PageText, PdfLoader, stage_upload},
    embedding::{EmbeddingClient, build_embedding_client},
    generation::{ChatClient, build_chat_client},
    index::{IndexHandle, VectorIndex},
    metrics::{MetricsSnapshot, ServiceMetrics},
    processing::{
        chunking::TextSplitter,
        prompt::{build_context, build_prompt},
        types::{Answer, AskError, InitError, SourceRef, UploadError, UploadOutcome},
    },
};
use async_trait::async_trait;
use sha2::{Digest, Sha256};
use std::sync::Arc;
use uuid::Uuid;

/// Tunables for the pipeline that do not belong to a provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PipelineSettings {
    /// Maximum chunk length in characters.
    pub chunk_size: usize,
    /// Characters repeated between adjacent chunks.
    pub chunk_overlap: usize,
    /// Chunks retrieved per question.
    pub top_k: usize,
    /// Upper bound on chunks per uploaded document.
    pub max_chunks_per_document: usize,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            chunk_size: 500,
            chunk_overlap: 50,
            top_k: 3,
            max_chunks_per_document: 10_000,
        }
    }
}

impl PipelineSettings {
    /// Extract pipeline settings from the runtime configuration.
    pub fn from_config(config: &Config) -> Self {
        Self {
            chunk_size: config.text_splitter_chunk_size,
            chunk_overlap: config.text_splitter_chunk_overlap,
            top_k: config.retrieval_top_k,
            max_chunks_per_document: config.max_chunks_per_document,
        }
    }
}

/// Abstraction over the pipeline used by the HTTP surface.
#[async_trait]
pub trait RagApi: Send + Sync {
    /// Extract, chunk, embed, and index an uploaded PDF, replacing the live index on success.
    async fn upload_document(&self, bytes: Vec<u8>) -> Result<UploadOutcome, UploadError>;

    /// Answer `question` from the live index.
    async fn ask(&self, question: &str) -> Result<Answer, AskError>;

    /// Whether a document has been indexed.
    async fn is_ready(&self) -> bool;

    /// Retrieve the current metrics snapshot for diagnostics.
    fn metrics_snapshot(&self) -> MetricsSnapshot;
}

/// Owns the provider clients and the live index.
///
/// Construct once near process start and share through an `Arc`. Uploads build a complete new
/// index before touching the live one, so a failed upload leaves the previous document
/// answerable.
pub struct RagService {
    loader: Arc<dyn DocumentLoader>,
    embedding_client: Box<dyn EmbeddingClient>,
    chat_client: Box<dyn ChatClient>,
    splitter: TextSplitter,
    settings: PipelineSettings,
    index: IndexHandle,
    metrics: ServiceMetrics,
}

impl RagService {
    /// Build the service with the PDF loader and the providers described by `config`.
    pub fn new(config: &Config) -> Result<Self, InitError> {
        tracing::info!("Initializing provider clients");
        let embedding_client = build_embedding_client(config)?;
        let chat_client = build_chat_client(config)?;
        tracing::info!(
            embedding_provider = ?config.embedding_provider,
            chat_model = %config.chat_model,
            "Provider clients initialized"
        );
        Self::from_parts(
            Arc::new(PdfLoader),
            embedding_client,
            chat_client,
            PipelineSettings::from_config(config),
        )
    }

    /// Assemble the service from explicit components.
    pub fn from_parts(
        loader: Arc<dyn DocumentLoader>,
        embedding_client: Box<dyn EmbeddingClient>,
        chat_client: Box<dyn ChatClient>,
        settings: PipelineSettings,
    ) -> Result<Self, InitError> {
        if settings.top_k == 0 {
            return Err(InitError::InvalidTopK);
        }
        let splitter = TextSplitter::new(settings.chunk_size, settings.chunk_overlap)?;
        Ok(Self {
            loader,
            embedding_client,
            chat_client,
            splitter,
            settings,
            index: IndexHandle::new(),
            metrics: ServiceMetrics::new(),
        })
    }

    /// Extract, chunk, embed, and index a document, then swap it in as the live index.
    pub async fn upload_document(&self, bytes: Vec<u8>) -> Result<UploadOutcome, UploadError> {
        tracing::info!(bytes = bytes.len(), "Processing upload");
        match self.build_index(bytes).await {
            Ok((index, outcome)) => {
                let replaced = self.index.replace(index).await;
                self.metrics.record_document(outcome.chunks as u64);
                tracing::info!(
                    document_id = %outcome.document_id,
                    pages = outcome.pages,
                    chunks = outcome.chunks,
                    digest = %outcome.digest,
                    replaced_previous = replaced.is_some(),
                    "Document indexed"
                );
                Ok(outcome)
            }
            Err(error) => {
                self.metrics.record_failed_upload();
                tracing::warn!(error = %error, "Upload failed; live index unchanged");
                Err(error)
            }
        }
    }

    async fn build_index(
        &self,
        bytes: Vec<u8>,
    ) -> Result<(VectorIndex, UploadOutcome), UploadError> {
        let digest = hex::encode(Sha256::digest(&bytes));
        let pages = self.extract_pages(bytes).await?;

        let chunks = self.splitter.split_pages(&pages);
        tracing::debug!(
            pages = pages.len(),
            chunks = chunks.len(),
            chunk_size = self.splitter.chunk_size(),
            overlap = self.splitter.overlap(),
            "Split document"
        );
        if chunks.is_empty() {
            return Err(crate::document::ExtractionError::NoText.into());
        }
        if chunks.len() > self.settings.max_chunks_per_document {
            return Err(UploadError::TooManyChunks {
                count: chunks.len(),
                limit: self.settings.max_chunks_per_document,
            });
        }

        let texts: Vec<String> = chunks.iter().map(|chunk| chunk.text.clone()).collect();
        let vectors = self.embedding_client.generate_embeddings(texts).await?;
        let index = VectorIndex::build(chunks, vectors)?;

        let outcome = UploadOutcome {
            document_id: Uuid::new_v4().to_string(),
            pages: pages.len(),
            chunks: index.len(),
            digest,
        };
        Ok((index, outcome))
    }

    async fn extract_pages(&self, bytes: Vec<u8>) -> Result<Vec<PageText>, UploadError> {
        let loader = Arc::clone(&self.loader);
        tokio::task::spawn_blocking(move || -> Result<Vec<PageText>, UploadError> {
            let staged = stage_upload(&bytes)?;
            let pages = loader.load(staged.path())?;
            Ok(pages)
        })
        .await
        .map_err(|error| UploadError::Task(error.to_string()))?
    }

    /// Answer a question using the live index.
    ///
    /// Returns [`AskError::NoIndex`] without contacting any provider when nothing is indexed.
    pub async fn ask(&self, question: &str) -> Result<Answer, AskError> {
        let result = self.answer(question).await;
        match &result {
            Ok(answer) => {
                self.metrics.record_answer();
                tracing::info!(sources = answer.sources.len(), "Question answered");
            }
            Err(AskError::NoIndex) => {
                self.metrics.record_failed_question();
                tracing::debug!("Question received before any upload");
            }
            Err(error) => {
                self.metrics.record_failed_question();
                tracing::warn!(error = %error, "Question failed");
            }
        }
        result
    }

    async fn answer(&self, question: &str) -> Result<Answer, AskError> {
        let index = self.index.current().await.ok_or(AskError::NoIndex)?;
        if question.trim().is_empty() {
            return Err(AskError::EmptyQuestion);
        }

        let mut vectors = self
            .embedding_client
            .generate_embeddings(vec![question.to_string()])
            .await?;
        let vector = vectors.pop().ok_or(AskError::EmptyEmbedding)?;

        let hits = index.search(&vector, self.settings.top_k)?;
        tracing::debug!(
            retrieved = hits.len(),
            top_score = hits.first().map(|hit| hit.score),
            "Retrieved context"
        );

        let context = build_context(&hits);
        let prompt = build_prompt(&context, question);
        let text = self.chat_client.complete(&prompt).await?;

        Ok(Answer {
            text,
            sources: hits
                .iter()
                .map(|hit| SourceRef {
                    page: hit.chunk.page,
                    ordinal: hit.chunk.ordinal,
                    score: hit.score,
                })
                .collect(),
        })
    }

    /// Whether a document has been indexed.
    pub async fn is_ready(&self) -> bool {
        self.index.is_ready().await
    }

    /// Return the current metrics snapshot.
    pub fn metrics_snapshot(&self) -> MetricsSnapshot {
        self.metrics.snapshot()
    }
}

#[async_trait]
impl RagApi for RagService {
    async fn upload_document(&self, bytes: Vec<u8>) -> Result<UploadOutcome, UploadError> {
        RagService::upload_document(self, bytes).await
    }

    async fn ask(&self, question: &str) -> Result<Answer, AskError> {
        RagService::ask(self, question).await
    }

    async fn is_ready(&self) -> bool {
        RagService::is_ready(self).await
    }

    fn metrics_snapshot(&self) -> MetricsSnapshot {
        RagService::metrics_snapshot(self)
    }
}
