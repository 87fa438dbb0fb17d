//! Embedding client abstraction and adapters.
//!
//! Two backends exist: the hosted OpenAI-compatible `/embeddings` endpoint, and a deterministic
//! byte-hashing embedder that runs in-process for offline use and tests.

use crate::config::{Config, EmbeddingProvider};
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

/// Errors raised by embedding providers.
#[derive(Debug, Error)]
pub enum EmbeddingClientError {
    /// Nothing to embed.
    #[error("no texts provided")]
    EmptyInput,
    /// Provider could not be reached or the transport failed.
    #[error("Embedding provider unavailable: {0}")]
    ProviderUnavailable(String),
    /// Provider answered with a non-success status.
    #[error("Embedding provider returned {status}: {body}")]
    UnexpectedStatus {
        /// HTTP status returned by the provider.
        status: StatusCode,
        /// Body payload associated with the failing response.
        body: String,
    },
    /// Provider response could not be decoded.
    #[error("Malformed embedding response: {0}")]
    InvalidResponse(String),
    /// Provider returned a different number of vectors than inputs.
    #[error("Embedding provider returned {actual} vectors for {expected} inputs")]
    CountMismatch {
        /// Number of texts submitted.
        expected: usize,
        /// Number of vectors received.
        actual: usize,
    },
    /// Provider was unable to produce embeddings for the supplied input.
    #[error("Failed to generate embeddings: {0}")]
    GenerationFailed(String),
}

/// Interface implemented by embedding backends.
#[async_trait]
pub trait EmbeddingClient: Send + Sync {
    /// Produce an embedding vector for each supplied text, in input order.
    async fn generate_embeddings(
        &self,
        texts: Vec<String>,
    ) -> Result<Vec<Vec<f32>>, EmbeddingClientError>;
}

/// Inputs sent per `/embeddings` request unless configured otherwise.
pub const DEFAULT_EMBEDDING_BATCH_SIZE: usize = 1000;

/// Client for the OpenAI-compatible `/embeddings` endpoint.
///
/// Texts are sent in consecutive batches of at most `batch_size` inputs. Vectors come back in
/// input order, and a failed batch fails the whole call.
pub struct OpenAiEmbeddingClient {
    http: Client,
    base_url: String,
    api_key: String,
    model: String,
    batch_size: usize,
}

#[derive(Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: &'a [String],
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Deserialize)]
struct EmbeddingData {
    #[serde(default)]
    index: Option<usize>,
    embedding: Vec<f32>,
}

impl OpenAiEmbeddingClient {
    /// Build a client against `base_url` (for example `https://api.openai.com/v1`).
    pub fn new(
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        model: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, EmbeddingClientError> {
        let http = Client::builder()
            .user_agent("docuquery/embeddings")
            .timeout(timeout)
            .build()
            .map_err(|error| EmbeddingClientError::ProviderUnavailable(error.to_string()))?;
        Ok(Self {
            http,
            base_url: base_url.into(),
            api_key: api_key.into(),
            model: model.into(),
            batch_size: DEFAULT_EMBEDDING_BATCH_SIZE,
        })
    }

    /// Cap the number of inputs per request. Zero is treated as one.
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    fn endpoint(&self) -> String {
        format!("{}/embeddings", self.base_url.trim_end_matches('/'))
    }

    async fn embed_batch(&self, batch: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingClientError> {
        let expected = batch.len();
        let response = self
            .http
            .post(self.endpoint())
            .bearer_auth(&self.api_key)
            .json(&EmbeddingRequest {
                model: &self.model,
                input: batch,
            })
            .send()
            .await
            .map_err(|error| {
                EmbeddingClientError::ProviderUnavailable(format!(
                    "failed to reach {}: {error}",
                    self.endpoint()
                ))
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            tracing::warn!(%status, inputs = expected, "Embedding request rejected");
            return Err(EmbeddingClientError::UnexpectedStatus { status, body });
        }

        let body: EmbeddingResponse = response
            .json()
            .await
            .map_err(|error| EmbeddingClientError::InvalidResponse(error.to_string()))?;

        let mut data = body.data;
        if data.len() != expected {
            return Err(EmbeddingClientError::CountMismatch {
                expected,
                actual: data.len(),
            });
        }
        // `index` is relative to the batch; order by it when present.
        if data.iter().all(|item| item.index.is_some()) {
            data.sort_by_key(|item| item.index);
        }

        Ok(data.into_iter().map(|item| item.embedding).collect())
    }
}

#[async_trait]
impl EmbeddingClient for OpenAiEmbeddingClient {
    async fn generate_embeddings(
        &self,
        texts: Vec<String>,
    ) -> Result<Vec<Vec<f32>>, EmbeddingClientError> {
        if texts.is_empty() {
            return Err(EmbeddingClientError::EmptyInput);
        }
        let batches = texts.len().div_ceil(self.batch_size);
        tracing::debug!(
            model = %self.model,
            inputs = texts.len(),
            batches,
            "Requesting embeddings"
        );

        let mut vectors = Vec::with_capacity(texts.len());
        for batch in texts.chunks(self.batch_size) {
            vectors.extend(self.embed_batch(batch).await?);
        }
        Ok(vectors)
    }
}

/// Deterministic in-process embedder that hashes bytes into a normalized vector.
pub struct LocalEmbeddingClient {
    dimension: usize,
}

impl LocalEmbeddingClient {
    /// Construct a local embedder producing vectors of `dimension` entries.
    pub const fn new(dimension: usize) -> Self {
        Self { dimension }
    }

    fn encode(text: &str, dimension: usize) -> Vec<f32> {
        let mut embedding = vec![0.0_f32; dimension];

        if text.is_empty() {
            return embedding;
        }

        for (idx, byte) in text.bytes().enumerate() {
            let position = idx % dimension;
            embedding[position] += f32::from(byte) / 255.0;
        }

        let norm = embedding
            .iter()
            .map(|value| value * value)
            .sum::<f32>()
            .sqrt();

        if norm > 0.0 {
            for value in &mut embedding {
                *value /= norm;
            }
        }

        embedding
    }
}

#[async_trait]
impl EmbeddingClient for LocalEmbeddingClient {
    async fn generate_embeddings(
        &self,
        texts: Vec<String>,
    ) -> Result<Vec<Vec<f32>>, EmbeddingClientError> {
        if self.dimension == 0 {
            return Err(EmbeddingClientError::GenerationFailed(
                "embedding dimension must be greater than zero".to_string(),
            ));
        }
        if texts.is_empty() {
            return Err(EmbeddingClientError::EmptyInput);
        }

        Ok(texts
            .iter()
            .map(|text| Self::encode(text, self.dimension))
            .collect())
    }
}

/// Build an embedding client suitable for the supplied configuration.
pub fn build_embedding_client(
    config: &Config,
) -> Result<Box<dyn EmbeddingClient>, EmbeddingClientError> {
    match config.embedding_provider {
        EmbeddingProvider::OpenAI => Ok(Box::new(OpenAiEmbeddingClient::new(
            config.openai_base_url.clone(),
            config.openai_api_key.clone(),
            config.embedding_model.clone(),
            config.provider_timeout(),
        )?
        .with_batch_size(config.embedding_batch_size))),
        EmbeddingProvider::Local => Ok(Box::new(LocalEmbeddingClient::new(
            config.embedding_dimension,
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::{Method::POST, MockServer};
    use serde_json::json;

    fn client_for(server: &MockServer) -> OpenAiEmbeddingClient {
        OpenAiEmbeddingClient::new(
            server.base_url(),
            "sk-test",
            "text-embedding-3-small",
            Duration::from_secs(5),
        )
        .expect("client")
    }

    #[tokio::test]
    async fn openai_client_batches_inputs_and_orders_by_index() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/embeddings")
                    .header("authorization", "Bearer sk-test")
                    .json_body(json!({
                        "model": "text-embedding-3-small",
                        "input": ["alpha", "beta"]
                    }));
                then.status(200).json_body(json!({
                    "object": "list",
                    "data": [
                        { "object": "embedding", "index": 1, "embedding": [0.0, 1.0] },
                        { "object": "embedding", "index": 0, "embedding": [1.0, 0.0] }
                    ]
                }));
            })
            .await;

        let vectors = client_for(&server)
            .generate_embeddings(vec!["alpha".into(), "beta".into()])
            .await
            .expect("embeddings");

        mock.assert_async().await;
        assert_eq!(vectors, vec![vec![1.0, 0.0], vec![0.0, 1.0]]);
    }

    #[tokio::test]
    async fn openai_client_splits_large_inputs_into_ordered_batches() {
        let server = MockServer::start_async().await;
        let mut mocks = Vec::new();
        for (inputs, first) in [(vec!["t0", "t1"], 0.0), (vec!["t2", "t3"], 2.0), (vec!["t4"], 4.0)] {
            let data: Vec<_> = (0..inputs.len())
                .map(|offset| json!({ "index": offset, "embedding": [first + offset as f32] }))
                .collect();
            let body = json!({ "model": "text-embedding-3-small", "input": inputs });
            mocks.push(
                server
                    .mock_async(|when, then| {
                        when.method(POST).path("/embeddings").json_body(body);
                        then.status(200).json_body(json!({ "data": data }));
                    })
                    .await,
            );
        }

        let texts = (0..5).map(|i| format!("t{i}")).collect();
        let vectors = client_for(&server)
            .with_batch_size(2)
            .generate_embeddings(texts)
            .await
            .expect("embeddings");

        for mock in &mocks {
            mock.assert_hits_async(1).await;
        }
        assert_eq!(
            vectors,
            vec![vec![0.0], vec![1.0], vec![2.0], vec![3.0], vec![4.0]]
        );
    }

    #[tokio::test]
    async fn openai_client_fails_whole_call_when_a_later_batch_fails() {
        let server = MockServer::start_async().await;
        let first = server
            .mock_async(|when, then| {
                when.method(POST).path("/embeddings").body_contains("\"first\"");
                then.status(200).json_body(json!({
                    "data": [{ "index": 0, "embedding": [1.0] }]
                }));
            })
            .await;
        let second = server
            .mock_async(|when, then| {
                when.method(POST).path("/embeddings").body_contains("\"second\"");
                then.status(429).body("rate limited");
            })
            .await;

        let error = client_for(&server)
            .with_batch_size(1)
            .generate_embeddings(vec!["first".into(), "second".into()])
            .await
            .expect_err("second batch fails");

        first.assert_hits_async(1).await;
        second.assert_hits_async(1).await;
        assert!(matches!(
            error,
            EmbeddingClientError::UnexpectedStatus { status, .. }
                if status == StatusCode::TOO_MANY_REQUESTS
        ));
    }

    #[tokio::test]
    async fn openai_client_surfaces_error_status() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/embeddings");
                then.status(401).body("invalid api key");
            })
            .await;

        let error = client_for(&server)
            .generate_embeddings(vec!["alpha".into()])
            .await
            .expect_err("unauthorized");

        assert!(matches!(
            error,
            EmbeddingClientError::UnexpectedStatus { status, ref body }
                if status == StatusCode::UNAUTHORIZED && body.contains("invalid api key")
        ));
    }

    #[tokio::test]
    async fn openai_client_rejects_short_responses() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/embeddings");
                then.status(200).json_body(json!({
                    "data": [{ "index": 0, "embedding": [1.0] }]
                }));
            })
            .await;

        let error = client_for(&server)
            .generate_embeddings(vec!["alpha".into(), "beta".into()])
            .await
            .expect_err("count mismatch");

        assert!(matches!(
            error,
            EmbeddingClientError::CountMismatch {
                expected: 2,
                actual: 1
            }
        ));
    }

    #[tokio::test]
    async fn openai_client_skips_request_for_empty_input() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(POST).path("/embeddings");
                then.status(200).json_body(json!({ "data": [] }));
            })
            .await;

        let error = client_for(&server)
            .generate_embeddings(Vec::new())
            .await
            .expect_err("empty input");

        assert!(matches!(error, EmbeddingClientError::EmptyInput));
        mock.assert_hits_async(0).await;
    }

    #[tokio::test]
    async fn local_client_is_deterministic_and_normalized() {
        let client = LocalEmbeddingClient::new(16);
        let first = client
            .generate_embeddings(vec!["same text".into(), "other".into()])
            .await
            .expect("vectors");
        let second = client
            .generate_embeddings(vec!["same text".into()])
            .await
            .expect("vectors");

        assert_eq!(first.len(), 2);
        assert_eq!(first[0], second[0]);
        assert_eq!(first[0].len(), 16);
        let norm: f32 = first[0].iter().map(|v| v * v).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-5);
    }

    #[tokio::test]
    async fn local_client_rejects_zero_dimension() {
        let error = LocalEmbeddingClient::new(0)
            .generate_embeddings(vec!["text".into()])
            .await
            .expect_err("zero dimension");
        assert!(matches!(error, EmbeddingClientError::GenerationFailed(_)));
    }
}
