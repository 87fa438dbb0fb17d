use serde::Deserialize;
use std::env;
use std::str::FromStr;
use std::sync::OnceLock;
use std::time::Duration;
use thiserror::Error;

use crate::embedding::DEFAULT_EMBEDDING_BATCH_SIZE;

const DEFAULT_OPENAI_BASE_URL: &str = "https://api.openai.com/v1";
const DEFAULT_EMBEDDING_MODEL: &str = "text-embedding-3-small";
const DEFAULT_EMBEDDING_DIMENSION: usize = 1536;
const MAX_EMBEDDING_BATCH_SIZE: usize = 2048;
const DEFAULT_CHAT_MODEL: &str = "gpt-3.5-turbo";
const DEFAULT_CHUNK_SIZE: usize = 500;
const DEFAULT_CHUNK_OVERLAP: usize = 50;
const DEFAULT_TOP_K: usize = 3;
const DEFAULT_MAX_UPLOAD_BYTES: usize = 20 * 1024 * 1024;
const DEFAULT_MAX_CHUNKS_PER_DOCUMENT: usize = 10_000;
const DEFAULT_PROVIDER_TIMEOUT_SECS: u64 = 60;

/// Errors encountered while loading configuration from environment variables.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Required environment variable was not provided.
    #[error("Missing environment variable: {0}")]
    MissingVariable(String),
    /// Environment variable contained a value that could not be parsed.
    #[error("Invalid value for environment variable: {0}")]
    InvalidValue(String),
}

/// Runtime configuration for the DocuQuery server.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Credential sent to the OpenAI-compatible API.
    pub openai_api_key: String,
    /// Base URL of the OpenAI-compatible API (`/embeddings` and `/chat/completions` are appended).
    pub openai_base_url: String,
    /// Embedding provider used to generate vector representations.
    pub embedding_provider: EmbeddingProvider,
    /// Embedding model identifier passed to the provider.
    pub embedding_model: String,
    /// Dimensionality of vectors produced by the local provider.
    pub embedding_dimension: usize,
    /// Inputs per `/embeddings` request; larger documents are sent in several requests.
    pub embedding_batch_size: usize,
    /// Chat-completion model used to synthesize answers.
    pub chat_model: String,
    /// Sampling temperature for the chat model.
    pub chat_temperature: f32,
    /// Maximum chunk length in characters.
    pub text_splitter_chunk_size: usize,
    /// Characters repeated from the previous chunk.
    pub text_splitter_chunk_overlap: usize,
    /// Number of chunks retrieved per question.
    pub retrieval_top_k: usize,
    /// Largest accepted request body for `POST /upload`.
    pub max_upload_bytes: usize,
    /// Upper bound on chunks produced from a single document.
    pub max_chunks_per_document: usize,
    /// Timeout applied to every provider HTTP call.
    pub provider_timeout_secs: u64,
    /// Optional HTML file served at `GET /` instead of the built-in page.
    pub home_page_path: Option<String>,
    /// Optional override for the HTTP server port.
    pub server_port: Option<u16>,
}

/// Supported embedding backends for the indexing pipeline.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EmbeddingProvider {
    /// Hosted OpenAI-compatible embeddings API.
    OpenAI,
    /// Deterministic in-process embedder, useful offline.
    Local,
}

impl Config {
    /// Load configuration from environment variables, performing validation along the way.
    pub fn from_env() -> Result<Self, ConfigError> {
        let config = Self {
            openai_api_key: load_env("OPENAI_API_KEY")?,
            openai_base_url: load_env_optional("OPENAI_BASE_URL")
                .unwrap_or_else(|| DEFAULT_OPENAI_BASE_URL.to_string()),
            embedding_provider: load_env_optional("EMBEDDING_PROVIDER")
                .map(|value| {
                    value
                        .parse()
                        .map_err(|()| ConfigError::InvalidValue("EMBEDDING_PROVIDER".to_string()))
                })
                .transpose()?
                .unwrap_or(EmbeddingProvider::OpenAI),
            embedding_model: load_env_optional("EMBEDDING_MODEL")
                .unwrap_or_else(|| DEFAULT_EMBEDDING_MODEL.to_string()),
            embedding_dimension: load_parsed("EMBEDDING_DIMENSION")?
                .unwrap_or(DEFAULT_EMBEDDING_DIMENSION),
            embedding_batch_size: load_parsed("EMBEDDING_BATCH_SIZE")?
                .unwrap_or(DEFAULT_EMBEDDING_BATCH_SIZE),
            chat_model: load_env_optional("CHAT_MODEL")
                .unwrap_or_else(|| DEFAULT_CHAT_MODEL.to_string()),
            chat_temperature: load_parsed("CHAT_TEMPERATURE")?.unwrap_or(0.0),
            text_splitter_chunk_size: load_parsed("TEXT_SPLITTER_CHUNK_SIZE")?
                .unwrap_or(DEFAULT_CHUNK_SIZE),
            text_splitter_chunk_overlap: load_parsed("TEXT_SPLITTER_CHUNK_OVERLAP")?
                .unwrap_or(DEFAULT_CHUNK_OVERLAP),
            retrieval_top_k: load_parsed("RETRIEVAL_TOP_K")?.unwrap_or(DEFAULT_TOP_K),
            max_upload_bytes: load_parsed("MAX_UPLOAD_BYTES")?.unwrap_or(DEFAULT_MAX_UPLOAD_BYTES),
            max_chunks_per_document: load_parsed("MAX_CHUNKS_PER_DOCUMENT")?
                .unwrap_or(DEFAULT_MAX_CHUNKS_PER_DOCUMENT),
            provider_timeout_secs: load_parsed("PROVIDER_TIMEOUT_SECS")?
                .unwrap_or(DEFAULT_PROVIDER_TIMEOUT_SECS),
            home_page_path: load_env_optional("HOME_PAGE_PATH"),
            server_port: load_parsed("SERVER_PORT")?,
        };
        config.validate()?;
        Ok(config)
    }

    /// Reject combinations that would make the pipeline unusable.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.text_splitter_chunk_size == 0 {
            return Err(ConfigError::InvalidValue(
                "TEXT_SPLITTER_CHUNK_SIZE".to_string(),
            ));
        }
        if self.text_splitter_chunk_overlap >= self.text_splitter_chunk_size {
            return Err(ConfigError::InvalidValue(
                "TEXT_SPLITTER_CHUNK_OVERLAP".to_string(),
            ));
        }
        if self.retrieval_top_k == 0 {
            return Err(ConfigError::InvalidValue("RETRIEVAL_TOP_K".to_string()));
        }
        if self.embedding_batch_size == 0 || self.embedding_batch_size > MAX_EMBEDDING_BATCH_SIZE {
            return Err(ConfigError::InvalidValue("EMBEDDING_BATCH_SIZE".to_string()));
        }
        if self.embedding_dimension == 0 {
            return Err(ConfigError::InvalidValue("EMBEDDING_DIMENSION".to_string()));
        }
        Ok(())
    }

    /// Timeout applied to embedding and chat requests.
    pub fn provider_timeout(&self) -> Duration {
        Duration::from_secs(self.provider_timeout_secs.max(1))
    }
}

fn load_env(key: &str) -> Result<String, ConfigError> {
    load_env_optional(key).ok_or_else(|| ConfigError::MissingVariable(key.to_string()))
}

fn load_env_optional(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn load_parsed<T: FromStr>(key: &str) -> Result<Option<T>, ConfigError> {
    load_env_optional(key)
        .map(|value| {
            value
                .trim()
                .parse()
                .map_err(|_| ConfigError::InvalidValue(key.to_string()))
        })
        .transpose()
}

impl FromStr for EmbeddingProvider {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "openai" => Ok(Self::OpenAI),
            "local" => Ok(Self::Local),
            _ => Err(()),
        }
    }
}

/// Global configuration cache populated during process start.
pub static CONFIG: OnceLock<Config> = OnceLock::new();

/// Retrieve the loaded configuration, panicking if initialization has not occurred.
pub fn get_config() -> &'static Config {
    CONFIG.get().expect("Config not initialized")
}

/// Load configuration from the environment and install it in the global cache.
pub fn init_config() {
    dotenvy::dotenv().ok();
    let config = Config::from_env().expect("Failed to load config from environment");
    tracing::debug!(
        base_url = %config.openai_base_url,
        embedding_provider = ?config.embedding_provider,
        embedding_model = %config.embedding_model,
        chat_model = %config.chat_model,
        chunk_size = config.text_splitter_chunk_size,
        chunk_overlap = config.text_splitter_chunk_overlap,
        top_k = config.retrieval_top_k,
        server_port = ?config.server_port,
        "Loaded configuration"
    );
    CONFIG.set(config).expect("Failed to set config");
}

#[cfg(test)]
pub(crate) fn test_config() -> Config {
    Config {
        openai_api_key: "test-key".into(),
        openai_base_url: "http://127.0.0.1:9".into(),
        embedding_provider: EmbeddingProvider::Local,
        embedding_model: "text-embedding-3-small".into(),
        embedding_dimension: 64,
        embedding_batch_size: DEFAULT_EMBEDDING_BATCH_SIZE,
        chat_model: "gpt-3.5-turbo".into(),
        chat_temperature: 0.0,
        text_splitter_chunk_size: DEFAULT_CHUNK_SIZE,
        text_splitter_chunk_overlap: DEFAULT_CHUNK_OVERLAP,
        retrieval_top_k: DEFAULT_TOP_K,
        max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
        max_chunks_per_document: DEFAULT_MAX_CHUNKS_PER_DOCUMENT,
        provider_timeout_secs: DEFAULT_PROVIDER_TIMEOUT_SECS,
        home_page_path: None,
        server_port: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn embedding_provider_parses_case_insensitively() {
        assert_eq!("OpenAI".parse::<EmbeddingProvider>(), Ok(EmbeddingProvider::OpenAI));
        assert_eq!(" local ".parse::<EmbeddingProvider>(), Ok(EmbeddingProvider::Local));
        assert_eq!("ollama".parse::<EmbeddingProvider>(), Err(()));
    }

    #[test]
    fn validate_rejects_overlap_not_smaller_than_chunk_size() {
        let mut config = test_config();
        config.text_splitter_chunk_overlap = config.text_splitter_chunk_size;
        let error = config.validate().unwrap_err();
        assert!(
            matches!(error, ConfigError::InvalidValue(ref key) if key == "TEXT_SPLITTER_CHUNK_OVERLAP")
        );
    }

    #[test]
    fn validate_rejects_zero_top_k() {
        let mut config = test_config();
        config.retrieval_top_k = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn validate_rejects_batch_size_outside_provider_limit() {
        let mut config = test_config();
        for size in [0, 2049] {
            config.embedding_batch_size = size;
            assert!(
                matches!(config.validate(), Err(ConfigError::InvalidValue(ref key)) if key == "EMBEDDING_BATCH_SIZE"),
                "batch size {size} should be rejected"
            );
        }
        config.embedding_batch_size = 2048;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn validate_accepts_defaults() {
        assert!(test_config().validate().is_ok());
    }

    #[test]
    fn provider_timeout_never_drops_to_zero() {
        let mut config = test_config();
        config.provider_timeout_secs = 0;
        assert_eq!(config.provider_timeout(), Duration::from_secs(1));
    }
}
