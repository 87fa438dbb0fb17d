//! HTTP surface for DocuQuery.
//!
//! - `GET /` – Static HTML page (built in, or `HOME_PAGE_PATH`).
//! - `GET /health` – Liveness check, plus whether a document is indexed.
//! - `GET /version` – API version.
//! - `POST /upload` – Multipart upload (field `file`) of a PDF that replaces the live index.
//! - `POST /ask` – Answer `{"question": ...}` from the indexed document.
//! - `GET /metrics` – Upload and question counters.
//!
//! Error bodies are always `{"error": string}`. Asking before any upload keeps status 200 so
//! simple clients only need to look for the `error` field.

use crate::config::Config;
use crate::processing::{AskError, RagApi, SourceRef, UploadError, UploadOutcome};
use axum::{
    Json, Router,
    extract::{
        DefaultBodyLimit, Multipart, State,
        multipart::{MultipartError, MultipartRejection},
        rejection::JsonRejection,
    },
    http::StatusCode,
    response::{Html, IntoResponse, Response},
    routing::{get, post},
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;

/// Version reported by `GET /version`.
pub const API_VERSION: &str = "1.0";

const UPLOAD_MESSAGE: &str = "Document uploaded and indexed successfully";
const UPLOAD_FIELD: &str = "file";
const BUILTIN_HOME_PAGE: &str = include_str!("../static/home.html");

/// Router settings resolved at startup.
#[derive(Debug, Clone)]
pub struct RouterOptions {
    /// Body limit applied to `POST /upload`.
    pub max_upload_bytes: usize,
    /// HTML served at `GET /`.
    pub home_page: Arc<str>,
}

impl Default for RouterOptions {
    fn default() -> Self {
        Self {
            max_upload_bytes: 20 * 1024 * 1024,
            home_page: Arc::from(BUILTIN_HOME_PAGE),
        }
    }
}

impl RouterOptions {
    /// Resolve options from configuration, reading `HOME_PAGE_PATH` when set.
    pub fn from_config(config: &Config) -> std::io::Result<Self> {
        let home_page = match &config.home_page_path {
            Some(path) => {
                tracing::info!(path = %path, "Serving custom home page");
                Arc::from(std::fs::read_to_string(path)?)
            }
            None => Arc::from(BUILTIN_HOME_PAGE),
        };
        Ok(Self {
            max_upload_bytes: config.max_upload_bytes,
            home_page,
        })
    }
}

struct AppState<S> {
    service: Arc<S>,
    home_page: Arc<str>,
}

impl<S> Clone for AppState<S> {
    fn clone(&self) -> Self {
        Self {
            service: Arc::clone(&self.service),
            home_page: Arc::clone(&self.home_page),
        }
    }
}

/// Build the HTTP router around a pipeline implementation.
pub fn create_router<S>(service: Arc<S>, options: RouterOptions) -> Router
where
    S: RagApi + 'static,
{
    let state = AppState {
        service,
        home_page: options.home_page,
    };
    Router::new()
        .route("/", get(home_page::<S>))
        .route("/health", get(health::<S>))
        .route("/version", get(version))
        .route(
            "/upload",
            post(upload_document::<S>).layer(DefaultBodyLimit::max(options.max_upload_bytes)),
        )
        .route("/ask", post(ask_question::<S>))
        .route("/metrics", get(get_metrics::<S>))
        .with_state(state)
}

async fn home_page<S>(State(state): State<AppState<S>>) -> Html<String>
where
    S: RagApi,
{
    Html(state.home_page.to_string())
}

async fn health<S>(State(state): State<AppState<S>>) -> Json<serde_json::Value>
where
    S: RagApi,
{
    let ready = state.service.is_ready().await;
    Json(json!({ "status": "running", "ready": ready }))
}

async fn version() -> Json<serde_json::Value> {
    Json(json!({ "version": API_VERSION }))
}

/// Success response for `POST /upload`.
#[derive(Serialize)]
struct UploadResponse {
    message: &'static str,
    #[serde(flatten)]
    outcome: UploadOutcome,
}

/// Read the `file` field, then extract, chunk, embed, and index it.
async fn upload_document<S>(
    State(state): State<AppState<S>>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<UploadResponse>, AppError>
where
    S: RagApi,
{
    let mut multipart = multipart.map_err(|rejection| AppError {
        status: rejection.status(),
        message: rejection.body_text(),
    })?;
    let bytes = read_upload_field(&mut multipart).await?;
    let outcome = state.service.upload_document(bytes).await?;
    Ok(Json(UploadResponse {
        message: UPLOAD_MESSAGE,
        outcome,
    }))
}

async fn read_upload_field(multipart: &mut Multipart) -> Result<Vec<u8>, AppError> {
    while let Some(field) = multipart.next_field().await.map_err(AppError::from_multipart)? {
        if field.name() == Some(UPLOAD_FIELD) {
            let bytes = field.bytes().await.map_err(AppError::from_multipart)?;
            tracing::debug!(bytes = bytes.len(), "Received upload field");
            return Ok(bytes.to_vec());
        }
    }
    Err(UploadError::Read(format!("multipart field `{UPLOAD_FIELD}` is missing")).into())
}

/// Request body for `POST /ask`.
#[derive(Deserialize)]
struct AskRequest {
    question: String,
}

/// Success response for `POST /ask`.
#[derive(Serialize)]
struct AskResponse {
    answer: String,
    sources: Vec<SourceRef>,
}

async fn ask_question<S>(
    State(state): State<AppState<S>>,
    request: Result<Json<AskRequest>, JsonRejection>,
) -> Result<Json<AskResponse>, AppError>
where
    S: RagApi,
{
    let Json(request) = request.map_err(|rejection| AppError {
        status: rejection.status(),
        message: rejection.body_text(),
    })?;
    let answer = state.service.ask(&request.question).await?;
    Ok(Json(AskResponse {
        answer: answer.text,
        sources: answer.sources,
    }))
}

async fn get_metrics<S>(State(state): State<AppState<S>>) -> impl IntoResponse
where
    S: RagApi,
{
    Json(state.service.metrics_snapshot())
}

/// Handler error rendered as `{"error": message}`.
#[derive(Debug)]
struct AppError {
    status: StatusCode,
    message: String,
}

impl AppError {
    fn from_multipart(error: MultipartError) -> Self {
        let status = error.status();
        let message = if status == StatusCode::PAYLOAD_TOO_LARGE {
            "Uploaded file exceeds the configured size limit".to_string()
        } else {
            UploadError::Read(error.body_text()).to_string()
        };
        Self { status, message }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        if self.status.is_server_error() {
            tracing::error!(status = %self.status, error = %self.message, "Request failed");
        }
        (self.status, Json(json!({ "error": self.message }))).into_response()
    }
}

impl From<UploadError> for AppError {
    fn from(error: UploadError) -> Self {
        let status = match &error {
            UploadError::Read(_) => StatusCode::BAD_REQUEST,
            UploadError::Extraction(_) | UploadError::TooManyChunks { .. } => {
                StatusCode::UNPROCESSABLE_ENTITY
            }
            UploadError::Embedding(_) | UploadError::Index(_) => StatusCode::BAD_GATEWAY,
            UploadError::Storage(_) | UploadError::Task(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        Self {
            status,
            message: error.to_string(),
        }
    }
}

impl From<AskError> for AppError {
    fn from(error: AskError) -> Self {
        let status = match &error {
            AskError::NoIndex => StatusCode::OK,
            AskError::EmptyQuestion => StatusCode::BAD_REQUEST,
            AskError::Embedding(_)
            | AskError::EmptyEmbedding
            | AskError::Index(_)
            | AskError::Generation(_) => StatusCode::BAD_GATEWAY,
        };
        Self {
            status,
            message: error.to_string(),
        }
    }
}
