#![deny(missing_docs)]

//! Core library for the DocuQuery document question-answering server.

/// HTTP routing and REST handlers.
pub mod api;
/// Environment-driven configuration management.
pub mod config;
/// PDF staging and per-page text extraction.
pub mod document;
/// Embedding client abstraction and adapters.
pub mod embedding;
/// Chat-completion client used for answer synthesis.
pub mod generation;
/// In-memory vector index and the live index slot.
pub mod index;
/// Structured logging and tracing setup.
pub mod logging;
/// Upload and question metrics helpers.
pub mod metrics;
/// Document pipeline orchestration.
pub mod processing;
