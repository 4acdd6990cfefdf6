//! Error types for the document Q&A pipeline

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

/// Result type alias for pipeline operations
pub type Result<T> = std::result::Result<T, Error>;

/// Pipeline errors
#[derive(Debug, Error)]
pub enum Error {
    /// No loader is registered for the declared file type
    #[error("Unsupported file format: {0}")]
    UnsupportedFormat(String),

    /// A loader recognised the file type but could not extract its content
    #[error("Failed to extract '{filename}': {message}")]
    Extraction { filename: String, message: String },

    /// Invalid chunking / retrieval parameters
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// Embedding backend failed (network, auth, quota, timeout, malformed output)
    #[error("Embedding backend '{backend}' unavailable: {message}")]
    EmbeddingBackendUnavailable { backend: String, message: String },

    /// Vector dimensionality differs from the index's established dimensionality
    #[error("Dimension mismatch: index expects {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    /// Generation backend failed
    #[error("Generation backend '{backend}' unavailable: {message}")]
    GenerationBackendUnavailable { backend: String, message: String },

    /// Generation backend did not answer within the configured time box
    #[error("Generation backend '{backend}' timed out after {seconds}s")]
    GenerationTimeout { backend: String, seconds: u64 },

    /// Configuration file could not be read or parsed
    #[error("Configuration error: {0}")]
    Config(String),

    /// Document not tracked by the session
    #[error("Document not found: {0}")]
    DocumentNotFound(String),

    /// Feedback store error
    #[error("Feedback store error: {0}")]
    Feedback(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// HTTP request error
    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Create an extraction error
    pub fn extraction(filename: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Extraction {
            filename: filename.into(),
            message: message.into(),
        }
    }

    /// Create an embedding backend error
    pub fn embedding(backend: impl Into<String>, message: impl Into<String>) -> Self {
        Self::EmbeddingBackendUnavailable {
            backend: backend.into(),
            message: message.into(),
        }
    }

    /// Create a generation backend error
    pub fn generation(backend: impl Into<String>, message: impl Into<String>) -> Self {
        Self::GenerationBackendUnavailable {
            backend: backend.into(),
            message: message.into(),
        }
    }

    /// Create an invalid configuration error
    pub fn invalid_config(message: impl Into<String>) -> Self {
        Self::InvalidConfiguration(message.into())
    }

    /// Create an internal error
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    /// Errors that abort the ingestion of a single document
    pub fn is_ingestion(&self) -> bool {
        matches!(
            self,
            Self::UnsupportedFormat(_)
                | Self::Extraction { .. }
                | Self::DimensionMismatch { .. }
                | Self::EmbeddingBackendUnavailable { .. }
        )
    }

    /// Errors raised on the query path that must degrade rather than propagate
    pub fn is_query_path(&self) -> bool {
        matches!(
            self,
            Self::EmbeddingBackendUnavailable { .. }
                | Self::GenerationBackendUnavailable { .. }
                | Self::GenerationTimeout { .. }
                | Self::DimensionMismatch { .. }
        )
    }
}

impl From<rusqlite::Error> for Error {
    fn from(err: rusqlite::Error) -> Self {
        Error::Feedback(err.to_string())
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let (status, error_type, message) = match &self {
            Error::UnsupportedFormat(ext) => (
                StatusCode::UNSUPPORTED_MEDIA_TYPE,
                "unsupported_format",
                format!("Unsupported file format: {}", ext),
            ),
            Error::Extraction { filename, message } => (
                StatusCode::UNPROCESSABLE_ENTITY,
                "extraction_error",
                format!("Failed to extract '{}': {}", filename, message),
            ),
            Error::InvalidConfiguration(msg) => {
                (StatusCode::BAD_REQUEST, "invalid_configuration", msg.clone())
            }
            Error::EmbeddingBackendUnavailable { .. } => (
                StatusCode::SERVICE_UNAVAILABLE,
                "embedding_unavailable",
                self.to_string(),
            ),
            Error::DimensionMismatch { .. } => {
                (StatusCode::CONFLICT, "dimension_mismatch", self.to_string())
            }
            Error::GenerationBackendUnavailable { .. } => (
                StatusCode::SERVICE_UNAVAILABLE,
                "generation_unavailable",
                self.to_string(),
            ),
            Error::GenerationTimeout { .. } => {
                (StatusCode::GATEWAY_TIMEOUT, "generation_timeout", self.to_string())
            }
            Error::Config(msg) => (StatusCode::BAD_REQUEST, "config_error", msg.clone()),
            Error::DocumentNotFound(name) => (
                StatusCode::NOT_FOUND,
                "not_found",
                format!("Document not found: {}", name),
            ),
            Error::Feedback(msg) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "feedback_error", msg.clone())
            }
            Error::Io(err) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "io_error",
                err.to_string(),
            ),
            Error::Json(err) => (StatusCode::BAD_REQUEST, "json_error", err.to_string()),
            Error::Http(err) => (StatusCode::BAD_GATEWAY, "http_error", err.to_string()),
            Error::Internal(msg) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "internal_error", msg.clone())
            }
        };

        let body = Json(json!({
            "error": {
                "type": error_type,
                "message": message,
            }
        }));

        (status, body).into_response()
    }
}
