//! API routes

pub mod documents;
pub mod feedback;
pub mod query;

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};

use crate::server::state::AppState;

/// Build all API routes
pub fn api_routes(max_upload_size: usize) -> Router<AppState> {
    Router::new()
        .route(
            "/documents",
            get(documents::list_documents)
                .post(documents::upload_documents)
                .put(documents::sync_documents)
                .layer(DefaultBodyLimit::max(max_upload_size)),
        )
        .route(
            "/documents/:name",
            get(documents::get_document).delete(documents::delete_document),
        )
        .route("/query", post(query::answer_question))
        .route("/feedback", post(feedback::record_feedback))
        .route("/info", get(info))
}

/// API info endpoint
async fn info() -> axum::Json<serde_json::Value> {
    axum::Json(serde_json::json!({
        "name": "doclens",
        "version": env!("CARGO_PKG_VERSION"),
        "endpoints": {
            "GET /api/documents": "List indexed documents",
            "POST /api/documents": "Upload documents (multipart)",
            "PUT /api/documents": "Replace the document set (multipart, reconciled)",
            "GET /api/documents/:name": "Get document details",
            "DELETE /api/documents/:name": "Delete a document",
            "POST /api/query": "Ask a question",
            "POST /api/feedback": "Record feedback on an answer"
        },
        "languages": ["fr", "en", "es", "ar"]
    }))
}
