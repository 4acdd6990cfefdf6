//! Question answering endpoint

use axum::{extract::State, Json};

use crate::server::state::AppState;
use crate::types::{QueryRequest, QueryResponse};

/// POST /api/query
///
/// Always answers 200: backend failures come back as a degraded message
/// in the requested language.
pub async fn answer_question(
    State(state): State<AppState>,
    Json(request): Json<QueryRequest>,
) -> Json<QueryResponse> {
    let k = request.k.unwrap_or(state.config().retrieval.default_k);
    tracing::info!("Query ({}, k={}): {}", request.lang, k, request.question);

    let answer = state
        .session()
        .answer_question(&request.question, request.lang, k)
        .await;

    Json(QueryResponse {
        answer,
        lang: request.lang,
    })
}
