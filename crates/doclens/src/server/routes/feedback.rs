use axum::{extract::State, Json};
use serde::Serialize;

use crate::error::Result;
use crate::server::state::AppState;
use crate::types::AnswerRecord;

#[derive(Debug, Serialize)]
pub struct FeedbackResponse {
    pub id: i64,
}

/// POST /api/feedback
pub async fn record_feedback(
    State(state): State<AppState>,
    Json(record): Json<AnswerRecord>,
) -> Result<Json<FeedbackResponse>> {
    let id = state.session().record_feedback(record).await?;
    Ok(Json(FeedbackResponse { id }))
}
