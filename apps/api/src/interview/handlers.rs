use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;

use crate::errors::AppError;
use crate::interview::grading::SessionSummary;
use crate::interview::service::TurnResponse;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct TurnRequest {
    pub session_id: Option<String>,
    pub user_id: String,
    pub message: String,
}

/// POST /api/v1/interview/turns
pub async fn handle_turn(
    State(state): State<AppState>,
    Json(req): Json<TurnRequest>,
) -> Result<Json<TurnResponse>, AppError> {
    let response = state
        .interview
        .process_turn(req.session_id, &req.user_id, &req.message)
        .await?;
    Ok(Json(response))
}

/// GET /api/v1/interview/sessions/:id/summary
pub async fn handle_get_summary(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> Result<Json<SessionSummary>, AppError> {
    let summary = state.interview.get_summary(&session_id).await?;
    Ok(Json(summary))
}

/// DELETE /api/v1/interview/sessions/:id
pub async fn handle_close_session(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> Result<StatusCode, AppError> {
    state.interview.close_session(&session_id)?;
    Ok(StatusCode::NO_CONTENT)
}
