use super::AppState;
use crate::error::ExerciseError;
use crate::story::StoryGapRequest;
use axum::{
    body::Bytes,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use serde_json::Value;

fn error_response(err: &ExerciseError) -> Response {
    let status =
        StatusCode::from_u16(err.http_status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    (status, Json(err.to_json())).into_response()
}

/// GET /health
pub(super) async fn handle_health() -> impl IntoResponse {
    Json(serde_json::json!({ "status": "ok" }))
}

/// POST /api/story-gap
///
/// The raw body is parsed here rather than through `Json<T>` so malformed
/// input maps to the `invalid_input` error shape instead of axum's rejection.
pub(super) async fn handle_story_gap(State(state): State<AppState>, body: Bytes) -> Response {
    let payload: Value = match serde_json::from_slice(&body) {
        Ok(payload) => payload,
        Err(e) => {
            tracing::debug!(error = %e, "rejecting malformed story gap body");
            return error_response(&ExerciseError::InvalidInput);
        }
    };

    let request = match StoryGapRequest::from_payload(&payload) {
        Ok(request) => request,
        Err(e) => return error_response(&e),
    };

    match state.pipeline.run(&request).await {
        Ok(exercise) => (StatusCode::OK, Json(exercise)).into_response(),
        Err(e) => {
            tracing::warn!(code = e.code(), error = %e, "story gap request failed");
            error_response(&e)
        }
    }
}
