//! History management handlers.

use super::HistoryQuery;
use crate::api::AppState;
use axum::{
    Json,
    extract::{Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use serde_json::json;

/// GET /history - Get download history (with pagination)
#[utoipa::path(
    get,
    path = "/history",
    tag = "history",
    params(
        ("limit" = Option<i64>, Query, description = "Maximum number of items to return"),
        ("offset" = Option<i64>, Query, description = "Number of items to skip")
    ),
    responses(
        (status = 200, description = "Download history, newest first", body = Vec<crate::types::HistoryEntry>),
        (status = 400, description = "Invalid query parameters"),
        (status = 500, description = "Internal server error")
    )
)]
pub async fn get_history(
    State(state): State<AppState>,
    Query(query): Query<HistoryQuery>,
) -> impl IntoResponse {
    let limit = query.limit.unwrap_or(50).clamp(1, 1000) as usize;
    let offset = query.offset.unwrap_or(0).max(0) as usize;

    match state.orchestrator.history(limit, offset).await {
        Ok(entries) => match state.orchestrator.history_count().await {
            Ok(total) => {
                let response = json!({
                    "items": entries,
                    "total": total,
                    "limit": limit,
                    "offset": offset
                });
                (StatusCode::OK, Json(response)).into_response()
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to count history");
                (StatusCode::INTERNAL_SERVER_ERROR, Json(json!({"error": {"code": "database_error", "message": "Failed to count history entries"}}))).into_response()
            }
        },
        Err(e) => {
            tracing::error!(error = %e, "Failed to query history");
            (StatusCode::INTERNAL_SERVER_ERROR, Json(json!({"error": {"code": "database_error", "message": "Failed to retrieve history"}}))).into_response()
        }
    }
}

/// DELETE /history - Clear history
#[utoipa::path(
    delete,
    path = "/history",
    tag = "history",
    responses(
        (status = 200, description = "Number of deleted entries"),
        (status = 500, description = "Internal server error")
    )
)]
pub async fn clear_history(State(state): State<AppState>) -> impl IntoResponse {
    match state.orchestrator.clear_history().await {
        Ok(deleted_count) => (
            StatusCode::OK,
            Json(json!({
                "message": "History cleared successfully",
                "deleted": deleted_count
            })),
        )
            .into_response(),
        Err(e) => {
            tracing::error!(error = %e, "Failed to clear history");
            (StatusCode::INTERNAL_SERVER_ERROR, Json(json!({"error": {"code": "clear_failed", "message": format!("Failed to clear history: {}", e)}}))).into_response()
        }
    }
}

/// POST /clear_history - Clear history (form-friendly alias of DELETE /history)
#[utoipa::path(
    post,
    path = "/clear_history",
    tag = "history",
    responses(
        (status = 200, description = "Number of deleted entries"),
        (status = 500, description = "Internal server error")
    )
)]
pub async fn clear_history_post(state: State<AppState>) -> impl IntoResponse {
    clear_history(state).await
}
