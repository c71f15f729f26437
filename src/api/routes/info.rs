//! Metadata probe handler.

use super::{InfoRequest, InfoResponse};
use crate::api::AppState;
use axum::{
    Json,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
};

/// POST /api/info - Fetch title, duration and available formats without downloading
#[utoipa::path(
    post,
    path = "/api/info",
    tag = "info",
    request_body = InfoRequest,
    responses(
        (status = 200, description = "Media metadata", body = InfoResponse),
        (status = 400, description = "URL is missing or empty", body = crate::error::ApiError),
        (status = 502, description = "The source could not be probed", body = crate::error::ApiError)
    )
)]
pub async fn video_info(
    State(state): State<AppState>,
    Json(request): Json<InfoRequest>,
) -> Response {
    let url = request.url.trim().to_string();

    match state.orchestrator.probe(&url).await {
        Ok(info) => (StatusCode::OK, Json(InfoResponse::new(info, url))).into_response(),
        Err(e) => {
            tracing::warn!(url = %url, error = %e, "Metadata probe failed");
            e.into_response()
        }
    }
}
