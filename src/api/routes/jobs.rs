//! Job handlers: submit, poll, cancel, fetch the output file.

use super::{DownloadRequest, DownloadResponse};
use crate::api::AppState;
use crate::types::{FormatChoice, JobId};
use axum::{
    Json,
    body::Body,
    extract::{Path, State},
    http::{StatusCode, header},
    response::{IntoResponse, Response},
};
use serde_json::json;
use tokio_util::io::ReaderStream;

/// POST /download - Submit a download job
#[utoipa::path(
    post,
    path = "/download",
    tag = "jobs",
    request_body = DownloadRequest,
    responses(
        (status = 200, description = "Job accepted", body = DownloadResponse),
        (status = 400, description = "URL is missing or empty", body = crate::error::ApiError),
        (status = 503, description = "Shutting down", body = crate::error::ApiError)
    )
)]
pub async fn start_download(
    State(state): State<AppState>,
    Json(request): Json<DownloadRequest>,
) -> Response {
    let format = request
        .format
        .as_deref()
        .map(FormatChoice::from_label)
        .unwrap_or_default();

    match state.orchestrator.submit(&request.url, format).await {
        Ok(handle) => (
            StatusCode::OK,
            Json(DownloadResponse {
                download_id: handle.id,
            }),
        )
            .into_response(),
        Err(e) => e.into_response(),
    }
}

/// GET /progress/:id - Poll a job's progress record
#[utoipa::path(
    get,
    path = "/progress/{id}",
    tag = "jobs",
    params(
        ("id" = String, Path, description = "Job ID")
    ),
    responses(
        (status = 200, description = "Current progress record", body = crate::types::ProgressRecord),
        (status = 404, description = "Unknown job, body is {\"status\": \"not_found\"}")
    )
)]
pub async fn get_progress(State(state): State<AppState>, Path(id): Path<String>) -> Response {
    let record = match id.parse::<JobId>() {
        Ok(id) => state.orchestrator.progress(id).await.ok(),
        Err(_) => None,
    };

    match record {
        Some(record) => (StatusCode::OK, Json(record)).into_response(),
        None => (StatusCode::NOT_FOUND, Json(json!({"status": "not_found"}))).into_response(),
    }
}

/// POST /jobs/:id/cancel - Cancel a running job
#[utoipa::path(
    post,
    path = "/jobs/{id}/cancel",
    tag = "jobs",
    params(
        ("id" = String, Path, description = "Job ID")
    ),
    responses(
        (status = 202, description = "Cancellation requested"),
        (status = 400, description = "Malformed job ID", body = crate::error::ApiError),
        (status = 404, description = "Unknown job", body = crate::error::ApiError)
    )
)]
pub async fn cancel_job(State(state): State<AppState>, Path(id): Path<String>) -> Response {
    let id = match parse_job_id(&id) {
        Ok(id) => id,
        Err(response) => return response,
    };

    match state.orchestrator.cancel(id).await {
        Ok(()) => (
            StatusCode::ACCEPTED,
            Json(json!({"status": "cancelling", "download_id": id})),
        )
            .into_response(),
        Err(e) => e.into_response(),
    }
}

/// GET /download_file/:id - Stream a completed job's file as an attachment
#[utoipa::path(
    get,
    path = "/download_file/{id}",
    tag = "jobs",
    params(
        ("id" = String, Path, description = "Job ID")
    ),
    responses(
        (status = 200, description = "File contents", content_type = "application/octet-stream"),
        (status = 404, description = "Unknown job or file gone", body = crate::error::ApiError),
        (status = 409, description = "Job not completed", body = crate::error::ApiError)
    )
)]
pub async fn download_file(State(state): State<AppState>, Path(id): Path<String>) -> Response {
    let id = match parse_job_id(&id) {
        Ok(id) => id,
        Err(response) => return response,
    };

    let file = match state.orchestrator.retrieve(id).await {
        Ok(file) => file,
        Err(e) => return e.into_response(),
    };

    let handle = match tokio::fs::File::open(&file.path).await {
        Ok(handle) => handle,
        Err(e) => {
            tracing::warn!(job_id = %id, error = %e, "Failed to open output file");
            return crate::Error::FileGone {
                id,
                path: file.path,
            }
            .into_response();
        }
    };

    let disposition = format!("attachment; filename=\"{}\"", file.filename);
    (
        [
            (header::CONTENT_TYPE, file.content_type.to_string()),
            (header::CONTENT_LENGTH, file.size.to_string()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        Body::from_stream(ReaderStream::new(handle)),
    )
        .into_response()
}

#[allow(clippy::result_large_err)]
fn parse_job_id(raw: &str) -> Result<JobId, Response> {
    raw.parse::<JobId>().map_err(|_| {
        crate::Error::InvalidInput(format!("'{}' is not a valid job id", raw)).into_response()
    })
}
