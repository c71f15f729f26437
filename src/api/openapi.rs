//! OpenAPI documentation and schema generation
//!
//! This module defines the OpenAPI specification for the media-dl REST API
//! using utoipa for compile-time spec generation.

use utoipa::OpenApi;

/// OpenAPI documentation for the media-dl REST API
///
/// The spec can be accessed via:
/// - `/openapi.json` - JSON format OpenAPI specification
/// - `/swagger-ui` - Interactive Swagger UI documentation
#[derive(OpenApi)]
#[openapi(
    info(
        title = "media-dl REST API",
        version = "0.1.0",
        description = "REST API for submitting media downloads, polling their progress and fetching the results",
        license(
            name = "MIT OR Apache-2.0"
        )
    ),
    servers(
        (url = "http://localhost:5000", description = "Local development server")
    ),
    paths(
        // Jobs
        crate::api::routes::start_download,
        crate::api::routes::get_progress,
        crate::api::routes::cancel_job,
        crate::api::routes::download_file,

        // Metadata
        crate::api::routes::video_info,

        // History
        crate::api::routes::get_history,
        crate::api::routes::clear_history,
        crate::api::routes::clear_history_post,

        // System
        crate::api::routes::health_check,
        crate::api::routes::openapi_spec,
        crate::api::routes::event_stream,
    ),
    components(schemas(
        // Core types from types.rs
        crate::types::JobId,
        crate::types::JobStatus,
        crate::types::FormatChoice,
        crate::types::ProgressRecord,
        crate::types::HistoryEntry,
        crate::types::Event,

        // Engine metadata
        crate::engine::FormatSummary,

        // Resolver diagnostics
        crate::resolver::ResolutionDiagnostic,

        // API request/response types
        crate::api::routes::DownloadRequest,
        crate::api::routes::DownloadResponse,
        crate::api::routes::HistoryQuery,
        crate::api::routes::InfoRequest,
        crate::api::routes::InfoResponse,

        // Error types from error.rs
        crate::error::ApiError,
        crate::error::ErrorDetail,
    )),
    tags(
        (name = "jobs", description = "Download jobs - Submit, poll, cancel and fetch the output file"),
        (name = "info", description = "Metadata - Probe a URL for title, duration and formats"),
        (name = "history", description = "Download history - View and clear completed downloads"),
        (name = "system", description = "System endpoints - Health checks, OpenAPI spec, events"),
    )
)]
pub struct ApiDoc;
