//! Error types for media-dl
//!
//! This module provides error handling for the library, including:
//! - The job error taxonomy (invalid input, remote rejections, output resolution)
//! - HTTP status code mapping for API integration
//! - Structured error responses with machine-readable error codes

use crate::resolver::ResolutionDiagnostic;
use crate::types::{JobId, JobStatus};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;
use utoipa::ToSchema;

/// Result type alias for media-dl operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for media-dl
///
/// Errors raised inside a job task never reach the submitter directly; they are
/// captured into the job's terminal progress record. The variants still carry enough
/// context for the API layer to map them onto HTTP responses.
#[derive(Debug, Error)]
pub enum Error {
    /// Caller supplied an unusable request (e.g. an empty URL)
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// No progress record exists for this job
    #[error("job {0} not found")]
    JobNotFound(JobId),

    /// Job exists but has not reached the state the operation needs
    #[error("job {id} is {status}, not completed")]
    NotReady {
        /// The job that was asked for
        id: JobId,
        /// Its current status
        status: JobStatus,
    },

    /// The job completed but its output is no longer on disk
    #[error("output of job {id} is gone from {}", path.display())]
    FileGone {
        /// The job whose file disappeared
        id: JobId,
        /// Where the file used to be
        path: PathBuf,
    },

    /// Raw failure reported by the extraction engine, not yet classified
    #[error("{0}")]
    Engine(String),

    /// Remote source kept rejecting us as automated traffic
    #[error("{message}")]
    TransientRemoteRejection {
        /// Original engine error text
        message: String,
        /// Number of attempts made before giving up
        attempts: u32,
    },

    /// Remote source (or engine) failed in a way retrying cannot fix
    #[error("{0}")]
    FatalRemoteError(String),

    /// Engine reported success but no output file could be located
    #[error("download completed but file not found: {0}")]
    OutputNotFound(Box<ResolutionDiagnostic>),

    /// The located output file is empty
    #[error("downloaded file is empty: {}", path.display())]
    EmptyOutput {
        /// The zero-length file
        path: PathBuf,
    },

    /// Job was cancelled before it finished
    #[error("download cancelled")]
    Cancelled,

    /// Shutdown in progress - not accepting new jobs
    #[error("shutdown in progress: not accepting new downloads")]
    ShuttingDown,

    /// Configuration error with context about which setting is invalid
    #[error("configuration error: {message}")]
    Config {
        /// Human-readable error message describing the configuration issue
        message: String,
        /// The configuration key that caused the error (e.g., "retry.max_attempts")
        key: Option<String>,
    },

    /// Database operation failed
    #[error("database error: {0}")]
    Database(#[from] DatabaseError),

    /// SQLx database error
    #[error("database error: {0}")]
    Sqlx(#[from] sqlx::Error),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// External tool could not be found or started (yt-dlp)
    #[error("external tool error: {0}")]
    ExternalTool(String),

    /// API server error
    #[error("API server error: {0}")]
    ApiServerError(String),
}

impl Error {
    /// The originating error text, without any wrapping added by this crate.
    ///
    /// This is what ends up in a failed job's `error` field.
    pub fn origin_message(&self) -> String {
        match self {
            Error::Engine(message)
            | Error::FatalRemoteError(message)
            | Error::TransientRemoteRejection { message, .. } => message.clone(),
            other => other.to_string(),
        }
    }
}

/// Database-related errors
#[derive(Debug, Error)]
pub enum DatabaseError {
    /// Failed to connect to database
    #[error("failed to connect to database: {0}")]
    ConnectionFailed(String),

    /// Failed to run migrations
    #[error("failed to run migrations: {0}")]
    MigrationFailed(String),

    /// Query failed
    #[error("query failed: {0}")]
    QueryFailed(String),
}

/// API error response format
///
/// This structure is returned by API endpoints when an error occurs.
///
/// # Example JSON Response
///
/// ```json
/// {
///   "error": {
///     "code": "job_not_found",
///     "message": "job 5f0c... not found",
///     "details": {
///       "job_id": "5f0c..."
///     }
///   }
/// }
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ApiError {
    /// The error details
    pub error: ErrorDetail,
}

/// Detailed error information for API responses
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ErrorDetail {
    /// Machine-readable error code (e.g., "job_not_found", "invalid_input")
    pub code: String,

    /// Human-readable error message
    pub message: String,

    /// Optional additional context about the error
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl ApiError {
    /// Create a new API error with code and message
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            error: ErrorDetail {
                code: code.into(),
                message: message.into(),
                details: None,
            },
        }
    }

    /// Create a "validation error" error
    pub fn validation(message: impl Into<String>) -> Self {
        Self::new("validation_error", message)
    }

    /// Create an "internal server error"
    pub fn internal(message: impl Into<String>) -> Self {
        Self::new("internal_error", message)
    }
}

/// Convert errors to HTTP status codes for API responses
pub trait ToHttpStatus {
    /// Get the HTTP status code for this error
    fn status_code(&self) -> u16;

    /// Get the machine-readable error code
    fn error_code(&self) -> &str;
}

impl ToHttpStatus for Error {
    fn status_code(&self) -> u16 {
        match self {
            // 400 Bad Request
            Error::InvalidInput(_) => 400,
            Error::Config { .. } => 400,

            // 404 Not Found
            Error::JobNotFound(_) => 404,
            Error::FileGone { .. } => 404,

            // 409 Conflict - job not in the right state
            Error::NotReady { .. } => 409,
            Error::Cancelled => 409,

            // 422 Unprocessable Entity - job ran but produced nothing usable
            Error::OutputNotFound(_) => 422,
            Error::EmptyOutput { .. } => 422,

            // 502 Bad Gateway - remote source / engine failures
            Error::Engine(_) => 502,
            Error::TransientRemoteRejection { .. } => 502,
            Error::FatalRemoteError(_) => 502,

            // 503 Service Unavailable
            Error::ShuttingDown => 503,
            Error::ExternalTool(_) => 503,

            // 500 Internal Server Error
            Error::Database(_) => 500,
            Error::Sqlx(_) => 500,
            Error::Io(_) => 500,
            Error::Serialization(_) => 500,
            Error::ApiServerError(_) => 500,
        }
    }

    fn error_code(&self) -> &str {
        match self {
            Error::InvalidInput(_) => "invalid_input",
            Error::JobNotFound(_) => "job_not_found",
            Error::NotReady { .. } => "not_ready",
            Error::FileGone { .. } => "file_not_found",
            Error::Engine(_) => "engine_error",
            Error::TransientRemoteRejection { .. } => "remote_rejection",
            Error::FatalRemoteError(_) => "remote_error",
            Error::OutputNotFound(_) => "output_not_found",
            Error::EmptyOutput { .. } => "empty_output",
            Error::Cancelled => "cancelled",
            Error::ShuttingDown => "shutting_down",
            Error::Config { .. } => "config_error",
            Error::Database(_) => "database_error",
            Error::Sqlx(_) => "database_error",
            Error::Io(_) => "io_error",
            Error::Serialization(_) => "serialization_error",
            Error::ExternalTool(_) => "external_tool_error",
            Error::ApiServerError(_) => "api_server_error",
        }
    }
}

impl From<Error> for ApiError {
    fn from(error: Error) -> Self {
        let code = error.error_code().to_string();
        let message = error.to_string();

        let details = match &error {
            Error::JobNotFound(id) => Some(serde_json::json!({
                "job_id": id,
            })),
            Error::NotReady { id, status } => Some(serde_json::json!({
                "job_id": id,
                "status": status,
            })),
            Error::FileGone { id, path } => Some(serde_json::json!({
                "job_id": id,
                "path": path,
            })),
            Error::TransientRemoteRejection { attempts, .. } => Some(serde_json::json!({
                "attempts": attempts,
            })),
            Error::OutputNotFound(diagnostic) => serde_json::to_value(diagnostic.as_ref()).ok(),
            Error::EmptyOutput { path } => Some(serde_json::json!({
                "path": path,
            })),
            Error::Config { key: Some(key), .. } => Some(serde_json::json!({
                "key": key,
            })),
            _ => None,
        };

        ApiError {
            error: ErrorDetail {
                code,
                message,
                details,
            },
        }
    }
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    fn all_error_variants() -> Vec<(Error, u16, &'static str)> {
        let id = JobId::new();
        vec![
            (Error::InvalidInput("URL is required".into()), 400, "invalid_input"),
            (
                Error::Config {
                    message: "must be at least 1".into(),
                    key: Some("retry.max_attempts".into()),
                },
                400,
                "config_error",
            ),
            (Error::JobNotFound(id), 404, "job_not_found"),
            (
                Error::FileGone {
                    id,
                    path: PathBuf::from("/tmp/gone.mp4"),
                },
                404,
                "file_not_found",
            ),
            (
                Error::NotReady {
                    id,
                    status: JobStatus::Downloading,
                },
                409,
                "not_ready",
            ),
            (Error::Cancelled, 409, "cancelled"),
            (
                Error::OutputNotFound(Box::new(ResolutionDiagnostic::default())),
                422,
                "output_not_found",
            ),
            (
                Error::EmptyOutput {
                    path: PathBuf::from("/tmp/empty.mp4"),
                },
                422,
                "empty_output",
            ),
            (Error::Engine("HTTP Error 403".into()), 502, "engine_error"),
            (
                Error::TransientRemoteRejection {
                    message: "Sign in to confirm you're not a bot".into(),
                    attempts: 3,
                },
                502,
                "remote_rejection",
            ),
            (
                Error::FatalRemoteError("Video unavailable".into()),
                502,
                "remote_error",
            ),
            (Error::ShuttingDown, 503, "shutting_down"),
            (
                Error::ExternalTool("yt-dlp not found".into()),
                503,
                "external_tool_error",
            ),
            (
                Error::Database(DatabaseError::QueryFailed("locked".into())),
                500,
                "database_error",
            ),
            (
                Error::Io(std::io::Error::new(std::io::ErrorKind::Other, "disk")),
                500,
                "io_error",
            ),
            (Error::ApiServerError("bind failed".into()), 500, "api_server_error"),
        ]
    }

    #[test]
    fn every_variant_maps_to_expected_status_and_code() {
        for (error, status, code) in all_error_variants() {
            assert_eq!(error.status_code(), status, "status for {error:?}");
            assert_eq!(error.error_code(), code, "code for {error:?}");
        }
    }

    #[test]
    fn origin_message_strips_wrapping_for_remote_errors() {
        let bot = Error::TransientRemoteRejection {
            message: "ERROR: Sign in to confirm you're not a bot".into(),
            attempts: 3,
        };
        assert_eq!(
            bot.origin_message(),
            "ERROR: Sign in to confirm you're not a bot"
        );

        let fatal = Error::FatalRemoteError("Private video".into());
        assert_eq!(fatal.origin_message(), "Private video");

        assert_eq!(Error::Cancelled.origin_message(), "download cancelled");
    }

    #[test]
    fn api_error_from_job_not_found_has_job_id() {
        let id = JobId::new();
        let api_error: ApiError = Error::JobNotFound(id).into();

        assert_eq!(api_error.error.code, "job_not_found");
        let details = api_error.error.details.unwrap();
        assert_eq!(details["job_id"], id.to_string());
    }

    #[test]
    fn api_error_from_not_ready_has_status() {
        let api_error: ApiError = Error::NotReady {
            id: JobId::new(),
            status: JobStatus::Finished,
        }
        .into();

        let details = api_error.error.details.unwrap();
        assert_eq!(details["status"], "finished");
    }

    #[test]
    fn api_error_from_output_not_found_carries_diagnostic() {
        let diagnostic = ResolutionDiagnostic {
            target_dir: PathBuf::from("/srv/downloads"),
            entries: vec!["notes.txt".into()],
            writable: true,
            hinted_path: Some(PathBuf::from("/srv/downloads/clip.mp4")),
        };
        let api_error: ApiError = Error::OutputNotFound(Box::new(diagnostic)).into();

        let details = api_error.error.details.unwrap();
        assert_eq!(details["entries"][0], "notes.txt");
        assert_eq!(details["writable"], true);
    }

    #[test]
    fn api_error_from_io_has_no_details() {
        let api_error: ApiError =
            Error::Io(std::io::Error::new(std::io::ErrorKind::Other, "boom")).into();
        assert!(api_error.error.details.is_none());
    }

    #[test]
    fn api_error_without_details_omits_details_in_json() {
        let json = serde_json::to_value(ApiError::validation("URL is required")).unwrap();
        assert_eq!(json["error"]["code"], "validation_error");
        assert!(json["error"].get("details").is_none());
    }
}
