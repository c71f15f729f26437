//! Route handlers for the REST API
//!
//! Handlers are organized by domain:
//! - [`jobs`] - Submitting, polling, cancelling and fetching downloads
//! - [`info`] - Metadata probe
//! - [`history`] - Download history
//! - [`system`] - Health, events, OpenAPI

use crate::engine::{FormatSummary, MediaInfo};
use serde::{Deserialize, Serialize};

mod history;
mod info;
mod jobs;
mod system;

pub use history::*;
pub use info::*;
pub use jobs::*;
pub use system::*;

// ============================================================================
// Query/Request Types (shared across handlers)
// ============================================================================

/// Request body for POST /download
#[derive(Debug, Deserialize, Serialize, utoipa::ToSchema)]
pub struct DownloadRequest {
    /// Media page URL
    #[serde(default)]
    pub url: String,
    /// Format label ("MP3", "720p", "1080p", "4K", "Best Quality"); defaults to Best Quality
    pub format: Option<String>,
}

/// Response for POST /download
#[derive(Debug, Deserialize, Serialize, utoipa::ToSchema)]
pub struct DownloadResponse {
    /// Id to poll with GET /progress/:id
    pub download_id: crate::types::JobId,
}

/// Query parameters for GET /history
#[derive(Debug, Deserialize, Serialize, utoipa::ToSchema)]
pub struct HistoryQuery {
    /// Maximum number of items to return (default: 50)
    pub limit: Option<i64>,
    /// Number of items to skip (default: 0)
    pub offset: Option<i64>,
}

/// Request body for POST /api/info
#[derive(Debug, Deserialize, Serialize, utoipa::ToSchema)]
pub struct InfoRequest {
    /// Media page URL
    #[serde(default)]
    pub url: String,
}

/// Response for POST /api/info
#[derive(Debug, Deserialize, Serialize, utoipa::ToSchema)]
pub struct InfoResponse {
    /// Title
    pub title: String,
    /// Thumbnail URL
    pub thumbnail: String,
    /// Duration in seconds (0 when unknown)
    pub duration: f64,
    /// Uploader name
    pub uploader: String,
    /// View count
    pub view_count: u64,
    /// Description
    pub description: String,
    /// Curated format list, largest first
    pub formats: Vec<FormatSummary>,
    /// The probed URL
    pub url: String,
}

impl InfoResponse {
    pub(crate) fn new(info: MediaInfo, url: String) -> Self {
        Self {
            formats: info.curated_formats(),
            title: info.title,
            thumbnail: info.thumbnail,
            duration: info.duration.unwrap_or(0.0),
            uploader: info.uploader,
            view_count: info.view_count,
            description: info.description,
            url,
        }
    }
}
