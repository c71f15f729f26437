//! Core types for media-dl

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tokio_util::sync::CancellationToken;
use utoipa::ToSchema;
use uuid::Uuid;

/// Unique identifier for a download job
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, ToSchema)]
#[serde(transparent)]
pub struct JobId(pub Uuid);

impl JobId {
    /// Allocate a fresh random identifier
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for JobId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for JobId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for JobId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

/// Requested output format
///
/// Labels match what the web front end sends ("MP3", "720p", ...). Unknown labels fall
/// back to [`FormatChoice::Default`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
pub enum FormatChoice {
    /// Extract audio and convert to MP3
    #[serde(rename = "MP3")]
    Mp3,
    /// Video capped at 720 lines
    #[serde(rename = "720p")]
    P720,
    /// Video capped at 1080 lines
    #[serde(rename = "1080p")]
    P1080,
    /// Video capped at 2160 lines
    #[serde(rename = "4K")]
    P4k,
    /// Best single-file mp4, whatever the resolution
    #[default]
    #[serde(rename = "Best Quality")]
    BestQuality,
    /// Best mp4 video + m4a audio, merged
    #[serde(rename = "default")]
    Default,
}

impl FormatChoice {
    /// Parse a front-end label; anything unrecognized selects [`FormatChoice::Default`].
    pub fn from_label(label: &str) -> Self {
        match label.trim() {
            "MP3" => FormatChoice::Mp3,
            "720p" => FormatChoice::P720,
            "1080p" => FormatChoice::P1080,
            "4K" => FormatChoice::P4k,
            "Best Quality" => FormatChoice::BestQuality,
            _ => FormatChoice::Default,
        }
    }

    /// The label this choice is submitted and stored under
    pub fn label(&self) -> &'static str {
        match self {
            FormatChoice::Mp3 => "MP3",
            FormatChoice::P720 => "720p",
            FormatChoice::P1080 => "1080p",
            FormatChoice::P4k => "4K",
            FormatChoice::BestQuality => "Best Quality",
            FormatChoice::Default => "default",
        }
    }

    /// Whether this choice produces audio only
    pub fn is_audio(&self) -> bool {
        matches!(self, FormatChoice::Mp3)
    }
}

impl std::fmt::Display for FormatChoice {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// A submitted download. Immutable after creation.
#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct Job {
    /// Job identifier
    pub id: JobId,
    /// Source URL
    pub url: String,
    /// Requested format
    pub format: FormatChoice,
    /// When the job was submitted
    pub created_at: DateTime<Utc>,
}

impl Job {
    /// Create a job with a fresh id
    pub fn new(url: impl Into<String>, format: FormatChoice) -> Self {
        Self {
            id: JobId::new(),
            url: url.into(),
            format,
            created_at: Utc::now(),
        }
    }
}

/// Job lifecycle state
///
/// `starting → downloading → finished → completed`, with `error` reachable from any
/// non-terminal state. `completed` and `error` are terminal.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    /// Submitted, waiting for a worker slot
    Starting,
    /// Engine is running (or the job is between retries)
    Downloading,
    /// Engine reported the output written; resolving the file
    Finished,
    /// Output located and ready to retrieve
    Completed,
    /// Job failed
    Error,
}

impl JobStatus {
    /// Whether no further transitions are possible
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Error)
    }

    /// Whether moving from `self` to `next` is a legal transition
    pub fn can_transition_to(&self, next: JobStatus) -> bool {
        use JobStatus::*;
        matches!(
            (self, next),
            (Starting, Starting)
                | (Starting, Downloading)
                | (Starting, Error)
                | (Downloading, Downloading)
                | (Downloading, Finished)
                | (Downloading, Error)
                | (Finished, Finished)
                | (Finished, Completed)
                | (Finished, Error)
        )
    }

    /// Lowercase name as it appears on the wire
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Starting => "starting",
            JobStatus::Downloading => "downloading",
            JobStatus::Finished => "finished",
            JobStatus::Completed => "completed",
            JobStatus::Error => "error",
        }
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Live, pollable state of a job
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct ProgressRecord {
    /// Current state
    pub status: JobStatus,
    /// Percentage complete (0.0 to 100.0)
    pub progress: f32,
    /// Human-readable status line
    pub message: String,
    /// Output file name, once resolved
    pub filename: Option<String>,
    /// Absolute output location, once resolved
    #[schema(value_type = Option<String>)]
    pub filepath: Option<PathBuf>,
    /// Originating error text (terminal `error` state only)
    pub error: Option<String>,
    /// When the record was created
    pub created_at: DateTime<Utc>,
    /// When the record was last written
    pub updated_at: DateTime<Utc>,
}

impl ProgressRecord {
    /// Fresh record for a just-submitted job
    pub fn starting() -> Self {
        let now = Utc::now();
        Self {
            status: JobStatus::Starting,
            progress: 0.0,
            message: "Starting download...".to_string(),
            filename: None,
            filepath: None,
            error: None,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Partial update merged into a [`ProgressRecord`]; `None` fields are left untouched.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ProgressUpdate {
    /// New status
    pub status: Option<JobStatus>,
    /// New progress percentage
    pub progress: Option<f32>,
    /// New message
    pub message: Option<String>,
    /// Resolved file name
    pub filename: Option<String>,
    /// Resolved file path
    pub filepath: Option<PathBuf>,
    /// Terminal error text
    pub error: Option<String>,
}

impl ProgressUpdate {
    /// Update that only replaces the message
    pub fn message(message: impl Into<String>) -> Self {
        Self {
            message: Some(message.into()),
            ..Default::default()
        }
    }

    /// Update that changes status and message together
    pub fn status(status: JobStatus, message: impl Into<String>) -> Self {
        Self {
            status: Some(status),
            message: Some(message.into()),
            ..Default::default()
        }
    }

    /// Set the progress percentage
    pub fn with_progress(mut self, progress: f32) -> Self {
        self.progress = Some(progress);
        self
    }

    /// Terminal failure carrying the originating error text
    pub fn failed(error: impl Into<String>) -> Self {
        let error = error.into();
        Self {
            status: Some(JobStatus::Error),
            message: Some(format!("Download failed: {}", error)),
            error: Some(error),
            ..Default::default()
        }
    }
}

/// Handle returned from a submission: the job id plus a token that cancels it
#[derive(Clone, Debug)]
pub struct JobHandle {
    /// Job identifier
    pub id: JobId,
    cancel: CancellationToken,
}

impl JobHandle {
    pub(crate) fn new(id: JobId, cancel: CancellationToken) -> Self {
        Self { id, cancel }
    }

    /// Request cancellation; the job ends in `error` at its next suspension point
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Whether cancellation has been requested
    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }
}

/// Historical record of a successfully completed job
#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct HistoryEntry {
    /// Row identifier
    pub id: i64,
    /// Job that produced this entry
    pub job_id: JobId,
    /// Source URL
    pub url: String,
    /// Media title (falls back to the file name)
    pub title: String,
    /// Output file name
    pub filename: String,
    /// Requested format
    pub format: FormatChoice,
    /// When the job completed
    pub completed_at: DateTime<Utc>,
}

/// A completed job's file, ready to be streamed to the caller
#[derive(Clone, Debug, Serialize, ToSchema)]
pub struct RetrievedFile {
    /// Location on disk
    #[schema(value_type = String)]
    pub path: PathBuf,
    /// Sanitized base name to present to the client
    pub filename: String,
    /// MIME type derived from the extension
    pub content_type: &'static str,
    /// Size in bytes
    pub size: u64,
}

/// Event emitted during the job lifecycle
#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    /// Job accepted
    Queued {
        /// Job ID
        id: JobId,
        /// Source URL
        url: String,
        /// Requested format
        format: FormatChoice,
    },

    /// Progress update from the engine
    Downloading {
        /// Job ID
        id: JobId,
        /// Progress percentage (0.0 to 100.0)
        percent: f32,
    },

    /// Remote source rejected the attempt; the job will retry
    Retrying {
        /// Job ID
        id: JobId,
        /// The attempt that just failed (1-based)
        attempt: u32,
        /// Wait before the next attempt, in seconds
        delay_secs: u64,
        /// Error text that triggered the retry
        reason: String,
    },

    /// Engine wrote the output; resolution pending
    Finished {
        /// Job ID
        id: JobId,
    },

    /// Output located
    Completed {
        /// Job ID
        id: JobId,
        /// Output file name
        filename: String,
    },

    /// Job failed
    Failed {
        /// Job ID
        id: JobId,
        /// Originating error text
        error: String,
    },

    /// Job cancelled by the caller or by shutdown
    Cancelled {
        /// Job ID
        id: JobId,
    },

    /// Graceful shutdown initiated
    Shutdown,
}

impl Event {
    /// SSE event name
    pub fn kind(&self) -> &'static str {
        match self {
            Event::Queued { .. } => "queued",
            Event::Downloading { .. } => "downloading",
            Event::Retrying { .. } => "retrying",
            Event::Finished { .. } => "finished",
            Event::Completed { .. } => "completed",
            Event::Failed { .. } => "failed",
            Event::Cancelled { .. } => "cancelled",
            Event::Shutdown => "shutdown",
        }
    }
}
