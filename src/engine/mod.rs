//! Extraction engine boundary
//!
//! The network fetch, demuxing and transcoding are done by an external engine
//! (`yt-dlp` in production). This module defines the narrow trait the rest of the crate
//! talks to, the options built for each attempt, and the [`EngineAdapter`] that relays
//! engine callbacks into the progress store.

pub mod adapter;
pub mod options;
pub mod ytdlp;

pub use adapter::EngineAdapter;
pub use options::{EngineOptions, Site};
pub use ytdlp::YtDlpEngine;

use crate::error::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tokio::sync::mpsc;
use utoipa::ToSchema;

/// Phase reported by an engine callback
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EngineStatus {
    /// Bytes are still arriving
    Downloading,
    /// A stream (or the whole output) has been written
    Finished,
}

/// One progress callback from the engine
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct EngineProgress {
    /// Current phase
    pub status: EngineStatus,
    /// Bytes written so far for the current stream
    pub downloaded_bytes: u64,
    /// Exact size of the current stream, when known
    pub total_bytes: Option<u64>,
    /// Estimated size of the current stream
    pub total_bytes_estimate: Option<u64>,
    /// File the engine is writing (or has written)
    pub filename: Option<PathBuf>,
}

impl EngineProgress {
    /// A `downloading` callback
    pub fn downloading(downloaded_bytes: u64, total_bytes: Option<u64>) -> Self {
        Self {
            status: EngineStatus::Downloading,
            downloaded_bytes,
            total_bytes,
            total_bytes_estimate: None,
            filename: None,
        }
    }

    /// A `finished` callback naming the written file
    pub fn finished(filename: Option<PathBuf>) -> Self {
        Self {
            status: EngineStatus::Finished,
            downloaded_bytes: 0,
            total_bytes: None,
            total_bytes_estimate: None,
            filename,
        }
    }

    /// Size to measure progress against: the exact total, else the estimate
    pub fn total(&self) -> Option<u64> {
        self.total_bytes
            .or(self.total_bytes_estimate)
            .filter(|total| *total > 0)
    }

    /// Percentage complete, capped at 100, when a total is known
    pub fn percent(&self) -> Option<f32> {
        self.total()
            .map(|total| ((self.downloaded_bytes as f64 / total as f64) * 100.0).min(100.0) as f32)
    }
}

/// Everything the engine needs for one download attempt
#[derive(Clone, Debug)]
pub struct EngineRequest {
    /// Source URL
    pub url: String,
    /// Options built for this attempt
    pub options: EngineOptions,
}

/// Metadata about a remote media item
#[derive(Clone, Debug, Default, Serialize, Deserialize, ToSchema)]
pub struct MediaInfo {
    /// Title
    pub title: String,
    /// Thumbnail URL
    pub thumbnail: String,
    /// Duration in seconds
    pub duration: Option<f64>,
    /// Uploader name
    pub uploader: String,
    /// View count
    pub view_count: u64,
    /// Description
    pub description: String,
    /// Formats the source offers
    pub formats: Vec<FormatInfo>,
}

/// One format offered by the source
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct FormatInfo {
    /// Engine format identifier
    pub format_id: String,
    /// Container extension
    pub ext: String,
    /// Video height in pixels
    pub height: Option<u32>,
    /// Video codec ("none" for audio-only)
    pub vcodec: Option<String>,
    /// Audio codec ("none" for video-only)
    pub acodec: Option<String>,
    /// Size in bytes (exact or approximate)
    pub filesize: Option<u64>,
    /// Free-form note ("720p", "medium", ...)
    pub format_note: Option<String>,
}

/// Entry of the short format list shown to users before they pick a [`FormatChoice`](crate::types::FormatChoice)
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct FormatSummary {
    /// Display label ("1080p", "Audio", "MP3", ...)
    pub format_note: String,
    /// Container extension
    pub ext: String,
    /// Size in bytes, 0 when unknown
    pub filesize: u64,
}

impl MediaInfo {
    /// Build from the engine's JSON metadata dump
    pub fn from_json(json: &serde_json::Value) -> Self {
        let str_field = |key: &str, fallback: &str| {
            json.get(key)
                .and_then(|v| v.as_str())
                .unwrap_or(fallback)
                .to_string()
        };

        let formats = json
            .get("formats")
            .and_then(|v| v.as_array())
            .map(|formats| formats.iter().filter_map(FormatInfo::from_json).collect())
            .unwrap_or_default();

        Self {
            title: str_field("title", "Unknown Title"),
            thumbnail: str_field("thumbnail", ""),
            duration: json.get("duration").and_then(|v| v.as_f64()),
            uploader: str_field("uploader", "Unknown Uploader"),
            view_count: json.get("view_count").and_then(|v| v.as_u64()).unwrap_or(0),
            description: str_field("description", ""),
            formats,
        }
    }

    /// Status line shown once metadata is known, e.g. `Found: Title... (3:07)`
    pub fn found_message(&self) -> String {
        let title: String = self.title.chars().take(50).collect();
        let duration = match self.duration {
            Some(secs) if secs >= 1.0 => {
                let secs = secs as u64;
                format!("{}:{:02}", secs / 60, secs % 60)
            }
            _ => "Unknown".to_string(),
        };
        format!("Found: {}... ({})", title, duration)
    }

    /// Short list of mp4/webm/mp3 formats, topped up with the common 1080p, 720p and MP3
    /// choices, largest first
    pub fn curated_formats(&self) -> Vec<FormatSummary> {
        let mut formats: Vec<FormatSummary> = self
            .formats
            .iter()
            .filter(|f| matches!(f.ext.as_str(), "mp4" | "webm" | "mp3"))
            .filter(|f| f.height.is_some() || f.acodec.as_deref() != Some("none"))
            .map(|f| FormatSummary {
                format_note: match f.height {
                    Some(height) => f
                        .format_note
                        .clone()
                        .filter(|note| !note.is_empty())
                        .unwrap_or_else(|| format!("{}p", height)),
                    None => "Audio".to_string(),
                },
                ext: f.ext.clone(),
                filesize: f.filesize.unwrap_or(0),
            })
            .collect();

        let has = |formats: &[FormatSummary], ext: &str, note: Option<&str>| {
            formats
                .iter()
                .any(|f| f.ext == ext && note.is_none_or(|n| f.format_note.contains(n)))
        };
        for (note, ext, match_note) in [
            ("1080p", "mp4", Some("1080p")),
            ("720p", "mp4", Some("720p")),
            ("MP3", "mp3", None),
        ] {
            if !has(&formats, ext, match_note) {
                formats.push(FormatSummary {
                    format_note: note.to_string(),
                    ext: ext.to_string(),
                    filesize: 0,
                });
            }
        }

        formats.sort_by(|a, b| b.filesize.cmp(&a.filesize));
        formats
    }
}

impl FormatInfo {
    fn from_json(json: &serde_json::Value) -> Option<Self> {
        let text = |key: &str| json.get(key).and_then(|v| v.as_str()).map(String::from);
        Some(Self {
            format_id: text("format_id")?,
            ext: text("ext").unwrap_or_default(),
            height: json.get("height").and_then(|v| v.as_u64()).map(|h| h as u32),
            vcodec: text("vcodec"),
            acodec: text("acodec"),
            filesize: json
                .get("filesize")
                .and_then(|v| v.as_u64())
                .or_else(|| json.get("filesize_approx").and_then(|v| v.as_u64())),
            format_note: text("format_note"),
        })
    }
}

/// An external media extraction engine
///
/// Implementations must report progress through `progress` as bytes arrive and return
/// `Err(Error::Engine(text))` with the engine's own error text on failure; the retry
/// policy classifies that text.
#[async_trait]
pub trait ExtractionEngine: Send + Sync {
    /// Engine name for logs
    fn name(&self) -> &str;

    /// Fetch metadata without downloading
    async fn probe(&self, url: &str, options: &EngineOptions) -> Result<MediaInfo>;

    /// Download and post-process one item into `request.options.output_dir`
    async fn extract(
        &self,
        request: EngineRequest,
        progress: mpsc::UnboundedSender<EngineProgress>,
    ) -> Result<()>;
}
