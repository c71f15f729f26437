//! Output file resolution
//!
//! The engine reports where it *intends* to write, but merges, audio extraction and slow
//! filesystems mean that path may appear late, under another extension, or not at all.
//! [`OutputResolver::resolve`] tries, in order:
//!
//! 1. the hinted path, polled until it exists with a non-zero size or `hint_wait` elapses
//! 2. media files in the target directory modified within `recent_window`, newest first
//! 3. any non-empty media file in the target directory
//!
//! Partial artifacts (`.part`, `.ytdl`, `.tmp`) and dotfiles are never candidates.

use crate::config::ResolverConfig;
use crate::error::{Error, Result};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};
use tokio::time::Instant;
use utoipa::ToSchema;

const PARTIAL_EXTENSIONS: &[&str] = &["part", "ytdl", "tmp"];

/// What the resolver saw when it could not find an output file
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, ToSchema)]
pub struct ResolutionDiagnostic {
    /// Directory that was searched
    #[schema(value_type = String)]
    pub target_dir: PathBuf,
    /// Names of every entry in the directory, sorted
    pub entries: Vec<String>,
    /// Whether the directory is writable
    pub writable: bool,
    /// Path the engine reported, if any
    #[schema(value_type = Option<String>)]
    pub hinted_path: Option<PathBuf>,
}

impl std::fmt::Display for ResolutionDiagnostic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "no media file in {} ({} entries",
            self.target_dir.display(),
            self.entries.len()
        )?;
        if !self.entries.is_empty() {
            write!(f, ": {}", self.entries.join(", "))?;
        }
        write!(f, "; writable: {}", if self.writable { "yes" } else { "no" })?;
        if let Some(hint) = &self.hinted_path {
            write!(f, "; expected {}", hint.display())?;
        }
        write!(f, ")")
    }
}

struct DirEntryInfo {
    path: PathBuf,
    len: u64,
    modified: Option<SystemTime>,
}

/// Locates a finished job's output file
#[derive(Clone, Debug)]
pub struct OutputResolver {
    config: ResolverConfig,
}

impl OutputResolver {
    /// Create a resolver with the given settings
    pub fn new(config: ResolverConfig) -> Self {
        Self { config }
    }

    /// Find the output file in `target_dir`, preferring `hinted` when it shows up in time
    ///
    /// Returns [`Error::EmptyOutput`] when the only candidates are zero bytes long and
    /// [`Error::OutputNotFound`] with a directory listing otherwise.
    pub async fn resolve(&self, target_dir: &Path, hinted: Option<&Path>) -> Result<PathBuf> {
        let hinted = hinted.map(|hint| {
            if hint.is_absolute() {
                hint.to_path_buf()
            } else {
                target_dir.join(hint)
            }
        });

        let mut empty_hint = None;
        if let Some(hint) = &hinted {
            match self.wait_for_hint(hint).await {
                HintOutcome::Ready => {
                    tracing::debug!(path = %hint.display(), "resolved output from engine hint");
                    return Ok(hint.clone());
                }
                HintOutcome::Empty => empty_hint = Some(hint.clone()),
                HintOutcome::Missing => {}
            }
        }

        let entries = list_dir(target_dir).await;
        let mut candidates: Vec<&DirEntryInfo> = entries
            .iter()
            .filter(|entry| self.is_candidate(&entry.path))
            .collect();
        candidates.sort_by(|a, b| b.modified.cmp(&a.modified));

        let now = SystemTime::now();
        let recent = candidates.iter().find(|entry| {
            entry.len > 0
                && entry
                    .modified
                    .map(|m| now.duration_since(m).unwrap_or(Duration::ZERO) <= self.config.recent_window)
                    .unwrap_or(false)
        });
        if let Some(entry) = recent {
            tracing::debug!(path = %entry.path.display(), "resolved output from recent files");
            return Ok(entry.path.clone());
        }

        if let Some(entry) = candidates.iter().find(|entry| entry.len > 0) {
            tracing::debug!(path = %entry.path.display(), "resolved output from any media file");
            return Ok(entry.path.clone());
        }

        if let Some(path) = empty_hint.or_else(|| candidates.first().map(|e| e.path.clone())) {
            return Err(Error::EmptyOutput { path });
        }

        let mut names: Vec<String> = entries
            .iter()
            .filter_map(|entry| entry.path.file_name())
            .map(|name| name.to_string_lossy().into_owned())
            .collect();
        names.sort();

        Err(Error::OutputNotFound(Box::new(ResolutionDiagnostic {
            target_dir: target_dir.to_path_buf(),
            entries: names,
            writable: is_writable(target_dir).await,
            hinted_path: hinted,
        })))
    }

    /// Whether `path` could be a finished output file, judging by its name alone
    pub fn is_candidate(&self, path: &Path) -> bool {
        let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
            return false;
        };
        if name.starts_with('.') {
            return false;
        }
        let Some(ext) = path.extension().and_then(|e| e.to_str()) else {
            return false;
        };
        let ext = ext.to_ascii_lowercase();
        if PARTIAL_EXTENSIONS.contains(&ext.as_str()) {
            return false;
        }
        self.config
            .media_extensions
            .iter()
            .any(|media| media.eq_ignore_ascii_case(&ext))
    }

    async fn wait_for_hint(&self, hint: &Path) -> HintOutcome {
        let deadline = Instant::now() + self.config.hint_wait;
        let mut outcome = HintOutcome::Missing;
        loop {
            if let Ok(metadata) = tokio::fs::metadata(hint).await {
                if metadata.is_file() && metadata.len() > 0 {
                    return HintOutcome::Ready;
                }
                if metadata.is_file() {
                    outcome = HintOutcome::Empty;
                }
            }
            if Instant::now() >= deadline {
                return outcome;
            }
            tokio::time::sleep(self.config.hint_poll_interval).await;
        }
    }
}

enum HintOutcome {
    Ready,
    Empty,
    Missing,
}

async fn list_dir(dir: &Path) -> Vec<DirEntryInfo> {
    let mut entries = Vec::new();
    let mut read_dir = match tokio::fs::read_dir(dir).await {
        Ok(read_dir) => read_dir,
        Err(e) => {
            tracing::warn!(dir = %dir.display(), error = %e, "cannot list output directory");
            return entries;
        }
    };

    loop {
        match read_dir.next_entry().await {
            Ok(Some(entry)) => {
                let Ok(metadata) = entry.metadata().await else {
                    continue;
                };
                if !metadata.is_file() {
                    continue;
                }
                entries.push(DirEntryInfo {
                    path: entry.path(),
                    len: metadata.len(),
                    modified: metadata.modified().ok(),
                });
            }
            Ok(None) => break,
            Err(e) => {
                tracing::warn!(dir = %dir.display(), error = %e, "error while listing output directory");
                break;
            }
        }
    }
    entries
}

async fn is_writable(dir: &Path) -> bool {
    tokio::fs::metadata(dir)
        .await
        .map(|m| m.is_dir() && !m.permissions().readonly())
        .unwrap_or(false)
}
