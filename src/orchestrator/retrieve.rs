//! Handing completed files to callers

use super::Orchestrator;
use super::task::remove_job_dir;
use crate::error::{Error, Result};
use crate::types::{JobId, JobStatus, RetrievedFile};
use std::path::{Path, PathBuf};

impl Orchestrator {
    /// Locate the output of a completed job for streaming
    ///
    /// Jobs in any other state are [`Error::NotReady`]; a completed job whose file is no
    /// longer on disk is [`Error::FileGone`]. The first successful retrieval schedules the
    /// file for deletion after `download.served_file_retention`.
    pub async fn retrieve(&self, id: JobId) -> Result<RetrievedFile> {
        let record = self.store.get(id).await?;
        if record.status != JobStatus::Completed {
            return Err(Error::NotReady {
                id,
                status: record.status,
            });
        }

        let path = record.filepath.ok_or_else(|| Error::FileGone {
            id,
            path: PathBuf::new(),
        })?;
        let metadata = match tokio::fs::metadata(&path).await {
            Ok(metadata) if metadata.is_file() => metadata,
            _ => return Err(Error::FileGone { id, path }),
        };

        let presented = record
            .filename
            .as_deref()
            .and_then(sanitize_filename)
            .or_else(|| {
                path.file_name()
                    .and_then(|name| sanitize_filename(&name.to_string_lossy()))
            })
            .ok_or_else(|| Error::FileGone {
                id,
                path: path.clone(),
            })?;

        self.schedule_cleanup(id, &path).await;

        Ok(RetrievedFile {
            content_type: content_type_for(&path),
            filename: presented,
            size: metadata.len(),
            path,
        })
    }

    /// Delete a served file once the retention window passes (at most once per job)
    async fn schedule_cleanup(&self, id: JobId, path: &Path) {
        let Some(retention) = self.config.download.served_file_retention else {
            return;
        };
        if !self.jobs.pending_cleanups.lock().await.insert(id) {
            return;
        }

        let path = path.to_path_buf();
        let job_dir = self
            .config
            .download
            .isolate_jobs
            .then(|| self.job_dir(id));
        let pending = self.jobs.pending_cleanups.clone();

        tracing::debug!(
            job_id = %id,
            path = %path.display(),
            retention_secs = retention.as_secs(),
            "Scheduled served file for deletion"
        );

        tokio::spawn(async move {
            tokio::time::sleep(retention).await;

            discard_output(id, job_dir.as_deref(), &path).await;

            pending.lock().await.remove(&id);
        });
    }
}

/// Delete a job's output: its private directory when isolated, else just the file
pub(crate) async fn discard_output(id: JobId, job_dir: Option<&Path>, path: &Path) {
    match job_dir {
        Some(dir) => remove_job_dir(dir).await,
        None => match tokio::fs::remove_file(path).await {
            Ok(()) => tracing::info!(job_id = %id, path = %path.display(), "Deleted output file"),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => tracing::warn!(
                job_id = %id,
                path = %path.display(),
                error = %e,
                "Failed to delete output file"
            ),
        },
    }
}

/// MIME type for a media file, by extension
pub fn content_type_for(path: &Path) -> &'static str {
    let ext = path
        .extension()
        .map(|ext| ext.to_string_lossy().to_ascii_lowercase());
    match ext.as_deref() {
        Some("mp4") => "video/mp4",
        Some("mp3") => "audio/mpeg",
        Some("webm") => "video/webm",
        Some("mkv") => "video/x-matroska",
        _ => "application/octet-stream",
    }
}

/// Reduce a name to a safe attachment filename
///
/// Keeps only the final path component (either separator style), rejects empty, `.` and
/// `..`, and replaces quotes and control characters so the name fits a
/// `Content-Disposition` header.
pub fn sanitize_filename(name: &str) -> Option<String> {
    let base = name.rsplit(['/', '\\']).next().unwrap_or_default().trim();
    if base.is_empty() || base == "." || base == ".." {
        return None;
    }

    Some(
        base.chars()
            .map(|c| if c == '"' || c.is_control() { '_' } else { c })
            .collect(),
    )
}
