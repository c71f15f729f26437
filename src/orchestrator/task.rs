//! Per-job state machine

use super::Orchestrator;
use crate::db::NewHistoryEntry;
use crate::error::{Error, Result};
use crate::retry::RetryDecision;
use crate::types::{Event, Job, JobStatus, ProgressUpdate};
use std::path::Path;
use tokio_util::sync::CancellationToken;

/// Everything a job task needs, moved into the spawned future
pub(crate) struct JobTaskContext {
    pub(crate) job: Job,
    pub(crate) cancel: CancellationToken,
    pub(crate) orchestrator: Orchestrator,
}

/// Drive one job to a terminal state
///
/// Every failure, including cancellation, ends in an `error` record; nothing escapes the
/// task. The job is removed from the active set on the way out.
pub(crate) async fn run_job(ctx: JobTaskContext) {
    let JobTaskContext {
        job,
        cancel,
        orchestrator,
    } = ctx;
    let id = job.id;

    if let Err(e) = drive(&orchestrator, &job, &cancel).await {
        mark_failed(&orchestrator, &job, e).await;
    }

    orchestrator.jobs.active_jobs.lock().await.remove(&id);
}

async fn drive(orchestrator: &Orchestrator, job: &Job, cancel: &CancellationToken) -> Result<()> {
    let id = job.id;

    // Waiting jobs stay `starting` until a worker slot frees up
    let _permit = tokio::select! {
        _ = cancel.cancelled() => return Err(Error::Cancelled),
        permit = orchestrator.jobs.concurrent_limit.clone().acquire_owned() => {
            permit.map_err(|_| Error::ShuttingDown)?
        }
    };

    orchestrator
        .store
        .update(
            id,
            ProgressUpdate::status(JobStatus::Downloading, "Starting download..."),
        )
        .await?;
    tracing::info!(job_id = %id, url = %job.url, format = %job.format, "Job started");

    let output_dir = orchestrator.job_dir(id);
    tokio::fs::create_dir_all(&output_dir).await.map_err(|e| {
        Error::Io(std::io::Error::new(
            e.kind(),
            format!(
                "Failed to create job directory '{}': {}",
                output_dir.display(),
                e
            ),
        ))
    })?;

    let policy = &orchestrator.policy;
    let mut params = policy.initial_params();

    // Metadata is best effort: a failed probe never fails the job
    let probed = tokio::select! {
        _ = cancel.cancelled() => return Err(Error::Cancelled),
        probed = orchestrator.adapter.probe(&job.url, &params) => probed,
    };
    let title = match probed {
        Ok(info) => {
            orchestrator
                .store
                .update(id, ProgressUpdate::message(info.found_message()))
                .await?;
            Some(info.title).filter(|title| !title.is_empty())
        }
        Err(e) => {
            tracing::debug!(job_id = %id, error = %e, "metadata probe failed");
            orchestrator
                .store
                .update(
                    id,
                    ProgressUpdate::message("Video info unavailable, starting download..."),
                )
                .await?;
            None
        }
    };

    let mut attempt = 1;
    let hint = loop {
        if cancel.is_cancelled() {
            return Err(Error::Cancelled);
        }

        match orchestrator
            .adapter
            .run(job, &params, &output_dir, cancel)
            .await
        {
            Ok(hint) => break hint,
            Err(e) => match policy.decide(e, attempt, &params) {
                RetryDecision::Abort(e) => return Err(e),
                RetryDecision::RetryAfter {
                    delay,
                    params: next,
                    reason,
                } => {
                    tracing::warn!(
                        job_id = %id,
                        attempt,
                        max_attempts = policy.max_attempts(),
                        delay_ms = delay.as_millis() as u64,
                        reason = %reason,
                        "Bot detection, retrying with a different request shape"
                    );
                    orchestrator
                        .store
                        .update(
                            id,
                            ProgressUpdate::message(format!(
                                "Bot detection triggered, retrying in {}s (attempt {}/{})...",
                                delay.as_secs(),
                                attempt + 1,
                                policy.max_attempts()
                            )),
                        )
                        .await?;
                    orchestrator.emit_event(Event::Retrying {
                        id,
                        attempt,
                        delay_secs: delay.as_secs(),
                        reason,
                    });

                    tokio::select! {
                        _ = cancel.cancelled() => return Err(Error::Cancelled),
                        _ = tokio::time::sleep(delay) => {}
                    }

                    params = next;
                    attempt += 1;
                }
            },
        }
    };

    let path = tokio::select! {
        _ = cancel.cancelled() => return Err(Error::Cancelled),
        resolved = orchestrator.resolver.resolve(&output_dir, hint.as_deref()) => resolved?,
    };

    complete(orchestrator, job, &path, title).await
}

async fn complete(
    orchestrator: &Orchestrator,
    job: &Job,
    path: &Path,
    title: Option<String>,
) -> Result<()> {
    let id = job.id;
    let filename = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default();

    orchestrator
        .store
        .update(
            id,
            ProgressUpdate {
                status: Some(JobStatus::Completed),
                message: Some("Download completed successfully!".to_string()),
                filename: Some(filename.clone()),
                filepath: Some(path.to_path_buf()),
                ..Default::default()
            },
        )
        .await?;

    tracing::info!(job_id = %id, path = %path.display(), "Job completed");
    orchestrator.emit_event(Event::Completed {
        id,
        filename: filename.clone(),
    });

    // History is a convenience; losing an entry never fails a completed job
    let entry = NewHistoryEntry {
        job_id: id,
        url: job.url.clone(),
        title: title.unwrap_or_else(|| filename.clone()),
        filename,
        format: job.format,
        completed_at: chrono::Utc::now().timestamp(),
    };
    if let Err(e) = orchestrator.db.insert_history(&entry).await {
        tracing::warn!(job_id = %id, error = %e, "Failed to record history entry");
    }

    Ok(())
}

async fn mark_failed(orchestrator: &Orchestrator, job: &Job, error: Error) {
    let id = job.id;
    let mut update = ProgressUpdate::failed(error.origin_message());
    match &error {
        Error::Cancelled => {
            update.message = Some("Download cancelled".to_string());
            tracing::info!(job_id = %id, "Job cancelled");
        }
        Error::OutputNotFound(_) | Error::EmptyOutput { .. } => {
            update.message = Some("Download completed but file not found".to_string());
            tracing::error!(job_id = %id, error = %error, "Output resolution failed");
        }
        _ => tracing::error!(job_id = %id, error = %error, "Job failed"),
    }

    if let Err(e) = orchestrator.store.update(id, update).await {
        tracing::warn!(job_id = %id, error = %e, "Failed to record job failure");
    }

    if orchestrator.config.download.isolate_jobs {
        remove_job_dir(&orchestrator.job_dir(id)).await;
    }

    let event = match error {
        Error::Cancelled => Event::Cancelled { id },
        other => Event::Failed {
            id,
            error: other.origin_message(),
        },
    };
    orchestrator.emit_event(event);
}

/// Delete a job's private directory along with any partial artifacts
pub(crate) async fn remove_job_dir(dir: &Path) {
    match tokio::fs::remove_dir_all(dir).await {
        Ok(()) => tracing::debug!(dir = %dir.display(), "Removed job directory"),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => {
            tracing::warn!(dir = %dir.display(), error = %e, "Failed to remove job directory")
        }
    }
}
