//! Custom test assertions for end-to-end tests

use media_dl::{Event, JobId, JobStatus, Orchestrator, ProgressRecord};
use std::path::Path;
use std::time::Duration;
use tokio::sync::broadcast;

/// Result of waiting for a job to settle
#[derive(Debug)]
pub enum WaitResult {
    /// Job completed; carries the final record
    Completed(ProgressRecord),
    /// Job ended in `error`; carries the final record
    Failed(ProgressRecord),
    /// Timeout waiting for a terminal state
    Timeout,
}

/// Poll a job's progress until it reaches a terminal state
///
/// Polling (rather than subscribing) avoids missing events emitted between
/// `submit` returning and the receiver being created.
pub async fn wait_for_completion(
    orchestrator: &Orchestrator,
    id: JobId,
    timeout: Duration,
) -> WaitResult {
    let result = tokio::time::timeout(timeout, async {
        loop {
            if let Ok(record) = orchestrator.progress(id).await {
                match record.status {
                    JobStatus::Completed => return WaitResult::Completed(record),
                    JobStatus::Error => return WaitResult::Failed(record),
                    _ => {}
                }
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
    })
    .await;

    result.unwrap_or(WaitResult::Timeout)
}

/// Wait until the job reports `downloading`
pub async fn wait_for_downloading(
    orchestrator: &Orchestrator,
    id: JobId,
    timeout: Duration,
) -> bool {
    tokio::time::timeout(timeout, async {
        loop {
            if let Ok(record) = orchestrator.progress(id).await
                && record.status == JobStatus::Downloading
            {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .is_ok()
}

/// Collect events from `events` until `stop_predicate` matches or timeout
pub async fn collect_events_until<F>(
    events: &mut broadcast::Receiver<Event>,
    timeout: Duration,
    stop_predicate: F,
) -> Vec<Event>
where
    F: Fn(&Event) -> bool,
{
    let mut collected = Vec::new();

    let _ = tokio::time::timeout(timeout, async {
        while let Ok(event) = events.recv().await {
            let should_stop = stop_predicate(&event);
            collected.push(event);
            if should_stop {
                break;
            }
        }
    })
    .await;

    collected
}

/// Assert that a job completed successfully and return its final record
pub async fn assert_job_completed(
    orchestrator: &Orchestrator,
    id: JobId,
    timeout: Duration,
) -> ProgressRecord {
    match wait_for_completion(orchestrator, id, timeout).await {
        WaitResult::Completed(record) => record,
        WaitResult::Failed(record) => {
            panic!("Job {} failed with error: {:?}", id, record.error);
        }
        WaitResult::Timeout => {
            panic!("Timeout waiting for job {} to complete", id);
        }
    }
}

/// Assert that a job failed, optionally with an error containing `expected_error_contains`
pub async fn assert_job_failed(
    orchestrator: &Orchestrator,
    id: JobId,
    timeout: Duration,
    expected_error_contains: Option<&str>,
) -> ProgressRecord {
    match wait_for_completion(orchestrator, id, timeout).await {
        WaitResult::Failed(record) => {
            if let Some(expected) = expected_error_contains {
                let error = record.error.clone().unwrap_or_default();
                assert!(
                    error.contains(expected),
                    "Expected error to contain '{}', got: {}",
                    expected,
                    error
                );
            }
            record
        }
        WaitResult::Completed(record) => {
            panic!(
                "Expected job {} to fail, but it completed with {:?}",
                id, record.filename
            );
        }
        WaitResult::Timeout => {
            panic!("Timeout waiting for job {} to fail", id);
        }
    }
}

/// Assert that files exist in a directory
pub fn assert_files_exist(dir: &Path, expected_files: &[&str]) {
    for filename in expected_files {
        let path = dir.join(filename);
        assert!(path.exists(), "Expected file not found: {}", path.display());
    }
}
