//! Live progress records, one per job
//!
//! The store is the only structure shared between job tasks and readers. Each record has a
//! single writer (its job task); [`ProgressStore::update`] merges a partial update under the
//! write lock so readers always see a whole record.

use crate::error::{Error, Result};
use crate::types::{JobId, JobStatus, ProgressRecord, ProgressUpdate};
use chrono::Utc;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;

/// Concurrent map of job id to progress record
#[derive(Clone, Default)]
pub struct ProgressStore {
    records: Arc<RwLock<HashMap<JobId, ProgressRecord>>>,
}

impl ProgressStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a record
    pub async fn put(&self, id: JobId, record: ProgressRecord) {
        self.records.write().await.insert(id, record);
    }

    /// Merge `update` into the record for `id` and return the resulting record
    ///
    /// Updates to a terminal record and illegal status transitions are ignored; the
    /// current record is returned unchanged in both cases. `progress` is clamped to
    /// `[0, 100]`, never moves backwards while downloading, and is pinned to 100 once
    /// the engine has finished.
    pub async fn update(&self, id: JobId, update: ProgressUpdate) -> Result<ProgressRecord> {
        let mut records = self.records.write().await;
        let record = records.get_mut(&id).ok_or(Error::JobNotFound(id))?;

        if record.status.is_terminal() {
            tracing::debug!(job_id = %id, status = %record.status, "ignoring update to terminal record");
            return Ok(record.clone());
        }

        let next_status = update.status.unwrap_or(record.status);
        if !record.status.can_transition_to(next_status) {
            tracing::warn!(
                job_id = %id,
                from = %record.status,
                to = %next_status,
                "ignoring illegal status transition"
            );
            return Ok(record.clone());
        }

        let mut progress = update
            .progress
            .map(|p| if p.is_nan() { 0.0 } else { p.clamp(0.0, 100.0) })
            .unwrap_or(record.progress);
        if next_status == JobStatus::Downloading && record.status == JobStatus::Downloading {
            progress = progress.max(record.progress);
        }
        if matches!(next_status, JobStatus::Finished | JobStatus::Completed) {
            progress = 100.0;
        }

        record.status = next_status;
        record.progress = progress;
        if let Some(message) = update.message {
            record.message = message;
        }
        if let Some(filename) = update.filename {
            record.filename = Some(filename);
        }
        if let Some(filepath) = update.filepath {
            record.filepath = Some(filepath);
        }
        if let Some(error) = update.error {
            record.error = Some(error);
        }
        record.updated_at = Utc::now();

        Ok(record.clone())
    }

    /// Snapshot of the record for `id`
    pub async fn get(&self, id: JobId) -> Result<ProgressRecord> {
        self.records
            .read()
            .await
            .get(&id)
            .cloned()
            .ok_or(Error::JobNotFound(id))
    }

    /// Number of records held
    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }

    /// Whether the store holds no records
    pub async fn is_empty(&self) -> bool {
        self.records.read().await.is_empty()
    }

    /// Drop terminal records last written more than `ttl` ago, then the oldest terminal
    /// records until at most `capacity` remain. Running jobs are never evicted.
    ///
    /// Returns the removed records so the caller can release what they point at.
    pub async fn evict(&self, ttl: Duration, capacity: usize) -> Vec<(JobId, ProgressRecord)> {
        let mut records = self.records.write().await;
        let ttl = chrono::Duration::from_std(ttl).unwrap_or(chrono::Duration::MAX);
        let cutoff = Utc::now().checked_sub_signed(ttl);

        let mut doomed: Vec<JobId> = match cutoff {
            Some(cutoff) => records
                .iter()
                .filter(|(_, record)| record.status.is_terminal() && record.updated_at < cutoff)
                .map(|(id, _)| *id)
                .collect(),
            None => Vec::new(),
        };

        let remaining = records.len() - doomed.len();
        if remaining > capacity {
            let mut terminal: Vec<_> = records
                .iter()
                .filter(|(id, record)| record.status.is_terminal() && !doomed.contains(id))
                .map(|(id, record)| (record.updated_at, *id))
                .collect();
            terminal.sort();
            doomed.extend(
                terminal
                    .into_iter()
                    .take(remaining - capacity)
                    .map(|(_, id)| id),
            );
        }

        let removed: Vec<_> = doomed
            .into_iter()
            .filter_map(|id| records.remove(&id).map(|record| (id, record)))
            .collect();
        if !removed.is_empty() {
            tracing::debug!(
                removed = removed.len(),
                remaining = records.len(),
                "evicted progress records"
            );
        }
        removed
    }
}
