//! Maintenance sweeps and shutdown coordination.

use crate::error::Result;
use crate::types::{Event, JobStatus};
use std::sync::atomic::Ordering;
use std::time::Duration;

use super::Orchestrator;
use super::retrieve::discard_output;

impl Orchestrator {
    /// Gracefully shut down the orchestrator
    ///
    /// This method performs a graceful shutdown sequence:
    /// 1. Stops accepting new submissions ([`Error::ShuttingDown`](crate::Error::ShuttingDown))
    /// 2. Cancels all active jobs (they end in `error`)
    /// 3. Waits for job tasks to wind down, up to `download.shutdown_timeout`
    /// 4. Stops the maintenance sweeper
    /// 5. Emits [`Event::Shutdown`]
    pub async fn shutdown(&self) -> Result<()> {
        tracing::info!("Initiating graceful shutdown");

        // 1. Stop accepting new jobs
        self.jobs.accepting_new.store(false, Ordering::SeqCst);
        tracing::info!("Stopped accepting new jobs");

        // 2. Cancel everything still running
        self.cancel_all().await;

        // 3. Wait with timeout
        let timeout = self.config.download.shutdown_timeout;
        match tokio::time::timeout(timeout, self.wait_for_active_jobs()).await {
            Ok(()) => tracing::info!("All active jobs stopped"),
            Err(_) => tracing::warn!(
                timeout_secs = timeout.as_secs(),
                "Timeout waiting for jobs to stop, proceeding with shutdown"
            ),
        }

        // 4. Stop background maintenance
        self.jobs.maintenance_token.cancel();

        // 5. Emit shutdown event
        self.emit_event(Event::Shutdown);

        tracing::info!("Graceful shutdown complete");
        Ok(())
    }

    /// Whether new submissions are still accepted
    pub fn is_accepting(&self) -> bool {
        self.jobs.accepting_new.load(Ordering::SeqCst)
    }

    async fn cancel_all(&self) {
        let active = self.jobs.active_jobs.lock().await;
        tracing::debug!(active_count = active.len(), "Cancelling all active jobs");

        for (id, token) in active.iter() {
            tracing::debug!(job_id = %id, "Signaling cancellation");
            token.cancel();
        }
    }

    async fn wait_for_active_jobs(&self) {
        loop {
            let active_count = self.jobs.active_jobs.lock().await.len();
            if active_count == 0 {
                return;
            }

            tracing::debug!(active_count, "Waiting for active jobs to stop");
            tokio::time::sleep(Duration::from_millis(100)).await;
        }
    }

    /// Spawn the sweeper that bounds progress records and history
    pub(crate) fn start_maintenance(&self) {
        let orchestrator = self.clone();
        let token = self.jobs.maintenance_token.clone();
        let period = self.config.retention.sweep_interval;

        tokio::spawn(async move {
            let mut interval = tokio::time::interval_at(tokio::time::Instant::now() + period, period);
            interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

            loop {
                tokio::select! {
                    _ = interval.tick() => orchestrator.sweep().await,
                    _ = token.cancelled() => {
                        tracing::debug!("Maintenance sweeper stopped");
                        break;
                    }
                }
            }
        });
    }

    /// Evict expired progress records and prune history to capacity
    pub(crate) async fn sweep(&self) {
        let retention = &self.config.retention;

        let evicted = self
            .store
            .evict(retention.progress_ttl, retention.progress_capacity)
            .await;
        if !evicted.is_empty() {
            tracing::debug!(evicted = evicted.len(), "Evicted progress records");
        }

        // Without a record the output can never be retrieved, so it goes with it.
        // Failed jobs already removed their directory; served files have their own timer.
        for (id, record) in evicted {
            if record.status != JobStatus::Completed {
                continue;
            }
            if self.jobs.pending_cleanups.lock().await.contains(&id) {
                continue;
            }
            let job_dir = self.config.download.isolate_jobs.then(|| self.job_dir(id));
            let Some(path) = record.filepath.or_else(|| job_dir.clone()) else {
                continue;
            };
            discard_output(id, job_dir.as_deref(), &path).await;
        }

        match self.db.prune_history(retention.history_capacity).await {
            Ok(0) => {}
            Ok(pruned) => tracing::debug!(pruned, "Pruned history entries"),
            Err(e) => tracing::warn!(error = %e, "Failed to prune history"),
        }
    }
}
