//! Job orchestrator split into focused submodules.
//!
//! The [`Orchestrator`] owns the progress store, the retry policy, the engine adapter and
//! the output resolver, and runs every submitted job as its own background task:
//! - [`task`] - per-job state machine (worker slot, probe, retry loop, resolution)
//! - [`retrieve`] - handing a completed job's file to the caller and cleaning it up
//! - [`lifecycle`] - maintenance sweeps and graceful shutdown

mod lifecycle;
mod retrieve;
mod task;

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
pub(crate) mod test_helpers;
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests;

pub use retrieve::{content_type_for, sanitize_filename};

use crate::config::Config;
use crate::db::Database;
use crate::engine::{EngineAdapter, ExtractionEngine, MediaInfo, YtDlpEngine};
use crate::error::{Error, Result};
use crate::progress::ProgressStore;
use crate::resolver::OutputResolver;
use crate::retry::RetryPolicy;
use crate::types::{Event, FormatChoice, HistoryEntry, Job, JobHandle, JobId, ProgressRecord};
use std::collections::{HashMap, HashSet};
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::{Mutex, Semaphore, broadcast};
use tokio_util::sync::CancellationToken;

/// Worker pool and running-job bookkeeping
#[derive(Clone)]
pub(crate) struct JobsState {
    /// Semaphore limiting concurrently running engines (max_concurrent_jobs)
    pub(crate) concurrent_limit: Arc<Semaphore>,
    /// Map of unfinished jobs to their cancellation tokens
    pub(crate) active_jobs: Arc<Mutex<HashMap<JobId, CancellationToken>>>,
    /// Jobs whose served file already has a deletion scheduled
    pub(crate) pending_cleanups: Arc<Mutex<HashSet<JobId>>>,
    /// Whether new submissions are accepted (false during shutdown)
    pub(crate) accepting_new: Arc<AtomicBool>,
    /// Stops the maintenance sweeper
    pub(crate) maintenance_token: CancellationToken,
}

/// Main orchestrator instance (cloneable - all fields are Arc-wrapped)
#[derive(Clone)]
pub struct Orchestrator {
    /// History database
    pub db: Arc<Database>,
    /// Event broadcast channel sender (multiple subscribers supported)
    pub(crate) event_tx: broadcast::Sender<Event>,
    /// Configuration
    pub(crate) config: Arc<Config>,
    /// Live progress records
    pub(crate) store: ProgressStore,
    /// Engine invocation and progress relay
    pub(crate) adapter: EngineAdapter,
    /// Retry decisions
    pub(crate) policy: RetryPolicy,
    /// Output file location
    pub(crate) resolver: OutputResolver,
    /// Worker pool and active jobs
    pub(crate) jobs: JobsState,
}

impl Orchestrator {
    /// Create an orchestrator driving the `yt-dlp` binary
    ///
    /// The binary is taken from `engine.binary_path`, or searched for in PATH when
    /// `engine.search_path` is set.
    pub async fn new(config: Config) -> Result<Self> {
        let engine = YtDlpEngine::discover(&config.engine)?;
        Self::with_engine(config, Arc::new(engine)).await
    }

    /// Create an orchestrator driving a custom engine
    ///
    /// This initializes all core components:
    /// - Validates the configuration
    /// - Creates the download directory
    /// - Opens/creates the SQLite history database
    /// - Sets up the event broadcast channel
    /// - Starts the maintenance sweeper
    pub async fn with_engine(config: Config, engine: Arc<dyn ExtractionEngine>) -> Result<Self> {
        config.validate()?;

        tokio::fs::create_dir_all(&config.download.download_dir)
            .await
            .map_err(|e| {
                Error::Io(std::io::Error::new(
                    e.kind(),
                    format!(
                        "Failed to create download directory '{}': {}",
                        config.download.download_dir.display(),
                        e
                    ),
                ))
            })?;

        let db = Database::new(&config.persistence.database_path).await?;

        // Buffer of 1000 events; slower subscribers see RecvError::Lagged
        let (event_tx, _rx) = broadcast::channel(1000);

        let store = ProgressStore::new();
        let adapter = EngineAdapter::new(
            engine,
            store.clone(),
            config.engine.clone(),
            event_tx.clone(),
        );
        tracing::info!(
            engine = adapter.engine_name(),
            max_concurrent_jobs = config.download.max_concurrent_jobs,
            "Extraction engine initialized"
        );

        let jobs = JobsState {
            concurrent_limit: Arc::new(Semaphore::new(config.download.max_concurrent_jobs)),
            active_jobs: Arc::new(Mutex::new(HashMap::new())),
            pending_cleanups: Arc::new(Mutex::new(HashSet::new())),
            accepting_new: Arc::new(AtomicBool::new(true)),
            maintenance_token: CancellationToken::new(),
        };

        let orchestrator = Self {
            db: Arc::new(db),
            event_tx,
            policy: RetryPolicy::new(config.retry.clone()),
            resolver: OutputResolver::new(config.resolver.clone()),
            config: Arc::new(config),
            store,
            adapter,
            jobs,
        };

        orchestrator.start_maintenance();

        Ok(orchestrator)
    }

    /// Submit a download and return immediately
    ///
    /// The job starts in `starting` and runs on its own task once a worker slot is free.
    /// An empty or whitespace-only URL is rejected synchronously with
    /// [`Error::InvalidInput`]; no job is created in that case.
    pub async fn submit(&self, url: &str, format: FormatChoice) -> Result<JobHandle> {
        let url = url.trim();
        if url.is_empty() {
            return Err(Error::InvalidInput("URL is required".to_string()));
        }
        let job = Job::new(url, format);
        let id = job.id;
        let cancel = CancellationToken::new();

        // Checked under the lock shutdown takes to cancel, so no job slips past it
        {
            let mut active = self.jobs.active_jobs.lock().await;
            if !self.jobs.accepting_new.load(Ordering::SeqCst) {
                return Err(Error::ShuttingDown);
            }
            active.insert(id, cancel.clone());
        }

        self.store.put(id, ProgressRecord::starting()).await;

        tracing::info!(job_id = %id, url = %job.url, format = %format, "Job submitted");
        self.emit_event(Event::Queued {
            id,
            url: job.url.clone(),
            format,
        });

        let ctx = task::JobTaskContext {
            job,
            cancel: cancel.clone(),
            orchestrator: self.clone(),
        };
        tokio::spawn(task::run_job(ctx));

        Ok(JobHandle::new(id, cancel))
    }

    /// Current progress record of a job
    ///
    /// Never waits on the job itself; unknown (or evicted) ids are [`Error::JobNotFound`].
    pub async fn progress(&self, id: JobId) -> Result<ProgressRecord> {
        self.store.get(id).await
    }

    /// Request cancellation of a running job
    ///
    /// The job ends in `error` at its next suspension point. Cancelling a job that already
    /// reached a terminal state is a no-op; an unknown id is [`Error::JobNotFound`].
    pub async fn cancel(&self, id: JobId) -> Result<()> {
        let token = self.jobs.active_jobs.lock().await.get(&id).cloned();
        match token {
            Some(token) => {
                tracing::info!(job_id = %id, "Cancelling job");
                token.cancel();
                Ok(())
            }
            None => {
                // finished jobs keep their record; cancelling them is a no-op
                self.store.get(id).await.map(|_| ())
            }
        }
    }

    /// Fetch metadata for `url` without downloading
    pub async fn probe(&self, url: &str) -> Result<MediaInfo> {
        let url = url.trim();
        if url.is_empty() {
            return Err(Error::InvalidInput("URL is required".to_string()));
        }
        self.adapter.probe(url, &self.policy.initial_params()).await
    }

    /// Completed jobs, newest first
    pub async fn history(&self, limit: usize, offset: usize) -> Result<Vec<HistoryEntry>> {
        self.db.query_history(limit, offset).await
    }

    /// Number of history entries
    pub async fn history_count(&self) -> Result<i64> {
        self.db.count_history().await
    }

    /// Delete all history entries
    pub async fn clear_history(&self) -> Result<u64> {
        let deleted = self.db.clear_history().await?;
        tracing::info!(deleted, "History cleared");
        Ok(deleted)
    }

    /// Number of jobs that have not reached a terminal state
    pub async fn active_job_count(&self) -> usize {
        self.jobs.active_jobs.lock().await.len()
    }

    /// Subscribe to job events
    ///
    /// Multiple subscribers are supported. Each subscriber receives all events independently.
    /// Events are buffered, but if a subscriber falls behind by more than 1000 events,
    /// it will receive a `RecvError::Lagged` error.
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.event_tx.subscribe()
    }

    /// Get the current configuration
    pub fn get_config(&self) -> Arc<Config> {
        Arc::clone(&self.config)
    }

    /// Output directory for a job
    pub(crate) fn job_dir(&self, id: JobId) -> PathBuf {
        if self.config.download.isolate_jobs {
            self.config.download.download_dir.join(id.to_string())
        } else {
            self.config.download.download_dir.clone()
        }
    }

    /// Emit an event to all subscribers
    ///
    /// If there are no active subscribers, the event is silently dropped.
    pub(crate) fn emit_event(&self, event: Event) {
        self.event_tx.send(event).ok();
    }

    /// Spawn the REST API server in a background task
    ///
    /// The server listens on the configured bind address (default: 0.0.0.0:5000).
    pub fn spawn_api_server(self: &Arc<Self>) -> tokio::task::JoinHandle<Result<()>> {
        let orchestrator = self.clone();
        let config = self.config.clone();

        tokio::spawn(async move { crate::api::start_api_server(orchestrator, config).await })
    }
}
