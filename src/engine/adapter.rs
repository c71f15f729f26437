//! Relays engine callbacks into the progress store

use super::{EngineOptions, EngineProgress, EngineRequest, EngineStatus, ExtractionEngine, MediaInfo};
use crate::config::EngineConfig;
use crate::error::{Error, Result};
use crate::progress::ProgressStore;
use crate::retry::RequestParams;
use crate::types::{Event, Job, JobId, JobStatus, ProgressUpdate};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc};
use tokio_util::sync::CancellationToken;

const MIB: u64 = 1024 * 1024;

/// Runs one engine invocation for a job and mirrors its progress into the store
#[derive(Clone)]
pub struct EngineAdapter {
    engine: Arc<dyn ExtractionEngine>,
    store: ProgressStore,
    config: EngineConfig,
    event_tx: broadcast::Sender<Event>,
}

impl EngineAdapter {
    /// Create an adapter around `engine`
    pub fn new(
        engine: Arc<dyn ExtractionEngine>,
        store: ProgressStore,
        config: EngineConfig,
        event_tx: broadcast::Sender<Event>,
    ) -> Self {
        Self {
            engine,
            store,
            config,
            event_tx,
        }
    }

    /// Name of the wrapped engine
    pub fn engine_name(&self) -> &str {
        self.engine.name()
    }

    /// Fetch metadata for `url` with the given request shape
    pub async fn probe(&self, url: &str, params: &RequestParams) -> Result<MediaInfo> {
        let options = EngineOptions::for_probe(url, params, &self.config);
        self.engine.probe(url, &options).await
    }

    /// Download `job` into `output_dir` and return the output path the engine reported
    ///
    /// The engine's `finished` callback moves the record to `finished`; if the engine
    /// returns success without sending one, the transition is made on its behalf. Engine
    /// failures are returned unmodified for the retry policy to classify; cancellation
    /// drops the engine future and returns [`Error::Cancelled`].
    pub async fn run(
        &self,
        job: &Job,
        params: &RequestParams,
        output_dir: &Path,
        cancel: &CancellationToken,
    ) -> Result<Option<PathBuf>> {
        let request = EngineRequest {
            url: job.url.clone(),
            options: EngineOptions::for_job(job, params, output_dir, &self.config),
        };
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut relay = RelayState::default();

        let extraction = self.engine.extract(request, tx);
        tokio::pin!(extraction);

        let outcome = loop {
            tokio::select! {
                _ = cancel.cancelled() => return Err(Error::Cancelled),
                Some(progress) = rx.recv() => {
                    self.relay(job.id, progress, &mut relay).await?;
                }
                result = &mut extraction => break result,
            }
        };

        while let Ok(progress) = rx.try_recv() {
            self.relay(job.id, progress, &mut relay).await?;
        }
        outcome?;

        if cancel.is_cancelled() {
            return Err(Error::Cancelled);
        }

        if !relay.finished {
            self.mark_finished(job.id).await?;
        }

        Ok(relay.hint)
    }

    async fn mark_finished(&self, id: JobId) -> Result<()> {
        self.store
            .update(
                id,
                ProgressUpdate::status(JobStatus::Finished, "Download complete!"),
            )
            .await?;
        let _ = self.event_tx.send(Event::Finished { id });
        Ok(())
    }

    async fn relay(&self, id: JobId, progress: EngineProgress, state: &mut RelayState) -> Result<()> {
        if let Some(filename) = &progress.filename {
            state.hint = Some(filename.clone());
        }
        if progress.status == EngineStatus::Finished {
            if !state.finished {
                state.finished = true;
                self.mark_finished(id).await?;
            }
            return Ok(());
        }

        let downloaded_mb = progress.downloaded_bytes / MIB;
        let update = match (progress.percent(), progress.total()) {
            (Some(percent), Some(total)) => ProgressUpdate::status(
                JobStatus::Downloading,
                format!(
                    "Downloading: {}% ({}MB / {}MB)",
                    percent as u32,
                    downloaded_mb,
                    total / MIB
                ),
            )
            .with_progress(percent),
            _ => ProgressUpdate::status(
                JobStatus::Downloading,
                format!("Downloading: {}MB downloaded...", downloaded_mb),
            )
            .with_progress(0.0),
        };

        let record = self.store.update(id, update).await?;

        let whole = record.progress as u32;
        if state.last_percent != Some(whole) {
            state.last_percent = Some(whole);
            let _ = self.event_tx.send(Event::Downloading {
                id,
                percent: record.progress,
            });
        }
        Ok(())
    }
}

/// What the relay has seen so far in one engine invocation
#[derive(Default)]
struct RelayState {
    hint: Option<PathBuf>,
    last_percent: Option<u32>,
    finished: bool,
}
