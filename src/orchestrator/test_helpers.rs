//! Shared test helpers for creating Orchestrator instances in tests.

use crate::config::Config;
use crate::engine::{EngineOptions, EngineProgress, EngineRequest, ExtractionEngine, MediaInfo};
use crate::error::{Error, Result};
use crate::orchestrator::Orchestrator;
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::Mutex;
use std::time::Duration;
use tempfile::tempdir;
use tokio::sync::mpsc;

/// What the fake engine does on one `extract` call
#[derive(Clone, Debug)]
pub(crate) enum Step {
    /// Write `name` with `bytes` bytes into the output dir and report it
    Write { name: &'static str, bytes: usize },
    /// Write the file but never report its path
    WriteSilently { name: &'static str, bytes: usize },
    /// Fail with this engine error text
    Fail(&'static str),
    /// Succeed without writing anything
    Nothing,
    /// Never return
    Hang,
}

/// Scripted engine: each `extract` call consumes the next step (the last one repeats)
pub(crate) struct FakeEngine {
    steps: Mutex<VecDeque<Step>>,
    info: Option<MediaInfo>,
    /// User agents seen by each `extract` call, in order
    pub(crate) user_agents: Mutex<Vec<String>>,
}

impl FakeEngine {
    pub(crate) fn new(steps: Vec<Step>) -> Self {
        Self {
            steps: Mutex::new(steps.into()),
            info: Some(MediaInfo {
                title: "Test Clip".to_string(),
                duration: Some(187.0),
                ..Default::default()
            }),
            user_agents: Mutex::new(Vec::new()),
        }
    }

    /// Make `probe` fail
    pub(crate) fn without_info(mut self) -> Self {
        self.info = None;
        self
    }

    pub(crate) fn calls(&self) -> usize {
        self.user_agents.lock().unwrap().len()
    }

    fn next_step(&self) -> Step {
        let mut steps = self.steps.lock().unwrap();
        if steps.len() > 1 {
            steps.pop_front().unwrap()
        } else {
            steps.front().cloned().unwrap_or(Step::Nothing)
        }
    }
}

#[async_trait]
impl ExtractionEngine for FakeEngine {
    fn name(&self) -> &str {
        "fake"
    }

    async fn probe(&self, _url: &str, _options: &EngineOptions) -> Result<MediaInfo> {
        self.info
            .clone()
            .ok_or_else(|| Error::Engine("ERROR: Unsupported URL".to_string()))
    }

    async fn extract(
        &self,
        request: EngineRequest,
        progress: mpsc::UnboundedSender<EngineProgress>,
    ) -> Result<()> {
        self.user_agents
            .lock()
            .unwrap()
            .push(request.options.user_agent.clone());

        match self.next_step() {
            Step::Write { name, bytes } => {
                let path = request.options.output_dir.join(name);
                let total = bytes as u64;
                let _ = progress.send(EngineProgress::downloading(total / 2, Some(total)));
                tokio::fs::write(&path, vec![0u8; bytes]).await?;
                let _ = progress.send(EngineProgress::downloading(total, Some(total)));
                let _ = progress.send(EngineProgress::finished(Some(path)));
                Ok(())
            }
            Step::WriteSilently { name, bytes } => {
                let path = request.options.output_dir.join(name);
                tokio::fs::write(&path, vec![0u8; bytes]).await?;
                Ok(())
            }
            Step::Fail(message) => Err(Error::Engine(message.to_string())),
            Step::Nothing => Ok(()),
            Step::Hang => std::future::pending().await,
        }
    }
}

/// Config rooted in `root` with timings shrunk for tests
pub(crate) fn test_config(root: &std::path::Path) -> Config {
    let mut config = Config::default();
    config.persistence.database_path = root.join("test.db");
    config.download.download_dir = root.join("downloads");
    config.download.shutdown_timeout = Duration::from_secs(5);
    config.retry.backoff_min = Duration::from_millis(10);
    config.retry.backoff_max = Duration::from_millis(20);
    config.resolver.hint_wait = Duration::from_millis(200);
    config.resolver.hint_poll_interval = Duration::from_millis(20);
    config
}

/// Helper to create a test Orchestrator driving `engine`.
/// Returns the orchestrator and the tempdir (which must be kept alive).
pub(crate) async fn create_test_orchestrator(
    engine: Arc<FakeEngine>,
) -> (Orchestrator, tempfile::TempDir) {
    let temp_dir = tempdir().unwrap();
    let config = test_config(temp_dir.path());
    let orchestrator = Orchestrator::with_engine(config, engine).await.unwrap();
    (orchestrator, temp_dir)
}

/// Like [`create_test_orchestrator`] with a config tweak applied first
pub(crate) async fn create_test_orchestrator_with(
    engine: Arc<FakeEngine>,
    tweak: impl FnOnce(&mut Config),
) -> (Orchestrator, tempfile::TempDir) {
    let temp_dir = tempdir().unwrap();
    let mut config = test_config(temp_dir.path());
    tweak(&mut config);
    let orchestrator = Orchestrator::with_engine(config, engine).await.unwrap();
    (orchestrator, temp_dir)
}

/// Poll until the job reaches a terminal state (or panic after 5s)
pub(crate) async fn wait_terminal(
    orchestrator: &Orchestrator,
    id: crate::types::JobId,
) -> crate::types::ProgressRecord {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    loop {
        let record = orchestrator.progress(id).await.unwrap();
        if record.status.is_terminal() {
            return record;
        }
        assert!(
            tokio::time::Instant::now() < deadline,
            "job {} stuck in {}",
            id,
            record.status
        );
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}
