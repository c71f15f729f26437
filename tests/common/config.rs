//! Test configuration helpers for creating orchestrators over a temp directory

use media_dl::{Config, ExtractionEngine, Orchestrator};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

/// Config rooted at `temp_dir` with short retry and resolver timings
pub fn test_config(temp_dir: &TempDir) -> Config {
    let mut config = Config::default();
    config.persistence.database_path = temp_dir.path().join("test.db");
    config.download.download_dir = temp_dir.path().join("downloads");
    config.download.shutdown_timeout = Duration::from_secs(5);
    config.retry.backoff_min = Duration::from_millis(10);
    config.retry.backoff_max = Duration::from_millis(20);
    config.resolver.hint_wait = Duration::from_millis(200);
    config.resolver.hint_poll_interval = Duration::from_millis(20);
    config
}

/// Create an Orchestrator driving `engine`
///
/// Returns the orchestrator and temp directory (keep temp_dir alive for test duration)
pub async fn create_orchestrator(
    engine: Arc<dyn ExtractionEngine>,
) -> (Arc<Orchestrator>, TempDir) {
    create_orchestrator_with(engine, |_| {}).await
}

/// Like [`create_orchestrator`] with a config tweak applied first
pub async fn create_orchestrator_with(
    engine: Arc<dyn ExtractionEngine>,
    tweak: impl FnOnce(&mut Config),
) -> (Arc<Orchestrator>, TempDir) {
    let temp_dir = tempfile::tempdir().expect("Failed to create temp dir");
    let mut config = test_config(&temp_dir);
    tweak(&mut config);

    let orchestrator = Orchestrator::with_engine(config, engine)
        .await
        .expect("Failed to create orchestrator");

    (Arc::new(orchestrator), temp_dir)
}

/// Check whether a yt-dlp binary is reachable
pub fn has_ytdlp() -> bool {
    which::which("yt-dlp").is_ok()
}

/// Skip test if yt-dlp is not installed
#[macro_export]
macro_rules! skip_if_no_ytdlp {
    () => {
        if !$crate::common::has_ytdlp() {
            eprintln!("Skipping test: yt-dlp not found on PATH");
            return;
        }
    };
}
