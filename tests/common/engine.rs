//! Scripted extraction engine standing in for yt-dlp

use async_trait::async_trait;
use media_dl::engine::EngineOptions;
use media_dl::{EngineProgress, EngineRequest, Error, ExtractionEngine, MediaInfo, Result};
use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Duration;
use tokio::sync::mpsc;

/// One scripted `extract` outcome
#[derive(Clone, Debug)]
pub enum Attempt {
    /// Report progress in `chunks` steps, write the file, report its path
    Download {
        /// File name inside the job directory
        name: String,
        /// File size
        bytes: usize,
        /// Number of progress callbacks before finishing
        chunks: u64,
    },
    /// Write the file without reporting where it went
    Silent {
        /// File name inside the job directory
        name: String,
        /// File size
        bytes: usize,
    },
    /// Report a path that never appears, but write a different file
    WrongHint {
        /// Reported (missing) name
        reported: String,
        /// Actually written name
        written: String,
    },
    /// Fail with an engine error
    Fail(String),
    /// Block until dropped
    Hang,
}

/// Engine that replays [`Attempt`]s in order; the last one repeats
pub struct ScriptedEngine {
    attempts: Mutex<VecDeque<Attempt>>,
    /// Every request seen, in order
    pub requests: Mutex<Vec<EngineRequest>>,
    /// Delay between progress callbacks
    pub step_delay: Duration,
}

impl ScriptedEngine {
    /// Engine replaying `attempts`
    pub fn new(attempts: Vec<Attempt>) -> Self {
        Self {
            attempts: Mutex::new(attempts.into()),
            requests: Mutex::new(Vec::new()),
            step_delay: Duration::from_millis(5),
        }
    }

    /// Number of `extract` calls so far
    pub fn calls(&self) -> usize {
        self.requests.lock().map(|r| r.len()).unwrap_or(0)
    }

    fn next(&self) -> Attempt {
        let mut attempts = match self.attempts.lock() {
            Ok(attempts) => attempts,
            Err(poisoned) => poisoned.into_inner(),
        };
        if attempts.len() > 1 {
            attempts.pop_front().unwrap_or(Attempt::Hang)
        } else {
            attempts.front().cloned().unwrap_or(Attempt::Hang)
        }
    }
}

#[async_trait]
impl ExtractionEngine for ScriptedEngine {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn probe(&self, url: &str, _options: &EngineOptions) -> Result<MediaInfo> {
        Ok(MediaInfo {
            title: format!("Scripted {}", url.rsplit('/').next().unwrap_or_default()),
            duration: Some(65.0),
            ..Default::default()
        })
    }

    async fn extract(
        &self,
        request: EngineRequest,
        progress: mpsc::UnboundedSender<EngineProgress>,
    ) -> Result<()> {
        let dir = request.options.output_dir.clone();
        if let Ok(mut requests) = self.requests.lock() {
            requests.push(request);
        }

        match self.next() {
            Attempt::Download {
                name,
                bytes,
                chunks,
            } => {
                let total = bytes as u64;
                let chunks = chunks.max(1);
                for i in 1..=chunks {
                    let _ = progress.send(EngineProgress::downloading(
                        total * i / chunks,
                        Some(total),
                    ));
                    tokio::time::sleep(self.step_delay).await;
                }
                let path = dir.join(name);
                tokio::fs::write(&path, vec![7u8; bytes]).await?;
                let _ = progress.send(EngineProgress::finished(Some(path)));
                Ok(())
            }
            Attempt::Silent { name, bytes } => {
                tokio::fs::write(dir.join(name), vec![7u8; bytes]).await?;
                Ok(())
            }
            Attempt::WrongHint { reported, written } => {
                tokio::fs::write(dir.join(written), vec![7u8; 64]).await?;
                let _ = progress.send(EngineProgress::finished(Some(dir.join(reported))));
                Ok(())
            }
            Attempt::Fail(message) => Err(Error::Engine(message)),
            Attempt::Hang => std::future::pending().await,
        }
    }
}
