//! yt-dlp process engine

use super::options::PROGRESS_PREFIX;
use super::{EngineOptions, EngineProgress, EngineRequest, EngineStatus, ExtractionEngine, MediaInfo};
use crate::config::EngineConfig;
use crate::error::{Error, Result};
use async_trait::async_trait;
use std::collections::VecDeque;
use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command;
use tokio::sync::mpsc;

const STDERR_TAIL_LINES: usize = 20;

/// Engine that shells out to the `yt-dlp` binary
#[derive(Clone, Debug)]
pub struct YtDlpEngine {
    binary: PathBuf,
    probe_timeout: Duration,
}

impl YtDlpEngine {
    /// Use the binary at `binary`
    pub fn new(binary: impl Into<PathBuf>) -> Self {
        Self {
            binary: binary.into(),
            probe_timeout: Duration::from_secs(30),
        }
    }

    /// Locate yt-dlp from the configured path, falling back to a PATH search
    pub fn discover(config: &EngineConfig) -> Result<Self> {
        let binary = match &config.binary_path {
            Some(path) if path.exists() => path.clone(),
            Some(path) => {
                return Err(Error::ExternalTool(format!(
                    "yt-dlp not found at configured path {}",
                    path.display()
                )));
            }
            None if config.search_path => which::which("yt-dlp").map_err(|e| {
                Error::ExternalTool(format!("yt-dlp not found in PATH: {}", e))
            })?,
            None => {
                return Err(Error::ExternalTool(
                    "yt-dlp path not configured and PATH search disabled".to_string(),
                ));
            }
        };

        tracing::info!(path = %binary.display(), "using yt-dlp binary");
        Ok(Self {
            binary,
            probe_timeout: config.connect_timeout,
        })
    }

    /// Path of the binary this engine runs
    pub fn binary(&self) -> &std::path::Path {
        &self.binary
    }

    fn command(&self, args: &[String]) -> Command {
        let mut command = Command::new(&self.binary);
        command
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        command
    }
}

#[async_trait]
impl ExtractionEngine for YtDlpEngine {
    fn name(&self) -> &str {
        "yt-dlp"
    }

    async fn probe(&self, url: &str, options: &EngineOptions) -> Result<MediaInfo> {
        let mut args = options.to_probe_args();
        args.push(url.to_string());

        let output = tokio::time::timeout(self.probe_timeout, self.command(&args).output())
            .await
            .map_err(|_| {
                Error::Engine(format!(
                    "timed out fetching media info after {}s",
                    self.probe_timeout.as_secs()
                ))
            })?
            .map_err(|e| Error::ExternalTool(format!("failed to run yt-dlp: {}", e)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let lines: Vec<String> = stderr.lines().map(String::from).collect();
            return Err(Error::Engine(error_text(&lines, output.status)));
        }

        let json: serde_json::Value = serde_json::from_slice(&output.stdout)?;
        Ok(MediaInfo::from_json(&json))
    }

    async fn extract(
        &self,
        request: EngineRequest,
        progress: mpsc::UnboundedSender<EngineProgress>,
    ) -> Result<()> {
        let mut args = request.options.to_args();
        args.push(request.url.clone());

        let mut child = self
            .command(&args)
            .spawn()
            .map_err(|e| Error::ExternalTool(format!("failed to start yt-dlp: {}", e)))?;

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| Error::ExternalTool("yt-dlp stdout not captured".to_string()))?;
        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| Error::ExternalTool("yt-dlp stderr not captured".to_string()))?;

        let stderr_reader = tokio::spawn(async move {
            let mut tail = VecDeque::with_capacity(STDERR_TAIL_LINES);
            let mut lines = BufReader::new(stderr).lines();
            while let Ok(Some(line)) = lines.next_line().await {
                if tail.len() == STDERR_TAIL_LINES {
                    tail.pop_front();
                }
                tail.push_back(line);
            }
            tail
        });

        let mut output_path: Option<PathBuf> = None;
        let mut lines = BufReader::new(stdout).lines();
        while let Some(line) = lines.next_line().await? {
            if let Some(path) = parse_destination_line(&line) {
                tracing::debug!(path = %path.display(), "yt-dlp output destination");
                output_path = Some(path);
                continue;
            }
            if let Some(mut update) = parse_progress_line(&line) {
                // per-stream "finished" is intermediate; the final one is sent after exit
                if update.status == EngineStatus::Finished {
                    update.status = EngineStatus::Downloading;
                }
                let _ = progress.send(update);
            }
        }

        let status = child.wait().await?;
        let tail: Vec<String> = stderr_reader.await.unwrap_or_default().into();

        if !status.success() {
            return Err(Error::Engine(error_text(&tail, status)));
        }

        let _ = progress.send(EngineProgress::finished(output_path));
        Ok(())
    }
}

/// Parse a `--progress-template` line produced by [`EngineOptions::to_args`]
pub(crate) fn parse_progress_line(line: &str) -> Option<EngineProgress> {
    let rest = line.trim().strip_prefix(PROGRESS_PREFIX)?;
    let mut fields = rest.trim_start().splitn(5, ' ');

    let status = match fields.next()? {
        "downloading" => EngineStatus::Downloading,
        "finished" => EngineStatus::Finished,
        _ => return None,
    };
    let number = |field: Option<&str>| {
        field
            .and_then(|f| f.parse::<f64>().ok())
            .filter(|n| n.is_finite() && *n >= 0.0)
            .map(|n| n as u64)
    };
    let downloaded_bytes = number(fields.next()).unwrap_or(0);
    let total_bytes = number(fields.next());
    let total_bytes_estimate = number(fields.next());
    let filename = fields
        .next()
        .map(str::trim)
        .filter(|f| !f.is_empty() && *f != "NA")
        .map(PathBuf::from);

    Some(EngineProgress {
        status,
        downloaded_bytes,
        total_bytes,
        total_bytes_estimate,
        filename,
    })
}

/// Extract the output path from destination, merger and audio extraction lines
pub(crate) fn parse_destination_line(line: &str) -> Option<PathBuf> {
    let line = line.trim();

    let path = if let Some(rest) = line.strip_prefix("[download] Destination:") {
        rest.trim()
    } else if let Some(rest) = line.strip_prefix("[ExtractAudio] Destination:") {
        rest.trim()
    } else if let Some(rest) = line.strip_prefix("[Merger] Merging formats into \"") {
        rest.trim_end_matches('"')
    } else if let Some(rest) = line.strip_prefix("[download] ") {
        rest.strip_suffix(" has already been downloaded")?.trim()
    } else {
        return None;
    };

    (!path.is_empty()).then(|| PathBuf::from(path))
}

// ERROR: lines carry the actual cause; fall back to the tail, then the exit status
fn error_text(stderr: &[String], status: std::process::ExitStatus) -> String {
    let errors: Vec<&str> = stderr
        .iter()
        .map(|l| l.trim())
        .filter(|l| l.starts_with("ERROR:"))
        .collect();
    if !errors.is_empty() {
        return errors.join("\n");
    }

    let tail: Vec<&str> = stderr
        .iter()
        .map(|l| l.trim())
        .filter(|l| !l.is_empty())
        .collect();
    if tail.is_empty() {
        format!("yt-dlp exited with {}", status)
    } else {
        tail[tail.len().saturating_sub(5)..].join("\n")
    }
}
