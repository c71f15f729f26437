//! # media-dl
//!
//! Backend library for media download services: accept a URL and a format, run the
//! download on a background task through an extraction engine (`yt-dlp`), expose
//! pollable progress, and hand the finished file back.
//!
//! ## Design Philosophy
//!
//! media-dl is designed to be:
//! - **Non-blocking** - `submit` returns a job id immediately; work runs on its own task
//! - **Resilient** - bot-detection rejections are retried with a rotated request shape
//! - **Bounded** - a worker pool caps running engines; progress and history are pruned
//! - **Library-first** - the REST API is a thin layer over [`Orchestrator`]
//!
//! ## Quick Start
//!
//! ```no_run
//! use media_dl::{Config, FormatChoice, Orchestrator};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let orchestrator = Orchestrator::new(Config::default()).await?;
//!
//!     // Subscribe to events
//!     let mut events = orchestrator.subscribe();
//!     tokio::spawn(async move {
//!         while let Ok(event) = events.recv().await {
//!             println!("Event: {:?}", event);
//!         }
//!     });
//!
//!     let job = orchestrator
//!         .submit("https://www.youtube.com/watch?v=dQw4w9WgXcQ", FormatChoice::Mp3)
//!         .await?;
//!     println!("{:?}", orchestrator.progress(job.id).await?);
//!
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]

/// REST API module
pub mod api;
/// Configuration types
pub mod config;
/// Database persistence layer
pub mod db;
/// Extraction engine trait, options and the yt-dlp implementation
pub mod engine;
/// Error types
pub mod error;
/// Job orchestration (decomposed into focused submodules)
pub mod orchestrator;
/// Live progress records
pub mod progress;
/// Locating a finished job's output file
pub mod resolver;
/// Retry policy for bot-detection rejections
pub mod retry;
/// Core types and events
pub mod types;

// Re-export commonly used types
pub use config::Config;
pub use db::Database;
pub use engine::{EngineProgress, EngineRequest, ExtractionEngine, MediaInfo, YtDlpEngine};
pub use error::{ApiError, DatabaseError, Error, ErrorDetail, Result, ToHttpStatus};
pub use orchestrator::Orchestrator;
pub use progress::ProgressStore;
pub use resolver::{OutputResolver, ResolutionDiagnostic};
pub use retry::{ErrorClassifier, RequestParams, RetryDecision, RetryPolicy};
pub use types::{
    Event, FormatChoice, HistoryEntry, Job, JobHandle, JobId, JobStatus, ProgressRecord,
    RetrievedFile,
};

/// Helper function to run the orchestrator with graceful signal handling.
///
/// Waits for a termination signal and then calls the orchestrator's `shutdown()` method.
///
/// Listens for SIGTERM and Ctrl+C on unix, Ctrl+C elsewhere.
///
/// # Example
///
/// ```no_run
/// use media_dl::{Config, Orchestrator, run_with_shutdown};
/// use std::sync::Arc;
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let orchestrator = Arc::new(Orchestrator::new(Config::default()).await?);
///     let _server = orchestrator.spawn_api_server();
///
///     // Run with automatic signal handling
///     run_with_shutdown(&orchestrator).await?;
///
///     Ok(())
/// }
/// ```
pub async fn run_with_shutdown(orchestrator: &Orchestrator) -> Result<()> {
    wait_for_signal().await;
    orchestrator.shutdown().await
}

/// Resolve on SIGTERM or Ctrl+C (Ctrl+C only off unix)
async fn wait_for_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};

        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    _ = sigterm.recv() => tracing::info!("Received SIGTERM signal"),
                    _ = tokio::signal::ctrl_c() => tracing::info!("Received Ctrl+C signal"),
                }
                return;
            }
            Err(e) => tracing::warn!(error = %e, "No SIGTERM handler, waiting for Ctrl+C only"),
        }
    }

    match tokio::signal::ctrl_c().await {
        Ok(()) => tracing::info!("Received Ctrl+C signal"),
        Err(e) => tracing::error!(error = %e, "Failed to listen for Ctrl+C signal"),
    }
}
