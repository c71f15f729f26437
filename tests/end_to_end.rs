//! End-to-end tests driving the public Orchestrator API with a scripted engine
//!
//! Every test runs against a fresh temp directory and SQLite database. The engine is
//! replaced by [`common::ScriptedEngine`] so no network access or yt-dlp binary is needed.

mod common;

use common::*;
use media_dl::{Error, Event, FormatChoice, JobStatus};
use std::sync::Arc;
use std::time::Duration;

const WAIT: Duration = Duration::from_secs(10);

fn download(name: &str, bytes: usize) -> Attempt {
    Attempt::Download {
        name: name.to_string(),
        bytes,
        chunks: 4,
    }
}

#[tokio::test]
async fn test_mp3_job_runs_to_completion_and_is_retrievable() {
    let engine = Arc::new(ScriptedEngine::new(vec![download("Song.mp3", 2048)]));
    let (orchestrator, temp_dir) = create_orchestrator(engine.clone()).await;

    let job = orchestrator
        .submit("https://www.youtube.com/watch?v=abc123", FormatChoice::Mp3)
        .await
        .unwrap();

    let record = assert_job_completed(&orchestrator, job.id, WAIT).await;
    assert_eq!(record.progress, 100.0);
    assert_eq!(record.message, "Download completed successfully!");
    assert_eq!(record.filename.as_deref(), Some("Song.mp3"));

    // Isolated per-job directory
    let job_dir = temp_dir.path().join("downloads").join(job.id.to_string());
    assert_files_exist(&job_dir, &["Song.mp3"]);

    // Audio extraction was requested from the engine
    let requests = engine.requests.lock().unwrap();
    assert_eq!(
        requests[0].options.extract_audio.as_ref().map(|(codec, _)| codec.as_str()),
        Some("mp3")
    );
    drop(requests);

    let file = orchestrator.retrieve(job.id).await.unwrap();
    assert_eq!(file.filename, "Song.mp3");
    assert_eq!(file.content_type, "audio/mpeg");
    assert_eq!(file.size, 2048);

    let history = orchestrator.history(10, 0).await.unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].url, "https://www.youtube.com/watch?v=abc123");
    assert_eq!(history[0].format, FormatChoice::Mp3);
}

#[tokio::test]
async fn test_event_sequence_for_successful_job() {
    let engine = Arc::new(ScriptedEngine::new(vec![download("clip.mp4", 1024)]));
    let (orchestrator, _temp_dir) = create_orchestrator(engine).await;
    let mut events = orchestrator.subscribe();

    let job = orchestrator
        .submit("https://vimeo.com/1", FormatChoice::P720)
        .await
        .unwrap();

    let collected = collect_events_until(&mut events, WAIT, |event| {
        matches!(event, Event::Completed { id, .. } | Event::Failed { id, .. } if *id == job.id)
    })
    .await;

    let kinds: Vec<&str> = collected.iter().map(Event::kind).collect();
    assert_eq!(kinds.first(), Some(&"queued"));
    assert!(kinds.contains(&"downloading"));
    assert_eq!(kinds.last(), Some(&"completed"));

    // Percentages never go backwards
    let percents: Vec<f32> = collected
        .iter()
        .filter_map(|event| match event {
            Event::Downloading { percent, .. } => Some(*percent),
            _ => None,
        })
        .collect();
    assert!(percents.windows(2).all(|pair| pair[0] <= pair[1]));
}

#[tokio::test]
async fn test_bot_detection_retries_then_succeeds() {
    let engine = Arc::new(ScriptedEngine::new(vec![
        Attempt::Fail("ERROR: Sign in to confirm you're not a bot".to_string()),
        download("clip.mp4", 512),
    ]));
    let (orchestrator, _temp_dir) = create_orchestrator(engine.clone()).await;
    let mut events = orchestrator.subscribe();

    let job = orchestrator
        .submit("https://www.youtube.com/watch?v=retry", FormatChoice::BestQuality)
        .await
        .unwrap();

    assert_job_completed(&orchestrator, job.id, WAIT).await;
    assert_eq!(engine.calls(), 2);

    let collected = collect_events_until(&mut events, Duration::from_millis(500), |event| {
        matches!(event, Event::Completed { .. })
    })
    .await;
    let retry = collected
        .iter()
        .find_map(|event| match event {
            Event::Retrying { attempt, .. } => Some(*attempt),
            _ => None,
        })
        .expect("Expected a retrying event");
    assert_eq!(retry, 1);
}

#[tokio::test]
async fn test_bot_detection_exhausts_attempts() {
    let engine = Arc::new(ScriptedEngine::new(vec![Attempt::Fail(
        "ERROR: Sign in to confirm you're not a bot".to_string(),
    )]));
    let (orchestrator, _temp_dir) = create_orchestrator(engine.clone()).await;

    let job = orchestrator
        .submit("https://www.youtube.com/watch?v=blocked", FormatChoice::P1080)
        .await
        .unwrap();

    let record = assert_job_failed(&orchestrator, job.id, WAIT, Some("not a bot")).await;
    assert!(record.message.starts_with("Download failed:"));
    assert_eq!(engine.calls(), 3, "Default policy allows three attempts");
    assert_eq!(orchestrator.history_count().await.unwrap(), 0);
}

#[tokio::test]
async fn test_non_transient_error_fails_without_retry() {
    let engine = Arc::new(ScriptedEngine::new(vec![Attempt::Fail(
        "ERROR: Unsupported URL: https://example.com/page".to_string(),
    )]));
    let (orchestrator, _temp_dir) = create_orchestrator(engine.clone()).await;

    let job = orchestrator
        .submit("https://example.com/page", FormatChoice::BestQuality)
        .await
        .unwrap();

    assert_job_failed(&orchestrator, job.id, WAIT, Some("Unsupported URL")).await;
    assert_eq!(engine.calls(), 1);
}

#[tokio::test]
async fn test_silent_engine_output_found_by_directory_scan() {
    let engine = Arc::new(ScriptedEngine::new(vec![Attempt::Silent {
        name: "quiet.webm".to_string(),
        bytes: 300,
    }]));
    let (orchestrator, _temp_dir) = create_orchestrator(engine).await;

    let job = orchestrator
        .submit("https://example.com/quiet", FormatChoice::BestQuality)
        .await
        .unwrap();

    let record = assert_job_completed(&orchestrator, job.id, WAIT).await;
    assert_eq!(record.filename.as_deref(), Some("quiet.webm"));
}

#[tokio::test]
async fn test_wrong_hint_falls_back_to_written_file() {
    let engine = Arc::new(ScriptedEngine::new(vec![Attempt::WrongHint {
        reported: "clip.f137.mp4".to_string(),
        written: "clip.mp4".to_string(),
    }]));
    let (orchestrator, _temp_dir) = create_orchestrator(engine).await;

    let job = orchestrator
        .submit("https://example.com/merge", FormatChoice::P720)
        .await
        .unwrap();

    let record = assert_job_completed(&orchestrator, job.id, WAIT).await;
    assert_eq!(record.filename.as_deref(), Some("clip.mp4"));
}

#[tokio::test]
async fn test_cancel_running_job() {
    let engine = Arc::new(ScriptedEngine::new(vec![Attempt::Hang]));
    let (orchestrator, temp_dir) = create_orchestrator(engine).await;

    let job = orchestrator
        .submit("https://example.com/slow", FormatChoice::BestQuality)
        .await
        .unwrap();
    assert!(wait_for_downloading(&orchestrator, job.id, WAIT).await);

    orchestrator.cancel(job.id).await.unwrap();

    let record = assert_job_failed(&orchestrator, job.id, WAIT, Some("cancelled")).await;
    assert_eq!(record.message, "Download cancelled");

    // Isolated directory is cleaned up with the job
    let job_dir = temp_dir.path().join("downloads").join(job.id.to_string());
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert!(!job_dir.exists());
}

#[tokio::test]
async fn test_pool_limits_running_jobs() {
    let engine = Arc::new(ScriptedEngine::new(vec![Attempt::Hang]));
    let (orchestrator, _temp_dir) = create_orchestrator_with(engine.clone(), |config| {
        config.download.max_concurrent_jobs = 2;
    })
    .await;

    let mut ids = Vec::new();
    for i in 0..4 {
        let job = orchestrator
            .submit(&format!("https://example.com/{}", i), FormatChoice::BestQuality)
            .await
            .unwrap();
        ids.push(job.id);
    }

    tokio::time::sleep(Duration::from_millis(300)).await;
    assert_eq!(engine.calls(), 2, "Only two engines should run at once");

    let mut waiting = 0;
    for id in &ids {
        if orchestrator.progress(*id).await.unwrap().status == JobStatus::Starting {
            waiting += 1;
        }
    }
    assert_eq!(waiting, 2);

    orchestrator.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_shutdown_rejects_new_jobs_and_cancels_running() {
    let engine = Arc::new(ScriptedEngine::new(vec![Attempt::Hang]));
    let (orchestrator, _temp_dir) = create_orchestrator(engine).await;

    let job = orchestrator
        .submit("https://example.com/long", FormatChoice::BestQuality)
        .await
        .unwrap();
    assert!(wait_for_downloading(&orchestrator, job.id, WAIT).await);

    orchestrator.shutdown().await.unwrap();
    assert!(!orchestrator.is_accepting());
    assert_eq!(orchestrator.active_job_count().await, 0);

    let result = orchestrator
        .submit("https://example.com/late", FormatChoice::BestQuality)
        .await;
    assert!(matches!(result, Err(Error::ShuttingDown)));

    let record = orchestrator.progress(job.id).await.unwrap();
    assert_eq!(record.status, JobStatus::Error);
}

#[tokio::test]
async fn test_history_survives_restart() {
    let engine = Arc::new(ScriptedEngine::new(vec![download("keep.mp4", 128)]));
    let temp_dir = tempfile::tempdir().unwrap();

    {
        let orchestrator =
            media_dl::Orchestrator::with_engine(test_config(&temp_dir), engine.clone())
                .await
                .unwrap();
        let job = orchestrator
            .submit("https://example.com/keep", FormatChoice::P720)
            .await
            .unwrap();
        assert_job_completed(&orchestrator, job.id, WAIT).await;
        orchestrator.shutdown().await.unwrap();
    }

    let orchestrator = media_dl::Orchestrator::with_engine(test_config(&temp_dir), engine)
        .await
        .unwrap();
    let history = orchestrator.history(10, 0).await.unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].filename, "keep.mp4");
}
