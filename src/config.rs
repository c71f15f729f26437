//! Configuration types for media-dl

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::{net::SocketAddr, path::PathBuf, time::Duration};
use utoipa::ToSchema;

/// Main configuration
///
/// Fields are organized into sub-configs, each with its own defaults, so a partial
/// JSON/TOML document only needs to name what it changes:
/// - [`download`](DownloadConfig) - directories, worker pool, retention of served files
/// - [`retry`](RetryConfig) - bot-rejection retry policy and identity rotation
/// - [`engine`](EngineConfig) - extraction engine binary and its transport options
/// - [`resolver`](ResolverConfig) - how the output file is located
/// - [`retention`](RetentionConfig) - bounds on progress records and history
#[derive(Clone, Debug, Default, Serialize, Deserialize, ToSchema)]
pub struct Config {
    /// Download behavior settings
    #[serde(default)]
    pub download: DownloadConfig,

    /// Retry policy for remote rejections
    #[serde(default)]
    pub retry: RetryConfig,

    /// Extraction engine settings
    #[serde(default)]
    pub engine: EngineConfig,

    /// Output resolution settings
    #[serde(default)]
    pub resolver: ResolverConfig,

    /// Eviction bounds for in-memory and persisted state
    #[serde(default)]
    pub retention: RetentionConfig,

    /// Data storage
    #[serde(default)]
    pub persistence: PersistenceConfig,

    /// REST API settings
    #[serde(default)]
    pub api: ApiConfig,
}

impl Config {
    /// Download directory
    pub fn download_dir(&self) -> &PathBuf {
        &self.download.download_dir
    }

    /// Check cross-field constraints that serde defaults cannot express
    pub fn validate(&self) -> Result<()> {
        fn invalid(key: &str, message: &str) -> Error {
            Error::Config {
                message: message.to_string(),
                key: Some(key.to_string()),
            }
        }

        if self.download.max_concurrent_jobs == 0 {
            return Err(invalid("download.max_concurrent_jobs", "must be at least 1"));
        }
        if self.retry.max_attempts == 0 {
            return Err(invalid("retry.max_attempts", "must be at least 1"));
        }
        if self.retry.backoff_max.is_zero() {
            return Err(invalid("retry.backoff_max", "must be greater than zero"));
        }
        if self.retry.backoff_min > self.retry.backoff_max {
            return Err(invalid(
                "retry.backoff_min",
                "must not be greater than retry.backoff_max",
            ));
        }
        if self.retry.min_sleep_interval > self.retry.max_sleep_interval {
            return Err(invalid(
                "retry.min_sleep_interval",
                "must not be greater than retry.max_sleep_interval",
            ));
        }
        if self.retry.user_agents.is_empty() {
            return Err(invalid("retry.user_agents", "at least one user agent is required"));
        }
        if self.resolver.hint_poll_interval.is_zero() {
            return Err(invalid("resolver.hint_poll_interval", "must be greater than zero"));
        }
        if self.resolver.media_extensions.is_empty() {
            return Err(invalid(
                "resolver.media_extensions",
                "at least one extension is required",
            ));
        }
        if self.retention.progress_capacity == 0 {
            return Err(invalid("retention.progress_capacity", "must be at least 1"));
        }
        if self.retention.sweep_interval.is_zero() {
            return Err(invalid("retention.sweep_interval", "must be greater than zero"));
        }
        Ok(())
    }
}

/// Download behavior configuration
#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct DownloadConfig {
    /// Download directory (default: "downloads")
    #[serde(default = "default_download_dir")]
    pub download_dir: PathBuf,

    /// Maximum jobs running the engine at once (default: 3)
    #[serde(default = "default_max_concurrent")]
    pub max_concurrent_jobs: usize,

    /// Give every job a private `download_dir/<job-id>/` output directory (default: true)
    #[serde(default = "default_true")]
    pub isolate_jobs: bool,

    /// Delete a file this long after it was served (default: 300 seconds, None = keep)
    #[serde(
        default = "default_served_file_retention",
        with = "optional_duration_serde"
    )]
    pub served_file_retention: Option<Duration>,

    /// How long shutdown waits for cancelled jobs to wind down (default: 30 seconds)
    #[serde(default = "default_shutdown_timeout", with = "duration_serde")]
    pub shutdown_timeout: Duration,
}

impl Default for DownloadConfig {
    fn default() -> Self {
        Self {
            download_dir: default_download_dir(),
            max_concurrent_jobs: default_max_concurrent(),
            isolate_jobs: true,
            served_file_retention: default_served_file_retention(),
            shutdown_timeout: default_shutdown_timeout(),
        }
    }
}

/// Retry configuration for anti-automation rejections
///
/// Only engine errors whose text matches one of `transient_signatures` are retried.
/// The delay before attempt `n + 1` is drawn uniformly from
/// `[backoff_min, backoff_max]` and multiplied by `n`.
#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct RetryConfig {
    /// Maximum number of attempts, including the first (default: 3)
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Lower bound of the per-attempt backoff unit (default: 5 seconds)
    #[serde(default = "default_backoff_min", with = "duration_serde")]
    pub backoff_min: Duration,

    /// Upper bound of the per-attempt backoff unit (default: 10 seconds)
    #[serde(default = "default_backoff_max", with = "duration_serde")]
    pub backoff_max: Duration,

    /// Lower bound for the engine's randomized pause between requests (default: 1 second)
    #[serde(default = "default_min_sleep_interval", with = "duration_serde")]
    pub min_sleep_interval: Duration,

    /// Upper bound for the engine's randomized pause between requests (default: 5 seconds)
    #[serde(default = "default_max_sleep_interval", with = "duration_serde")]
    pub max_sleep_interval: Duration,

    /// Browser identities rotated between attempts; the first is used initially
    #[serde(default = "default_user_agents")]
    pub user_agents: Vec<String>,

    /// Case-insensitive substrings marking an engine error as a bot rejection
    #[serde(default = "default_transient_signatures")]
    pub transient_signatures: Vec<String>,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            backoff_min: default_backoff_min(),
            backoff_max: default_backoff_max(),
            min_sleep_interval: default_min_sleep_interval(),
            max_sleep_interval: default_max_sleep_interval(),
            user_agents: default_user_agents(),
            transient_signatures: default_transient_signatures(),
        }
    }
}

/// Extraction engine (yt-dlp) configuration
#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct EngineConfig {
    /// Explicit path to the yt-dlp binary (default: None, search PATH)
    #[serde(default)]
    pub binary_path: Option<PathBuf>,

    /// Search PATH for yt-dlp when `binary_path` is unset (default: true)
    #[serde(default = "default_true")]
    pub search_path: bool,

    /// Socket read timeout passed to the engine (default: 30 seconds)
    #[serde(default = "default_engine_timeout", with = "duration_serde")]
    pub socket_timeout: Duration,

    /// Upper bound on a metadata probe (default: 30 seconds)
    #[serde(default = "default_engine_timeout", with = "duration_serde")]
    pub connect_timeout: Duration,

    /// Engine-level HTTP retries (default: 3)
    #[serde(default = "default_engine_retries")]
    pub retries: u32,

    /// Engine-level fragment retries for segmented streams (default: 5)
    #[serde(default = "default_fragment_retries")]
    pub fragment_retries: u32,

    /// Engine-level extractor retries (default: 3)
    #[serde(default = "default_engine_retries")]
    pub extractor_retries: u32,

    /// HTTP chunk size in bytes (default: 10 MiB)
    #[serde(default = "default_http_chunk_size")]
    pub http_chunk_size: u64,

    /// Audio bitrate for MP3 extraction, in kbps (default: "192")
    #[serde(default = "default_audio_quality")]
    pub audio_quality: String,

    /// Spoof geo-restriction headers (default: true)
    #[serde(default = "default_true")]
    pub geo_bypass: bool,

    /// Verify TLS certificates (default: false)
    #[serde(default)]
    pub check_certificates: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            binary_path: None,
            search_path: true,
            socket_timeout: default_engine_timeout(),
            connect_timeout: default_engine_timeout(),
            retries: default_engine_retries(),
            fragment_retries: default_fragment_retries(),
            extractor_retries: default_engine_retries(),
            http_chunk_size: default_http_chunk_size(),
            audio_quality: default_audio_quality(),
            geo_bypass: true,
            check_certificates: false,
        }
    }
}

/// Output resolution configuration
#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct ResolverConfig {
    /// How long to wait for the engine-reported path to appear (default: 5 seconds)
    #[serde(default = "default_hint_wait", with = "duration_serde")]
    pub hint_wait: Duration,

    /// Poll interval while waiting for the reported path, in milliseconds (default: 500)
    #[serde(default = "default_hint_poll_interval", with = "millis_serde")]
    pub hint_poll_interval: Duration,

    /// Files modified within this window count as recent (default: 600 seconds)
    #[serde(default = "default_recent_window", with = "duration_serde")]
    pub recent_window: Duration,

    /// Extensions (lowercase, no dot) that can be a job's output
    #[serde(default = "default_media_extensions")]
    pub media_extensions: Vec<String>,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            hint_wait: default_hint_wait(),
            hint_poll_interval: default_hint_poll_interval(),
            recent_window: default_recent_window(),
            media_extensions: default_media_extensions(),
        }
    }
}

/// Bounds on retained state
#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct RetentionConfig {
    /// Terminal progress records older than this are evicted (default: 3600 seconds)
    #[serde(default = "default_progress_ttl", with = "duration_serde")]
    pub progress_ttl: Duration,

    /// Maximum progress records kept (default: 10000)
    #[serde(default = "default_progress_capacity")]
    pub progress_capacity: usize,

    /// Maximum history rows kept (default: 1000)
    #[serde(default = "default_history_capacity")]
    pub history_capacity: u32,

    /// Interval between maintenance sweeps (default: 60 seconds)
    #[serde(default = "default_sweep_interval", with = "duration_serde")]
    pub sweep_interval: Duration,
}

impl Default for RetentionConfig {
    fn default() -> Self {
        Self {
            progress_ttl: default_progress_ttl(),
            progress_capacity: default_progress_capacity(),
            history_capacity: default_history_capacity(),
            sweep_interval: default_sweep_interval(),
        }
    }
}

/// Data storage configuration
#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct PersistenceConfig {
    /// Database path (default: "media-dl.db")
    #[serde(default = "default_database_path")]
    pub database_path: PathBuf,
}

impl Default for PersistenceConfig {
    fn default() -> Self {
        Self {
            database_path: default_database_path(),
        }
    }
}

/// REST API configuration
#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct ApiConfig {
    /// Address to bind to (default: 0.0.0.0:5000)
    #[serde(default = "default_bind_address")]
    pub bind_address: SocketAddr,

    /// Enable CORS for browser access (default: true)
    #[serde(default = "default_true")]
    pub cors_enabled: bool,

    /// Allowed CORS origins (default: ["*"])
    #[serde(default = "default_cors_origins")]
    pub cors_origins: Vec<String>,

    /// Enable Swagger UI at /swagger-ui (default: true)
    #[serde(default = "default_true")]
    pub swagger_ui: bool,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            bind_address: default_bind_address(),
            cors_enabled: true,
            cors_origins: default_cors_origins(),
            swagger_ui: true,
        }
    }
}

fn default_download_dir() -> PathBuf {
    PathBuf::from("downloads")
}

fn default_max_concurrent() -> usize {
    3
}

fn default_true() -> bool {
    true
}

fn default_served_file_retention() -> Option<Duration> {
    Some(Duration::from_secs(300))
}

fn default_shutdown_timeout() -> Duration {
    Duration::from_secs(30)
}

fn default_max_attempts() -> u32 {
    3
}

fn default_backoff_min() -> Duration {
    Duration::from_secs(5)
}

fn default_backoff_max() -> Duration {
    Duration::from_secs(10)
}

fn default_min_sleep_interval() -> Duration {
    Duration::from_secs(1)
}

fn default_max_sleep_interval() -> Duration {
    Duration::from_secs(5)
}

fn default_user_agents() -> Vec<String> {
    vec![
        "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36".to_string(),
        "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36".to_string(),
        "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36".to_string(),
        "Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv:121.0) Gecko/20100101 Firefox/121.0".to_string(),
        "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/17.2 Safari/605.1.15".to_string(),
    ]
}

fn default_transient_signatures() -> Vec<String> {
    vec![
        "sign in to confirm you're not a bot".to_string(),
        "not a bot".to_string(),
        "bot".to_string(),
    ]
}

fn default_engine_timeout() -> Duration {
    Duration::from_secs(30)
}

fn default_engine_retries() -> u32 {
    3
}

fn default_fragment_retries() -> u32 {
    5
}

fn default_http_chunk_size() -> u64 {
    10 * 1024 * 1024
}

fn default_audio_quality() -> String {
    "192".to_string()
}

fn default_hint_wait() -> Duration {
    Duration::from_secs(5)
}

fn default_hint_poll_interval() -> Duration {
    Duration::from_millis(500)
}

fn default_recent_window() -> Duration {
    Duration::from_secs(600)
}

fn default_media_extensions() -> Vec<String> {
    [
        "mp4", "mp3", "webm", "mkv", "m4a", "opus", "ogg", "flac", "wav", "mov", "avi",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

fn default_progress_ttl() -> Duration {
    Duration::from_secs(3600)
}

fn default_progress_capacity() -> usize {
    10_000
}

fn default_history_capacity() -> u32 {
    1000
}

fn default_sweep_interval() -> Duration {
    Duration::from_secs(60)
}

fn default_database_path() -> PathBuf {
    PathBuf::from("media-dl.db")
}

fn default_bind_address() -> SocketAddr {
    SocketAddr::from(([0, 0, 0, 0], 5000))
}

fn default_cors_origins() -> Vec<String> {
    vec!["*".to_string()]
}

// Duration serialization helper
mod duration_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(duration.as_secs())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = u64::deserialize(deserializer)?;
        Ok(Duration::from_secs(secs))
    }
}

// Sub-second intervals are written as milliseconds
mod millis_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(duration.as_millis() as u64)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let millis = u64::deserialize(deserializer)?;
        Ok(Duration::from_millis(millis))
    }
}

// Optional Duration serialization helper
mod optional_duration_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Option<Duration>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match duration {
            Some(d) => serializer.serialize_some(&d.as_secs()),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<Duration>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = Option::<u64>::deserialize(deserializer)?;
        Ok(secs.map(Duration::from_secs))
    }
}
