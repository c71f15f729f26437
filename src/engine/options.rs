//! Per-attempt engine options

use crate::config::EngineConfig;
use crate::retry::RequestParams;
use crate::types::{FormatChoice, Job};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Output file name template, relative to the job's output directory
pub const OUTPUT_TEMPLATE: &str = "%(title)s.%(ext)s";

/// Prefix of the machine-readable progress lines requested from yt-dlp
pub(crate) const PROGRESS_PREFIX: &str = "media-dl-progress";

/// Site family detected from the URL host
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Site {
    /// youtube.com, youtu.be
    YouTube,
    /// tiktok.com
    TikTok,
    /// instagram.com
    Instagram,
    /// twitter.com, x.com
    Twitter,
    /// facebook.com, fb.watch
    Facebook,
    /// twitch.tv
    Twitch,
    /// Anything else
    Other,
}

impl Site {
    /// Detect the site from a URL; unparseable URLs are [`Site::Other`]
    pub fn detect(url: &str) -> Self {
        let Some(host) = url::Url::parse(url)
            .ok()
            .and_then(|u| u.host_str().map(|h| h.to_ascii_lowercase()))
        else {
            return Site::Other;
        };

        let on = |domain: &str| host == domain || host.ends_with(&format!(".{}", domain));
        if on("youtube.com") || on("youtu.be") {
            Site::YouTube
        } else if on("tiktok.com") {
            Site::TikTok
        } else if on("instagram.com") {
            Site::Instagram
        } else if on("twitter.com") || on("x.com") {
            Site::Twitter
        } else if on("facebook.com") || on("fb.watch") {
            Site::Facebook
        } else if on("twitch.tv") {
            Site::Twitch
        } else {
            Site::Other
        }
    }

    fn extractor_args(&self) -> Option<&'static str> {
        match self {
            Site::TikTok => Some("tiktok:webpage_url_basename=video"),
            Site::Instagram => Some("instagram:include_sidecar=false"),
            Site::Twitter => Some("twitter:cards=false"),
            Site::Facebook => Some("facebook:include_dash_manifest=false"),
            Site::Twitch => Some("twitch:vod_id=true"),
            Site::YouTube | Site::Other => None,
        }
    }
}

const YOUTUBE_EXTRACTOR_ARGS: &str = "youtube:skip=dash,hls;player_skip=configs";

/// Options for a single engine invocation
#[derive(Clone, Debug, PartialEq)]
pub struct EngineOptions {
    /// Format selector
    pub format: String,
    /// Container to merge separate video/audio streams into
    pub merge_output_format: Option<String>,
    /// Audio codec and bitrate when extracting audio
    pub extract_audio: Option<(String, String)>,
    /// Directory the output is written to
    pub output_dir: PathBuf,
    /// File name template inside `output_dir`
    pub output_template: String,
    /// Browser identity
    pub user_agent: String,
    /// Minimum pause between requests
    pub sleep_interval: Duration,
    /// Maximum pause between requests
    pub max_sleep_interval: Duration,
    /// Socket timeout
    pub socket_timeout: Duration,
    /// Engine-level HTTP retries
    pub retries: u32,
    /// Engine-level fragment retries
    pub fragment_retries: u32,
    /// Engine-level extractor retries
    pub extractor_retries: u32,
    /// HTTP chunk size in bytes
    pub http_chunk_size: u64,
    /// Spoof geo-restriction headers
    pub geo_bypass: bool,
    /// Verify TLS certificates
    pub check_certificates: bool,
    /// Extractor arguments (`site:key=value;...`)
    pub extractor_args: Vec<String>,
}

impl EngineOptions {
    /// Options for downloading `job` into `output_dir` with the request shape `params`
    pub fn for_job(
        job: &Job,
        params: &RequestParams,
        output_dir: &Path,
        config: &EngineConfig,
    ) -> Self {
        let site = Site::detect(&job.url);
        let (mut format, mut merge, extract_audio) = match job.format {
            FormatChoice::Mp3 => (
                "bestaudio/best".to_string(),
                None,
                Some(("mp3".to_string(), config.audio_quality.clone())),
            ),
            FormatChoice::P720 => (height_capped(720), Some("mp4".to_string()), None),
            FormatChoice::P1080 => (height_capped(1080), Some("mp4".to_string()), None),
            FormatChoice::P4k => (height_capped(2160), Some("mp4".to_string()), None),
            FormatChoice::BestQuality => {
                ("best[ext=mp4]/best".to_string(), Some("mp4".to_string()), None)
            }
            FormatChoice::Default => (
                "bestvideo[ext=mp4]+bestaudio[ext=m4a]/best[ext=mp4]/best".to_string(),
                Some("mp4".to_string()),
                None,
            ),
        };

        if site == Site::TikTok && extract_audio.is_none() {
            format = "best[ext=mp4]/best".to_string();
            merge = None;
        }

        let mut extractor_args = vec![YOUTUBE_EXTRACTOR_ARGS.to_string()];
        if let Some(args) = site.extractor_args() {
            extractor_args.push(args.to_string());
        }

        Self {
            format,
            merge_output_format: merge,
            extract_audio,
            output_dir: output_dir.to_path_buf(),
            output_template: OUTPUT_TEMPLATE.to_string(),
            user_agent: params.user_agent.clone(),
            sleep_interval: params.sleep_interval,
            max_sleep_interval: params.max_sleep_interval.max(params.sleep_interval),
            socket_timeout: config.socket_timeout,
            retries: config.retries,
            fragment_retries: config.fragment_retries,
            extractor_retries: config.extractor_retries,
            http_chunk_size: config.http_chunk_size,
            geo_bypass: config.geo_bypass,
            check_certificates: config.check_certificates,
            extractor_args,
        }
    }

    /// Options for a metadata probe of `url`
    pub fn for_probe(url: &str, params: &RequestParams, config: &EngineConfig) -> Self {
        let job = Job::new(url, FormatChoice::BestQuality);
        Self::for_job(&job, params, Path::new("."), config)
    }

    /// Arguments shared by downloads and probes
    fn common_args(&self) -> Vec<String> {
        let mut args = vec![
            "--no-playlist".to_string(),
            "--no-color".to_string(),
            "--no-warnings".to_string(),
            "--user-agent".to_string(),
            self.user_agent.clone(),
            "--socket-timeout".to_string(),
            self.socket_timeout.as_secs().to_string(),
            "--retries".to_string(),
            self.retries.to_string(),
            "--extractor-retries".to_string(),
            self.extractor_retries.to_string(),
        ];
        if self.geo_bypass {
            args.push("--geo-bypass".to_string());
        }
        if !self.check_certificates {
            args.extend(
                ["--no-check-certificates", "--prefer-insecure", "--legacy-server-connect"]
                    .map(String::from),
            );
        }
        for extractor_args in &self.extractor_args {
            args.push("--extractor-args".to_string());
            args.push(extractor_args.clone());
        }
        args
    }

    /// Command-line arguments for a yt-dlp download
    pub fn to_args(&self) -> Vec<String> {
        let mut args = self.common_args();
        args.extend([
            "-f".to_string(),
            self.format.clone(),
            "-o".to_string(),
            self.output_dir
                .join(&self.output_template)
                .to_string_lossy()
                .into_owned(),
            "--restrict-filenames".to_string(),
            "--fragment-retries".to_string(),
            self.fragment_retries.to_string(),
            "--http-chunk-size".to_string(),
            self.http_chunk_size.to_string(),
            "--sleep-interval".to_string(),
            format_secs(self.sleep_interval),
            "--max-sleep-interval".to_string(),
            format_secs(self.max_sleep_interval),
            "--newline".to_string(),
            "--progress-template".to_string(),
            format!(
                "download:{} %(progress.status)s %(progress.downloaded_bytes)s \
                 %(progress.total_bytes)s %(progress.total_bytes_estimate)s %(progress.filename)s",
                PROGRESS_PREFIX
            ),
        ]);
        if let Some(merge) = &self.merge_output_format {
            args.push("--merge-output-format".to_string());
            args.push(merge.clone());
        }
        if let Some((codec, quality)) = &self.extract_audio {
            args.extend([
                "-x".to_string(),
                "--audio-format".to_string(),
                codec.clone(),
                "--audio-quality".to_string(),
                format!("{}K", quality),
            ]);
        }
        args
    }

    /// Command-line arguments for a yt-dlp metadata dump
    pub fn to_probe_args(&self) -> Vec<String> {
        let mut args = self.common_args();
        args.extend(["--dump-single-json", "--skip-download"].map(String::from));
        args
    }
}

fn height_capped(height: u32) -> String {
    format!(
        "bestvideo[height<={h}][ext=mp4]+bestaudio[ext=m4a]/best[height<={h}]/best",
        h = height
    )
}

fn format_secs(duration: Duration) -> String {
    let secs = duration.as_secs_f64();
    if secs.fract() == 0.0 {
        format!("{}", secs as u64)
    } else {
        format!("{:.3}", secs)
    }
}
