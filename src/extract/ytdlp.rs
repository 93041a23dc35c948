//! yt-dlp subprocess backend
//!
//! Drives the yt-dlp executable with `--dump-json` and normalizes the
//! resulting document. Nothing is ever downloaded through yt-dlp itself;
//! only metadata and direct media URLs are resolved here.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use tokio::process::Command as TokioCommand;
use tokio::time::timeout;
use tracing::debug;

use crate::protocol::{
    FormatBuckets, FormatDescriptor, KeyedFormatBuckets, KeyedFormats, VideoInfo,
};
use crate::utils;

use super::{ExtractError, Extractor, ResolvedStream, StreamSelection};

/// Largest media file yt-dlp may resolve
const MAX_FILESIZE: &str = "1G";

/// Find the yt-dlp executable, checking PATH first and then the common
/// per-user pip install location on Windows.
pub fn find_ytdlp() -> Option<PathBuf> {
    if let Ok(output) = std::process::Command::new("yt-dlp").arg("--version").output() {
        if output.status.success() {
            return Some(PathBuf::from("yt-dlp"));
        }
    }

    #[cfg(windows)]
    if let Ok(appdata) = std::env::var("APPDATA") {
        if let Ok(entries) = std::fs::read_dir(PathBuf::from(appdata).join("Python")) {
            for entry in entries.flatten() {
                let candidate = entry.path().join("Scripts").join("yt-dlp.exe");
                if candidate.exists() {
                    return Some(candidate);
                }
            }
        }
    }

    None
}

pub struct YtDlp {
    program: PathBuf,
    cookie_file: PathBuf,
    timeout_secs: u64,
}

impl YtDlp {
    pub fn new(cookie_file: PathBuf, timeout: Duration) -> Self {
        Self {
            program: find_ytdlp().unwrap_or_else(|| PathBuf::from("yt-dlp")),
            cookie_file,
            timeout_secs: timeout.as_secs().max(1),
        }
    }

    /// Probe `yt-dlp --version`; `None` when the binary is missing or broken.
    pub async fn probe_version(&self) -> Option<String> {
        let output = TokioCommand::new(&self.program)
            .arg("--version")
            .output()
            .await
            .ok()?;
        if !output.status.success() {
            return None;
        }
        let version = String::from_utf8_lossy(&output.stdout).trim().to_string();
        (!version.is_empty()).then_some(version)
    }

    /// Run one `--dump-json` extraction with the full options bundle.
    async fn dump_json(&self, url: &str, selector: &str) -> Result<Value, ExtractError> {
        let mut cmd = TokioCommand::new(&self.program);
        cmd.args(["--dump-json", "--no-warnings", "--no-playlist"])
            .args(["-f", selector])
            .args(["--user-agent", utils::random_user_agent()])
            .args(["--add-header", "Accept-Language:en-US,en;q=0.9"])
            .args(["--add-header", "Referer:https://www.youtube.com/"])
            .args(["--retries", "5", "--fragment-retries", "5"])
            .args(["--socket-timeout", "30"])
            .args(["--geo-bypass", "--geo-bypass-country", "IN"])
            .args(["--concurrent-fragments", "4"])
            .args(["--max-filesize", MAX_FILESIZE])
            .args(["--prefer-free-formats"]);

        if self.cookie_file.exists() {
            cmd.arg("--cookies").arg(&self.cookie_file);
        }

        cmd.arg(url)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        debug!("spawning {} for {}", self.program.display(), url);

        let output = match timeout(Duration::from_secs(self.timeout_secs), cmd.output()).await {
            Ok(result) => result.map_err(|e| {
                if e.kind() == std::io::ErrorKind::NotFound {
                    ExtractError::ToolNotFound
                } else {
                    ExtractError::Io(e)
                }
            })?,
            Err(_) => return Err(ExtractError::Timeout(self.timeout_secs)),
        };

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let message = stderr
                .lines()
                .rev()
                .find(|line| !line.trim().is_empty())
                .unwrap_or("yt-dlp exited with an error")
                .trim()
                .to_string();
            return Err(ExtractError::Extraction(message));
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        Ok(serde_json::from_str(stdout.trim())?)
    }

    /// Listing keyed by format id, served by `/api/youtube/formats`.
    pub async fn keyed_formats(&self, url: &str) -> Result<KeyedFormats, ExtractError> {
        let info = self.dump_json(url, "best").await?;
        Ok(keyed(&info))
    }
}

#[async_trait]
impl Extractor for YtDlp {
    fn name(&self) -> &'static str {
        "yt-dlp"
    }

    async fn video_info(&self, url: &str) -> Result<VideoInfo, ExtractError> {
        let info = self.dump_json(url, "best").await?;
        Ok(normalize(&info))
    }

    async fn resolve_stream(
        &self,
        url: &str,
        selection: &StreamSelection,
    ) -> Result<ResolvedStream, ExtractError> {
        let info = self.dump_json(url, &selection.format_selector()).await?;
        let direct = info
            .get("url")
            .and_then(Value::as_str)
            .ok_or_else(|| ExtractError::Extraction("no direct url in yt-dlp output".to_string()))?;
        Ok(ResolvedStream {
            url: direct.to_string(),
        })
    }
}

/// Normalize a yt-dlp info document into the cacheable lookup shape.
fn normalize(info: &Value) -> VideoInfo {
    let mut buckets = FormatBuckets::default();

    if let Some(formats) = info.get("formats").and_then(Value::as_array) {
        for fmt in formats {
            let vcodec = fmt.get("vcodec").and_then(Value::as_str).unwrap_or("none");
            let acodec = fmt.get("acodec").and_then(Value::as_str).unwrap_or("none");

            let descriptor = FormatDescriptor {
                quality: quality_value(fmt),
                container: text_field(fmt, "ext", "unknown"),
                fps: fmt.get("fps").and_then(Value::as_f64),
                size: fmt.get("filesize").and_then(Value::as_u64),
                file_size_h: None,
                format_note: None,
                url: None,
            };

            if vcodec != "none" && acodec != "none" {
                buckets.video.push(descriptor);
            } else if acodec != "none" && vcodec == "none" {
                buckets.audio.push(descriptor);
            }
        }
    }

    VideoInfo {
        title: text_field(info, "title", "Unknown Title"),
        duration: info.get("duration").and_then(Value::as_f64).unwrap_or(0.0),
        view_count: info.get("view_count").and_then(Value::as_u64).unwrap_or(0),
        uploader: text_field(info, "uploader", "Unknown"),
        formats: buckets,
        thumbnail: text_field(info, "thumbnail", ""),
        description: utils::truncate_description(
            info.get("description").and_then(Value::as_str).unwrap_or(""),
        ),
    }
}

/// Build the format-id-keyed listing, with humanized sizes and direct URLs.
fn keyed(info: &Value) -> KeyedFormats {
    let mut video = BTreeMap::new();
    let mut audio = BTreeMap::new();

    if let Some(formats) = info.get("formats").and_then(Value::as_array) {
        for fmt in formats {
            let vcodec = fmt.get("vcodec").and_then(Value::as_str).unwrap_or("none");
            let acodec = fmt.get("acodec").and_then(Value::as_str).unwrap_or("none");
            let format_id = text_field(fmt, "format_id", "unknown");

            let size = fmt
                .get("filesize")
                .and_then(Value::as_u64)
                .or_else(|| fmt.get("filesize_approx").and_then(Value::as_u64));

            let descriptor = FormatDescriptor {
                quality: quality_value(fmt),
                container: text_field(fmt, "ext", "unknown"),
                fps: fmt.get("fps").and_then(Value::as_f64),
                size,
                file_size_h: Some(utils::human_size(size)),
                format_note: Some(text_field(fmt, "format_note", "")),
                url: Some(text_field(fmt, "url", "")),
            };

            if vcodec != "none" && acodec != "none" {
                video.insert(format_id, descriptor);
            } else if acodec != "none" && vcodec == "none" {
                audio.insert(format_id, descriptor);
            }
        }
    }

    KeyedFormats {
        title: text_field(info, "title", "Unknown Title"),
        duration: info.get("duration").and_then(Value::as_f64).unwrap_or(0.0),
        thumbnail: text_field(info, "thumbnail", ""),
        formats: KeyedFormatBuckets { video, audio },
    }
}

fn quality_value(fmt: &Value) -> Value {
    match fmt.get("height") {
        Some(height) if !height.is_null() => height.clone(),
        _ => Value::String("unknown".to_string()),
    }
}

fn text_field(info: &Value, key: &str, default: &str) -> String {
    info.get(key)
        .and_then(Value::as_str)
        .unwrap_or(default)
        .to_string()
}
