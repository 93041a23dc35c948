//! Extraction backends and primary/fallback orchestration
//!
//! Each backend normalizes its own output into the wire shape; the chain
//! tries them in order and aggregates every failure into one message.

mod rustube;
mod ytdlp;

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::protocol::VideoInfo;

pub use self::rustube::RustubeExtractor;
pub use self::ytdlp::YtDlp;

/// Requested media kind, from the `format` query parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaKind {
    Video,
    Audio,
}

impl MediaKind {
    pub fn from_param(param: &str) -> Self {
        if param.eq_ignore_ascii_case("audio") {
            Self::Audio
        } else {
            Self::Video
        }
    }

    pub fn file_extension(&self) -> &'static str {
        match self {
            Self::Video => "mp4",
            Self::Audio => "mp3",
        }
    }

    pub fn content_type(&self) -> &'static str {
        match self {
            Self::Video => "video/mp4",
            Self::Audio => "audio/mp3",
        }
    }
}

impl fmt::Display for MediaKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Video => "video",
            Self::Audio => "audio",
        })
    }
}

/// Requested quality, from the `quality` query parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Quality {
    Highest,
    MaxHeight(u32),
}

impl Quality {
    /// Parse hints like "highest", "720p" or "720". Anything unparsable
    /// falls back to `Highest`.
    pub fn parse(param: &str) -> Self {
        let param = param.trim();
        if param.eq_ignore_ascii_case("highest") {
            return Self::Highest;
        }
        match param.trim_end_matches(|c| c == 'p' || c == 'P').parse::<u32>() {
            Ok(height) if height > 0 => Self::MaxHeight(height),
            _ => Self::Highest,
        }
    }
}

/// What the caller asked to download.
#[derive(Debug, Clone, Copy)]
pub struct StreamSelection {
    pub kind: MediaKind,
    pub quality: Quality,
}

impl StreamSelection {
    pub fn new(kind: MediaKind, quality: Quality) -> Self {
        Self { kind, quality }
    }

    /// yt-dlp format selector expression for this selection.
    pub fn format_selector(&self) -> String {
        match (self.kind, self.quality) {
            (MediaKind::Audio, _) => "bestaudio".to_string(),
            (MediaKind::Video, Quality::Highest) => "best".to_string(),
            (MediaKind::Video, Quality::MaxHeight(height)) => {
                format!("best[height<={}]", height)
            }
        }
    }
}

/// Direct, time-limited media URL picked by a backend.
#[derive(Debug, Clone)]
pub struct ResolvedStream {
    pub url: String,
}

/// One backend's failure, kept for aggregation.
#[derive(Debug, Clone)]
pub struct BackendFailure {
    pub backend: &'static str,
    pub message: String,
}

impl fmt::Display for BackendFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} failed: {}", self.backend, self.message)
    }
}

fn join_failures(failures: &[BackendFailure]) -> String {
    if failures.is_empty() {
        return "no extraction backend configured".to_string();
    }
    failures
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(" | ")
}

#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("yt-dlp executable not found (install with: pip install yt-dlp)")]
    ToolNotFound,

    #[error("extraction failed: {0}")]
    Extraction(String),

    #[error("failed to parse extractor output: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("extractor timed out after {0} seconds")]
    Timeout(u64),

    #[error("no suitable {0} stream found")]
    NoMatchingStream(MediaKind),

    #[error("{}", join_failures(.0))]
    AllFailed(Vec<BackendFailure>),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// A metadata/stream extraction backend.
#[async_trait]
pub trait Extractor: Send + Sync {
    /// Backend name used in logs and aggregated error messages
    fn name(&self) -> &'static str;

    /// Full metadata lookup, normalized into the wire shape.
    async fn video_info(&self, url: &str) -> Result<VideoInfo, ExtractError>;

    /// Resolve a direct media URL for the given kind/quality.
    async fn resolve_stream(
        &self,
        url: &str,
        selection: &StreamSelection,
    ) -> Result<ResolvedStream, ExtractError>;
}

/// Ordered backends with fallback.
#[derive(Default)]
pub struct ExtractorChain {
    backends: Vec<Arc<dyn Extractor>>,
}

impl ExtractorChain {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, backend: Arc<dyn Extractor>) {
        self.backends.push(backend);
    }

    pub async fn video_info(&self, url: &str) -> Result<VideoInfo, ExtractError> {
        let mut failures = Vec::new();

        for backend in &self.backends {
            debug!("trying {} for {}", backend.name(), url);
            match backend.video_info(url).await {
                Ok(info) => {
                    info!("{} resolved info for {}", backend.name(), url);
                    return Ok(info);
                }
                Err(e) => {
                    warn!("{} failed for {}: {}", backend.name(), url, e);
                    failures.push(BackendFailure {
                        backend: backend.name(),
                        message: e.to_string(),
                    });
                }
            }
        }

        Err(ExtractError::AllFailed(failures))
    }

    pub async fn resolve_stream(
        &self,
        url: &str,
        selection: &StreamSelection,
    ) -> Result<ResolvedStream, ExtractError> {
        let mut failures = Vec::new();

        for backend in &self.backends {
            debug!("resolving stream via {} for {}", backend.name(), url);
            match backend.resolve_stream(url, selection).await {
                Ok(stream) => {
                    info!("{} resolved a {} stream for {}", backend.name(), selection.kind, url);
                    return Ok(stream);
                }
                // A definitive "nothing matches" answer is not a backend
                // malfunction; surface it as-is.
                Err(e @ ExtractError::NoMatchingStream(_)) => return Err(e),
                Err(e) => {
                    warn!("{} failed for {}: {}", backend.name(), url, e);
                    failures.push(BackendFailure {
                        backend: backend.name(),
                        message: e.to_string(),
                    });
                }
            }
        }

        Err(ExtractError::AllFailed(failures))
    }
}
