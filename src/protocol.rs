//! JSON types for the HTTP API

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A single media format, normalized from extractor output.
///
/// `quality` stays a raw JSON value because the upstream tools disagree on
/// its shape: yt-dlp reports a numeric pixel height, the fallback renders
/// labels like `"720p"` or `"128kbps"`, and `"unknown"` stands in when a
/// format carries no usable hint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FormatDescriptor {
    pub quality: Value,
    pub container: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fps: Option<f64>,
    pub size: Option<u64>,
    #[serde(rename = "fileSizeH", skip_serializing_if = "Option::is_none")]
    pub file_size_h: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub format_note: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

/// Formats split by track presence: "video" means both a video and an audio
/// track, "audio" means audio only. Formats with neither are dropped.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FormatBuckets {
    pub video: Vec<FormatDescriptor>,
    pub audio: Vec<FormatDescriptor>,
}

/// Full lookup result, also the shape stored in the cache.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VideoInfo {
    pub title: String,
    pub duration: f64,
    pub view_count: u64,
    pub uploader: String,
    pub formats: FormatBuckets,
    pub thumbnail: String,
    pub description: String,
}

/// Buckets for the keyed formats listing, indexed by yt-dlp format id.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct KeyedFormatBuckets {
    pub video: BTreeMap<String, FormatDescriptor>,
    pub audio: BTreeMap<String, FormatDescriptor>,
}

/// Response shape of `/api/youtube/formats`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KeyedFormats {
    pub title: String,
    pub duration: f64,
    pub thumbnail: String,
    pub formats: KeyedFormatBuckets,
}

/// Response shape of `/health`.
#[derive(Debug, Clone, Serialize)]
pub struct HealthReport {
    pub status: String,
    pub time: String,
    pub version: String,
    pub yt_dlp_available: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub yt_dlp_version: Option<String>,
    pub fallback_available: bool,
}

/// Response shape of `/api/python/test-cookies`.
#[derive(Debug, Clone, Serialize)]
pub struct CookieReport {
    pub status: String,
    pub cookies_loaded: usize,
    pub cookie_names: Vec<String>,
    pub user_agent: String,
    pub has_login_info: bool,
    pub has_sapisid: bool,
    pub has_visitor_info: bool,
}

/// Error body for non-2xx responses.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Detail {
    pub detail: String,
}

/// Query parameters for the lookup endpoints.
#[derive(Debug, Clone, Deserialize)]
pub struct InfoQuery {
    pub url: String,
}

/// Query parameters for `/api/python/direct-download`.
#[derive(Debug, Clone, Deserialize)]
pub struct DownloadQuery {
    pub url: String,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default = "default_quality")]
    pub quality: String,
    #[serde(default = "default_format")]
    pub format: String,
}

fn default_quality() -> String {
    "highest".to_string()
}

fn default_format() -> String {
    "video".to_string()
}
