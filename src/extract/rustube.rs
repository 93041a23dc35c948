//! rustube fallback backend
//!
//! Used when yt-dlp fails. rustube exposes per-stream track-presence
//! attributes, so classification and selection work directly on its
//! stream list instead of a format selector expression.

use async_trait::async_trait;
use serde_json::Value;
use tracing::debug;

use ::rustube::{Id, Video, VideoFetcher};

use crate::protocol::{FormatBuckets, FormatDescriptor, VideoInfo};
use crate::utils;

use super::{ExtractError, Extractor, MediaKind, Quality, ResolvedStream, StreamSelection};

pub struct RustubeExtractor;

impl RustubeExtractor {
    async fn fetch(url: &str) -> Result<Video, ExtractError> {
        debug!("fetching {} via rustube", url);

        let id = Id::from_raw(url)
            .map_err(|e| ExtractError::Extraction(e.to_string()))?
            .as_owned();

        let video = VideoFetcher::from_id(id)
            .map_err(|e| ExtractError::Extraction(e.to_string()))?
            .fetch()
            .await
            .map_err(|e| ExtractError::Extraction(e.to_string()))?
            .descramble()
            .map_err(|e| ExtractError::Extraction(e.to_string()))?;

        Ok(video)
    }
}

#[async_trait]
impl Extractor for RustubeExtractor {
    fn name(&self) -> &'static str {
        "rustube"
    }

    async fn video_info(&self, url: &str) -> Result<VideoInfo, ExtractError> {
        let video = Self::fetch(url).await?;
        Ok(normalize(&video))
    }

    async fn resolve_stream(
        &self,
        url: &str,
        selection: &StreamSelection,
    ) -> Result<ResolvedStream, ExtractError> {
        let video = Self::fetch(url).await?;

        let stream = match selection.kind {
            MediaKind::Audio => video.best_audio(),
            MediaKind::Video => match selection.quality {
                Quality::Highest => video.best_quality(),
                Quality::MaxHeight(max) => {
                    let progressive: Vec<_> = video
                        .streams()
                        .iter()
                        .filter(|s| s.includes_video_track && s.includes_audio_track)
                        .collect();
                    let heights: Vec<Option<u64>> =
                        progressive.iter().map(|s| s.height).collect();
                    match pick_by_height(&heights, u64::from(max)) {
                        Some(index) => Some(progressive[index]),
                        // Nothing at or below the requested height; take
                        // the best the video has.
                        None => video.best_quality(),
                    }
                }
            },
        };

        let stream = stream.ok_or(ExtractError::NoMatchingStream(selection.kind))?;
        Ok(ResolvedStream {
            url: stream.signature_cipher.url.to_string(),
        })
    }
}

/// Index of the tallest candidate whose height is known and at most `max`.
fn pick_by_height(heights: &[Option<u64>], max: u64) -> Option<usize> {
    heights
        .iter()
        .enumerate()
        .filter_map(|(index, height)| height.map(|h| (index, h)))
        .filter(|(_, height)| *height <= max)
        .max_by_key(|(_, height)| *height)
        .map(|(index, _)| index)
}

/// Normalize a descrambled video into the cacheable lookup shape.
fn normalize(video: &Video) -> VideoInfo {
    let details = video.video_details();
    let mut buckets = FormatBuckets::default();

    for stream in video.streams() {
        if stream.includes_video_track && stream.includes_audio_track {
            buckets.video.push(FormatDescriptor {
                quality: match stream.height {
                    Some(height) => Value::String(format!("{}p", height)),
                    None => Value::String("unknown".to_string()),
                },
                container: stream.mime.subtype().as_str().to_string(),
                fps: None,
                size: None,
                file_size_h: None,
                format_note: None,
                url: None,
            });
        } else if stream.includes_audio_track && !stream.includes_video_track {
            buckets.audio.push(FormatDescriptor {
                quality: match stream.bitrate {
                    Some(bitrate) => Value::String(format!("{}kbps", bitrate / 1000)),
                    None => Value::String("unknown".to_string()),
                },
                container: stream.mime.subtype().as_str().to_string(),
                fps: None,
                size: None,
                file_size_h: None,
                format_note: None,
                url: None,
            });
        }
    }

    VideoInfo {
        title: details.title.clone(),
        duration: details.length_seconds as f64,
        view_count: details.view_count,
        uploader: details.author.clone(),
        formats: buckets,
        thumbnail: details
            .thumbnails
            .last()
            .map(|thumbnail| thumbnail.url.clone())
            .unwrap_or_default(),
        description: utils::truncate_description(&details.short_description),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn picks_tallest_height_at_or_below_limit() {
        let heights = vec![Some(360), Some(480), Some(720), Some(1080)];
        assert_eq!(pick_by_height(&heights, 720), Some(2));
        assert_eq!(pick_by_height(&heights, 700), Some(1));
        assert_eq!(pick_by_height(&heights, 4320), Some(3));
    }

    #[test]
    fn ignores_streams_without_height() {
        let heights = vec![None, Some(480), None];
        assert_eq!(pick_by_height(&heights, 720), Some(1));
    }

    #[test]
    fn no_candidate_below_limit() {
        let heights = vec![Some(720), Some(1080)];
        assert_eq!(pick_by_height(&heights, 480), None);
        assert_eq!(pick_by_height(&[], 480), None);
    }
}
