//! Shared application state

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info};

use crate::cache::InfoCache;
use crate::extract::{ExtractError, ExtractorChain, RustubeExtractor, YtDlp};
use crate::protocol::VideoInfo;

pub struct AppState {
    pub cache: InfoCache,
    pub chain: ExtractorChain,
    pub ytdlp: Arc<YtDlp>,
    pub http: reqwest::Client,
    pub cookie_file: PathBuf,
    pub fallback_enabled: bool,
}

impl AppState {
    pub fn new(
        cookie_file: PathBuf,
        cache_capacity: usize,
        cache_ttl: Duration,
        extract_timeout: Duration,
        enable_fallback: bool,
    ) -> Self {
        let ytdlp = Arc::new(YtDlp::new(cookie_file.clone(), extract_timeout));

        let mut chain = ExtractorChain::new();
        chain.push(ytdlp.clone());
        if enable_fallback {
            chain.push(Arc::new(RustubeExtractor));
        }

        Self {
            cache: InfoCache::new(cache_capacity, cache_ttl),
            chain,
            ytdlp,
            http: reqwest::Client::new(),
            cookie_file,
            fallback_enabled: enable_fallback,
        }
    }

    /// Cached lookup: a fresh cache entry short-circuits the whole
    /// extractor chain. Concurrent misses for the same URL may both run an
    /// extraction; the last writer wins.
    pub async fn video_info(&self, url: &str) -> Result<VideoInfo, ExtractError> {
        if let Some(info) = self.cache.get(url) {
            debug!("using cached info for {}", url);
            return Ok(info);
        }

        info!("fetching video info for {}", url);
        let info = self.chain.video_info(url).await?;
        self.cache.put(url.to_string(), info.clone());
        Ok(info)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extract::testing::CountingExtractor;
    use std::sync::atomic::Ordering;

    fn state_with(chain: ExtractorChain, ttl: Duration) -> AppState {
        AppState {
            cache: InfoCache::new(16, ttl),
            chain,
            ytdlp: Arc::new(YtDlp::new(PathBuf::from("cookies.txt"), Duration::from_secs(1))),
            http: reqwest::Client::new(),
            cookie_file: PathBuf::from("cookies.txt"),
            fallback_enabled: false,
        }
    }

    #[tokio::test]
    async fn second_lookup_within_ttl_hits_cache() {
        let backend = Arc::new(CountingExtractor::new("mock"));
        let mut chain = ExtractorChain::new();
        chain.push(backend.clone());
        let state = state_with(chain, Duration::from_secs(60));

        let first = state.video_info("https://example.com/v").await.unwrap();
        let second = state.video_info("https://example.com/v").await.unwrap();

        assert_eq!(first, second);
        assert_eq!(backend.info_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn expired_entry_triggers_fresh_lookup() {
        let backend = Arc::new(CountingExtractor::new("mock"));
        let mut chain = ExtractorChain::new();
        chain.push(backend.clone());
        let state = state_with(chain, Duration::from_millis(5));

        state.video_info("https://example.com/v").await.unwrap();
        tokio::time::sleep(Duration::from_millis(10)).await;
        state.video_info("https://example.com/v").await.unwrap();

        assert_eq!(backend.info_calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn different_urls_are_cached_separately() {
        let backend = Arc::new(CountingExtractor::new("mock"));
        let mut chain = ExtractorChain::new();
        chain.push(backend.clone());
        let state = state_with(chain, Duration::from_secs(60));

        state.video_info("https://example.com/a").await.unwrap();
        state.video_info("https://example.com/b").await.unwrap();

        assert_eq!(backend.info_calls.load(Ordering::SeqCst), 2);
    }
}
