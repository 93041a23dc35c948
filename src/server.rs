//! HTTP surface of the gateway

use std::convert::Infallible;
use std::sync::Arc;

use hyper::Body;
use tracing::{error, info, warn};
use warp::http::{header, Response, StatusCode};
use warp::{Filter, Reply};

use crate::cookies;
use crate::extract::{ExtractError, MediaKind, Quality, StreamSelection};
use crate::protocol::{Detail, DownloadQuery, HealthReport, InfoQuery};
use crate::state::AppState;
use crate::utils;

pub struct ServerConfig {
    pub port: u16,
}

pub async fn run(config: ServerConfig, state: Arc<AppState>) -> anyhow::Result<()> {
    info!("gateway listening on http://0.0.0.0:{}", config.port);
    warp::serve(routes(state)).run(([0, 0, 0, 0], config.port)).await;
    Ok(())
}

/// All routes, combined. Kept separate from `run` so tests can drive the
/// filter directly.
pub fn routes(
    state: Arc<AppState>,
) -> impl Filter<Extract = (impl Reply,), Error = warp::Rejection> + Clone {
    let cors = warp::cors()
        .allow_any_origin()
        .allow_methods(vec!["GET", "OPTIONS"])
        .allow_headers(vec!["Content-Type"]);

    let health = warp::path!("health")
        .and(warp::get())
        .and(with_state(state.clone()))
        .and_then(health_handler);

    let formats = warp::path!("api" / "youtube" / "formats")
        .and(warp::get())
        .and(warp::query::<InfoQuery>())
        .and(with_state(state.clone()))
        .and_then(formats_handler);

    let test_cookies = warp::path!("api" / "python" / "test-cookies")
        .and(warp::get())
        .and(with_state(state.clone()))
        .and_then(test_cookies_handler);

    let video_info = warp::path!("api" / "python" / "video-info")
        .and(warp::get())
        .and(warp::query::<InfoQuery>())
        .and(with_state(state.clone()))
        .and_then(video_info_handler);

    let download = warp::path!("api" / "python" / "direct-download")
        .and(warp::get())
        .and(warp::query::<DownloadQuery>())
        .and(with_state(state))
        .and_then(direct_download_handler);

    health
        .or(formats)
        .or(test_cookies)
        .or(video_info)
        .or(download)
        .with(cors)
}

fn with_state(
    state: Arc<AppState>,
) -> impl Filter<Extract = (Arc<AppState>,), Error = Infallible> + Clone {
    warp::any().map(move || state.clone())
}

fn error_reply(status: StatusCode, detail: String) -> warp::reply::Response {
    warp::reply::with_status(warp::reply::json(&Detail { detail }), status).into_response()
}

async fn health_handler(state: Arc<AppState>) -> Result<impl Reply, Infallible> {
    let yt_dlp_version = state.ytdlp.probe_version().await;
    let report = HealthReport {
        status: "healthy".to_string(),
        time: utils::utc_timestamp(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        yt_dlp_available: yt_dlp_version.is_some(),
        yt_dlp_version,
        fallback_available: state.fallback_enabled,
    };
    Ok(warp::reply::json(&report))
}

async fn formats_handler(
    query: InfoQuery,
    state: Arc<AppState>,
) -> Result<impl Reply, Infallible> {
    match state.ytdlp.keyed_formats(&query.url).await {
        Ok(listing) => Ok(warp::reply::json(&listing)),
        Err(e) => {
            warn!("format listing failed for {}: {}", query.url, e);
            // This route keeps its historical envelope: errors come back as
            // a 200 with an "error" field.
            Ok(warp::reply::json(
                &serde_json::json!({ "error": e.to_string() }),
            ))
        }
    }
}

async fn test_cookies_handler(state: Arc<AppState>) -> Result<impl Reply, Infallible> {
    let report = cookies::report(&state.cookie_file, utils::random_user_agent());
    Ok(warp::reply::json(&report))
}

async fn video_info_handler(
    query: InfoQuery,
    state: Arc<AppState>,
) -> Result<warp::reply::Response, Infallible> {
    match state.video_info(&query.url).await {
        Ok(info) => Ok(warp::reply::json(&info).into_response()),
        Err(e) => {
            error!("video info lookup failed for {}: {}", query.url, e);
            Ok(error_reply(
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("Failed to get video information: {}", e),
            ))
        }
    }
}

async fn direct_download_handler(
    query: DownloadQuery,
    state: Arc<AppState>,
) -> Result<warp::reply::Response, Infallible> {
    info!(
        "direct download request: url={} format={} quality={}",
        query.url, query.format, query.quality
    );

    let kind = MediaKind::from_param(&query.format);
    let selection = StreamSelection::new(kind, Quality::parse(&query.quality));

    // Display title: explicit parameter, else a (possibly cached) lookup,
    // else a generic placeholder.
    let title = match query.title.filter(|t| !t.is_empty()) {
        Some(title) => title,
        None => match state.video_info(&query.url).await {
            Ok(info) => info.title,
            Err(e) => {
                warn!("could not resolve title for {}: {}", query.url, e);
                "video".to_string()
            }
        },
    };
    let filename = format!("{}.{}", utils::sanitize_filename(&title), kind.file_extension());

    let resolved = match state.chain.resolve_stream(&query.url, &selection).await {
        Ok(resolved) => resolved,
        Err(e @ ExtractError::NoMatchingStream(_)) => {
            return Ok(error_reply(StatusCode::NOT_FOUND, e.to_string()));
        }
        Err(e) => {
            error!("download resolution failed for {}: {}", query.url, e);
            return Ok(error_reply(
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("Download failed: {}", e),
            ));
        }
    };

    // Open the upstream connection before the first response byte goes out,
    // so a transport failure maps to a status code instead of error text
    // spliced into the payload. After this point a failed read terminates
    // the connection abruptly.
    let upstream = match state
        .http
        .get(&resolved.url)
        .send()
        .await
        .and_then(|response| response.error_for_status())
    {
        Ok(response) => response,
        Err(e) => {
            error!("upstream fetch failed for {}: {}", query.url, e);
            return Ok(error_reply(
                StatusCode::BAD_GATEWAY,
                format!("Upstream fetch failed: {}", e),
            ));
        }
    };

    let response = Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, kind.content_type())
        .header(
            header::CONTENT_DISPOSITION,
            format!("attachment; filename=\"{}\"", filename),
        )
        .body(Body::wrap_stream(upstream.bytes_stream()));

    match response {
        Ok(response) => Ok(response),
        Err(e) => {
            error!("failed to build download response: {}", e);
            Ok(error_reply(
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("Download failed: {}", e),
            ))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::InfoCache;
    use crate::extract::testing::{FailingExtractor, NoStreamExtractor};
    use crate::extract::{ExtractorChain, YtDlp};
    use serde_json::Value;
    use std::path::PathBuf;
    use std::time::Duration;

    fn test_state(chain: ExtractorChain) -> Arc<AppState> {
        Arc::new(AppState {
            cache: InfoCache::new(16, Duration::from_secs(60)),
            chain,
            ytdlp: Arc::new(YtDlp::new(PathBuf::from("cookies.txt"), Duration::from_secs(1))),
            http: reqwest::Client::new(),
            cookie_file: PathBuf::from("/nonexistent/cookies.txt"),
            fallback_enabled: false,
        })
    }

    fn failing_chain() -> ExtractorChain {
        let mut chain = ExtractorChain::new();
        chain.push(Arc::new(FailingExtractor {
            name: "yt-dlp",
            message: "primary broke",
        }));
        chain
    }

    #[tokio::test]
    async fn health_reports_status_and_fallback() {
        let filter = routes(test_state(ExtractorChain::new()));
        let response = warp::test::request().path("/health").reply(&filter).await;

        assert_eq!(response.status(), StatusCode::OK);
        let body: Value = serde_json::from_slice(response.body()).unwrap();
        assert_eq!(body["status"], "healthy");
        assert_eq!(body["fallback_available"], false);
        assert!(body.get("version").is_some());
    }

    #[tokio::test]
    async fn test_cookies_with_missing_file() {
        let filter = routes(test_state(ExtractorChain::new()));
        let response = warp::test::request()
            .path("/api/python/test-cookies")
            .reply(&filter)
            .await;

        assert_eq!(response.status(), StatusCode::OK);
        let body: Value = serde_json::from_slice(response.body()).unwrap();
        assert_eq!(body["status"], "success");
        assert_eq!(body["cookies_loaded"], 0);
        assert_eq!(body["has_sapisid"], false);
    }

    #[tokio::test]
    async fn video_info_failure_maps_to_500_with_cause() {
        let filter = routes(test_state(failing_chain()));
        let response = warp::test::request()
            .path("/api/python/video-info?url=https://example.com/v")
            .reply(&filter)
            .await;

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body: Value = serde_json::from_slice(response.body()).unwrap();
        let detail = body["detail"].as_str().unwrap();
        assert!(detail.contains("yt-dlp failed"));
        assert!(detail.contains("primary broke"));
    }

    #[tokio::test]
    async fn download_without_matching_stream_is_404() {
        let mut chain = ExtractorChain::new();
        chain.push(Arc::new(NoStreamExtractor));
        let filter = routes(test_state(chain));

        let response = warp::test::request()
            .path("/api/python/direct-download?url=https://example.com/v&title=t&format=audio")
            .reply(&filter)
            .await;

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        let body: Value = serde_json::from_slice(response.body()).unwrap();
        assert!(body["detail"].as_str().unwrap().contains("audio"));
    }

    #[tokio::test]
    async fn download_with_failed_resolution_is_500() {
        let filter = routes(test_state(failing_chain()));
        let response = warp::test::request()
            .path("/api/python/direct-download?url=https://example.com/v&title=t")
            .reply(&filter)
            .await;

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body: Value = serde_json::from_slice(response.body()).unwrap();
        assert!(body["detail"].as_str().unwrap().contains("Download failed"));
    }

    #[tokio::test]
    async fn missing_url_parameter_is_rejected() {
        let filter = routes(test_state(ExtractorChain::new()));
        let response = warp::test::request()
            .path("/api/python/video-info")
            .reply(&filter)
            .await;

        assert!(response.status().is_client_error());
    }
}
