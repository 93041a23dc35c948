//! tubegate
//!
//! A thin HTTP gateway that resolves video URLs to metadata and format
//! lists via yt-dlp, falls back to rustube when that fails, and streams
//! download bytes back to the caller unmodified.

mod cache;
mod cookies;
mod extract;
mod protocol;
mod server;
mod state;
mod utils;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tracing::{error, Level};
use tracing_subscriber::FmtSubscriber;

use state::AppState;

/// tubegate - video lookup and download gateway
#[derive(Parser, Debug)]
#[command(name = "tubegate")]
#[command(about = "HTTP gateway for video metadata lookup and download streaming")]
#[command(version)]
struct Args {
    /// Port to listen on
    #[arg(short, long, default_value = "8001")]
    port: u16,

    /// Netscape-format cookie file passed to yt-dlp
    #[arg(long, default_value = "cookies.txt")]
    cookie_file: PathBuf,

    /// Seconds a cached lookup stays valid
    #[arg(long, default_value = "3600")]
    cache_ttl: u64,

    /// Maximum number of cached lookups
    #[arg(long, default_value = "256")]
    cache_capacity: usize,

    /// Wall-clock timeout for a single yt-dlp invocation, in seconds
    #[arg(long, default_value = "120")]
    extract_timeout: u64,

    /// Disable the rustube fallback extractor
    #[arg(long)]
    no_fallback: bool,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let level = match args.log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .compact()
        .init();

    let state = Arc::new(AppState::new(
        args.cookie_file.clone(),
        args.cache_capacity,
        Duration::from_secs(args.cache_ttl),
        Duration::from_secs(args.extract_timeout),
        !args.no_fallback,
    ));

    let ytdlp_version = state.ytdlp.probe_version().await;

    println!();
    println!("========================================================");
    println!("  tubegate v{}", env!("CARGO_PKG_VERSION"));
    println!("========================================================");
    println!("  HTTP:     http://0.0.0.0:{}", args.port);
    println!("  Cache:    {} entries, {}s TTL", args.cache_capacity, args.cache_ttl);
    println!("  yt-dlp:   {}", ytdlp_version.as_deref().unwrap_or("NOT FOUND"));
    println!("  Fallback: {}", if args.no_fallback { "disabled" } else { "rustube" });
    println!("  Cookies:  {}", args.cookie_file.display());
    println!("========================================================");
    println!();

    let config = server::ServerConfig { port: args.port };
    if let Err(e) = server::run(config, state).await {
        error!("Server error: {}", e);
        return Err(e);
    }

    Ok(())
}
