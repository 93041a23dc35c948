//! Netscape cookie file handling
//!
//! The cookie file is read fresh on every request; the browser exporting it
//! may rewrite it at any time, so nothing here is cached.

use std::collections::HashMap;
use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};

use tracing::info;

use crate::protocol::CookieReport;

/// Cookies must belong to this domain to be forwarded
const COOKIE_DOMAIN: &str = "youtube.com";

/// Load non-expired cookies for the target domain.
///
/// A missing or unreadable file is not an error: extraction is attempted
/// without cookies, exactly like a first run before the user exported any.
pub fn load_cookies(path: &Path) -> HashMap<String, String> {
    let text = match std::fs::read_to_string(path) {
        Ok(text) => text,
        Err(_) => {
            info!("no cookie file at {}, continuing without cookies", path.display());
            return HashMap::new();
        }
    };

    let cookies = parse_netscape(&text, COOKIE_DOMAIN, unix_now());
    info!("loaded {} valid cookies from {}", cookies.len(), path.display());
    cookies
}

/// Parse Netscape-format lines: domain, flag, path, secure, expiration,
/// name, value, all tab-separated. Expired entries, foreign domains and
/// malformed lines are skipped.
fn parse_netscape(text: &str, domain: &str, now: u64) -> HashMap<String, String> {
    let mut cookies = HashMap::new();

    for line in text.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let parts: Vec<&str> = line.split('\t').collect();
        if parts.len() < 7 {
            continue;
        }

        let expiration: u64 = match parts[4].parse() {
            Ok(value) => value,
            Err(_) => continue,
        };

        if parts[0].contains(domain) && expiration > now {
            cookies.insert(parts[5].to_string(), parts[6].to_string());
        }
    }

    cookies
}

/// Build the diagnostic report served by `/api/python/test-cookies`.
pub fn report(path: &Path, user_agent: &str) -> CookieReport {
    let cookies = load_cookies(path);

    let mut cookie_names: Vec<String> = cookies.keys().cloned().collect();
    cookie_names.sort();

    CookieReport {
        status: "success".to_string(),
        cookies_loaded: cookies.len(),
        cookie_names,
        user_agent: user_agent.to_string(),
        has_login_info: cookies.contains_key("LOGIN_INFO"),
        has_sapisid: cookies.contains_key("SAPISID"),
        has_visitor_info: cookies.contains_key("VISITOR_INFO1_LIVE"),
    }
}

fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_secs())
        .unwrap_or(0)
}
