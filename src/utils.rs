//! Small helpers shared across the gateway

use lazy_static::lazy_static;
use rand::seq::SliceRandom;
use regex::Regex;
use time::macros::format_description;
use time::OffsetDateTime;

/// Browser user agents rotated across upstream requests
const USER_AGENTS: &[&str] = &[
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/131.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/130.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv:132.0) Gecko/20100101 Firefox/132.0",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/131.0.0.0 Safari/537.36 Edg/131.0.0.0",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/131.0.0.0 Safari/537.36",
];

lazy_static! {
    static ref UNSAFE_FILENAME: Regex = Regex::new(r"[^a-zA-Z0-9\-_.]").unwrap();
}

pub fn random_user_agent() -> &'static str {
    USER_AGENTS
        .choose(&mut rand::thread_rng())
        .copied()
        .unwrap_or(USER_AGENTS[0])
}

/// Replace anything outside `[A-Za-z0-9-_.]` so a title is safe inside a
/// `Content-Disposition` filename.
pub fn sanitize_filename(title: &str) -> String {
    UNSAFE_FILENAME.replace_all(title, "_").into_owned()
}

/// Humanize a byte count into the "12.34 MB" shape the listing uses,
/// or "unknown" when the extractor reported no size.
pub fn human_size(bytes: Option<u64>) -> String {
    match bytes {
        Some(b) => format!("{:.2} MB", b as f64 / 1024.0 / 1024.0),
        None => "unknown".to_string(),
    }
}

/// Cap a description at 500 characters, appending an ellipsis marker when
/// there was any text at all.
pub fn truncate_description(description: &str) -> String {
    if description.is_empty() {
        return String::new();
    }
    let capped: String = description.chars().take(500).collect();
    format!("{}...", capped)
}

/// Current UTC time as "YYYY-MM-DD HH:MM:SS"
pub fn utc_timestamp() -> String {
    let format = format_description!("[year]-[month]-[day] [hour]:[minute]:[second]");
    OffsetDateTime::now_utc()
        .format(&format)
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sanitize_replaces_special_characters() {
        assert_eq!(sanitize_filename("My Video: Part 1!"), "My_Video__Part_1_");
    }

    #[test]
    fn sanitize_keeps_safe_characters() {
        assert_eq!(sanitize_filename("clip-01_final.v2"), "clip-01_final.v2");
    }

    #[test]
    fn sanitize_handles_non_ascii() {
        assert_eq!(sanitize_filename("café"), "caf_");
    }

    #[test]
    fn human_size_formats_megabytes() {
        assert_eq!(human_size(Some(10 * 1024 * 1024)), "10.00 MB");
        assert_eq!(human_size(None), "unknown");
    }

    #[test]
    fn description_truncated_at_500_chars() {
        let long = "a".repeat(600);
        let out = truncate_description(&long);
        assert_eq!(out.chars().count(), 503);
        assert!(out.ends_with("..."));
    }

    #[test]
    fn empty_description_stays_empty() {
        assert_eq!(truncate_description(""), "");
    }

    #[test]
    fn user_agent_comes_from_pool() {
        let ua = random_user_agent();
        assert!(USER_AGENTS.contains(&ua));
    }

    #[test]
    fn timestamp_has_expected_shape() {
        let ts = utc_timestamp();
        assert_eq!(ts.len(), 19);
        assert_eq!(&ts[4..5], "-");
        assert_eq!(&ts[10..11], " ");
    }
}
