use serde::{Deserialize, Serialize};
use std::time::Duration;

use browser::NavigateOptions;

use crate::storage::StorageConfig;

/// Crawler signatures checked against the caller's user agent
pub const DEFAULT_BOT_PATTERN: &str = "bot|crawl|archiver|transcoder|spider|uptime|validator|fetcher|cron|checker|reader|extractor|monitoring|analyzer|scraper";

/// Largest body returned inline; also the bot-trimming trigger
pub const DEFAULT_SIZE_THRESHOLD: usize = 5_800_000;

/// Seven days
pub const DEFAULT_CACHE_MAX_AGE: u64 = 7 * 24 * 60 * 60;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderConfig {
    /// Hostname suffixes that may be rendered and fetched
    pub allowed_suffixes: Vec<String>,
    /// Name used in the rejection message
    pub allowed_label: String,
    /// Image requests under this path are never fetched
    pub document_asset_segment: String,
    /// Regexes for infrastructure URLs that would hang or pollute a render
    pub denied_url_patterns: Vec<String>,
    pub size_threshold: usize,
    pub cache_max_age_secs: u64,
    pub navigation_timeout_secs: u64,
    pub idle_connections: usize,
    pub idle_quiet_ms: u64,
    pub prerender_header_name: String,
    pub prerender_header_value: String,
    /// Caller headers holding the original user agent, first match wins
    pub user_agent_headers: Vec<String>,
    pub bot_pattern: String,
    /// Container whose descendants lose their `style` attribute for bots
    pub content_selector: String,
    pub minify: bool,
    pub storage: StorageConfig,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            allowed_suffixes: vec!["cbd.int".to_string(), "cbddev.xyz".to_string()],
            allowed_label: "CBD".to_string(),
            document_asset_segment: "/api/v2013/documents/".to_string(),
            denied_url_patterns: vec![
                r"/socket\.io".to_string(),
                r"app/authorize\.html$".to_string(),
                r"/error-logs".to_string(),
            ],
            size_threshold: DEFAULT_SIZE_THRESHOLD,
            cache_max_age_secs: DEFAULT_CACHE_MAX_AGE,
            navigation_timeout_secs: 15,
            idle_connections: 0,
            idle_quiet_ms: 500,
            prerender_header_name: "X-Is-Prerender".to_string(),
            prerender_header_value: "true".to_string(),
            user_agent_headers: vec!["X-Origin-User-Agent".to_string(), "User-Agent".to_string()],
            bot_pattern: DEFAULT_BOT_PATTERN.to_string(),
            content_selector: ".page-content".to_string(),
            minify: false,
            storage: StorageConfig::default(),
        }
    }
}

impl RenderConfig {
    pub fn navigation_timeout(&self) -> Duration {
        Duration::from_secs(self.navigation_timeout_secs)
    }

    pub fn navigate_options(&self) -> NavigateOptions {
        NavigateOptions {
            timeout: self.navigation_timeout(),
            idle_connections: self.idle_connections,
            idle_quiet: Duration::from_millis(self.idle_quiet_ms),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_values_match_expected() {
        let cfg = RenderConfig::default();

        assert_eq!(cfg.allowed_suffixes, vec!["cbd.int", "cbddev.xyz"]);
        assert_eq!(cfg.size_threshold, 5_800_000);
        assert_eq!(cfg.cache_max_age_secs, 604_800);
        assert_eq!(cfg.navigation_timeout(), Duration::from_secs(15));
        assert_eq!(cfg.prerender_header_name, "X-Is-Prerender");
        assert_eq!(cfg.storage.bucket, "pdf-cache-prod");
        assert!(!cfg.minify);

        let nav = cfg.navigate_options();
        assert_eq!(nav.idle_connections, 0);
        assert_eq!(nav.idle_quiet, Duration::from_millis(500));
    }

    #[test]
    fn partial_json_keeps_defaults() {
        let cfg: RenderConfig = serde_json::from_str(
            r#"{ "navigation_timeout_secs": 30, "storage": { "bucket": "html-cache-dev" } }"#,
        )
        .unwrap();

        assert_eq!(cfg.navigation_timeout(), Duration::from_secs(30));
        assert_eq!(cfg.storage.bucket, "html-cache-dev");
        assert_eq!(cfg.storage.key_prefix, "html-files/");
        assert_eq!(cfg.content_selector, ".page-content");
    }
}
