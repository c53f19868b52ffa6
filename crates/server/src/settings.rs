use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use browser::BrowserConfig;
use prerender::RenderConfig;

/// Contents of the optional JSON settings file
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub render: RenderConfig,
    pub browser: BrowserConfig,
}

impl Settings {
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        let Some(path) = path else {
            return Ok(Self::default());
        };
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read settings from {}", path.display()))?;
        serde_json::from_str(&raw)
            .with_context(|| format!("Invalid settings in {}", path.display()))
    }

    /// Command line values win over the file
    pub fn apply_overrides(
        &mut self,
        chrome: Option<PathBuf>,
        ws_url: Option<String>,
        storage_endpoint: Option<String>,
        bucket: Option<String>,
        headful: bool,
    ) {
        if chrome.is_some() {
            self.browser.executable = chrome;
        }
        if ws_url.is_some() {
            self.browser.ws_url = ws_url;
        }
        if let Some(endpoint) = storage_endpoint {
            self.render.storage.endpoint = endpoint;
        }
        if let Some(bucket) = bucket {
            self.render.storage.bucket = bucket;
        }
        if headful {
            self.browser.headless = false;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_path_gives_defaults() {
        let settings = Settings::load(None).unwrap();
        assert_eq!(settings.render.storage.bucket, "pdf-cache-prod");
        assert!(settings.browser.headless);
    }

    #[test]
    fn overrides_replace_file_values() {
        let mut settings: Settings = serde_json::from_str(
            r#"{ "render": { "storage": { "bucket": "from-file" } }, "browser": { "ws_url": "ws://file" } }"#,
        )
        .unwrap();

        settings.apply_overrides(None, Some("ws://cli".to_string()), None, None, true);

        assert_eq!(settings.render.storage.bucket, "from-file");
        assert_eq!(settings.browser.ws_url.as_deref(), Some("ws://cli"));
        assert!(!settings.browser.headless);
    }

    #[test]
    fn unreadable_file_is_an_error() {
        assert!(Settings::load(Some(Path::new("/nonexistent/prerender.json"))).is_err());
    }
}
