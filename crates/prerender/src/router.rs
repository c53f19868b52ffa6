//! Output routing
//!
//! Small documents go back inline. Anything at or above the size threshold
//! is uploaded and answered with a redirect to the stored copy.

use std::collections::BTreeMap;
use std::sync::Arc;

use crate::config::RenderConfig;
use crate::error::{RenderError, Result};
use crate::storage::{StorageConfig, StorageSink};

pub const CONTENT_TYPE_HTML: &str = "text/html";

/// HTTP-shaped outcome of one render
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RenderResult {
    InlineHtml {
        status: u16,
        headers: BTreeMap<String, String>,
        body: String,
    },
    Redirect {
        status: u16,
        headers: BTreeMap<String, String>,
    },
    Error {
        status: u16,
        body: String,
    },
}

impl RenderResult {
    pub fn status(&self) -> u16 {
        match self {
            RenderResult::InlineHtml { status, .. }
            | RenderResult::Redirect { status, .. }
            | RenderResult::Error { status, .. } => *status,
        }
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        match self {
            RenderResult::InlineHtml { headers, .. } | RenderResult::Redirect { headers, .. } => {
                headers
                    .iter()
                    .find(|(key, _)| key.eq_ignore_ascii_case(name))
                    .map(|(_, value)| value.as_str())
            }
            RenderResult::Error { .. } => None,
        }
    }

    pub fn body(&self) -> Option<&str> {
        match self {
            RenderResult::InlineHtml { body, .. } | RenderResult::Error { body, .. } => Some(body),
            RenderResult::Redirect { .. } => None,
        }
    }
}

impl From<&RenderError> for RenderResult {
    fn from(err: &RenderError) -> Self {
        RenderResult::Error {
            status: err.status_code(),
            body: err.to_string(),
        }
    }
}

pub struct OutputRouter {
    storage: Arc<dyn StorageSink>,
    storage_config: StorageConfig,
    size_threshold: usize,
    cache_max_age_secs: u64,
}

impl OutputRouter {
    pub fn new(storage: Arc<dyn StorageSink>, config: &RenderConfig) -> Self {
        Self {
            storage,
            storage_config: config.storage.clone(),
            size_threshold: config.size_threshold,
            cache_max_age_secs: config.cache_max_age_secs,
        }
    }

    /// `cache_override == Some(false)` drops the Cache-Control header
    fn cache_control(&self, cache_override: Option<bool>) -> Option<String> {
        match cache_override {
            Some(false) => None,
            _ => Some(format!("public, max-age={}", self.cache_max_age_secs)),
        }
    }

    pub async fn finalize(&self, html: String, cache_override: Option<bool>) -> Result<RenderResult> {
        let mut headers = BTreeMap::new();
        if let Some(cache) = self.cache_control(cache_override) {
            headers.insert("Cache-Control".to_string(), cache);
        }

        if html.len() < self.size_threshold {
            headers.insert("Content-Type".to_string(), CONTENT_TYPE_HTML.to_string());
            return Ok(RenderResult::InlineHtml {
                status: 200,
                headers,
                body: html,
            });
        }

        let key = self.storage_config.new_key();
        tracing::info!(
            "Content is {} bytes, uploading to {}/{}",
            html.len(),
            self.storage_config.bucket,
            key
        );
        let location = self
            .storage
            .put(
                &self.storage_config.bucket,
                &key,
                html,
                CONTENT_TYPE_HTML,
                self.storage_config.visibility,
            )
            .await?;

        headers.insert("Location".to_string(), location);
        Ok(RenderResult::Redirect {
            status: 302,
            headers,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::Visibility;
    use async_trait::async_trait;
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingSink {
        puts: Mutex<Vec<(String, String, usize, String, Visibility)>>,
        fail: bool,
    }

    #[async_trait]
    impl StorageSink for RecordingSink {
        async fn put(
            &self,
            bucket: &str,
            key: &str,
            body: String,
            content_type: &str,
            visibility: Visibility,
        ) -> Result<String> {
            if self.fail {
                return Err(RenderError::storage("bucket unavailable"));
            }
            self.puts.lock().unwrap().push((
                bucket.to_string(),
                key.to_string(),
                body.len(),
                content_type.to_string(),
                visibility,
            ));
            Ok(format!("https://s3.amazonaws.com/{}/{}", bucket, key))
        }
    }

    fn router(sink: Arc<RecordingSink>) -> OutputRouter {
        OutputRouter::new(sink, &RenderConfig::default())
    }

    #[tokio::test]
    async fn test_below_threshold_is_inline() {
        let sink = Arc::new(RecordingSink::default());
        let result = router(sink.clone())
            .finalize("a".repeat(5_799_999), None)
            .await
            .unwrap();

        assert_eq!(result.status(), 200);
        assert_eq!(result.header("content-type"), Some("text/html"));
        assert_eq!(result.header("cache-control"), Some("public, max-age=604800"));
        assert_eq!(result.body().map(str::len), Some(5_799_999));
        assert!(sink.puts.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_threshold_and_above_redirects() {
        for size in [5_800_000, 5_800_001] {
            let sink = Arc::new(RecordingSink::default());
            let result = router(sink.clone()).finalize("a".repeat(size), None).await.unwrap();

            assert_eq!(result.status(), 302);
            let location = result.header("location").unwrap();
            assert!(location.starts_with("https://s3.amazonaws.com/pdf-cache-prod/html-files/"));
            assert!(location.ends_with(".html"));
            assert_eq!(result.header("cache-control"), Some("public, max-age=604800"));

            let puts = sink.puts.lock().unwrap();
            assert_eq!(puts.len(), 1);
            assert_eq!(puts[0].0, "pdf-cache-prod");
            assert_eq!(puts[0].2, size);
            assert_eq!(puts[0].3, "text/html");
            assert_eq!(puts[0].4, Visibility::PublicRead);
        }
    }

    #[tokio::test]
    async fn test_cache_override_drops_cache_control() {
        let sink = Arc::new(RecordingSink::default());
        let r = router(sink);

        let inline = r.finalize("<p>x</p>".to_string(), Some(false)).await.unwrap();
        assert_eq!(inline.header("cache-control"), None);
        assert_eq!(inline.header("content-type"), Some("text/html"));

        let redirect = r.finalize("a".repeat(5_800_001), Some(false)).await.unwrap();
        assert_eq!(redirect.header("cache-control"), None);
        assert!(redirect.header("location").is_some());
    }

    #[tokio::test]
    async fn test_storage_failure_propagates() {
        let sink = Arc::new(RecordingSink {
            fail: true,
            ..RecordingSink::default()
        });
        let err = router(sink).finalize("a".repeat(5_800_001), None).await.unwrap_err();
        assert!(matches!(err, RenderError::Storage(_)));
        assert_eq!(RenderResult::from(&err).status(), 500);
    }
}
