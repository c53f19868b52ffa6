//! Object storage for oversized renders
//!
//! Large documents are uploaded under a fresh key and the caller is
//! redirected to the public URL instead of receiving the body inline.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use uuid::Uuid;

use crate::error::{RenderError, Result};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Objects are PUT to `{endpoint}/{bucket}/{key}`
    pub endpoint: String,
    /// Base URL of the redirect target; falls back to `endpoint`
    pub public_base_url: Option<String>,
    pub bucket: String,
    pub key_prefix: String,
    /// Canned ACL sent with every upload
    pub visibility: Visibility,
    pub request_timeout_secs: u64,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            endpoint: "https://s3.amazonaws.com".to_string(),
            public_base_url: None,
            bucket: "pdf-cache-prod".to_string(),
            key_prefix: "html-files/".to_string(),
            visibility: Visibility::PublicRead,
            request_timeout_secs: 60,
        }
    }
}

impl StorageConfig {
    /// `{prefix}{uuid}.html`, unique per call
    pub fn new_key(&self) -> String {
        format!("{}{}.html", self.key_prefix, Uuid::new_v4())
    }

    pub fn public_url(&self, bucket: &str, key: &str) -> String {
        let base = self.public_base_url.as_deref().unwrap_or(&self.endpoint);
        format!("{}/{}/{}", base.trim_end_matches('/'), bucket, key)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Visibility {
    PublicRead,
    Private,
}

impl Visibility {
    pub fn as_acl(&self) -> &'static str {
        match self {
            Visibility::PublicRead => "public-read",
            Visibility::Private => "private",
        }
    }
}

/// Where large render results go
#[async_trait]
pub trait StorageSink: Send + Sync {
    /// Store `body` and return its public URL
    async fn put(
        &self,
        bucket: &str,
        key: &str,
        body: String,
        content_type: &str,
        visibility: Visibility,
    ) -> Result<String>;
}

/// Plain HTTP PUT against an S3-compatible endpoint
///
/// Requests are unsigned; the endpoint (or a proxy in front of it) is
/// expected to accept them.
pub struct HttpObjectStore {
    client: reqwest::Client,
    config: StorageConfig,
}

impl HttpObjectStore {
    pub fn new(config: StorageConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()?;

        Ok(Self { client, config })
    }

    fn object_url(&self, bucket: &str, key: &str) -> String {
        format!(
            "{}/{}/{}",
            self.config.endpoint.trim_end_matches('/'),
            bucket,
            key
        )
    }
}

#[async_trait]
impl StorageSink for HttpObjectStore {
    async fn put(
        &self,
        bucket: &str,
        key: &str,
        body: String,
        content_type: &str,
        visibility: Visibility,
    ) -> Result<String> {
        let url = self.object_url(bucket, key);
        let size = body.len();

        let response = self
            .client
            .put(&url)
            .header(reqwest::header::CONTENT_TYPE, content_type)
            .header("x-amz-acl", visibility.as_acl())
            .body(body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            return Err(RenderError::storage(format!(
                "PUT {} failed with {}: {}",
                url, status, detail
            )));
        }

        tracing::info!("Uploaded {} bytes to {}", size, url);
        Ok(self.config.public_url(bucket, key))
    }
}
