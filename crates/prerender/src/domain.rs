//! Domain allowlist
//!
//! A hostname is allowed when it ends with one of the configured suffixes.
//! Matching is a plain, case-sensitive suffix test: `cbd.int` admits
//! `www.cbd.int` and also `xcbd.int`.

use url::Url;

#[derive(Debug, Clone)]
pub struct DomainValidator {
    suffixes: Vec<String>,
}

impl DomainValidator {
    pub fn new<I, S>(suffixes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            suffixes: suffixes.into_iter().map(Into::into).collect(),
        }
    }

    pub fn is_allowed(&self, hostname: &str) -> bool {
        !hostname.is_empty()
            && self
                .suffixes
                .iter()
                .any(|suffix| hostname.ends_with(suffix.as_str()))
    }

    /// Check the host of a full URL; unparseable URLs are never allowed
    pub fn is_url_allowed(&self, url: &str) -> bool {
        Url::parse(url)
            .ok()
            .and_then(|parsed| parsed.host_str().map(|host| self.is_allowed(host)))
            .unwrap_or(false)
    }

    /// Stylesheets served from an allowed host get their `@import`s flattened
    pub fn is_first_party(&self, url: &str) -> bool {
        self.is_url_allowed(url)
    }
}
