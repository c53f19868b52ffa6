//! Outbound request filter
//!
//! Decides, for every request the page makes, whether it may go out. The
//! conditions are independent and cheap; any one of them aborts.

use regex::RegexSet;
use url::Url;

use browser::ResourceType;

use crate::config::RenderConfig;
use crate::domain::DomainValidator;
use crate::error::Result;

#[derive(Debug, Clone)]
pub struct RequestFilter {
    domains: DomainValidator,
    document_asset_segment: String,
    denied: RegexSet,
}

impl RequestFilter {
    pub fn new(
        domains: DomainValidator,
        document_asset_segment: impl Into<String>,
        denied_patterns: &[String],
    ) -> Result<Self> {
        Ok(Self {
            domains,
            document_asset_segment: document_asset_segment.into(),
            denied: RegexSet::new(denied_patterns)?,
        })
    }

    pub fn from_config(config: &RenderConfig) -> Result<Self> {
        Self::new(
            DomainValidator::new(config.allowed_suffixes.iter().cloned()),
            config.document_asset_segment.clone(),
            &config.denied_url_patterns,
        )
    }

    pub fn should_abort(&self, request_url: &str, resource_type: &ResourceType) -> bool {
        if self.denied.is_match(request_url) {
            return true;
        }

        let Ok(parsed) = Url::parse(request_url) else {
            return true;
        };

        if *resource_type == ResourceType::Image
            && parsed.path().contains(self.document_asset_segment.as_str())
        {
            return true;
        }

        !parsed
            .host_str()
            .is_some_and(|host| self.domains.is_allowed(host))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn filter() -> RequestFilter {
        RequestFilter::from_config(&RenderConfig::default()).unwrap()
    }

    #[test]
    fn test_allows_first_party_assets() {
        let f = filter();
        assert!(!f.should_abort("https://www.cbd.int/app/main.css", &ResourceType::Stylesheet));
        assert!(!f.should_abort("https://api.cbd.int/api/v2013/index", &ResourceType::Xhr));
        assert!(!f.should_abort("https://www.cbd.int/images/logo.png", &ResourceType::Image));
    }

    #[test]
    fn test_aborts_document_images_only() {
        let f = filter();
        let url = "https://api.cbd.int/api/v2013/documents/abc/attachments/cover.jpg";
        assert!(f.should_abort(url, &ResourceType::Image));
        assert!(!f.should_abort(url, &ResourceType::Xhr));
    }

    #[test]
    fn test_aborts_foreign_hosts() {
        let f = filter();
        assert!(f.should_abort("https://www.google-analytics.com/analytics.js", &ResourceType::Script));
        assert!(f.should_abort("https://fonts.googleapis.com/css?family=Roboto", &ResourceType::Stylesheet));
        assert!(f.should_abort("::not a url::", &ResourceType::Document));
    }

    #[test]
    fn test_denylist_aborts_regardless_of_type() {
        let f = filter();
        let denied = [
            "https://www.cbd.int/socket.io/?EIO=3&transport=polling",
            "https://accounts.cbd.int/app/authorize.html",
            "https://api.cbd.int/api/v2015/error-logs",
        ];
        let types = [
            ResourceType::Document,
            ResourceType::Script,
            ResourceType::Xhr,
            ResourceType::Image,
            ResourceType::Other("ping".to_string()),
        ];
        for url in denied {
            for resource_type in &types {
                assert!(f.should_abort(url, resource_type), "{} as {}", url, resource_type);
            }
        }
    }

    #[test]
    fn test_authorize_page_only_denied_at_end_of_url() {
        let f = filter();
        assert!(!f.should_abort(
            "https://accounts.cbd.int/app/authorize.html.js",
            &ResourceType::Script
        ));
    }

    #[test]
    fn test_invalid_pattern_is_a_config_error() {
        let result = RequestFilter::new(
            DomainValidator::new(["cbd.int"]),
            "/docs/",
            &["(unclosed".to_string()],
        );
        assert!(result.is_err());
    }
}
