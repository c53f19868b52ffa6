//! Crawler-specific trimming
//!
//! Oversized pages requested by a crawler lose inline `style` attributes
//! inside the content container, which is usually enough to bring them
//! back under the inline limit.

use lol_html::{rewrite_str, ElementContentHandlers, RewriteStrSettings, Selector};
use regex::{Regex, RegexBuilder};
use std::borrow::Cow;
use std::collections::HashMap;

use crate::error::{RenderError, Result};

#[derive(Debug, Clone)]
pub struct BotDetector {
    pattern: Regex,
    user_agent_headers: Vec<String>,
}

impl BotDetector {
    pub fn new(pattern: &str, user_agent_headers: &[String]) -> Result<Self> {
        let pattern = RegexBuilder::new(pattern).case_insensitive(true).build()?;
        Ok(Self {
            pattern,
            user_agent_headers: user_agent_headers.to_vec(),
        })
    }

    /// First configured header present on the request, names compared
    /// case-insensitively
    pub fn user_agent<'a>(&self, headers: &'a HashMap<String, String>) -> Option<&'a str> {
        self.user_agent_headers.iter().find_map(|wanted| {
            headers
                .iter()
                .find(|(name, _)| name.eq_ignore_ascii_case(wanted))
                .map(|(_, value)| value.as_str())
        })
    }

    pub fn is_bot(&self, headers: &HashMap<String, String>) -> bool {
        self.user_agent(headers)
            .is_some_and(|ua| self.pattern.is_match(ua))
    }
}

/// Drop `style` from every element nested under `container_selector`
pub fn strip_style_attributes(html: &str, container_selector: &str) -> Result<String> {
    let selector: Selector = format!("{} [style]", container_selector)
        .parse()
        .map_err(|e| RenderError::transform("bot-strip", e))?;

    let handlers = ElementContentHandlers::default().element(|el| {
        el.remove_attribute("style");
        Ok(())
    });

    rewrite_str(
        html,
        RewriteStrSettings {
            element_content_handlers: vec![(Cow::Owned(selector), handlers)],
            ..RewriteStrSettings::default()
        },
    )
    .map_err(|e| RenderError::transform("bot-strip", e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{RenderConfig, DEFAULT_BOT_PATTERN};

    fn detector() -> BotDetector {
        let config = RenderConfig::default();
        BotDetector::new(DEFAULT_BOT_PATTERN, &config.user_agent_headers).unwrap()
    }

    fn headers(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_detects_crawlers_case_insensitively() {
        let d = detector();
        assert!(d.is_bot(&headers(&[(
            "x-origin-user-agent",
            "Mozilla/5.0 (compatible; Googlebot/2.1; +http://www.google.com/bot.html)"
        )])));
        assert!(d.is_bot(&headers(&[("User-Agent", "AhrefsSiteAuditor SCRAPER")])));
        assert!(!d.is_bot(&headers(&[(
            "user-agent",
            "Mozilla/5.0 (Windows NT 10.0; Win64; x64) Chrome/120.0"
        )])));
        assert!(!d.is_bot(&HashMap::new()));
    }

    #[test]
    fn test_origin_header_takes_precedence() {
        let d = detector();
        let h = headers(&[
            ("x-origin-user-agent", "Mozilla/5.0 Firefox/121.0"),
            ("user-agent", "Amazon CloudFront bot"),
        ]);
        assert_eq!(d.user_agent(&h), Some("Mozilla/5.0 Firefox/121.0"));
        assert!(!d.is_bot(&h));
    }

    #[test]
    fn test_strips_only_descendants_of_container() {
        let html = r#"<body style="margin:0"><div class="page-content" style="width:100%"><p style="color:red">a</p><span><b style="x">b</b></span></div><p style="keep">c</p></body>"#;
        let out = strip_style_attributes(html, ".page-content").unwrap();
        assert_eq!(
            out,
            r#"<body style="margin:0"><div class="page-content" style="width:100%"><p>a</p><span><b>b</b></span></div><p style="keep">c</p></body>"#
        );
    }

    #[test]
    fn test_invalid_selector_is_an_error() {
        assert!(strip_style_attributes("<p></p>", "[[[").is_err());
    }
}
