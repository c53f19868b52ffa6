//! Script removal
//!
//! A prerendered page must not boot the application again in the client, so
//! executable scripts and HTML imports are dropped. Structured data blocks
//! (`application/ld+json`) stay for search engines.

use once_cell::sync::Lazy;
use regex::{Captures, Regex};

static SCRIPT_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)<script[^\r\n]*?>[\s\S]*?</script>").expect("valid script regex")
});

static LINK_IMPORT_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?i)<link[^>]+?rel="import"[^>]*?>"#).expect("valid link import regex")
});

const STRUCTURED_DATA: &str = "application/ld+json";

/// Removes executable markup from serialized HTML
pub trait MarkupStripper: Send + Sync {
    fn strip(&self, html: &str) -> String;
}

/// Pattern-based stripper; good enough for serialized DOM output
#[derive(Debug, Default, Clone, Copy)]
pub struct RegexStripper;

impl MarkupStripper for RegexStripper {
    fn strip(&self, html: &str) -> String {
        let without_scripts = SCRIPT_RE.replace_all(html, |caps: &Captures| {
            let block = &caps[0];
            if block.contains(STRUCTURED_DATA) {
                block.to_string()
            } else {
                String::new()
            }
        });

        LINK_IMPORT_RE
            .replace_all(&without_scripts, "")
            .into_owned()
    }
}
