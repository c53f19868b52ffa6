//! Stylesheet capture
//!
//! Every successful stylesheet response is kept verbatim, keyed by its URL.
//! First-party stylesheets are also scanned for `@import url(...)` lines;
//! those are resolved later against the complete set of captured sheets.

use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashMap;

use browser::{InterceptedRequest, NetworkObserver, RequestDecision, ResourceType, ResponseMeta};

use crate::domain::DomainValidator;
use crate::filter::RequestFilter;

/// `@import url("…")` or `@import url('…')` on a line of its own
static IMPORT_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?im)^(@import url\((?:"|')(.*)(?:"|')\);?)\r?$"#).expect("valid import regex")
});

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StylesheetEntry {
    pub source_url: String,
    pub raw_text: String,
    pub is_first_party: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportReference {
    /// Exact directive text as it appears in the stylesheet
    pub directive: String,
    /// Referenced path with every `../` removed
    pub relative_url: String,
    pub owning_stylesheet: String,
}

/// Extract `(directive, relative_url)` pairs from a stylesheet body
pub fn scan_imports(raw_text: &str) -> Vec<(String, String)> {
    IMPORT_RE
        .captures_iter(raw_text)
        .map(|caps| (caps[1].to_string(), caps[2].replace("../", "")))
        .collect()
}

#[derive(Debug, Clone)]
pub struct StylesheetCollector {
    domains: DomainValidator,
    entries: Vec<StylesheetEntry>,
    index: HashMap<String, usize>,
    imports: Vec<ImportReference>,
}

impl StylesheetCollector {
    pub fn new(domains: DomainValidator) -> Self {
        Self {
            domains,
            entries: Vec::new(),
            index: HashMap::new(),
            imports: Vec::new(),
        }
    }

    /// Only successful stylesheet responses are captured
    pub fn accepts(&self, response: &ResponseMeta) -> bool {
        response.status == 200 && response.resource_type == ResourceType::Stylesheet
    }

    /// Store a stylesheet body. The first body seen for a URL wins.
    pub fn record(&mut self, source_url: &str, raw_text: &str) {
        if self.index.contains_key(source_url) {
            tracing::debug!("Stylesheet {} already captured", source_url);
            return;
        }

        let is_first_party = self.domains.is_first_party(source_url);
        if is_first_party {
            for (directive, relative_url) in scan_imports(raw_text) {
                tracing::debug!("Found import {} in {}", relative_url, source_url);
                self.imports.push(ImportReference {
                    directive,
                    relative_url,
                    owning_stylesheet: source_url.to_string(),
                });
            }
        }

        self.index.insert(source_url.to_string(), self.entries.len());
        self.entries.push(StylesheetEntry {
            source_url: source_url.to_string(),
            raw_text: raw_text.to_string(),
            is_first_party,
        });
    }

    pub fn get(&self, source_url: &str) -> Option<&StylesheetEntry> {
        self.index.get(source_url).map(|&i| &self.entries[i])
    }

    /// Entries in arrival order
    pub fn entries(&self) -> &[StylesheetEntry] {
        &self.entries
    }

    pub fn imports(&self) -> &[ImportReference] {
        &self.imports
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// First captured sheet whose URL contains the imported path
    pub fn resolve_import(&self, import: &ImportReference) -> Option<&StylesheetEntry> {
        self.entries
            .iter()
            .find(|entry| entry.source_url.contains(import.relative_url.as_str()))
    }

    /// URL → text, as handed to the in-page link replacement
    pub fn content_map(&self) -> HashMap<String, String> {
        self.entries
            .iter()
            .map(|entry| (entry.source_url.clone(), entry.raw_text.clone()))
            .collect()
    }
}

/// Navigation-scoped observer: filters requests and captures stylesheets
pub struct NetworkCapture<'a> {
    filter: &'a RequestFilter,
    collector: StylesheetCollector,
    requests: usize,
    aborted: usize,
}

impl<'a> NetworkCapture<'a> {
    pub fn new(filter: &'a RequestFilter, collector: StylesheetCollector) -> Self {
        Self {
            filter,
            collector,
            requests: 0,
            aborted: 0,
        }
    }

    pub fn requests(&self) -> usize {
        self.requests
    }

    pub fn aborted(&self) -> usize {
        self.aborted
    }

    pub fn into_collector(self) -> StylesheetCollector {
        self.collector
    }
}

impl NetworkObserver for NetworkCapture<'_> {
    fn on_request(&mut self, request: &InterceptedRequest) -> RequestDecision {
        self.requests += 1;
        if self.filter.should_abort(&request.url, &request.resource_type) {
            self.aborted += 1;
            RequestDecision::Abort
        } else {
            RequestDecision::Continue
        }
    }

    fn wants_body(&self, response: &ResponseMeta) -> bool {
        self.collector.accepts(response)
    }

    fn on_response(&mut self, response: &ResponseMeta, body: &str) {
        if self.collector.accepts(response) {
            self.collector.record(&response.url, body);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RenderConfig;

    fn collector() -> StylesheetCollector {
        StylesheetCollector::new(DomainValidator::new(["cbd.int", "cbddev.xyz"]))
    }

    fn response(url: &str, status: u16, resource_type: ResourceType) -> ResponseMeta {
        ResponseMeta {
            request_id: "1".to_string(),
            url: url.to_string(),
            status,
            resource_type,
        }
    }

    #[test]
    fn test_scan_imports_both_quote_styles() {
        let css = "@import url(\"../sub/reset.css\");\nbody{color:red}\n@IMPORT URL('../../fonts/icons.css')\n";
        let imports = scan_imports(css);
        assert_eq!(
            imports,
            vec![
                (
                    "@import url(\"../sub/reset.css\");".to_string(),
                    "sub/reset.css".to_string()
                ),
                (
                    "@IMPORT URL('../../fonts/icons.css')".to_string(),
                    "fonts/icons.css".to_string()
                ),
            ]
        );
    }

    #[test]
    fn test_scan_imports_ignores_inline_and_crlf_is_tolerated() {
        let css = "a{} @import url(\"x.css\");\r\n@import url(\"y.css\");\r\n";
        let imports = scan_imports(css);
        assert_eq!(imports.len(), 1);
        assert_eq!(imports[0].0, "@import url(\"y.css\");");
        assert_eq!(imports[0].1, "y.css");
    }

    #[test]
    fn test_only_first_party_sheets_are_scanned() {
        let mut c = collector();
        c.record("https://www.cbd.int/app/main.css", "@import url(\"reset.css\");");
        c.record("https://cdn.example.com/lib.css", "@import url(\"other.css\");");

        assert_eq!(c.imports().len(), 1);
        assert_eq!(c.imports()[0].owning_stylesheet, "https://www.cbd.int/app/main.css");
        assert!(c.get("https://www.cbd.int/app/main.css").unwrap().is_first_party);
        assert!(!c.get("https://cdn.example.com/lib.css").unwrap().is_first_party);
    }

    #[test]
    fn test_first_body_wins() {
        let mut c = collector();
        c.record("https://www.cbd.int/a.css", "a{}");
        c.record("https://www.cbd.int/a.css", "b{}");
        assert_eq!(c.entries().len(), 1);
        assert_eq!(c.get("https://www.cbd.int/a.css").unwrap().raw_text, "a{}");
    }

    #[test]
    fn test_resolve_import_by_substring_in_arrival_order() {
        let mut c = collector();
        c.record("https://www.cbd.int/app/main.css", "@import url(\"sub/reset.css\");");
        c.record("https://www.cbd.int/app/sub/reset.css", "html{margin:0}");
        c.record("https://www.cbd.int/old/sub/reset.css", "html{margin:1px}");

        let import = c.imports()[0].clone();
        let target = c.resolve_import(&import).unwrap();
        assert_eq!(target.raw_text, "html{margin:0}");
    }

    #[test]
    fn test_accepts_only_ok_stylesheets() {
        let c = collector();
        assert!(c.accepts(&response("https://www.cbd.int/a.css", 200, ResourceType::Stylesheet)));
        assert!(!c.accepts(&response("https://www.cbd.int/a.css", 304, ResourceType::Stylesheet)));
        assert!(!c.accepts(&response("https://www.cbd.int/a.js", 200, ResourceType::Script)));
    }

    #[test]
    fn test_network_capture_counts_and_collects() {
        let config = RenderConfig::default();
        let filter = RequestFilter::from_config(&config).unwrap();
        let mut capture = NetworkCapture::new(&filter, collector());

        let allowed = InterceptedRequest {
            url: "https://www.cbd.int/app/main.css".to_string(),
            resource_type: ResourceType::Stylesheet,
        };
        let foreign = InterceptedRequest {
            url: "https://www.googletagmanager.com/gtm.js".to_string(),
            resource_type: ResourceType::Script,
        };
        assert_eq!(capture.on_request(&allowed), RequestDecision::Continue);
        assert_eq!(capture.on_request(&foreign), RequestDecision::Abort);

        let css = response("https://www.cbd.int/app/main.css", 200, ResourceType::Stylesheet);
        let missing = response("https://www.cbd.int/app/gone.css", 404, ResourceType::Stylesheet);
        assert!(capture.wants_body(&css));
        assert!(!capture.wants_body(&missing));
        capture.on_response(&css, "body{color:red}");
        capture.on_response(&missing, "not found");

        assert_eq!(capture.requests(), 2);
        assert_eq!(capture.aborted(), 1);
        let collector = capture.into_collector();
        assert_eq!(collector.entries().len(), 1);
        assert_eq!(
            collector.content_map().get("https://www.cbd.int/app/main.css").map(String::as_str),
            Some("body{color:red}")
        );
    }
}
