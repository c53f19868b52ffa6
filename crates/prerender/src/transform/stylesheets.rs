//! Stylesheet inlining
//!
//! Stage one runs inside the page, where `link.href` is already resolved
//! against the document base. Stage two works on the serialized text.

use serde_json::Value;

use crate::collector::StylesheetCollector;
use crate::error::{RenderError, Result};
use crate::surface::RenderPage;

/// Replaces every captured `<link rel="stylesheet">` with a `<style>` block.
/// Called with the URL → text map; returns the number of links replaced.
pub const INLINE_STYLESHEETS_FN: &str = r#"(sheets) => {
    let replaced = 0;
    for (const link of Array.from(document.querySelectorAll('link[rel="stylesheet"]'))) {
        const text = sheets[link.href];
        if (typeof text !== 'string') continue;
        const style = document.createElement('style');
        style.textContent = text;
        link.replaceWith(style);
        replaced++;
    }
    return replaced;
}"#;

pub fn inline_expression(collector: &StylesheetCollector) -> Result<String> {
    let sheets = serde_json::to_string(&collector.content_map())
        .map_err(|e| RenderError::transform("inline-stylesheets", e))?;
    Ok(format!("({})({})", INLINE_STYLESHEETS_FN, sheets))
}

/// Swap captured stylesheet links for inline styles in the live DOM
pub async fn inline_stylesheets<P>(page: &P, collector: &StylesheetCollector) -> Result<usize>
where
    P: RenderPage + ?Sized,
{
    if collector.is_empty() {
        return Ok(0);
    }

    let expression = inline_expression(collector)?;
    let value = page
        .evaluate(expression)
        .await
        .map_err(|e| RenderError::transform("inline-stylesheets", e))?;

    Ok(match value {
        Value::Number(n) => n.as_u64().unwrap_or(0) as usize,
        _ => 0,
    })
}

/// Replace each resolvable `@import` directive with the imported sheet's text
pub fn substitute_imports(html: &str, collector: &StylesheetCollector) -> String {
    let mut output = html.to_string();

    for import in collector.imports() {
        match collector.resolve_import(import) {
            Some(entry) => {
                output = output.replacen(&import.directive, &entry.raw_text, 1);
                tracing::debug!("Inlined import {} from {}", import.relative_url, entry.source_url);
            }
            None => {
                tracing::debug!(
                    "Import {} in {} has no captured stylesheet",
                    import.relative_url,
                    import.owning_stylesheet
                );
            }
        }
    }

    output
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::DomainValidator;

    fn collector() -> StylesheetCollector {
        StylesheetCollector::new(DomainValidator::new(["cbd.int"]))
    }

    #[test]
    fn test_import_directive_replaced_with_sheet_text() {
        let mut c = collector();
        c.record(
            "https://www.cbd.int/app/css/main.css",
            "@import url(\"../sub/reset.css\");\nbody{color:red}",
        );
        c.record("https://www.cbd.int/app/sub/reset.css", "html{margin:0}");

        let html = "<style>@import url(\"../sub/reset.css\");\nbody{color:red}</style>";
        let out = substitute_imports(html, &c);
        assert_eq!(out, "<style>html{margin:0}\nbody{color:red}</style>");
    }

    #[test]
    fn test_unmatched_import_left_in_place() {
        let mut c = collector();
        c.record("https://www.cbd.int/app/main.css", "@import url('missing.css');");

        let html = "<style>@import url('missing.css');</style>";
        assert_eq!(substitute_imports(html, &c), html);
    }

    #[test]
    fn test_only_first_occurrence_is_replaced() {
        let mut c = collector();
        c.record("https://www.cbd.int/a.css", "@import url(\"b.css\");");
        c.record("https://www.cbd.int/b.css", "b{}");

        let html = "@import url(\"b.css\");|@import url(\"b.css\");";
        assert_eq!(substitute_imports(html, &c), "b{}|@import url(\"b.css\");");
    }

    #[test]
    fn test_inline_expression_embeds_json_map() {
        let mut c = collector();
        c.record("https://www.cbd.int/a.css", "a{content:\"x\"}");

        let expr = inline_expression(&c).unwrap();
        assert!(expr.starts_with(&format!("({})(", INLINE_STYLESHEETS_FN)));
        let json = &expr[INLINE_STYLESHEETS_FN.len() + 3..expr.len() - 1];
        let map: std::collections::HashMap<String, String> = serde_json::from_str(json).unwrap();
        assert_eq!(map["https://www.cbd.int/a.css"], "a{content:\"x\"}");
    }
}
