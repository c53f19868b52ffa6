//! Light HTML minification
//!
//! Strips comments (conditional comments excepted) and collapses whitespace
//! runs in text between tags. Tags are copied as is, so attribute values keep
//! their whitespace. Content of `pre`, `textarea`, `script` and `style` is
//! never touched.

use once_cell::sync::Lazy;
use regex::{Captures, Regex};

static PROTECTED_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?is)<pre\b.*?</pre\s*>|<textarea\b.*?</textarea\s*>|<script\b.*?</script\s*>|<style\b.*?</style\s*>",
    )
    .expect("valid protected block regex")
});

static COMMENT_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)<!--(.*?)-->").expect("valid comment regex"));

/// A tag, with `>` allowed inside quoted attribute values
static TAG_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"<(?:[^>"']|"[^"]*"|'[^']*')*>"#).expect("valid tag regex"));

static WHITESPACE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").expect("valid whitespace regex"));

fn minify_segment(segment: &str) -> String {
    let without_comments = COMMENT_RE.replace_all(segment, |caps: &Captures| {
        let body = &caps[1];
        if body.starts_with("[if") || body.starts_with("<![endif]") {
            caps[0].to_string()
        } else {
            String::new()
        }
    });
    map_between(&without_comments, &TAG_RE, |text| {
        WHITESPACE_RE.replace_all(text, " ").into_owned()
    })
}

/// Copy matches of `keep` verbatim and pass everything between them through `f`
fn map_between(input: &str, keep: &Regex, f: impl Fn(&str) -> String) -> String {
    let mut output = String::with_capacity(input.len());
    let mut cursor = 0;

    for kept in keep.find_iter(input) {
        output.push_str(&f(&input[cursor..kept.start()]));
        output.push_str(kept.as_str());
        cursor = kept.end();
    }
    output.push_str(&f(&input[cursor..]));

    output
}

pub fn minify_html(html: &str) -> String {
    map_between(html, &PROTECTED_RE, minify_segment)
}

/// Human-readable byte count for log lines
pub fn format_bytes(bytes: usize) -> String {
    const UNITS: [&str; 4] = ["B", "KB", "MB", "GB"];
    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{} {}", bytes, UNITS[0])
    } else {
        format!("{:.2} {}", value, UNITS[unit])
    }
}
