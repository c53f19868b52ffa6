//! Post-load content transforms
//!
//! Stages run in a fixed order:
//!
//! 1. stylesheet links replaced by inline styles (in the live DOM)
//! 2. `@import` directives replaced by the imported text
//! 3. scripts and HTML imports removed
//! 4. `style` attributes stripped for oversized crawler renders
//! 5. optional minification for renders that stay inline
//!
//! Stage failures are logged and the stage's input is carried forward.

pub mod bot;
pub mod minify;
pub mod scripts;
pub mod stylesheets;

use std::collections::HashMap;

use crate::collector::StylesheetCollector;
use crate::config::RenderConfig;
use crate::error::Result;
use crate::surface::RenderPage;

pub use bot::{strip_style_attributes, BotDetector};
pub use minify::{format_bytes, minify_html};
pub use scripts::{MarkupStripper, RegexStripper};
pub use stylesheets::{inline_stylesheets, substitute_imports};

pub struct ContentTransformer {
    stripper: Box<dyn MarkupStripper>,
    bots: BotDetector,
    size_threshold: usize,
    content_selector: String,
    minify: bool,
}

impl ContentTransformer {
    pub fn from_config(config: &RenderConfig) -> Result<Self> {
        Ok(Self {
            stripper: Box::new(RegexStripper),
            bots: BotDetector::new(&config.bot_pattern, &config.user_agent_headers)?,
            size_threshold: config.size_threshold,
            content_selector: config.content_selector.clone(),
            minify: config.minify,
        })
    }

    pub fn with_stripper(mut self, stripper: Box<dyn MarkupStripper>) -> Self {
        self.stripper = stripper;
        self
    }

    /// Stage 1; must run before the DOM is serialized
    pub async fn inline_in_page<P>(&self, page: &P, collector: &StylesheetCollector) -> usize
    where
        P: RenderPage + ?Sized,
    {
        match inline_stylesheets(page, collector).await {
            Ok(replaced) => {
                tracing::debug!(
                    "Inlined {} of {} captured stylesheets",
                    replaced,
                    collector.entries().len()
                );
                replaced
            }
            Err(e) => {
                tracing::warn!("{}", e);
                0
            }
        }
    }

    /// Stages 2 to 5 on the serialized document
    pub fn finish(
        &self,
        html: String,
        collector: &StylesheetCollector,
        caller_headers: &HashMap<String, String>,
    ) -> String {
        let html = substitute_imports(&html, collector);
        let mut html = self.stripper.strip(&html);

        if html.len() > self.size_threshold && self.bots.is_bot(caller_headers) {
            let before = html.len();
            match strip_style_attributes(&html, &self.content_selector) {
                Ok(stripped) => {
                    tracing::info!(
                        "Stripped style attributes for crawler: {} -> {}",
                        format_bytes(before),
                        format_bytes(stripped.len())
                    );
                    html = stripped;
                }
                Err(e) => tracing::warn!("{}", e),
            }
        }

        if self.minify && html.len() < self.size_threshold {
            let before = html.len();
            html = minify_html(&html);
            tracing::debug!(
                "Minified {} -> {} (saved {})",
                format_bytes(before),
                format_bytes(html.len()),
                format_bytes(before.saturating_sub(html.len()))
            );
        }

        html
    }
}
