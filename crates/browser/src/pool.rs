//! One-slot browser pool
//!
//! The browser is created on first use and kept for the life of the process.
//! Initialization runs at most once even when many requests race for it;
//! callers only ever see pages, never the shared handle. A browser whose
//! connection dropped is discarded, and the next acquire starts a new one.

use std::sync::Arc;
use tokio::sync::Mutex;

use crate::cdp::CDPError;
use crate::error::{BrowserError, Result};
use crate::launcher::{Browser, BrowserConfig};
use crate::page::Page;

pub struct BrowserPool {
    config: BrowserConfig,
    slot: Mutex<Option<Arc<Browser>>>,
}

impl BrowserPool {
    pub fn new(config: BrowserConfig) -> Self {
        Self {
            config,
            slot: Mutex::new(None),
        }
    }

    pub fn config(&self) -> &BrowserConfig {
        &self.config
    }

    pub async fn is_initialized(&self) -> bool {
        self.slot.lock().await.is_some()
    }

    async fn browser(&self) -> Result<Arc<Browser>> {
        let mut slot = self.slot.lock().await;
        if let Some(browser) = slot.as_ref() {
            tracing::debug!("Browser instance is in memory, reusing");
            return Ok(browser.clone());
        }

        let mut browser = Browser::start(&self.config).await?;
        browser.open_keep_warm_page().await?;
        tracing::info!("Browser instance initialized");

        let browser = Arc::new(browser);
        *slot = Some(browser.clone());
        Ok(browser)
    }

    /// Drop `browser` from the slot unless it was already replaced
    async fn discard(&self, browser: &Arc<Browser>) {
        let mut slot = self.slot.lock().await;
        if slot.as_ref().is_some_and(|current| Arc::ptr_eq(current, browser)) {
            tracing::warn!("Browser connection lost, discarding instance");
            *slot = None;
        }
    }

    /// Fresh page on the shared browser
    pub async fn acquire_page(&self) -> Result<Page> {
        let browser = self.browser().await?;
        let page = browser.new_page().await;
        if let Err(e) = &page {
            if is_disconnected(e) {
                self.discard(&browser).await;
            }
        }
        page
    }

    /// Close a page. Never fails: a page that cannot be closed is logged and dropped.
    pub async fn release_page(&self, page: Page) {
        let target_id = page.target_id().to_string();
        match page.close().await {
            Ok(()) => tracing::debug!("Closed page {}", target_id),
            Err(e) => tracing::warn!("Failed to close page {}: {}", target_id, e),
        }
    }
}

fn is_disconnected(error: &BrowserError) -> bool {
    matches!(
        error,
        BrowserError::Cdp(CDPError::Closed) | BrowserError::Cdp(CDPError::WebSocket(_))
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_pool_starts_empty() {
        let pool = BrowserPool::new(BrowserConfig::default());
        assert!(!pool.is_initialized().await);
        assert!(pool.config().headless);
    }

    #[tokio::test]
    async fn test_failed_init_leaves_slot_empty() {
        let pool = BrowserPool::new(BrowserConfig {
            executable: Some("/nonexistent/chrome".into()),
            ..Default::default()
        });

        assert!(pool.acquire_page().await.is_err());
        assert!(!pool.is_initialized().await);
    }

    #[tokio::test]
    #[ignore] // Needs Chrome installed
    async fn test_concurrent_acquire_launches_once() {
        let pool = std::sync::Arc::new(BrowserPool::new(BrowserConfig::default()));
        let (a, b) = tokio::join!(pool.acquire_page(), pool.acquire_page());
        let (a, b) = (a.unwrap(), b.unwrap());
        assert_ne!(a.target_id(), b.target_id());
        pool.release_page(a).await;
        pool.release_page(b).await;
        assert!(pool.is_initialized().await);
    }
}
