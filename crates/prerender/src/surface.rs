//! Browser seams used by the render pipeline
//!
//! The pipeline only needs a handful of page operations and a way to borrow
//! and return pages. Both are traits so renders can run against a live
//! browser or an in-process fake.

use async_trait::async_trait;
use serde_json::Value;

use browser::{BrowserPool, NavigateOptions, NetworkObserver, Page};

#[async_trait]
pub trait RenderPage: Send + Sync {
    async fn set_request_interception(&mut self, enabled: bool) -> browser::Result<()>;

    async fn set_extra_http_headers(&self, headers: &[(String, String)]) -> browser::Result<()>;

    async fn goto(
        &mut self,
        url: &str,
        options: &NavigateOptions,
        observer: &mut (dyn NetworkObserver + Send),
    ) -> browser::Result<()>;

    async fn evaluate(&self, expression: String) -> browser::Result<Value>;

    /// Serialized document, doctype included
    async fn content(&self) -> browser::Result<String>;
}

#[async_trait]
pub trait PageProvider: Send + Sync {
    type Page: RenderPage;

    async fn acquire_page(&self) -> browser::Result<Self::Page>;

    /// Must not fail; problems are logged by the provider
    async fn release_page(&self, page: Self::Page);
}

#[async_trait]
impl RenderPage for Page {
    async fn set_request_interception(&mut self, enabled: bool) -> browser::Result<()> {
        Page::set_request_interception(self, enabled).await
    }

    async fn set_extra_http_headers(&self, headers: &[(String, String)]) -> browser::Result<()> {
        Page::set_extra_http_headers(self, headers).await
    }

    async fn goto(
        &mut self,
        url: &str,
        options: &NavigateOptions,
        observer: &mut (dyn NetworkObserver + Send),
    ) -> browser::Result<()> {
        Page::goto(self, url, options, observer).await
    }

    async fn evaluate(&self, expression: String) -> browser::Result<Value> {
        Page::evaluate(self, expression).await
    }

    async fn content(&self) -> browser::Result<String> {
        Page::content(self).await
    }
}

#[async_trait]
impl PageProvider for BrowserPool {
    type Page = Page;

    async fn acquire_page(&self) -> browser::Result<Page> {
        BrowserPool::acquire_page(self).await
    }

    async fn release_page(&self, page: Page) {
        BrowserPool::release_page(self, page).await
    }
}
