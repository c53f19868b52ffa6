//! Render pipeline
//!
//! One call renders one target: validate, load with interception, transform,
//! route. The page borrowed for the load is always handed back, whatever
//! happened in between.

use futures_util::FutureExt;
use std::collections::HashMap;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Instant;
use url::Url;
use uuid::Uuid;

use crate::collector::{NetworkCapture, StylesheetCollector};
use crate::config::RenderConfig;
use crate::domain::DomainValidator;
use crate::error::{RenderError, Result};
use crate::filter::RequestFilter;
use crate::lifecycle::{LifecycleBus, LifecycleEvent, RenderState};
use crate::router::{OutputRouter, RenderResult};
use crate::storage::StorageSink;
use crate::surface::{PageProvider, RenderPage};
use crate::transform::ContentTransformer;

/// Inbound render request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderRequest {
    pub target_url: String,
    pub caller_headers: HashMap<String, String>,
    /// `Some(false)` when the target carries `cfCache=false`
    pub cache_override: Option<bool>,
}

impl RenderRequest {
    pub fn new(target_url: impl Into<String>, caller_headers: HashMap<String, String>) -> Self {
        let target_url = target_url.into();
        let cache_override = cache_override(&target_url);
        Self {
            target_url,
            caller_headers,
            cache_override,
        }
    }

    /// Build from an inbound path such as `/https://www.cbd.int/page?x=1`
    pub fn from_path(path: &str, caller_headers: HashMap<String, String>) -> Self {
        let target = path.strip_prefix('/').unwrap_or(path);
        Self::new(target, caller_headers)
    }
}

fn cache_override(target_url: &str) -> Option<bool> {
    let parsed = Url::parse(target_url).ok()?;
    parsed
        .query_pairs()
        .any(|(key, value)| key == "cfCache" && value == "false")
        .then_some(false)
}

pub struct RenderPipeline<P: PageProvider> {
    provider: Arc<P>,
    config: RenderConfig,
    domains: DomainValidator,
    filter: RequestFilter,
    transformer: ContentTransformer,
    router: OutputRouter,
    lifecycle: LifecycleBus,
}

impl<P: PageProvider> RenderPipeline<P> {
    pub fn new(provider: Arc<P>, storage: Arc<dyn StorageSink>, config: RenderConfig) -> Result<Self> {
        let domains = DomainValidator::new(config.allowed_suffixes.iter().cloned());
        let filter = RequestFilter::from_config(&config)?;
        let transformer = ContentTransformer::from_config(&config)?;
        let router = OutputRouter::new(storage, &config);

        Ok(Self {
            provider,
            config,
            domains,
            filter,
            transformer,
            router,
            lifecycle: LifecycleBus::new(),
        })
    }

    pub fn config(&self) -> &RenderConfig {
        &self.config
    }

    pub fn lifecycle(&self) -> &LifecycleBus {
        &self.lifecycle
    }

    /// Render `target_url`; a leading `/` left over from routing is dropped
    pub async fn render(
        &self,
        target_url: &str,
        caller_headers: HashMap<String, String>,
    ) -> RenderResult {
        self.execute(&RenderRequest::from_path(target_url, caller_headers))
            .await
    }

    pub async fn execute(&self, request: &RenderRequest) -> RenderResult {
        let started = Instant::now();
        let render_id = Uuid::new_v4();
        let emit = |state| {
            self.lifecycle.publish(LifecycleEvent {
                render_id,
                target: request.target_url.clone(),
                state,
            })
        };

        emit(RenderState::Idle);
        emit(RenderState::Validating);
        if let Err(e) = self.validate(&request.target_url) {
            tracing::warn!("Rejected {}: {}", request.target_url, e);
            emit(RenderState::Done);
            return RenderResult::from(&e);
        }

        emit(RenderState::Loading);
        let mut page = match self.provider.acquire_page().await {
            Ok(page) => page,
            Err(e) => {
                let e = RenderError::from(e);
                tracing::error!("Could not get a page for {}: {}", request.target_url, e);
                emit(RenderState::Failed);
                return RenderResult::from(&e);
            }
        };

        // A panic mid-render still has to give the page back
        let outcome = AssertUnwindSafe(self.run(&mut page, request, &emit))
            .catch_unwind()
            .await
            .unwrap_or_else(|payload| Err(RenderError::from_panic(payload)));

        emit(RenderState::Closing);
        self.provider.release_page(page).await;

        let result = match outcome {
            Ok(result) => {
                emit(RenderState::Done);
                result
            }
            Err(e) => {
                tracing::error!("Render of {} failed: {}", request.target_url, e);
                emit(RenderState::Failed);
                RenderResult::from(&e)
            }
        };

        tracing::info!(
            "Rendered {} -> {} in {:?}",
            request.target_url,
            result.status(),
            started.elapsed()
        );
        result
    }

    fn validate(&self, target_url: &str) -> Result<()> {
        if self.domains.is_url_allowed(target_url) {
            Ok(())
        } else {
            Err(RenderError::Validation {
                label: self.config.allowed_label.clone(),
                target: target_url.to_string(),
            })
        }
    }

    async fn run(
        &self,
        page: &mut P::Page,
        request: &RenderRequest,
        emit: &(dyn Fn(RenderState) + Sync),
    ) -> Result<RenderResult> {
        page.set_request_interception(true).await?;
        page.set_extra_http_headers(&[(
            self.config.prerender_header_name.clone(),
            self.config.prerender_header_value.clone(),
        )])
        .await?;

        let mut capture = NetworkCapture::new(
            &self.filter,
            StylesheetCollector::new(self.domains.clone()),
        );
        page.goto(&request.target_url, &self.config.navigate_options(), &mut capture)
            .await?;
        tracing::debug!(
            "Loaded {}: {} requests, {} aborted",
            request.target_url,
            capture.requests(),
            capture.aborted()
        );
        let collector = capture.into_collector();

        emit(RenderState::Transforming);
        self.transformer.inline_in_page(&*page, &collector).await;
        let html = page.content().await?;
        let html = self
            .transformer
            .finish(html, &collector, &request.caller_headers);

        emit(RenderState::Routing);
        self.router.finalize(html, request.cache_override).await
    }
}
