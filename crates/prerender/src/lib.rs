//! Prerendering for single-page applications
//!
//! A target URL on an allowed domain is loaded in headless Chrome with
//! request interception on. Once the network settles the DOM is flattened
//! into self-contained HTML: stylesheets and their imports are inlined and
//! scripts are removed. The result goes back inline, or through object
//! storage and a redirect when it is too large.
//!
//! ```no_run
//! use std::collections::HashMap;
//! use std::sync::Arc;
//! use browser::{BrowserConfig, BrowserPool};
//! use prerender::{HttpObjectStore, RenderConfig, RenderPipeline};
//!
//! # async fn run() -> prerender::Result<()> {
//! let config = RenderConfig::default();
//! let pool = Arc::new(BrowserPool::new(BrowserConfig::default()));
//! let storage = Arc::new(HttpObjectStore::new(config.storage.clone())?);
//! let pipeline = RenderPipeline::new(pool, storage, config)?;
//!
//! let result = pipeline.render("https://www.cbd.int/", HashMap::new()).await;
//! println!("{}", result.status());
//! # Ok(())
//! # }
//! ```

pub mod collector;
pub mod config;
pub mod domain;
pub mod error;
pub mod filter;
pub mod lifecycle;
pub mod pipeline;
pub mod router;
pub mod storage;
pub mod surface;
pub mod transform;

pub use collector::{ImportReference, NetworkCapture, StylesheetCollector, StylesheetEntry};
pub use config::RenderConfig;
pub use domain::DomainValidator;
pub use error::{RenderError, Result};
pub use filter::RequestFilter;
pub use lifecycle::{LifecycleBus, LifecycleEvent, RenderState};
pub use pipeline::{RenderPipeline, RenderRequest};
pub use router::{OutputRouter, RenderResult};
pub use storage::{HttpObjectStore, StorageConfig, StorageSink, Visibility};
pub use surface::{PageProvider, RenderPage};
pub use transform::{ContentTransformer, MarkupStripper, RegexStripper};
