//! Headless browser capability over the Chrome DevTools Protocol
//!
//! This crate launches (or connects to) Chrome, opens pages on a single
//! multiplexed WebSocket and drives page loads with request interception.
//!
//! # Architecture
//!
//! 1. **One socket**: every page is a flattened session on the same `CDPClient`
//! 2. **Message passing**: each session gets its own event channel, drained
//!    only by the page that owns it
//! 3. **Observers, not callbacks**: a [`NetworkObserver`] is handed to
//!    [`Page::goto`] and consulted from inside the navigation loop
//! 4. **One browser per process**: [`BrowserPool`] initializes lazily, once

pub mod cdp;
pub mod error;
pub mod launcher;
pub mod network;
pub mod page;
pub mod pool;

pub use cdp::{CDPClient, CDPSession};
pub use error::{BrowserError, Result};
pub use launcher::{Browser, BrowserConfig};
pub use network::{
    IdleTracker, InterceptedRequest, NetworkObserver, RequestDecision, ResourceType, ResponseMeta,
};
pub use page::{NavigateOptions, Page};
pub use pool::BrowserPool;
