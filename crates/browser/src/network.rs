//! Network observation for a single page load
//!
//! The page's navigation loop is the only caller of a [`NetworkObserver`].
//! Observers see every paused request exactly once and every completed
//! response whose body they asked for.

use std::collections::HashSet;
use std::fmt;
use std::time::{Duration, Instant};

/// CDP resource type, lower-cased
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ResourceType {
    Document,
    Stylesheet,
    Image,
    Media,
    Font,
    Script,
    Xhr,
    Fetch,
    WebSocket,
    Other(String),
}

impl ResourceType {
    pub fn parse(raw: &str) -> Self {
        match raw.to_ascii_lowercase().as_str() {
            "document" => Self::Document,
            "stylesheet" => Self::Stylesheet,
            "image" => Self::Image,
            "media" => Self::Media,
            "font" => Self::Font,
            "script" => Self::Script,
            "xhr" => Self::Xhr,
            "fetch" => Self::Fetch,
            "websocket" => Self::WebSocket,
            other => Self::Other(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::Document => "document",
            Self::Stylesheet => "stylesheet",
            Self::Image => "image",
            Self::Media => "media",
            Self::Font => "font",
            Self::Script => "script",
            Self::Xhr => "xhr",
            Self::Fetch => "fetch",
            Self::WebSocket => "websocket",
            Self::Other(other) => other,
        }
    }
}

impl fmt::Display for ResourceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outbound request held by the interception layer
#[derive(Debug, Clone)]
pub struct InterceptedRequest {
    pub url: String,
    pub resource_type: ResourceType,
}

/// Response metadata, before any body is read
#[derive(Debug, Clone)]
pub struct ResponseMeta {
    pub request_id: String,
    pub url: String,
    pub status: u16,
    pub resource_type: ResourceType,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestDecision {
    Continue,
    Abort,
}

pub trait NetworkObserver {
    /// Decide the fate of a paused request. Called exactly once per request.
    fn on_request(&mut self, request: &InterceptedRequest) -> RequestDecision;

    /// Whether the body of this response should be read once loading finishes
    fn wants_body(&self, response: &ResponseMeta) -> bool {
        let _ = response;
        false
    }

    /// Deliver a body requested through [`NetworkObserver::wants_body`]
    fn on_response(&mut self, response: &ResponseMeta, body: &str) {
        let _ = (response, body);
    }
}

/// Tracks in-flight requests to detect the network-idle settle point
#[derive(Debug)]
pub struct IdleTracker {
    in_flight: HashSet<String>,
    last_change: Instant,
    max_in_flight: usize,
    quiet: Duration,
}

impl IdleTracker {
    pub fn new(max_in_flight: usize, quiet: Duration, now: Instant) -> Self {
        Self {
            in_flight: HashSet::new(),
            last_change: now,
            max_in_flight,
            quiet,
        }
    }

    /// Redirects reuse the request id, so starting twice is a no-op
    pub fn request_started(&mut self, request_id: &str, now: Instant) {
        if self.in_flight.insert(request_id.to_string()) {
            self.last_change = now;
        }
    }

    pub fn request_finished(&mut self, request_id: &str, now: Instant) {
        if self.in_flight.remove(request_id) {
            self.last_change = now;
        }
    }

    pub fn in_flight(&self) -> usize {
        self.in_flight.len()
    }

    /// Instant at which the page counts as idle, if nothing else changes
    pub fn idle_deadline(&self) -> Option<Instant> {
        (self.in_flight.len() <= self.max_in_flight).then(|| self.last_change + self.quiet)
    }

    pub fn is_idle(&self, now: Instant) -> bool {
        self.idle_deadline().is_some_and(|deadline| now >= deadline)
    }
}
