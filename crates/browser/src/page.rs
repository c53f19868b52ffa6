//! Page - one browser tab driven through its CDP session
//!
//! A page owns the receiving end of its session's event route. Events are
//! only consumed inside [`Page::goto`], which makes the navigation loop the
//! single place where interception decisions and response bodies are handled.

use base64::Engine;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::time::{Duration, Instant};

use crate::cdp::protocol::{
    LoadingDone, NavigateResult, RequestPaused, RequestWillBeSent, ResponseBody, ResponseReceived,
};
use crate::cdp::{CDPError, CDPEvent, CDPSession, EventReceiver};
use crate::error::{BrowserError, Result};
use crate::network::{
    IdleTracker, InterceptedRequest, NetworkObserver, RequestDecision, ResourceType, ResponseMeta,
};

/// Serializes the document the same way DevTools "Copy outerHTML" does,
/// with the doctype kept in front.
const CONTENT_SCRIPT: &str = r#"(() => {
  let html = '';
  if (document.doctype) {
    html = new XMLSerializer().serializeToString(document.doctype);
  }
  if (document.documentElement) {
    html += document.documentElement.outerHTML;
  }
  return html;
})()"#;

/// Navigation settle options
#[derive(Debug, Clone)]
pub struct NavigateOptions {
    /// Upper bound for the whole navigation, including the idle wait
    pub timeout: Duration,
    /// In-flight requests still tolerated when idle
    pub idle_connections: usize,
    /// How long the network must stay at or below `idle_connections`
    pub idle_quiet: Duration,
}

impl Default for NavigateOptions {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(15),
            idle_connections: 0,
            idle_quiet: Duration::from_millis(500),
        }
    }
}

pub struct Page {
    session: CDPSession,
    events: EventReceiver,
}

impl Page {
    pub(crate) fn new(session: CDPSession, events: EventReceiver) -> Self {
        Self { session, events }
    }

    pub fn target_id(&self) -> &str {
        &self.session.target_id
    }

    /// Pause every outbound request until the navigation loop decides it
    pub async fn set_request_interception(&self, enabled: bool) -> Result<()> {
        if enabled {
            self.session
                .send(
                    "Fetch.enable",
                    Some(json!({ "patterns": [{ "urlPattern": "*", "requestStage": "Request" }] })),
                )
                .await?;
        } else {
            self.session.send("Fetch.disable", None).await?;
        }
        Ok(())
    }

    /// Headers sent with every request the page makes
    pub async fn set_extra_http_headers(&self, headers: &[(String, String)]) -> Result<()> {
        let headers: serde_json::Map<String, Value> = headers
            .iter()
            .map(|(name, value)| (name.clone(), Value::String(value.clone())))
            .collect();
        self.session
            .send(
                "Network.setExtraHTTPHeaders",
                Some(json!({ "headers": headers })),
            )
            .await?;
        Ok(())
    }

    /// Navigate and wait until the load event fired and the network settled.
    ///
    /// The observer is consulted for every paused request and for every
    /// response body it asks for. On timeout the page is left as is; closing
    /// it is the caller's job.
    pub async fn goto(
        &mut self,
        url: &str,
        options: &NavigateOptions,
        observer: &mut (dyn NetworkObserver + Send),
    ) -> Result<()> {
        let navigation = drive_navigation(&self.session, &mut self.events, url, options, observer);
        match tokio::time::timeout(options.timeout, navigation).await {
            Ok(result) => result,
            Err(_) => Err(BrowserError::NavigationTimeout(options.timeout)),
        }
    }

    /// Evaluate an expression and return its value
    pub async fn evaluate(&self, expression: impl Into<String>) -> Result<Value> {
        let evaluated = self.session.evaluate(expression).await?;
        if let Some(details) = evaluated.exception_details {
            let description = details
                .exception
                .and_then(|e| e.description)
                .unwrap_or_default();
            return Err(BrowserError::Evaluation(format!(
                "{} {}",
                details.text, description
            )));
        }
        Ok(evaluated.result.value.unwrap_or(Value::Null))
    }

    /// Serialized DOM, doctype included
    pub async fn content(&self) -> Result<String> {
        match self.evaluate(CONTENT_SCRIPT).await? {
            Value::String(html) => Ok(html),
            other => Err(BrowserError::Evaluation(format!(
                "document serialization returned {}",
                other
            ))),
        }
    }

    pub async fn close(self) -> Result<()> {
        self.session.close().await?;
        Ok(())
    }
}

/// Map a decision onto the Fetch command that releases the request
pub(crate) fn resolution(request_id: &str, decision: RequestDecision) -> (&'static str, Value) {
    match decision {
        RequestDecision::Continue => ("Fetch.continueRequest", json!({ "requestId": request_id })),
        RequestDecision::Abort => (
            "Fetch.failRequest",
            json!({ "requestId": request_id, "errorReason": "Aborted" }),
        ),
    }
}

async fn drive_navigation(
    session: &CDPSession,
    events: &mut EventReceiver,
    url: &str,
    options: &NavigateOptions,
    observer: &mut (dyn NetworkObserver + Send),
) -> Result<()> {
    let navigate = session.navigate(url);
    tokio::pin!(navigate);

    let mut navigated = false;
    let mut loaded = false;
    let mut tracker = IdleTracker::new(options.idle_connections, options.idle_quiet, Instant::now());
    let mut wanted: HashMap<String, ResponseMeta> = HashMap::new();

    loop {
        let now = Instant::now();
        if navigated && loaded && tracker.is_idle(now) {
            tracing::debug!("Network idle reached for {}", url);
            return Ok(());
        }
        let wake = tracker
            .idle_deadline()
            .filter(|_| navigated && loaded)
            .unwrap_or(now + options.idle_quiet);

        tokio::select! {
            biased;

            result = &mut navigate, if !navigated => {
                let navigation: NavigateResult = serde_json::from_value(result?)?;
                if let Some(error) = navigation.error_text.filter(|e| !e.is_empty()) {
                    return Err(BrowserError::Navigation(format!("{}: {}", url, error)));
                }
                navigated = true;
            }

            event = events.recv() => {
                let event = event.ok_or(CDPError::Closed)?;
                if event.method == "Page.loadEventFired" {
                    loaded |= navigated;
                    continue;
                }
                handle_network_event(session, &event, observer, &mut tracker, &mut wanted).await?;
            }

            _ = tokio::time::sleep_until(wake.into()) => {}
        }
    }
}

async fn handle_network_event(
    session: &CDPSession,
    event: &CDPEvent,
    observer: &mut (dyn NetworkObserver + Send),
    tracker: &mut IdleTracker,
    wanted: &mut HashMap<String, ResponseMeta>,
) -> Result<()> {
    match event.method.as_str() {
        "Fetch.requestPaused" => {
            let paused: RequestPaused = match event.decode() {
                Ok(paused) => paused,
                Err(e) => {
                    // A paused request stays paused until resolved
                    let request_id = event
                        .params
                        .as_ref()
                        .and_then(|params| params.get("requestId"))
                        .and_then(Value::as_str);
                    match request_id {
                        Some(request_id) => {
                            tracing::warn!("Undecodable Fetch.requestPaused {}: {}", request_id, e);
                            resolve(session, request_id, RequestDecision::Abort, "<undecodable>").await;
                        }
                        None => tracing::warn!("Fetch.requestPaused without requestId: {}", e),
                    }
                    return Ok(());
                }
            };
            let request = InterceptedRequest {
                url: paused.request.url,
                resource_type: ResourceType::parse(&paused.resource_type),
            };
            let decision = observer.on_request(&request);
            if decision == RequestDecision::Abort {
                tracing::debug!("Aborting {} request {}", request.resource_type, request.url);
            }
            resolve(session, &paused.request_id, decision, &request.url).await;
        }

        "Network.requestWillBeSent" => {
            if let Ok(sent) = event.decode::<RequestWillBeSent>() {
                tracker.request_started(&sent.request_id, Instant::now());
            }
        }

        "Network.responseReceived" => {
            if let Ok(received) = event.decode::<ResponseReceived>() {
                let meta = ResponseMeta {
                    request_id: received.request_id,
                    url: received.response.url,
                    status: received.response.status,
                    resource_type: ResourceType::parse(&received.resource_type),
                };
                if observer.wants_body(&meta) {
                    wanted.insert(meta.request_id.clone(), meta);
                }
            }
        }

        "Network.loadingFinished" => {
            let Ok(done) = event.decode::<LoadingDone>() else {
                return Ok(());
            };
            tracker.request_finished(&done.request_id, Instant::now());
            if let Some(meta) = wanted.remove(&done.request_id) {
                match response_body(session, &meta.request_id).await {
                    Ok(body) => observer.on_response(&meta, &body),
                    Err(e) => tracing::debug!("Skipping body of {}: {}", meta.url, e),
                }
            }
        }

        "Network.loadingFailed" => {
            if let Ok(done) = event.decode::<LoadingDone>() {
                tracker.request_finished(&done.request_id, Instant::now());
                wanted.remove(&done.request_id);
            }
        }

        "Inspector.targetCrashed" => return Err(BrowserError::TargetCrashed),

        _ => {}
    }

    Ok(())
}

async fn resolve(session: &CDPSession, request_id: &str, decision: RequestDecision, url: &str) {
    let (method, params) = resolution(request_id, decision);
    if let Err(e) = session.send(method, Some(params)).await {
        // The request may have been cancelled by the page meanwhile
        tracing::warn!("{} failed for {}: {}", method, url, e);
    }
}

async fn response_body(session: &CDPSession, request_id: &str) -> Result<String> {
    let result = session
        .send(
            "Network.getResponseBody",
            Some(json!({ "requestId": request_id })),
        )
        .await?;
    let body: ResponseBody = serde_json::from_value(result)?;
    if !body.base64_encoded {
        return Ok(body.body);
    }
    let bytes = base64::engine::general_purpose::STANDARD
        .decode(body.body.as_bytes())
        .map_err(|e| BrowserError::Evaluation(format!("invalid base64 body: {}", e)))?;
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}
