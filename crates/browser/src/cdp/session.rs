//! Target sessions
//!
//! A session pins commands to one target and owns that target's event route
//! on the shared client.

use super::client::{CDPClient, CDPError, EventReceiver, Result};
use super::protocol::{AttachToTargetResult, EvaluateResult, SessionId, TargetId};
use serde_json::{json, Value};
use std::sync::Arc;

/// Domains every render session needs
pub const DEFAULT_DOMAINS: &[&str] = &["Page", "Network", "Runtime", "Inspector"];

/// CDP Session bound to a specific target
#[derive(Clone)]
pub struct CDPSession {
    /// Shared CDP client
    client: Arc<CDPClient>,

    /// Target this session is attached to
    pub target_id: TargetId,

    /// Session ID assigned by Chrome
    pub session_id: SessionId,
}

impl CDPSession {
    /// Attach to a target and create session
    ///
    /// The event route is registered before any domain is enabled, so the
    /// returned receiver sees every event the target emits from then on.
    pub async fn attach(
        client: Arc<CDPClient>,
        target_id: TargetId,
        domains: Option<&[&str]>,
    ) -> Result<(Self, EventReceiver)> {
        // Attach to target
        let result = client
            .send_request(
                "Target.attachToTarget",
                Some(json!({
                    "targetId": target_id,
                    "flatten": true,
                })),
                None,
            )
            .await?;

        let attach_result: AttachToTargetResult = serde_json::from_value(result)?;
        let session_id = attach_result.session_id;
        let events = client.subscribe_session(&session_id);

        let domains = domains.unwrap_or(DEFAULT_DOMAINS);

        // Enable all domains in parallel
        let enable_futures: Vec<_> = domains
            .iter()
            .map(|domain| {
                let client = client.clone();
                let session_id = session_id.clone();
                async move {
                    client
                        .send_request(format!("{}.enable", domain), None, Some(session_id))
                        .await
                }
            })
            .collect();

        // A render cannot proceed without its domains
        let results = futures_util::future::join_all(enable_futures).await;
        if let Some(err) = results.into_iter().find_map(|r| r.err()) {
            client.unsubscribe_session(&session_id);
            return Err(err);
        }

        Ok((
            Self {
                client,
                target_id,
                session_id,
            },
            events,
        ))
    }

    /// Send command within this session's context
    pub async fn send(&self, method: impl Into<String>, params: Option<Value>) -> Result<Value> {
        self.client
            .send_request(method, params, Some(self.session_id.clone()))
            .await
    }

    /// Navigate to URL
    pub async fn navigate(&self, url: impl Into<String>) -> Result<Value> {
        self.send("Page.navigate", Some(json!({ "url": url.into() })))
            .await
    }

    /// Evaluate JavaScript and return the by-value result
    pub async fn evaluate(&self, expression: impl Into<String>) -> Result<EvaluateResult> {
        let result = self
            .send(
                "Runtime.evaluate",
                Some(json!({
                    "expression": expression.into(),
                    "returnByValue": true,
                    "awaitPromise": true,
                })),
            )
            .await?;

        Ok(serde_json::from_value(result)?)
    }

    /// Close the target and stop routing its events
    pub async fn close(&self) -> Result<()> {
        self.client.unsubscribe_session(&self.session_id);
        let result = self
            .client
            .send_request(
                "Target.closeTarget",
                Some(json!({ "targetId": &self.target_id })),
                None,
            )
            .await;

        match result {
            Ok(_) => Ok(()),
            // Already gone (crashed or closed by the browser)
            Err(CDPError::Protocol { message, .. }) if message.contains("No target") => Ok(()),
            Err(e) => Err(e),
        }
    }
}
