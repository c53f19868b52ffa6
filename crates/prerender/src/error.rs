//! Render error taxonomy
//!
//! Stage-local failures are recovered where they happen and never show up
//! here. Everything in this enum aborts the render.

use std::time::Duration;
use thiserror::Error;

use browser::BrowserError;

pub type Result<T> = std::result::Result<T, RenderError>;

#[derive(Debug, Error)]
pub enum RenderError {
    #[error("Only {label} domain urls can be rendered")]
    Validation { label: String, target: String },

    #[error("Navigation timeout of {0:?} exceeded")]
    NavigationTimeout(Duration),

    #[error("Browser error: {0}")]
    Browser(BrowserError),

    #[error("Transform {stage} failed: {message}")]
    Transform { stage: &'static str, message: String },

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Unexpected error: {0}")]
    Unknown(String),
}

impl RenderError {
    pub fn storage(message: impl Into<String>) -> Self {
        RenderError::Storage(message.into())
    }

    /// Message carried by a panic payload
    pub fn from_panic(payload: Box<dyn std::any::Any + Send>) -> Self {
        let message = payload
            .downcast_ref::<&str>()
            .map(|s| s.to_string())
            .or_else(|| payload.downcast_ref::<String>().cloned())
            .unwrap_or_else(|| "render panicked".to_string());
        RenderError::Unknown(message)
    }

    pub fn transform(stage: &'static str, message: impl ToString) -> Self {
        RenderError::Transform {
            stage,
            message: message.to_string(),
        }
    }

    /// HTTP status the failure surfaces as
    pub fn status_code(&self) -> u16 {
        match self {
            RenderError::Validation { .. } => 400,
            _ => 500,
        }
    }
}

impl From<BrowserError> for RenderError {
    fn from(err: BrowserError) -> Self {
        match err {
            BrowserError::NavigationTimeout(limit) => RenderError::NavigationTimeout(limit),
            other => RenderError::Browser(other),
        }
    }
}

impl From<reqwest::Error> for RenderError {
    fn from(err: reqwest::Error) -> Self {
        RenderError::Storage(err.to_string())
    }
}

impl From<regex::Error> for RenderError {
    fn from(err: regex::Error) -> Self {
        RenderError::Config(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validation_message_names_the_allowed_domain() {
        let err = RenderError::Validation {
            label: "CBD".to_string(),
            target: "https://notallowed.com/page".to_string(),
        };
        assert_eq!(err.to_string(), "Only CBD domain urls can be rendered");
        assert_eq!(err.status_code(), 400);
    }

    #[test]
    fn browser_timeout_maps_to_navigation_timeout() {
        let err: RenderError = BrowserError::NavigationTimeout(Duration::from_secs(15)).into();
        assert!(matches!(err, RenderError::NavigationTimeout(_)));
        assert_eq!(err.status_code(), 500);
    }

    #[test]
    fn panic_payloads_become_unknown() {
        let err = RenderError::from_panic(Box::new("boom"));
        assert_eq!(err.to_string(), "Unexpected error: boom");
        assert_eq!(err.status_code(), 500);

        let err = RenderError::from_panic(Box::new(format!("bad {}", 1)));
        assert_eq!(err.to_string(), "Unexpected error: bad 1");

        let err = RenderError::from_panic(Box::new(42));
        assert_eq!(err.to_string(), "Unexpected error: render panicked");
    }

    #[test]
    fn other_browser_errors_are_wrapped() {
        let err: RenderError = BrowserError::TargetCrashed.into();
        assert_eq!(err.to_string(), "Browser error: Target crashed");
    }
}
