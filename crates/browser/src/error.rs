//! Error types for browser operations
//!
//! Simple, flat error hierarchy. No over-engineering.

use std::time::Duration;
use thiserror::Error;

use crate::cdp::CDPError;

pub type Result<T> = std::result::Result<T, BrowserError>;

#[derive(Debug, Error)]
pub enum BrowserError {
    #[error(transparent)]
    Cdp(#[from] CDPError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to launch browser: {0}")]
    Launch(String),

    #[error("Navigation failed: {0}")]
    Navigation(String),

    #[error("Navigation timeout of {0:?} exceeded")]
    NavigationTimeout(Duration),

    #[error("Evaluation failed: {0}")]
    Evaluation(String),

    #[error("Target crashed")]
    TargetCrashed,
}
