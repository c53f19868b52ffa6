//! Browser process launch and connection
//!
//! Chrome is started with `--remote-debugging-port=0` and announces the
//! DevTools WebSocket on stderr. Alternatively an already running browser can
//! be reached through `ws_url`.

use serde::{Deserialize, Serialize};
use serde_json::json;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::{Child, ChildStderr, Command};
use uuid::Uuid;

use crate::cdp::protocol::{CreateTargetResult, TargetId};
use crate::cdp::{CDPClient, CDPSession};
use crate::error::{BrowserError, Result};
use crate::page::Page;

const DEVTOOLS_PREFIX: &str = "DevTools listening on ";

const CHROME_CANDIDATES: &[&str] = &[
    "google-chrome-stable",
    "google-chrome",
    "chromium",
    "chromium-browser",
    "chrome",
];

/// Browser configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BrowserConfig {
    /// Chrome binary; falls back to `CHROME_BIN`, then to `PATH`
    pub executable: Option<PathBuf>,
    /// Connect to this DevTools endpoint instead of launching
    pub ws_url: Option<String>,
    pub headless: bool,
    /// Extra command line switches
    pub args: Vec<String>,
    pub launch_timeout_secs: u64,
    pub command_timeout_secs: u64,
}

impl Default for BrowserConfig {
    fn default() -> Self {
        Self {
            executable: None,
            ws_url: None,
            headless: true,
            args: Vec::new(),
            launch_timeout_secs: 20,
            command_timeout_secs: 30,
        }
    }
}

impl BrowserConfig {
    pub fn command_timeout(&self) -> Duration {
        Duration::from_secs(self.command_timeout_secs)
    }

    pub fn launch_timeout(&self) -> Duration {
        Duration::from_secs(self.launch_timeout_secs)
    }

    /// Command line for a launched browser
    pub fn launch_args(&self, profile_dir: &Path) -> Vec<String> {
        let mut args = Vec::<String>::new();
        if self.headless {
            args.push("--headless=new".to_string());
        }
        args.push("--remote-debugging-port=0".to_string());
        args.push(format!("--user-data-dir={}", profile_dir.display()));
        args.push("--no-first-run".to_string());
        args.push("--no-default-browser-check".to_string());
        args.push("--disable-gpu".to_string());
        args.push("--disable-dev-shm-usage".to_string());
        args.push("--disable-crash-reporter".to_string());
        args.push("--hide-scrollbars".to_string());
        args.push("--mute-audio".to_string());
        if !cfg!(target_os = "macos") {
            args.push("--no-sandbox".to_string());
        }
        args.extend(self.args.iter().cloned());
        args.push("about:blank".to_string());
        args
    }
}

/// A connected browser, optionally owning its process
pub struct Browser {
    client: Arc<CDPClient>,
    /// Killed on drop
    _process: Option<Child>,
    keep_warm: Option<TargetId>,
}

impl Browser {
    /// Launch a new browser process, or connect when `ws_url` is set
    pub async fn start(config: &BrowserConfig) -> Result<Self> {
        match &config.ws_url {
            Some(ws_url) => Self::connect(ws_url, config.command_timeout()).await,
            None => Self::launch(config).await,
        }
    }

    pub async fn launch(config: &BrowserConfig) -> Result<Self> {
        let executable = find_executable(config)?;
        let profile_dir = std::env::temp_dir().join(format!("prerender-profile-{}", Uuid::new_v4()));
        tokio::fs::create_dir_all(&profile_dir).await?;

        tracing::info!("Launching browser: {}", executable.display());
        let mut child = Command::new(&executable)
            .args(config.launch_args(&profile_dir))
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                BrowserError::Launch(format!("failed to spawn {}: {}", executable.display(), e))
            })?;

        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| BrowserError::Launch("browser stderr unavailable".to_string()))?;

        let ws_url = tokio::time::timeout(config.launch_timeout(), read_ws_url(stderr))
            .await
            .map_err(|_| {
                BrowserError::Launch(format!(
                    "no DevTools endpoint announced within {:?}",
                    config.launch_timeout()
                ))
            })??;

        tracing::debug!("DevTools endpoint: {}", ws_url);
        let client = CDPClient::connect_with_timeout(&ws_url, config.command_timeout()).await?;

        Ok(Self {
            client,
            _process: Some(child),
            keep_warm: None,
        })
    }

    pub async fn connect(ws_url: &str, command_timeout: Duration) -> Result<Self> {
        tracing::info!("Connecting to browser at {}", ws_url);
        let client = CDPClient::connect_with_timeout(ws_url, command_timeout).await?;
        Ok(Self {
            client,
            _process: None,
            keep_warm: None,
        })
    }

    pub fn client(&self) -> &Arc<CDPClient> {
        &self.client
    }

    async fn create_target(&self) -> Result<TargetId> {
        let result = self
            .client
            .send_request(
                "Target.createTarget",
                Some(json!({ "url": "about:blank" })),
                None,
            )
            .await?;
        let created: CreateTargetResult = serde_json::from_value(result)?;
        Ok(created.target_id)
    }

    /// Open a fresh tab with its own event route
    ///
    /// A tab whose session cannot be set up is closed again before the
    /// error is returned, so a failed call never leaves a target behind.
    pub async fn new_page(&self) -> Result<Page> {
        let target_id = self.create_target().await?;
        match CDPSession::attach(self.client.clone(), target_id.clone(), None).await {
            Ok((session, events)) => {
                tracing::debug!("Opened page {}", session.target_id);
                Ok(Page::new(session, events))
            }
            Err(e) => {
                tracing::warn!("Attaching to {} failed: {}", target_id, e);
                self.close_target(&target_id).await;
                Err(e.into())
            }
        }
    }

    async fn close_target(&self, target_id: &str) {
        let closed = self
            .client
            .send_request(
                "Target.closeTarget",
                Some(json!({ "targetId": target_id })),
                None,
            )
            .await;
        if let Err(e) = closed {
            tracing::warn!("Failed to close target {}: {}", target_id, e);
        }
    }

    /// Keep one idle tab open so the browser never runs out of targets
    pub async fn open_keep_warm_page(&mut self) -> Result<()> {
        if self.keep_warm.is_none() {
            self.keep_warm = Some(self.create_target().await?);
        }
        Ok(())
    }
}

fn find_executable(config: &BrowserConfig) -> Result<PathBuf> {
    if let Some(path) = &config.executable {
        return Ok(path.clone());
    }
    if let Ok(v) = std::env::var("CHROME_BIN") {
        let p = PathBuf::from(v);
        if p.exists() {
            return Ok(p);
        }
    }
    let path = std::env::var_os("PATH").unwrap_or_default();
    for dir in std::env::split_paths(&path) {
        for name in CHROME_CANDIDATES {
            let candidate = dir.join(name);
            if candidate.is_file() {
                return Ok(candidate);
            }
        }
    }
    Err(BrowserError::Launch(
        "no Chrome/Chromium executable found; set CHROME_BIN".to_string(),
    ))
}

/// Read stderr until the DevTools endpoint shows up, then keep draining it
/// in the background so the browser never blocks on a full pipe.
async fn read_ws_url(stderr: ChildStderr) -> Result<String> {
    let mut lines = BufReader::new(stderr).lines();
    while let Some(line) = lines.next_line().await? {
        if let Some(ws_url) = parse_devtools_line(&line) {
            tokio::spawn(async move {
                while let Ok(Some(line)) = lines.next_line().await {
                    tracing::trace!("[chrome] {}", line);
                }
            });
            return Ok(ws_url);
        }
        tracing::trace!("[chrome] {}", line);
    }
    Err(BrowserError::Launch(
        "browser exited before announcing its DevTools endpoint".to_string(),
    ))
}

fn parse_devtools_line(line: &str) -> Option<String> {
    line.trim()
        .strip_prefix(DEVTOOLS_PREFIX)
        .map(|url| url.trim().to_string())
        .filter(|url| url.starts_with("ws://") || url.starts_with("wss://"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_devtools_line() {
        assert_eq!(
            parse_devtools_line(
                "DevTools listening on ws://127.0.0.1:41235/devtools/browser/0b1c-22"
            )
            .as_deref(),
            Some("ws://127.0.0.1:41235/devtools/browser/0b1c-22")
        );
        assert!(parse_devtools_line("[0101/000000.1:ERROR:gpu_init.cc] oops").is_none());
        assert!(parse_devtools_line("DevTools listening on nowhere").is_none());
    }

    #[test]
    fn test_launch_args() {
        let config = BrowserConfig {
            args: vec!["--lang=en-US".to_string()],
            ..Default::default()
        };
        let args = config.launch_args(Path::new("/tmp/profile"));
        assert_eq!(args[0], "--headless=new");
        assert!(args.contains(&"--remote-debugging-port=0".to_string()));
        assert!(args.contains(&"--user-data-dir=/tmp/profile".to_string()));
        assert!(args.contains(&"--lang=en-US".to_string()));
        assert_eq!(args.last().map(String::as_str), Some("about:blank"));
    }

    #[test]
    fn test_headful_args_skip_headless_switch() {
        let config = BrowserConfig {
            headless: false,
            ..Default::default()
        };
        let args = config.launch_args(Path::new("/tmp/profile"));
        assert!(!args.iter().any(|a| a.starts_with("--headless")));
    }

    #[test]
    fn test_explicit_executable_wins() {
        let config = BrowserConfig {
            executable: Some(PathBuf::from("/opt/chrome/chrome")),
            ..Default::default()
        };
        assert_eq!(
            find_executable(&config).unwrap(),
            PathBuf::from("/opt/chrome/chrome")
        );
    }

    #[tokio::test]
    #[ignore] // Needs Chrome installed
    async fn test_launch_and_open_page() {
        let browser = Browser::launch(&BrowserConfig::default()).await.unwrap();
        let page = browser.new_page().await.unwrap();
        page.close().await.unwrap();
    }
}
