//! Finding or starting a Chrome instance with remote debugging enabled.

use std::path::Path;
use std::process::Stdio;
use std::time::Duration;

use serde::Deserialize;
use tokio::process::{Child, Command};
use tracing::{debug, info};

use super::error::AutomationError;
use crate::config::BrowserConfig;

/// How often the DevTools endpoint is probed while Chrome starts.
const PROBE_INTERVAL: Duration = Duration::from_millis(250);

/// A page target ready to be driven, plus the browser process if we started it.
#[derive(Debug)]
pub struct LaunchedBrowser {
    /// WebSocket URL of the page target.
    pub ws_url: String,
    /// Target id, when the target was opened by us.
    pub target_id: Option<String>,
    /// Chrome process, when it was spawned by us. Killed on drop.
    pub process: Option<Child>,
}

impl LaunchedBrowser {
    /// Whether closing the session should also close the page.
    pub fn owns_target(&self) -> bool {
        self.target_id.is_some()
    }
}

/// Entry from the DevTools `/json/*` HTTP endpoints.
#[derive(Debug, Clone, Deserialize)]
pub struct TargetInfo {
    pub id: String,
    #[serde(rename = "type", default)]
    pub kind: String,
    #[serde(rename = "webSocketDebuggerUrl")]
    pub ws_url: String,
}

/// Resolves a page target according to [`BrowserConfig`].
pub struct BrowserLauncher {
    config: BrowserConfig,
    http: reqwest::Client,
}

impl BrowserLauncher {
    pub fn new(config: BrowserConfig) -> Self {
        Self {
            config,
            http: reqwest::Client::new(),
        }
    }

    /// Attach to `cdp_url` if configured; otherwise (optionally) spawn Chrome
    /// and open a fresh page target through the DevTools HTTP endpoint.
    pub async fn start(&self) -> Result<LaunchedBrowser, AutomationError> {
        if let Some(ws_url) = &self.config.cdp_url {
            info!(url = %ws_url, "Attaching to existing page target");
            return Ok(LaunchedBrowser {
                ws_url: ws_url.clone(),
                target_id: None,
                process: None,
            });
        }

        let process = match &self.config.executable {
            Some(executable) => Some(self.spawn(executable)?),
            None => None,
        };

        self.wait_for_devtools().await?;
        let target = self.open_target().await?;
        info!(target = %target.id, "Opened page target");

        Ok(LaunchedBrowser {
            ws_url: target.ws_url,
            target_id: Some(target.id),
            process,
        })
    }

    fn spawn(&self, executable: &Path) -> Result<Child, AutomationError> {
        let args = chrome_args(&self.config)?;
        info!(executable = %executable.display(), headless = self.config.headless, "Launching browser");
        debug!(?args, "Browser arguments");

        Command::new(executable)
            .args(&args)
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| AutomationError::Launch {
                reason: format!("{}: {e}", executable.display()),
            })
    }

    async fn wait_for_devtools(&self) -> Result<(), AutomationError> {
        let url = format!("{}/json/version", self.debug_base());
        let timeout = Duration::from_millis(self.config.startup_timeout_ms);
        let deadline = tokio::time::Instant::now() + timeout;

        loop {
            match self.http.get(&url).send().await {
                Ok(response) if response.status().is_success() => return Ok(()),
                Ok(response) => debug!(status = %response.status(), "DevTools not ready"),
                Err(e) => debug!(error = %e, "DevTools not reachable yet"),
            }
            if tokio::time::Instant::now() >= deadline {
                return Err(AutomationError::ConnectionFailed {
                    url,
                    reason: format!("no answer within {timeout:?}"),
                });
            }
            tokio::time::sleep(PROBE_INTERVAL).await;
        }
    }

    async fn open_target(&self) -> Result<TargetInfo, AutomationError> {
        let url = format!("{}/json/new?about:blank", self.debug_base());
        let connection_failed = |e: reqwest::Error| AutomationError::ConnectionFailed {
            url: url.clone(),
            reason: e.to_string(),
        };

        self.http
            .put(&url)
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(connection_failed)?
            .json::<TargetInfo>()
            .await
            .map_err(|e| AutomationError::Protocol {
                detail: format!("unexpected /json/new response: {e}"),
            })
    }

    fn debug_base(&self) -> &str {
        self.config.debug_url.trim_end_matches('/')
    }
}

/// Command-line arguments for a debuggable Chrome instance.
pub fn chrome_args(config: &BrowserConfig) -> Result<Vec<String>, AutomationError> {
    let port = reqwest::Url::parse(&config.debug_url)
        .ok()
        .and_then(|url| url.port_or_known_default())
        .ok_or_else(|| AutomationError::Launch {
            reason: format!("cannot derive a debugging port from {}", config.debug_url),
        })?;

    let profile = config
        .user_data_dir
        .clone()
        .unwrap_or_else(|| std::env::temp_dir().join("railbook-profile"));

    let mut args = vec![
        format!("--remote-debugging-port={port}"),
        format!("--user-data-dir={}", profile.display()),
        "--no-first-run".to_string(),
        "--no-default-browser-check".to_string(),
    ];
    if config.headless {
        args.push("--headless=new".to_string());
    }
    args.push("about:blank".to_string());
    Ok(args)
}
