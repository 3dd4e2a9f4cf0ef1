use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;

use chromiumoxide::browser::Browser;
use futures::StreamExt;
use serde::Deserialize;
use tokio::process::{Child, Command};
use tokio::time::sleep;

use super::discovery::{discover_browser, BrowserInfo};
use crate::config::BrowserConfig;
use crate::error::{ConsoleError, Result};

/// Target entry from the DevTools /json/list endpoint
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TargetInfo {
    pub id: String,
    pub url: String,
    #[serde(rename = "type")]
    pub target_type: String,
    pub web_socket_debugger_url: Option<String>,
}

/// Starts a browser with remote debugging enabled
pub struct BrowserLauncher {
    browser_info: BrowserInfo,
    cdp_port: u16,
    headless: bool,
    user_data_dir: PathBuf,
    window_size: (u32, u32),
    extra_args: Vec<String>,
}

impl BrowserLauncher {
    pub fn from_config(config: &BrowserConfig) -> Result<Self> {
        let browser_info = discover_browser(config.executable.as_deref())?;

        Ok(Self {
            browser_info,
            cdp_port: config.cdp_port,
            headless: config.headless,
            user_data_dir: config.resolved_user_data_dir(),
            window_size: (config.window_width, config.window_height),
            extra_args: config.extra_args.clone(),
        })
    }

    fn build_args(&self) -> Vec<String> {
        let mut args = vec![
            format!("--remote-debugging-port={}", self.cdp_port),
            format!("--user-data-dir={}", self.user_data_dir.display()),
            format!("--window-size={},{}", self.window_size.0, self.window_size.1),
            "--no-first-run".to_string(),
            "--no-default-browser-check".to_string(),
            "--disable-save-password-bubble".to_string(),
            "--disable-translate".to_string(),
            // Keep cross-origin iframes in the page's process so one
            // DevTools session can reach every frame
            "--disable-features=IsolateOrigins,site-per-process".to_string(),
        ];

        if self.headless {
            args.push("--headless=new".to_string());
        }

        args.extend(self.extra_args.iter().cloned());
        args.push("about:blank".to_string());
        args
    }

    /// Launch the browser and wait until its DevTools endpoint answers
    pub async fn launch(&self) -> Result<BrowserProcess> {
        let client = devtools_client();

        // A browser already on this port would silently take our commands
        if fetch_browser_ws_url(&client, self.cdp_port).await.is_some() {
            return Err(ConsoleError::BrowserLaunchFailed(format!(
                "port {} is already serving DevTools; pick another with --cdp-port",
                self.cdp_port
            )));
        }

        std::fs::create_dir_all(&self.user_data_dir)?;

        let args = self.build_args();
        tracing::debug!(
            "Launching {} at {:?} with args: {:?}",
            self.browser_info.kind.name(),
            self.browser_info.path,
            args
        );
        if let Some(version) = self.browser_info.version() {
            tracing::debug!("Browser version {}", version);
        }

        let mut child = Command::new(&self.browser_info.path)
            .args(&args)
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                ConsoleError::BrowserLaunchFailed(format!(
                    "Failed to launch {}: {}",
                    self.browser_info.kind.name(),
                    e
                ))
            })?;

        let browser_ws_url = self.wait_for_cdp(&client, &mut child).await?;

        Ok(BrowserProcess {
            child,
            cdp_port: self.cdp_port,
            browser_ws_url,
            client,
        })
    }

    async fn wait_for_cdp(&self, client: &reqwest::Client, child: &mut Child) -> Result<String> {
        // Up to 10 seconds
        for attempt in 1..=20 {
            sleep(Duration::from_millis(500)).await;

            if let Some(status) = child.try_wait()? {
                return Err(ConsoleError::BrowserLaunchFailed(format!(
                    "browser exited early ({}); is {} in use by another browser?",
                    status,
                    self.user_data_dir.display()
                )));
            }

            match fetch_browser_ws_url(client, self.cdp_port).await {
                Some(ws_url) => {
                    tracing::info!("CDP ready at: {}", ws_url);
                    return Ok(ws_url);
                }
                None => tracing::debug!("CDP not ready yet (attempt {})", attempt),
            }
        }

        Err(ConsoleError::CdpConnectionFailed(
            "Timeout waiting for CDP to be ready".to_string(),
        ))
    }
}

/// A running browser we launched and own
pub struct BrowserProcess {
    child: Child,
    cdp_port: u16,
    browser_ws_url: String,
    client: reqwest::Client,
}

impl BrowserProcess {
    /// WebSocket URL of the first page target, creating a page if none exists
    pub async fn page_ws_url(&self) -> Result<String> {
        let url = format!("http://127.0.0.1:{}/json/list", self.cdp_port);
        let targets: Vec<TargetInfo> = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| ConsoleError::CdpConnectionFailed(format!("Failed to list pages: {}", e)))?
            .json()
            .await?;

        if let Some(ws_url) = targets
            .into_iter()
            .filter(|t| t.target_type == "page")
            .find_map(|t| {
                tracing::debug!("Attaching to page target {} ({})", t.id, t.url);
                t.web_socket_debugger_url
            })
        {
            return Ok(ws_url);
        }

        // Newer Chrome only accepts PUT here
        let url = format!("http://127.0.0.1:{}/json/new?about:blank", self.cdp_port);
        let target: TargetInfo = self
            .client
            .put(&url)
            .send()
            .await
            .map_err(|e| ConsoleError::CdpConnectionFailed(format!("Failed to open a page: {}", e)))?
            .json()
            .await?;

        target.web_socket_debugger_url.ok_or_else(|| {
            ConsoleError::CdpConnectionFailed("New page has no WebSocket URL".to_string())
        })
    }

    /// Close the browser gracefully, killing it if it lingers
    pub async fn close(&mut self) -> Result<()> {
        match Browser::connect(&self.browser_ws_url).await {
            Ok((mut browser, mut handler)) => {
                let events = tokio::spawn(async move { while handler.next().await.is_some() {} });
                if let Err(e) = browser.close().await {
                    tracing::debug!("Browser.close failed: {}", e);
                }
                events.abort();
            }
            Err(e) => tracing::debug!("Could not connect to close browser: {}", e),
        }

        match tokio::time::timeout(Duration::from_secs(5), self.child.wait()).await {
            Ok(status) => {
                tracing::debug!("Browser exited with {}", status?);
            }
            Err(_) => {
                tracing::warn!("Browser did not exit in time, killing it");
                self.child.kill().await?;
            }
        }
        Ok(())
    }
}

fn devtools_client() -> reqwest::Client {
    // Bypass proxies for localhost
    reqwest::Client::builder()
        .no_proxy()
        .timeout(Duration::from_secs(5))
        .build()
        .unwrap_or_else(|_| reqwest::Client::new())
}

/// `webSocketDebuggerUrl` from /json/version, or `None` if nothing answers
async fn fetch_browser_ws_url(client: &reqwest::Client, cdp_port: u16) -> Option<String> {
    let url = format!("http://127.0.0.1:{}/json/version", cdp_port);
    let response = client.get(&url).send().await.ok()?;
    if !response.status().is_success() {
        return None;
    }
    let info: serde_json::Value = response.json().await.ok()?;
    info.get("webSocketDebuggerUrl")
        .and_then(|v| v.as_str())
        .map(|s| s.to_string())
}
