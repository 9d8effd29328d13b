//! Playwright browser automation
//!
//! [`PlaywrightPage`] keeps a single Node.js process alive for the whole run.
//! The process hosts the embedded `driver.js`, which owns the browser and the
//! page; requests and responses travel as newline-delimited JSON over the
//! child's stdin/stdout. Keeping one process (rather than one script per
//! action) is what lets the login cookie and the current URL carry over
//! from step to step.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader, Lines};
use tokio::process::{Child, ChildStdin, ChildStdout, Command};
use tokio::time::timeout;
use tracing::{debug, info, trace, warn};

use crate::error::{E2eError, E2eResult};
use crate::page::{Locator, Page};

const DRIVER_JS: &str = include_str!("driver.js");

/// Slack on top of the Playwright-side timeout before the bridge gives up
/// on a response.
const RESPONSE_GRACE: Duration = Duration::from_secs(10);

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Browser {
    #[default]
    Chromium,
    Firefox,
    Webkit,
}

impl Browser {
    pub fn as_str(&self) -> &'static str {
        match self {
            Browser::Chromium => "chromium",
            Browser::Firefox => "firefox",
            Browser::Webkit => "webkit",
        }
    }

    pub fn parse(name: &str) -> E2eResult<Self> {
        match name.to_ascii_lowercase().as_str() {
            "chromium" | "chrome" => Ok(Browser::Chromium),
            "firefox" => Ok(Browser::Firefox),
            "webkit" | "safari" => Ok(Browser::Webkit),
            other => Err(E2eError::Config(format!("unknown browser: {}", other))),
        }
    }
}

/// Configuration for Playwright (`[browser]` table)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PlaywrightConfig {
    pub kind: Browser,
    pub headless: bool,
    pub viewport_width: u32,
    pub viewport_height: u32,

    /// `node_modules` directory holding the `playwright` package
    pub node_path: Option<PathBuf>,

    /// How long to wait for the browser to come up
    pub launch_timeout_ms: u64,
}

impl Default for PlaywrightConfig {
    fn default() -> Self {
        Self {
            kind: Browser::Chromium,
            headless: true,
            viewport_width: 1280,
            viewport_height: 720,
            node_path: None,
            launch_timeout_ms: 60_000,
        }
    }
}

#[derive(Serialize)]
struct Request<'a> {
    id: u64,
    op: &'a str,
    #[serde(flatten)]
    args: Value,
}

#[derive(Debug, Deserialize)]
struct Response {
    #[serde(default)]
    id: Option<u64>,
    #[serde(default)]
    ready: bool,
    #[serde(default)]
    ok: bool,
    #[serde(default)]
    value: Value,
    #[serde(default)]
    kind: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

/// Playwright-backed [`Page`]
///
/// Generic over the driver's pipes; [`PlaywrightPage::launch`] connects it to
/// a spawned `node` process.
pub struct PlaywrightPage<W = ChildStdin, R = BufReader<ChildStdout>> {
    writer: W,
    reader: Lines<R>,
    next_id: u64,
    default_timeout: Duration,
    closed: bool,
    child: Option<Child>,

    // Holds driver.js on disk for as long as node runs.
    _script_dir: Option<tempfile::TempDir>,
}

impl PlaywrightPage {
    /// Start the driver and wait until its page is ready
    pub async fn launch(config: &PlaywrightConfig) -> E2eResult<Self> {
        Self::check_playwright_installed().await?;

        let script_dir = tempfile::tempdir()?;
        let script_path = script_dir.path().join("driver.js");
        std::fs::write(&script_path, DRIVER_JS)?;

        let opts = json!({
            "browser": config.kind.as_str(),
            "headless": config.headless,
            "width": config.viewport_width,
            "height": config.viewport_height,
        });

        let mut cmd = Command::new("node");
        cmd.arg(&script_path)
            .arg(opts.to_string())
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .kill_on_drop(true);

        if let Some(node_path) = resolve_node_path(config.node_path.as_deref()) {
            debug!("NODE_PATH={}", node_path.display());
            cmd.env("NODE_PATH", node_path);
        }

        info!(
            "Launching {} (headless: {}, viewport {}x{})",
            config.kind.as_str(),
            config.headless,
            config.viewport_width,
            config.viewport_height
        );

        let mut child = cmd.spawn().map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                E2eError::PlaywrightNotFound
            } else {
                E2eError::Bridge(format!("Failed to spawn node: {}", e))
            }
        })?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| E2eError::Bridge("driver stdin not captured".to_string()))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| E2eError::Bridge("driver stdout not captured".to_string()))?;

        let mut page = Self::from_streams(stdin, BufReader::new(stdout));
        page.child = Some(child);
        page._script_dir = Some(script_dir);

        let launch_timeout = Duration::from_millis(config.launch_timeout_ms);
        match timeout(launch_timeout, page.wait_ready()).await {
            Ok(result) => result?,
            Err(_) => {
                return Err(E2eError::Timeout(format!(
                    "browser launch ({} ms)",
                    config.launch_timeout_ms
                )))
            }
        }

        info!("Browser ready");
        Ok(page)
    }

    async fn check_playwright_installed() -> E2eResult<()> {
        let status = Command::new("npx")
            .args(["--no-install", "playwright", "--version"])
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .await;

        match status {
            Ok(status) if status.success() => Ok(()),
            _ => Err(E2eError::PlaywrightNotFound),
        }
    }
}

impl<W, R> PlaywrightPage<W, R>
where
    W: AsyncWrite + Unpin + Send,
    R: AsyncBufRead + Unpin + Send,
{
    /// Speak the driver protocol over already connected pipes
    pub fn from_streams(writer: W, reader: R) -> Self {
        Self {
            writer,
            reader: reader.lines(),
            next_id: 1,
            default_timeout: Duration::from_secs(30),
            closed: false,
            child: None,
            _script_dir: None,
        }
    }

    async fn wait_ready(&mut self) -> E2eResult<()> {
        loop {
            let response = self.read_response().await?;
            if response.ready {
                return Ok(());
            }
            if let Some(error) = response.error {
                return Err(E2eError::Playwright(error));
            }
        }
    }

    /// Read the next protocol line, skipping anything that is not JSON
    async fn read_response(&mut self) -> E2eResult<Response> {
        loop {
            let line = self
                .reader
                .next_line()
                .await?
                .ok_or_else(|| E2eError::Bridge("driver exited unexpectedly".to_string()))?;
            trace!("driver <- {}", line);

            match serde_json::from_str::<Response>(&line) {
                Ok(response) => return Ok(response),
                Err(_) => debug!("Ignoring non-protocol driver output: {}", line),
            }
        }
    }

    async fn request(&mut self, op: &str, args: Value) -> E2eResult<Value> {
        if self.closed {
            return Err(E2eError::Bridge(format!("{} after close", op)));
        }

        let id = self.next_id;
        self.next_id += 1;

        let line = serde_json::to_string(&Request { id, op, args })?;
        debug!("driver -> {} #{}", op, id);
        trace!("driver -> {}", line);

        self.writer.write_all(line.as_bytes()).await?;
        self.writer.write_all(b"\n").await?;
        self.writer.flush().await?;

        let wait = self.default_timeout + RESPONSE_GRACE;
        let response = timeout(wait, self.response_for(id))
            .await
            .map_err(|_| E2eError::Timeout(format!("driver response to {} #{}", op, id)))??;

        if response.ok {
            return Ok(response.value);
        }

        let message = response.error.unwrap_or_else(|| "unknown driver error".to_string());
        match response.kind.as_deref() {
            Some("timeout") => Err(E2eError::Timeout(message)),
            Some("protocol") => Err(E2eError::Bridge(message)),
            _ => Err(E2eError::Playwright(message)),
        }
    }

    async fn response_for(&mut self, id: u64) -> E2eResult<Response> {
        loop {
            let response = self.read_response().await?;
            match response.id {
                Some(got) if got == id => return Ok(response),
                Some(got) => warn!("Dropping stale driver response #{} (waiting for #{})", got, id),
                None if response.kind.as_deref() == Some("protocol") => {
                    return Err(E2eError::Bridge(
                        response.error.unwrap_or_else(|| "protocol error".to_string()),
                    ))
                }
                None => {}
            }
        }
    }
}

#[async_trait]
impl<W, R> Page for PlaywrightPage<W, R>
where
    W: AsyncWrite + Unpin + Send,
    R: AsyncBufRead + Unpin + Send,
{
    async fn set_default_timeout(&mut self, timeout: Duration) -> E2eResult<()> {
        self.request(
            "set_default_timeout",
            json!({ "timeout_ms": timeout.as_millis() as u64 }),
        )
        .await?;
        self.default_timeout = timeout;
        Ok(())
    }

    async fn goto(&mut self, url: &str) -> E2eResult<()> {
        self.request("goto", json!({ "url": url })).await?;
        Ok(())
    }

    async fn fill(&mut self, locator: &Locator, value: &str) -> E2eResult<()> {
        self.request("fill", json!({ "locator": locator, "value": value }))
            .await?;
        Ok(())
    }

    async fn click(&mut self, locator: &Locator) -> E2eResult<()> {
        self.request("click", json!({ "locator": locator })).await?;
        Ok(())
    }

    async fn select_option_by_label(&mut self, locator: &Locator, label: &str) -> E2eResult<()> {
        self.request("select_option", json!({ "locator": locator, "label": label }))
            .await?;
        Ok(())
    }

    async fn choose_files(&mut self, trigger: &Locator, files: &[PathBuf]) -> E2eResult<()> {
        let files: Vec<String> = files
            .iter()
            .map(|f| absolute(f).to_string_lossy().into_owned())
            .collect();
        self.request("choose_files", json!({ "trigger": trigger, "files": files }))
            .await?;
        Ok(())
    }

    async fn url(&mut self) -> E2eResult<String> {
        match self.request("url", json!({})).await? {
            Value::String(url) => Ok(url),
            other => Err(E2eError::Bridge(format!("url returned {}", other))),
        }
    }

    async fn expect_url(&mut self, pattern: &Regex) -> E2eResult<()> {
        self.request("expect_url", json!({ "pattern": pattern.as_str() }))
            .await?;
        Ok(())
    }

    async fn expect_visible(&mut self, locator: &Locator) -> E2eResult<()> {
        self.request("expect_visible", json!({ "locator": locator }))
            .await
            .map_err(|e| match e {
                E2eError::Timeout(msg) => {
                    E2eError::AssertionFailed(format!("{} is not visible: {}", locator, msg))
                }
                other => other,
            })?;
        Ok(())
    }

    async fn expect_hidden(&mut self, locator: &Locator) -> E2eResult<()> {
        self.request("expect_hidden", json!({ "locator": locator }))
            .await
            .map_err(|e| match e {
                E2eError::Timeout(msg) => {
                    E2eError::AssertionFailed(format!("{} is visible: {}", locator, msg))
                }
                other => other,
            })?;
        Ok(())
    }

    async fn screenshot(&mut self, locator: &Locator, path: &Path) -> E2eResult<()> {
        let path = absolute(path);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        self.request(
            "screenshot",
            json!({ "locator": locator, "path": path.to_string_lossy() }),
        )
        .await?;
        Ok(())
    }

    async fn close(&mut self) -> E2eResult<()> {
        if self.closed {
            return Ok(());
        }
        let result = self.request("close", json!({})).await;
        self.closed = true;

        if let Some(child) = self.child.as_mut() {
            match timeout(RESPONSE_GRACE, child.wait()).await {
                Ok(Ok(status)) => debug!("Driver exited with {}", status),
                Ok(Err(e)) => warn!("Failed waiting for driver: {}", e),
                Err(_) => {
                    warn!("Driver did not exit, killing it");
                    let _ = child.kill().await;
                }
            }
        }

        result.map(|_| ())
    }
}

/// Playwright resolves relative paths against the driver's temp dir, so
/// everything handed over is made absolute first.
fn absolute(path: &Path) -> PathBuf {
    if path.is_absolute() {
        return path.to_path_buf();
    }
    std::env::current_dir()
        .map(|cwd| cwd.join(path))
        .unwrap_or_else(|_| path.to_path_buf())
}

/// The driver lives in a temp dir, so `require('playwright')` only works
/// through `NODE_PATH`. Prefer the configured directory, then a
/// `node_modules` in the working directory.
fn resolve_node_path(configured: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = configured {
        return Some(absolute(path));
    }
    let local = absolute(Path::new("node_modules"));
    if local.is_dir() {
        Some(local)
    } else {
        std::env::var_os("NODE_PATH").map(PathBuf::from)
    }
}
