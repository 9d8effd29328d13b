//! Target server reachability
//!
//! The WordPress instance is expected to be running already; the harness
//! never starts it. Probing first turns "nothing is listening" into a clear
//! error instead of a browser navigation timeout in the login step.

use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use tokio::time::sleep;
use tracing::{info, warn};

use crate::error::{E2eError, E2eResult};

const POLL_INTERVAL: Duration = Duration::from_millis(250);

/// Probe configuration (`[probe]` table)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProbeConfig {
    pub enabled: bool,

    /// Path requested on the target, relative to the base URL
    pub path: String,

    /// Overall time budget for the probe
    pub timeout_ms: u64,
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            path: "/wp-login.php".to_string(),
            timeout_ms: 30_000,
        }
    }
}

/// Polls the target until it answers
pub struct TargetProbe {
    url: String,
    timeout: Duration,
    client: reqwest::Client,
}

impl TargetProbe {
    pub fn new(base_url: &str, config: &ProbeConfig) -> E2eResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(2))
            .build()?;

        Ok(Self {
            url: probe_url(base_url, &config.path),
            timeout: Duration::from_millis(config.timeout_ms),
            client,
        })
    }

    /// Wait until the target answers with anything but a 5xx
    pub async fn wait_until_reachable(&self) -> E2eResult<()> {
        let start = Instant::now();
        let mut attempts = 0;

        loop {
            attempts += 1;

            match self.client.get(&self.url).send().await {
                Ok(resp) if !resp.status().is_server_error() => {
                    info!("Target reachable at {} ({})", self.url, resp.status());
                    return Ok(());
                }
                Ok(resp) => {
                    warn!("Probe of {} returned {}", self.url, resp.status());
                }
                Err(e) => {
                    if attempts == 1 {
                        info!("Waiting for {} ...", self.url);
                    }
                    // Connection refused is expected while the stack boots.
                    if !e.is_connect() {
                        warn!("Probe error: {}", e);
                    }
                }
            }

            if start.elapsed() >= self.timeout {
                return Err(E2eError::ServerHealthCheck(attempts));
            }
            sleep(POLL_INTERVAL).await;
        }
    }
}

fn probe_url(base_url: &str, path: &str) -> String {
    format!(
        "{}/{}",
        base_url.trim().trim_end_matches('/'),
        path.trim_start_matches('/')
    )
}
