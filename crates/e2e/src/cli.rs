//! Command line of the `e2e` harness binary
//!
//! The binary is a `harness = false` test, so cargo hands it whatever libtest
//! flags the user passed to `cargo test -- ...`. Those are accepted and
//! ignored here; only the harness's own flags affect the run.

use std::path::PathBuf;

use clap::{Args, Parser};

use crate::config::E2eConfig;
use crate::error::E2eResult;
use crate::playwright::Browser;

#[derive(Parser, Debug)]
#[command(name = "resolate-e2e")]
#[command(about = "E2E verification of the Resolate dynamic fields metabox")]
pub struct HarnessArgs {
    /// Actually drive the browser (otherwise the harness skips)
    #[arg(long, env = "RESOLATE_E2E")]
    pub run: bool,

    /// TOML configuration file (defaults apply when missing)
    #[arg(short, long, env = "RESOLATE_E2E_CONFIG", default_value = "e2e.toml")]
    pub config: PathBuf,

    /// WordPress root URL
    #[arg(long, env = "RESOLATE_E2E_BASE_URL")]
    pub base_url: Option<String>,

    #[arg(long, env = "RESOLATE_E2E_USERNAME")]
    pub username: Option<String>,

    #[arg(long, env = "RESOLATE_E2E_PASSWORD", hide_env_values = true)]
    pub password: Option<String>,

    /// Template document to upload
    #[arg(long, env = "RESOLATE_E2E_FIXTURE")]
    pub fixture: Option<PathBuf>,

    /// Where to write the metabox screenshot
    #[arg(long, env = "RESOLATE_E2E_SCREENSHOT")]
    pub screenshot: Option<PathBuf>,

    /// Output directory for results
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Browser to use (chromium, firefox, webkit)
    #[arg(long)]
    pub browser: Option<String>,

    /// Show the browser window
    #[arg(long)]
    pub headed: bool,

    /// Do not probe the target before launching the browser
    #[arg(long)]
    pub skip_probe: bool,

    /// Compare the screenshot against baselines in this directory
    #[arg(long)]
    pub baseline_dir: Option<PathBuf>,

    /// Overwrite the baseline with this run's screenshot
    #[arg(long)]
    pub update_baseline: bool,

    #[command(flatten)]
    pub libtest: LibtestArgs,
}

/// Flags cargo forwards to every test binary
#[derive(Args, Debug, Default)]
pub struct LibtestArgs {
    #[arg(hide = true)]
    pub filters: Vec<String>,
    #[arg(long, hide = true)]
    pub list: bool,
    #[arg(long, hide = true)]
    pub exact: bool,
    #[arg(long, hide = true)]
    pub ignored: bool,
    #[arg(long, hide = true)]
    pub include_ignored: bool,
    #[arg(long, hide = true)]
    pub nocapture: bool,
    #[arg(long, hide = true)]
    pub show_output: bool,
    #[arg(short, long, hide = true)]
    pub quiet: bool,
    #[arg(long, hide = true)]
    pub test_threads: Option<usize>,
    #[arg(long, hide = true)]
    pub format: Option<String>,
    #[arg(long, hide = true)]
    pub color: Option<String>,
    #[arg(long, hide = true)]
    pub skip: Vec<String>,
}

impl HarnessArgs {
    /// Whether this invocation should drive a browser
    ///
    /// `--list` and `--ignored` never run the live scenario; neither lists
    /// nor ignored-only runs include it.
    pub fn should_run(&self) -> bool {
        self.run && !self.libtest.list && !self.libtest.ignored
    }

    /// Apply command line and environment values on top of the file config
    pub fn apply_to(&self, config: &mut E2eConfig) -> E2eResult<()> {
        if let Some(base_url) = &self.base_url {
            config.base_url = base_url.clone();
        }
        if let Some(username) = &self.username {
            config.credentials.username = username.clone();
        }
        if let Some(password) = &self.password {
            config.credentials.password = password.clone();
        }
        if let Some(fixture) = &self.fixture {
            config.fixture_path = fixture.clone();
        }
        if let Some(screenshot) = &self.screenshot {
            config.screenshot_path = screenshot.clone();
        }
        if let Some(output) = &self.output {
            config.output_dir = output.clone();
        }
        if let Some(browser) = &self.browser {
            config.browser.kind = Browser::parse(browser)?;
        }
        if self.headed {
            config.browser.headless = false;
        }
        if self.skip_probe {
            config.probe.enabled = false;
        }
        if let Some(dir) = &self.baseline_dir {
            config.visual.baseline_dir = Some(dir.clone());
        }
        if self.update_baseline {
            config.visual.update_baseline = true;
        }
        Ok(())
    }
}
