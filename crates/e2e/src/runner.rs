//! Runner that wires the probe, Playwright, the scenario and the visual check

use std::path::{Path, PathBuf};
use std::time::Instant;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};

use crate::config::E2eConfig;
use crate::error::{E2eError, E2eResult};
use crate::page::Page;
use crate::playwright::PlaywrightPage;
use crate::scenario::{DynamicFieldsScenario, ScenarioReport};
use crate::server::TargetProbe;
use crate::visual::{sha256_file, VisualDiff, VisualTester};

/// Facts about the screenshot the run produced
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScreenshotInfo {
    pub path: PathBuf,
    pub size_bytes: u64,
    pub sha256: String,
}

/// Everything written to `test-results.json`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunReport {
    pub started_at: DateTime<Utc>,
    pub base_url: String,
    pub success: bool,
    pub duration_ms: u64,
    pub scenario: ScenarioReport,
    pub screenshot: Option<ScreenshotInfo>,
    pub visual_diff: Option<VisualDiff>,
    pub error: Option<String>,
}

pub struct TestRunner {
    config: E2eConfig,
}

impl TestRunner {
    pub fn new(config: E2eConfig) -> Self {
        Self { config }
    }

    /// Full run against a real browser
    pub async fn run(&self) -> E2eResult<RunReport> {
        self.config.validate()?;

        if self.config.probe.enabled {
            TargetProbe::new(&self.config.base_url, &self.config.probe)?
                .wait_until_reachable()
                .await?;
        }

        let mut page = PlaywrightPage::launch(&self.config.browser).await?;
        let report = self.run_with_page(&mut page).await;

        if let Err(e) = page.close().await {
            warn!("Closing the browser failed: {}", e);
        }

        let report = report?;
        self.write_results(&report)?;
        Ok(report)
    }

    /// Run the scenario and post-checks on an already open page
    ///
    /// The page is left open; closing it is up to the caller.
    pub async fn run_with_page(&self, page: &mut dyn Page) -> E2eResult<RunReport> {
        let started_at = Utc::now();
        let start = Instant::now();

        info!("Running dynamic fields scenario against {}", self.config.base_url);
        let scenario = DynamicFieldsScenario::new(&self.config).run(page).await;

        let mut report = RunReport {
            started_at,
            base_url: self.config.base_url.clone(),
            success: scenario.success,
            duration_ms: 0,
            error: scenario.error.clone(),
            scenario,
            screenshot: None,
            visual_diff: None,
        };

        if report.success {
            if let Err(e) = self.post_checks(&mut report) {
                error!("✗ post-run check - {}", e);
                report.success = false;
                report.error = Some(e.to_string());
            }
        }

        report.duration_ms = start.elapsed().as_millis() as u64;
        info!(
            "Result: {} ({} ms)",
            if report.success { "passed" } else { "failed" },
            report.duration_ms
        );
        Ok(report)
    }

    fn post_checks(&self, report: &mut RunReport) -> E2eResult<()> {
        let path = report
            .scenario
            .screenshot_path
            .clone()
            .unwrap_or_else(|| self.config.screenshot_path.clone());

        let info = inspect_screenshot(&path)?;
        info!("Screenshot {} ({} bytes, sha256 {})", path.display(), info.size_bytes, info.sha256);
        report.screenshot = Some(info);

        if let Some(tester) = VisualTester::from_config(&self.config.visual)? {
            if let Some(diff) = tester.compare(&path)? {
                report.visual_diff = Some(diff.clone());
                diff.into_result(tester.threshold())?;
            }
        }
        Ok(())
    }

    /// Write the report to `<output_dir>/test-results.json`
    pub fn write_results(&self, report: &RunReport) -> E2eResult<PathBuf> {
        std::fs::create_dir_all(&self.config.output_dir)?;

        let path = self.config.output_dir.join("test-results.json");
        let json = serde_json::to_string_pretty(report)?;
        std::fs::write(&path, json)?;

        info!("Results written to: {}", path.display());
        Ok(path)
    }
}

/// The screenshot must exist and be non-empty
fn inspect_screenshot(path: &Path) -> E2eResult<ScreenshotInfo> {
    let meta = std::fs::metadata(path)
        .map_err(|e| E2eError::ScreenshotMissing(format!("{}: {}", path.display(), e)))?;
    if meta.len() == 0 {
        return Err(E2eError::ScreenshotMissing(format!("{} is empty", path.display())));
    }

    Ok(ScreenshotInfo {
        path: path.to_path_buf(),
        size_bytes: meta.len(),
        sha256: sha256_file(path)?,
    })
}
