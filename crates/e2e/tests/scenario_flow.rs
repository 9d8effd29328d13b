//! Scenario behaviour against a scripted in-memory page
//!
//! No browser involved: `ScriptedPage` records every page operation and
//! answers from a small script, so the ordering, data flow and failure
//! semantics of the scenario can be checked deterministically.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use image::{Rgba, RgbaImage};
use regex::Regex;

use resolate_e2e::steps::StepOverride;
use resolate_e2e::{
    DynamicFieldsScenario, E2eConfig, E2eError, E2eResult, Locator, Page, StepName, TestRunner,
};

const UPLOAD_REDIRECT: &str = "http://localhost:8889/wp-admin/post.php?post=42&action=edit";

struct ScriptedPage {
    calls: Vec<String>,
    url: String,
    upload_redirect: String,
    /// Call key -> how many more times it times out
    timeouts: HashMap<String, u32>,
    error_notice_visible: bool,
}

impl ScriptedPage {
    fn new() -> Self {
        Self {
            calls: Vec::new(),
            url: "about:blank".to_string(),
            upload_redirect: UPLOAD_REDIRECT.to_string(),
            timeouts: HashMap::new(),
            error_notice_visible: false,
        }
    }

    fn time_out(mut self, key: impl Into<String>, times: u32) -> Self {
        self.timeouts.insert(key.into(), times);
        self
    }

    fn record(&mut self, key: String) -> E2eResult<()> {
        self.calls.push(key.clone());
        match self.timeouts.get_mut(&key) {
            Some(remaining) if *remaining > 0 => {
                *remaining -= 1;
                Err(E2eError::Timeout(key))
            }
            _ => Ok(()),
        }
    }

    /// Calls without the per-attempt timeout bookkeeping
    fn actions(&self) -> Vec<String> {
        self.calls
            .iter()
            .filter(|c| !c.starts_with("timeout "))
            .cloned()
            .collect()
    }
}

#[async_trait]
impl Page for ScriptedPage {
    async fn set_default_timeout(&mut self, timeout: Duration) -> E2eResult<()> {
        self.record(format!("timeout {}", timeout.as_millis()))
    }

    async fn goto(&mut self, url: &str) -> E2eResult<()> {
        self.record(format!("goto {}", url))?;
        self.url = url.to_string();
        Ok(())
    }

    async fn fill(&mut self, locator: &Locator, value: &str) -> E2eResult<()> {
        self.record(format!("fill {} = {}", locator, value))
    }

    async fn click(&mut self, locator: &Locator) -> E2eResult<()> {
        self.record(format!("click {}", locator))
    }

    async fn select_option_by_label(&mut self, locator: &Locator, label: &str) -> E2eResult<()> {
        self.record(format!("select {} = {}", locator, label))
    }

    async fn choose_files(&mut self, trigger: &Locator, files: &[PathBuf]) -> E2eResult<()> {
        let names: Vec<String> = files.iter().map(|f| f.display().to_string()).collect();
        self.record(format!("choose_files {} <- {}", trigger, names.join(",")))?;
        self.url = self.upload_redirect.clone();
        Ok(())
    }

    async fn url(&mut self) -> E2eResult<String> {
        self.record("url".to_string())?;
        Ok(self.url.clone())
    }

    async fn expect_url(&mut self, pattern: &Regex) -> E2eResult<()> {
        self.record("expect_url".to_string())?;
        if pattern.is_match(&self.url) {
            Ok(())
        } else {
            Err(E2eError::Timeout(format!("url {} !~ {}", self.url, pattern)))
        }
    }

    async fn expect_visible(&mut self, locator: &Locator) -> E2eResult<()> {
        self.record(format!("expect_visible {}", locator))
    }

    async fn expect_hidden(&mut self, locator: &Locator) -> E2eResult<()> {
        self.record(format!("expect_hidden {}", locator))?;
        if self.error_notice_visible {
            return Err(E2eError::AssertionFailed(format!("{} is visible", locator)));
        }
        Ok(())
    }

    async fn screenshot(&mut self, locator: &Locator, path: &Path) -> E2eResult<()> {
        self.record(format!("screenshot {}", locator))?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        RgbaImage::from_pixel(16, 8, Rgba([240, 240, 240, 255])).save(path)?;
        Ok(())
    }

    async fn close(&mut self) -> E2eResult<()> {
        self.record("close".to_string())
    }
}

fn config_in(dir: &Path) -> E2eConfig {
    let fixture = dir.join("plantilla.odt");
    std::fs::write(&fixture, b"PK\x03\x04").unwrap();

    E2eConfig {
        fixture_path: fixture,
        screenshot_path: dir.join("shots").join("dynamic-fields.png"),
        output_dir: dir.join("results"),
        ..Default::default()
    }
}

#[tokio::test]
async fn full_run_issues_actions_in_order() {
    let dir = tempfile::tempdir().unwrap();
    let config = config_in(dir.path());
    let mut page = ScriptedPage::new();

    let report = DynamicFieldsScenario::new(&config).run(&mut page).await;
    assert!(report.success, "scenario failed: {:?}", report.error);
    assert_eq!(report.steps.len(), 8);
    assert_eq!(report.attachment_id.map(|id| id.to_string()).as_deref(), Some("42"));

    let fixture = config.fixture_path.display().to_string();
    let expected = vec![
        "goto http://localhost:8889/wp-login.php".to_string(),
        format!("fill {} = admin", Locator::label("Username or Email Address")),
        format!("fill {} = password", Locator::label("Password")),
        format!("click {}", Locator::button("Log In")),
        "goto http://localhost:8889/wp-admin/upload.php".to_string(),
        format!("choose_files {} <- {}", Locator::link("Add New"), fixture),
        "expect_url".to_string(),
        "url".to_string(),
        "goto http://localhost:8889/wp-admin/edit-tags.php?taxonomy=resolate_doc_type&post_type=resolate_doc".to_string(),
        format!("fill {} = Test ODT Type", Locator::label("Name")),
        format!("fill {} = 42", Locator::css("#resolate_type_template_id")),
        format!("click {}", Locator::button("Add New Document Type")),
        "goto http://localhost:8889/wp-admin/post-new.php?post_type=resolate_doc".to_string(),
        format!("fill {} = Test Document", Locator::label("Add title")),
        format!("select {} = Test ODT Type", Locator::label("Tipo de documento")),
        format!("click {}", Locator::button("Save Draft")),
        format!("expect_visible {}", Locator::heading("Campos del Documento (ODT)")),
        format!("fill {} = Jules Verne", Locator::label("Full name")),
        format!("fill {} = 123.45", Locator::label("amount")),
        format!("fill {} = 2025-12-31", Locator::label("due date")),
        format!("fill {} = These are some notes.", Locator::label("Optional notes")),
        format!("screenshot {}", Locator::css("#resolate_dynamic_fields")),
        format!("click {}", Locator::button("Save Draft")),
        format!("expect_hidden {}", Locator::css(".notice-error")),
    ];
    assert_eq!(page.actions(), expected);

    let shot = report.screenshot_path.unwrap();
    assert!(std::fs::metadata(&shot).unwrap().len() > 0);
}

#[tokio::test]
async fn every_step_sets_its_timeout_first() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = config_in(dir.path());
    config.steps.overrides.insert(
        "upload_template".to_string(),
        StepOverride {
            timeout_ms: Some(60_000),
            retries: None,
        },
    );
    let mut page = ScriptedPage::new();

    let report = DynamicFieldsScenario::new(&config).run(&mut page).await;
    assert!(report.success);

    let timeouts: Vec<&String> = page.calls.iter().filter(|c| c.starts_with("timeout ")).collect();
    assert_eq!(timeouts.len(), 8);
    assert_eq!(timeouts[1], "timeout 60000");
    assert!(timeouts.iter().enumerate().all(|(i, t)| i == 1 || *t == "timeout 30000"));

    let upload_goto = page
        .calls
        .iter()
        .position(|c| c.ends_with("/wp-admin/upload.php"))
        .unwrap();
    assert_eq!(page.calls[upload_goto - 1], "timeout 60000");
}

#[tokio::test]
async fn missing_metabox_stops_the_run() {
    let dir = tempfile::tempdir().unwrap();
    let config = config_in(dir.path());
    let heading = format!("expect_visible {}", Locator::heading("Campos del Documento (ODT)"));
    let mut page = ScriptedPage::new().time_out(heading.clone(), 1);

    let report = DynamicFieldsScenario::new(&config).run(&mut page).await;
    assert!(!report.success);
    assert_eq!(report.steps.len(), 5);
    assert_eq!(report.failed_step().unwrap().step_name, StepName::VerifyMetabox);

    // Nothing after the failing expectation ran.
    assert_eq!(page.actions().last(), Some(&heading));
    assert!(report.screenshot_path.is_none());

    match report.into_result() {
        Err(E2eError::StepFailed { step, .. }) => assert_eq!(step, "verify_metabox"),
        other => panic!("expected StepFailed, got {:?}", other),
    }
}

#[tokio::test]
async fn retry_budget_absorbs_a_transient_timeout() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = config_in(dir.path());
    config.steps.overrides.insert(
        "verify_metabox".to_string(),
        StepOverride {
            timeout_ms: None,
            retries: Some(1),
        },
    );
    let heading = format!("expect_visible {}", Locator::heading("Campos del Documento (ODT)"));
    let mut page = ScriptedPage::new().time_out(heading.clone(), 1);

    let report = DynamicFieldsScenario::new(&config).run(&mut page).await;
    assert!(report.success, "scenario failed: {:?}", report.error);

    let verify = &report.steps[4];
    assert_eq!(verify.step_name, StepName::VerifyMetabox);
    assert_eq!(verify.attempts, 2);
    assert_eq!(page.actions().iter().filter(|c| **c == heading).count(), 2);
}

#[tokio::test]
async fn unexpected_upload_url_is_a_typed_error_and_not_retried() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = config_in(dir.path());
    config.steps.default_retries = 3;
    let mut page = ScriptedPage::new();
    page.upload_redirect =
        "http://localhost:8889/wp-admin/post.php?post=99999999999999999999999&action=edit"
            .to_string();

    let report = DynamicFieldsScenario::new(&config).run(&mut page).await;
    assert!(!report.success);

    let failed = report.failed_step().unwrap();
    assert_eq!(failed.step_name, StepName::UploadTemplate);
    assert_eq!(failed.attempts, 1);
    assert!(failed.error.as_deref().unwrap().contains("Unexpected URL shape"));
    assert!(report.attachment_id.is_none());
}

#[tokio::test]
async fn visible_error_notice_fails_the_final_step() {
    let dir = tempfile::tempdir().unwrap();
    let config = config_in(dir.path());
    let mut page = ScriptedPage::new();
    page.error_notice_visible = true;

    let report = DynamicFieldsScenario::new(&config).run(&mut page).await;
    assert!(!report.success);
    assert_eq!(report.steps.len(), 8);
    assert_eq!(report.failed_step().unwrap().step_name, StepName::SaveAndVerify);
    // The screenshot was still taken before the re-save.
    assert!(report.screenshot_path.is_some());
}

#[tokio::test]
async fn runner_checks_screenshot_and_writes_results() {
    let dir = tempfile::tempdir().unwrap();
    let config = config_in(dir.path());
    let runner = TestRunner::new(config.clone());

    let mut page = ScriptedPage::new();
    let report = runner.run_with_page(&mut page).await.unwrap();
    assert!(report.success, "run failed: {:?}", report.error);

    let shot = report.screenshot.clone().unwrap();
    assert_eq!(shot.path, config.screenshot_path);
    assert_eq!(shot.size_bytes, std::fs::metadata(&shot.path).unwrap().len());
    assert_eq!(shot.sha256, resolate_e2e::visual::sha256_file(&shot.path).unwrap());

    let path = runner.write_results(&report).unwrap();
    let json: serde_json::Value = serde_json::from_str(&std::fs::read_to_string(path).unwrap()).unwrap();
    assert_eq!(json["success"], true);
    assert_eq!(json["scenario"]["attachment_id"], 42);
    assert_eq!(json["scenario"]["steps"].as_array().unwrap().len(), 8);
    assert_eq!(json["screenshot"]["sha256"], shot.sha256.as_str());
}

#[tokio::test]
async fn runner_creates_visual_baseline_on_request() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = config_in(dir.path());
    config.visual.baseline_dir = Some(dir.path().join("baselines"));
    config.visual.diff_dir = dir.path().join("diffs");
    config.visual.update_baseline = true;

    let runner = TestRunner::new(config);
    let mut page = ScriptedPage::new();
    let report = runner.run_with_page(&mut page).await.unwrap();

    assert!(report.success, "run failed: {:?}", report.error);
    assert!(report.visual_diff.unwrap().baseline_created);
    assert!(dir.path().join("baselines").join("dynamic-fields.png").exists());
}

#[tokio::test]
async fn failed_scenario_skips_post_checks() {
    let dir = tempfile::tempdir().unwrap();
    let config = config_in(dir.path());
    let runner = TestRunner::new(config);

    let login = format!("click {}", Locator::button("Log In"));
    let mut page = ScriptedPage::new().time_out(login, 1);
    let report = runner.run_with_page(&mut page).await.unwrap();

    assert!(!report.success);
    assert!(report.screenshot.is_none());
    assert_eq!(report.scenario.steps.len(), 1);
}
