//! Named scenario steps and their execution policies

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

/// The eight steps of the dynamic fields scenario, in execution order
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepName {
    Authenticate,
    UploadTemplate,
    CreateDocumentType,
    CreateDocument,
    VerifyMetabox,
    FillFields,
    CaptureScreenshot,
    SaveAndVerify,
}

impl StepName {
    pub const ALL: [StepName; 8] = [
        StepName::Authenticate,
        StepName::UploadTemplate,
        StepName::CreateDocumentType,
        StepName::CreateDocument,
        StepName::VerifyMetabox,
        StepName::FillFields,
        StepName::CaptureScreenshot,
        StepName::SaveAndVerify,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            StepName::Authenticate => "authenticate",
            StepName::UploadTemplate => "upload_template",
            StepName::CreateDocumentType => "create_document_type",
            StepName::CreateDocument => "create_document",
            StepName::VerifyMetabox => "verify_metabox",
            StepName::FillFields => "fill_fields",
            StepName::CaptureScreenshot => "capture_screenshot",
            StepName::SaveAndVerify => "save_and_verify",
        }
    }

    pub fn from_key(key: &str) -> Option<StepName> {
        StepName::ALL.into_iter().find(|step| step.as_str() == key)
    }
}

impl fmt::Display for StepName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Timeout and retry budget for one step
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StepPolicy {
    /// Default timeout applied to every page action in the step
    pub timeout: Duration,

    /// Extra attempts after the first failure
    pub retries: u32,
}

/// Step policy configuration (`[steps]` table)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StepsConfig {
    pub default_timeout_ms: u64,
    pub default_retries: u32,
    /// Keyed by step identifier, e.g. `upload_template`
    pub overrides: BTreeMap<String, StepOverride>,
}

impl Default for StepsConfig {
    fn default() -> Self {
        Self {
            default_timeout_ms: 30_000,
            default_retries: 0,
            overrides: BTreeMap::new(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StepOverride {
    #[serde(default)]
    pub timeout_ms: Option<u64>,
    #[serde(default)]
    pub retries: Option<u32>,
}

impl StepsConfig {
    /// Resolve the effective policy for a step
    pub fn policy_for(&self, step: StepName) -> StepPolicy {
        let over = self.overrides.get(step.as_str());
        let timeout_ms = over
            .and_then(|o| o.timeout_ms)
            .unwrap_or(self.default_timeout_ms);
        let retries = over
            .and_then(|o| o.retries)
            .unwrap_or(self.default_retries);

        StepPolicy {
            timeout: Duration::from_millis(timeout_ms),
            retries,
        }
    }

    /// Override keys that do not name a step
    pub fn unknown_overrides(&self) -> Vec<&str> {
        self.overrides
            .keys()
            .filter(|key| StepName::from_key(key).is_none())
            .map(String::as_str)
            .collect()
    }
}

/// Result of executing a single step
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepResult {
    pub step_name: StepName,
    pub success: bool,
    pub attempts: u32,
    pub duration_ms: u64,
    pub error: Option<String>,
    pub screenshot_path: Option<PathBuf>,
}
