//! Harness configuration
//!
//! Every value the verification run needs (target URL, credentials, fixture
//! and screenshot paths, document data, step policies) lives here instead of
//! being baked into the scenario. All fields have defaults, so an empty or
//! missing TOML file reproduces the stock scenario against
//! `http://localhost:8889`.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

use crate::error::{E2eError, E2eResult};
use crate::playwright::PlaywrightConfig;
use crate::server::ProbeConfig;
use crate::steps::StepsConfig;
use crate::visual::VisualConfig;

/// Taxonomy holding Resolate document types
pub const DOC_TYPE_TAXONOMY: &str = "resolate_doc_type";

/// Custom post type for Resolate documents
pub const DOC_POST_TYPE: &str = "resolate_doc";

/// Top-level harness configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct E2eConfig {
    /// Root URL of the WordPress instance under test
    pub base_url: String,

    /// Template document uploaded to the media library
    pub fixture_path: PathBuf,

    /// Where the metabox screenshot is written (overwritten each run)
    pub screenshot_path: PathBuf,

    /// Directory for `test-results.json`
    pub output_dir: PathBuf,

    pub credentials: Credentials,
    pub browser: PlaywrightConfig,
    pub document: DocumentConfig,
    pub steps: StepsConfig,
    pub probe: ProbeConfig,
    pub visual: VisualConfig,
}

impl Default for E2eConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8889".to_string(),
            fixture_path: PathBuf::from("fixtures/plantilla.odt"),
            screenshot_path: PathBuf::from("test-results/dynamic-fields.png"),
            output_dir: PathBuf::from("test-results"),
            credentials: Credentials::default(),
            browser: PlaywrightConfig::default(),
            document: DocumentConfig::default(),
            steps: StepsConfig::default(),
            probe: ProbeConfig::default(),
            visual: VisualConfig::default(),
        }
    }
}

/// WordPress login
#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl Default for Credentials {
    fn default() -> Self {
        Self {
            username: "admin".to_string(),
            password: "password".to_string(),
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Data entered into the document-type and document screens
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DocumentConfig {
    /// Name of the document-type term to create
    pub type_name: String,

    /// Title of the draft document
    pub title: String,

    /// Heading of the dynamic fields metabox
    pub metabox_heading: String,

    /// Labeled dynamic fields and the values typed into them, in order
    pub fields: Vec<FieldValue>,
}

impl Default for DocumentConfig {
    fn default() -> Self {
        Self {
            type_name: "Test ODT Type".to_string(),
            title: "Test Document".to_string(),
            metabox_heading: "Campos del Documento (ODT)".to_string(),
            fields: vec![
                FieldValue::new("Full name", "Jules Verne"),
                FieldValue::new("amount", "123.45"),
                FieldValue::new("due date", "2025-12-31"),
                FieldValue::new("Optional notes", "These are some notes."),
            ],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldValue {
    pub label: String,
    pub value: String,
}

impl FieldValue {
    pub fn new(label: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            value: value.into(),
        }
    }
}

impl E2eConfig {
    /// Load configuration from file, falling back to defaults when absent
    pub fn load(path: &Path) -> E2eResult<Self> {
        if path.exists() {
            let content = std::fs::read_to_string(path)?;
            Self::from_toml(&content)
        } else {
            Ok(Self::default())
        }
    }

    pub fn from_toml(content: &str) -> E2eResult<Self> {
        Ok(toml::from_str(content)?)
    }

    /// Reject configurations the scenario cannot possibly pass with
    pub fn validate(&self) -> E2eResult<()> {
        let base = self.base_url.trim();
        if base.is_empty() {
            return Err(E2eError::Config("base_url is empty".to_string()));
        }
        if !(base.starts_with("http://") || base.starts_with("https://")) {
            return Err(E2eError::Config(format!(
                "base_url must be an http(s) URL: {}",
                base
            )));
        }
        if self.credentials.username.is_empty() {
            return Err(E2eError::Config("credentials.username is empty".to_string()));
        }
        if !self.fixture_path.is_file() {
            return Err(E2eError::Config(format!(
                "fixture not found: {}",
                self.fixture_path.display()
            )));
        }
        if self.document.type_name.trim().is_empty() {
            return Err(E2eError::Config("document.type_name is empty".to_string()));
        }
        if let Some(key) = self.steps.unknown_overrides().first() {
            return Err(E2eError::Config(format!("unknown step in [steps.overrides]: {}", key)));
        }
        if self.document.fields.is_empty() {
            return Err(E2eError::Config("document.fields is empty".to_string()));
        }
        if let Some(field) = self.document.fields.iter().find(|f| f.label.trim().is_empty()) {
            return Err(E2eError::Config(format!(
                "document field with value {:?} has an empty label",
                field.value
            )));
        }
        Ok(())
    }

    pub fn login_url(&self) -> String {
        self.url("/wp-login.php")
    }

    pub fn media_library_url(&self) -> String {
        self.url("/wp-admin/upload.php")
    }

    pub fn new_document_type_url(&self) -> String {
        self.url(&format!(
            "/wp-admin/edit-tags.php?taxonomy={}&post_type={}",
            DOC_TYPE_TAXONOMY, DOC_POST_TYPE
        ))
    }

    pub fn new_document_url(&self) -> String {
        self.url(&format!("/wp-admin/post-new.php?post_type={}", DOC_POST_TYPE))
    }

    fn url(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.base_url.trim().trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }
}
