//! The dynamic fields verification scenario
//!
//! Logs in, uploads the template, creates a document type bound to it,
//! creates a draft of that type and checks that the plugin renders and
//! accepts its dynamic fields metabox. Steps run strictly in order; the
//! first step that fails (after its retries) ends the run.

use std::path::PathBuf;
use std::time::Instant;

use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};

use crate::attachment::AttachmentId;
use crate::config::E2eConfig;
use crate::error::{E2eError, E2eResult};
use crate::page::{Locator, Page};
use crate::steps::{StepName, StepPolicy, StepResult};

const LOGIN_USER_LABEL: &str = "Username or Email Address";
const LOGIN_PASSWORD_LABEL: &str = "Password";
const LOGIN_BUTTON: &str = "Log In";
const ADD_MEDIA_LINK: &str = "Add New";
const TERM_NAME_LABEL: &str = "Name";
const TEMPLATE_ID_SELECTOR: &str = "#resolate_type_template_id";
const ADD_DOC_TYPE_BUTTON: &str = "Add New Document Type";
const TITLE_LABEL: &str = "Add title";
const DOC_TYPE_SELECT_LABEL: &str = "Tipo de documento";
const SAVE_DRAFT_BUTTON: &str = "Save Draft";
const METABOX_SELECTOR: &str = "#resolate_dynamic_fields";
const ERROR_NOTICE_SELECTOR: &str = ".notice-error";

/// Outcome of one scenario run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScenarioReport {
    pub success: bool,
    pub duration_ms: u64,
    pub steps: Vec<StepResult>,
    pub attachment_id: Option<AttachmentId>,
    pub screenshot_path: Option<PathBuf>,
    pub error: Option<String>,
}

impl ScenarioReport {
    pub fn failed_step(&self) -> Option<&StepResult> {
        self.steps.iter().find(|s| !s.success)
    }

    /// Turn a failed report into [`E2eError::StepFailed`]
    pub fn into_result(self) -> E2eResult<Self> {
        if self.success {
            return Ok(self);
        }
        let (step, reason) = match self.failed_step() {
            Some(failed) => (
                failed.step_name.to_string(),
                failed.error.clone().unwrap_or_default(),
            ),
            None => (
                "scenario".to_string(),
                self.error.clone().unwrap_or_default(),
            ),
        };
        Err(E2eError::StepFailed { step, reason })
    }
}

/// Values produced by one step and consumed by a later one
#[derive(Debug, Default)]
struct ScenarioState {
    attachment_id: Option<AttachmentId>,
    screenshot_path: Option<PathBuf>,
}

pub struct DynamicFieldsScenario<'a> {
    config: &'a E2eConfig,
}

impl<'a> DynamicFieldsScenario<'a> {
    pub fn new(config: &'a E2eConfig) -> Self {
        Self { config }
    }

    /// Run every step against `page`, stopping at the first failure
    pub async fn run(&self, page: &mut dyn Page) -> ScenarioReport {
        let start = Instant::now();
        let mut state = ScenarioState::default();
        let mut steps = Vec::with_capacity(StepName::ALL.len());
        let mut failure = None;

        for step in StepName::ALL {
            let policy = self.config.steps.policy_for(step);
            let result = self.run_step(step, policy, page, &mut state).await;

            if result.success {
                info!("✓ {} ({} ms)", step, result.duration_ms);
                steps.push(result);
            } else {
                error!(
                    "✗ {} - {}",
                    step,
                    result.error.as_deref().unwrap_or("unknown error")
                );
                failure = result.error.clone();
                steps.push(result);
                break;
            }
        }

        ScenarioReport {
            success: failure.is_none(),
            duration_ms: start.elapsed().as_millis() as u64,
            steps,
            attachment_id: state.attachment_id,
            screenshot_path: state.screenshot_path,
            error: failure,
        }
    }

    async fn run_step(
        &self,
        step: StepName,
        policy: StepPolicy,
        page: &mut dyn Page,
        state: &mut ScenarioState,
    ) -> StepResult {
        let start = Instant::now();
        let mut attempts = 0;

        let outcome = loop {
            attempts += 1;
            debug!("Step {} attempt {} (timeout {:?})", step, attempts, policy.timeout);

            match self.attempt(step, policy, page, state).await {
                Ok(()) => break Ok(()),
                Err(e) if e.is_retryable() && attempts <= policy.retries => {
                    warn!("{} failed on attempt {}: {} - retrying", step, attempts, e);
                }
                Err(e) => break Err(e),
            }
        };

        StepResult {
            step_name: step,
            success: outcome.is_ok(),
            attempts,
            duration_ms: start.elapsed().as_millis() as u64,
            error: outcome.err().map(|e| e.to_string()),
            screenshot_path: match step {
                StepName::CaptureScreenshot => state.screenshot_path.clone(),
                _ => None,
            },
        }
    }

    async fn attempt(
        &self,
        step: StepName,
        policy: StepPolicy,
        page: &mut dyn Page,
        state: &mut ScenarioState,
    ) -> E2eResult<()> {
        page.set_default_timeout(policy.timeout).await?;

        match step {
            StepName::Authenticate => self.authenticate(page).await,
            StepName::UploadTemplate => {
                state.attachment_id = Some(self.upload_template(page).await?);
                Ok(())
            }
            StepName::CreateDocumentType => {
                let id = state.attachment_id.ok_or_else(|| {
                    E2eError::Config("document type needs an uploaded template".to_string())
                })?;
                self.create_document_type(page, id).await
            }
            StepName::CreateDocument => self.create_document(page).await,
            StepName::VerifyMetabox => self.verify_metabox(page).await,
            StepName::FillFields => self.fill_fields(page).await,
            StepName::CaptureScreenshot => {
                state.screenshot_path = Some(self.capture_screenshot(page).await?);
                Ok(())
            }
            StepName::SaveAndVerify => self.save_and_verify(page).await,
        }
    }

    // Login success is not asserted here; a failed login shows up as a
    // missing element in the next step.
    async fn authenticate(&self, page: &mut dyn Page) -> E2eResult<()> {
        let creds = &self.config.credentials;
        page.goto(&self.config.login_url()).await?;
        page.fill(&Locator::label(LOGIN_USER_LABEL), &creds.username).await?;
        page.fill(&Locator::label(LOGIN_PASSWORD_LABEL), &creds.password).await?;
        page.click(&Locator::button(LOGIN_BUTTON)).await
    }

    async fn upload_template(&self, page: &mut dyn Page) -> E2eResult<AttachmentId> {
        page.goto(&self.config.media_library_url()).await?;
        page.choose_files(
            &Locator::link(ADD_MEDIA_LINK),
            &[self.config.fixture_path.clone()],
        )
        .await?;

        page.expect_url(&AttachmentId::edit_url_regex()?).await?;
        let url = page.url().await?;
        let id = AttachmentId::from_edit_url(&url)?;
        info!("Uploaded {} as attachment {}", self.config.fixture_path.display(), id);
        Ok(id)
    }

    async fn create_document_type(&self, page: &mut dyn Page, template: AttachmentId) -> E2eResult<()> {
        page.goto(&self.config.new_document_type_url()).await?;
        page.fill(&Locator::label(TERM_NAME_LABEL), &self.config.document.type_name)
            .await?;
        page.fill(&Locator::css(TEMPLATE_ID_SELECTOR), &template.to_string())
            .await?;
        page.click(&Locator::button(ADD_DOC_TYPE_BUTTON)).await
    }

    async fn create_document(&self, page: &mut dyn Page) -> E2eResult<()> {
        let doc = &self.config.document;
        page.goto(&self.config.new_document_url()).await?;
        page.fill(&Locator::label(TITLE_LABEL), &doc.title).await?;
        page.select_option_by_label(&Locator::label(DOC_TYPE_SELECT_LABEL), &doc.type_name)
            .await?;
        page.click(&Locator::button(SAVE_DRAFT_BUTTON)).await
    }

    async fn verify_metabox(&self, page: &mut dyn Page) -> E2eResult<()> {
        page.expect_visible(&Locator::heading(&self.config.document.metabox_heading))
            .await
    }

    async fn fill_fields(&self, page: &mut dyn Page) -> E2eResult<()> {
        for field in &self.config.document.fields {
            page.fill(&Locator::label(&field.label), &field.value).await?;
        }
        Ok(())
    }

    async fn capture_screenshot(&self, page: &mut dyn Page) -> E2eResult<PathBuf> {
        let path = self.config.screenshot_path.clone();
        page.screenshot(&Locator::css(METABOX_SELECTOR), &path).await?;
        info!("Metabox screenshot saved to {}", path.display());
        Ok(path)
    }

    async fn save_and_verify(&self, page: &mut dyn Page) -> E2eResult<()> {
        page.click(&Locator::button(SAVE_DRAFT_BUTTON)).await?;
        page.expect_hidden(&Locator::css(ERROR_NOTICE_SELECTOR)).await
    }
}
