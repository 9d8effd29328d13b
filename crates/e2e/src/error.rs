//! Error types for the E2E harness

use thiserror::Error;

#[derive(Error, Debug)]
pub enum E2eError {
    #[error("Playwright not found. Install with: npm install playwright && npx playwright install")]
    PlaywrightNotFound,

    #[error("Playwright error: {0}")]
    Playwright(String),

    #[error("Driver bridge error: {0}")]
    Bridge(String),

    #[error("Timeout waiting for: {0}")]
    Timeout(String),

    #[error("Assertion failed: {0}")]
    AssertionFailed(String),

    #[error("Unexpected URL shape (expected post.php?post=<id>&action=edit): {url}")]
    UnexpectedUrlShape { url: String },

    #[error("Step failed: {step} - {reason}")]
    StepFailed { step: String, reason: String },

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Target health check failed after {0} attempts")]
    ServerHealthCheck(usize),

    #[error("Screenshot missing or empty: {0}")]
    ScreenshotMissing(String),

    #[error("Screenshot mismatch: {name} differs by {diff_percent:.2}% (threshold: {threshold:.2}%)")]
    ScreenshotMismatch {
        name: String,
        diff_percent: f64,
        threshold: f64,
    },

    #[error("Visual regression: {0}")]
    VisualRegression(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),

    #[error("Regex error: {0}")]
    Regex(#[from] regex::Error),
}

impl E2eError {
    /// Whether re-running the same step could plausibly succeed.
    ///
    /// Configuration and URL-shape errors are deterministic; bridge failures
    /// mean the browser is gone.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            E2eError::Timeout(_) | E2eError::Playwright(_) | E2eError::AssertionFailed(_)
        )
    }
}

pub type E2eResult<T> = Result<T, E2eError>;
