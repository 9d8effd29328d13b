//! Page automation interface
//!
//! The scenario only ever talks to a [`Page`]. The production implementation
//! is [`crate::playwright::PlaywrightPage`]; tests drive the scenario with
//! scripted in-memory pages.

use async_trait::async_trait;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::E2eResult;

/// How to find an element on the page
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "by", rename_all = "snake_case")]
pub enum Locator {
    /// Form control by its associated `<label>` text
    Label { text: String },

    /// Element by ARIA role and accessible name
    Role { role: String, name: String },

    /// Element by CSS selector
    Css { selector: String },
}

impl Locator {
    pub fn label(text: impl Into<String>) -> Self {
        Locator::Label { text: text.into() }
    }

    pub fn role(role: impl Into<String>, name: impl Into<String>) -> Self {
        Locator::Role {
            role: role.into(),
            name: name.into(),
        }
    }

    pub fn css(selector: impl Into<String>) -> Self {
        Locator::Css {
            selector: selector.into(),
        }
    }

    pub fn button(name: impl Into<String>) -> Self {
        Self::role("button", name)
    }

    pub fn link(name: impl Into<String>) -> Self {
        Self::role("link", name)
    }

    pub fn heading(name: impl Into<String>) -> Self {
        Self::role("heading", name)
    }
}

impl fmt::Display for Locator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Locator::Label { text } => write!(f, "label={:?}", text),
            Locator::Role { role, name } => write!(f, "role={}[name={:?}]", role, name),
            Locator::Css { selector } => write!(f, "css={}", selector),
        }
    }
}

/// A single browser tab driven for the duration of one run
#[async_trait]
pub trait Page: Send {
    /// Timeout applied to every subsequent action and expectation
    async fn set_default_timeout(&mut self, timeout: Duration) -> E2eResult<()>;

    async fn goto(&mut self, url: &str) -> E2eResult<()>;

    async fn fill(&mut self, locator: &Locator, value: &str) -> E2eResult<()>;

    async fn click(&mut self, locator: &Locator) -> E2eResult<()>;

    /// Choose a `<select>` option by its visible text
    async fn select_option_by_label(&mut self, locator: &Locator, label: &str) -> E2eResult<()>;

    /// Click `trigger`, wait for the file chooser it opens and hand it `files`
    async fn choose_files(&mut self, trigger: &Locator, files: &[PathBuf]) -> E2eResult<()>;

    async fn url(&mut self) -> E2eResult<String>;

    /// Wait until the page URL matches `pattern`
    async fn expect_url(&mut self, pattern: &Regex) -> E2eResult<()>;

    async fn expect_visible(&mut self, locator: &Locator) -> E2eResult<()>;

    /// Wait until no element matched by `locator` is visible
    async fn expect_hidden(&mut self, locator: &Locator) -> E2eResult<()>;

    /// Screenshot a single element, overwriting `path`
    async fn screenshot(&mut self, locator: &Locator, path: &Path) -> E2eResult<()>;

    async fn close(&mut self) -> E2eResult<()>;
}
