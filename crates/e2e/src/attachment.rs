//! Attachment identifiers read back from the WordPress edit screen URL

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{E2eError, E2eResult};

/// Shape of the URL WordPress redirects to after a media upload
pub const EDIT_URL_PATTERN: &str = r"post\.php\?post=(\d+)&action=edit";

/// Numeric ID of an uploaded media attachment
///
/// Held as a number, so `post=000123` becomes `123`. WordPress reads the
/// template ID with `intval`, which treats both the same.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AttachmentId(u64);

impl AttachmentId {
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    /// Regex matching `post.php?post=<digits>&action=edit`
    pub fn edit_url_regex() -> E2eResult<Regex> {
        Ok(Regex::new(EDIT_URL_PATTERN)?)
    }

    /// Extract the attachment ID from an attachment edit URL
    pub fn from_edit_url(url: &str) -> E2eResult<Self> {
        let shape_err = || E2eError::UnexpectedUrlShape {
            url: url.to_string(),
        };

        let captures = Self::edit_url_regex()?.captures(url).ok_or_else(shape_err)?;
        let digits = captures.get(1).ok_or_else(shape_err)?.as_str();
        // Overflowing u64 is as much a shape problem as a missing marker.
        digits.parse::<u64>().map(Self).map_err(|_| shape_err())
    }
}

impl fmt::Display for AttachmentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
