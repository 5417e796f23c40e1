//! View state read by the presentation layer.

use crate::error::Result;
use crate::image::{DataUrl, UploadedImage};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Shown while a request is in flight.
pub const LOADING_LABEL: &str = "Generating...";

/// Placeholder for the original panel before any upload.
pub const ORIGINAL_PLACEHOLDER: &str = "Upload an image to see it here";

/// Placeholder for the result panel before any edit.
pub const RESULT_PLACEHOLDER: &str = "Your edited image will appear here";

/// Lifecycle of the current submission.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubmissionStatus {
    /// Nothing submitted since the last upload.
    #[default]
    Idle,
    /// A request is being processed.
    InFlight,
    /// The last request returned an image.
    Succeeded,
    /// The last submission failed (validation, intake or service).
    Failed,
}

impl SubmissionStatus {
    /// Returns true while a request is outstanding.
    pub fn is_in_flight(&self) -> bool {
        matches!(self, Self::InFlight)
    }
}

impl fmt::Display for SubmissionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Idle => write!(f, "idle"),
            Self::InFlight => write!(f, "in flight"),
            Self::Succeeded => write!(f, "succeeded"),
            Self::Failed => write!(f, "failed"),
        }
    }
}

/// Everything the presentation layer needs to draw the editor.
///
/// Owned by [`SubmissionController`](crate::SubmissionController); callers get
/// clones through `snapshot()`.
#[derive(Debug, Clone, Default)]
pub struct ViewState {
    /// Currently uploaded image.
    pub original: Option<Arc<UploadedImage>>,
    /// Editing instruction as typed.
    pub prompt: String,
    /// Submission status.
    pub status: SubmissionStatus,
    /// Edited image, as a displayable data URL.
    pub result: Option<DataUrl>,
    /// Message of the last failure.
    pub error: Option<String>,
    /// Bumped on every accepted upload so late results can be recognised.
    pub(crate) generation: u64,
}

/// What a single image panel shows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Panel<'a> {
    /// Nothing to show yet.
    Placeholder(&'static str),
    /// Waiting on the service.
    Loading,
    /// An image to display.
    Image(&'a DataUrl),
    /// An error message in place of the image.
    Error(&'a str),
}

impl ViewState {
    /// Returns true if the submit trigger should be enabled.
    pub fn can_submit(&self) -> bool {
        !self.status.is_in_flight()
    }

    /// Returns the left-hand panel.
    pub fn original_panel(&self) -> Panel<'_> {
        match self.original.as_deref() {
            Some(image) => Panel::Image(&image.encoded_preview),
            None => Panel::Placeholder(ORIGINAL_PLACEHOLDER),
        }
    }

    /// Returns the right-hand panel. Error and result never show together.
    pub fn result_panel(&self) -> Panel<'_> {
        if self.status.is_in_flight() {
            return Panel::Loading;
        }
        if let Some(ref error) = self.error {
            return Panel::Error(error);
        }
        match self.result {
            Some(ref url) => Panel::Image(url),
            None => Panel::Placeholder(RESULT_PLACEHOLDER),
        }
    }

    /// Decodes the edited image, if there is one.
    pub fn result_bytes(&self) -> Result<Option<Vec<u8>>> {
        self.result.as_ref().map(DataUrl::decode).transpose()
    }
}

impl fmt::Display for Panel<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Placeholder(text) => write!(f, "{text}"),
            Self::Loading => write!(f, "{LOADING_LABEL}"),
            Self::Image(url) => write!(
                f,
                "[{} image, {} base64 chars]",
                url.mime_type(),
                url.payload().len()
            ),
            Self::Error(message) => write!(f, "error: {message}"),
        }
    }
}

/// Renders the state as plain text, one line per panel.
pub fn render(state: &ViewState) -> String {
    let file = state
        .original
        .as_deref()
        .map(|img| format!(" ({})", img.file_name))
        .unwrap_or_default();

    format!(
        "Original{}: {}\nPrompt: {}\nStatus: {}\nEdited: {}",
        file,
        state.original_panel(),
        if state.prompt.is_empty() {
            "-"
        } else {
            state.prompt.as_str()
        },
        state.status,
        state.result_panel()
    )
}
