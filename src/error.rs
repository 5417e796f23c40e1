//! Error types for image intake, editing and submission.

use std::time::Duration;

/// Message shown when a submission is attempted without an image or prompt.
pub const VALIDATION_MESSAGE: &str = "Please upload an image and provide an editing prompt.";

/// Message shown when an accepted file could not be read.
pub const READ_FAILURE_MESSAGE: &str = "failed to read file";

/// Maximum length of an upstream error body kept in an error message.
const MAX_ERROR_MESSAGE_LEN: usize = 500;

/// Errors raised while reading a user-supplied file.
#[derive(Debug, thiserror::Error)]
pub enum IntakeError {
    /// The file does not declare an `image/*` content type.
    #[error("not an image: {mime_type}")]
    NotAnImage { mime_type: String },

    /// The file could not be read.
    #[error("failed to read file")]
    Read(#[source] std::io::Error),

    /// The file exceeds the configured size limit.
    #[error("file is {size} bytes, limit is {limit} bytes")]
    TooLarge { size: u64, limit: u64 },

    /// The file has no content.
    #[error("file is empty")]
    Empty,
}

/// Errors that can occur while editing an image.
#[derive(Debug, thiserror::Error)]
pub enum EditorError {
    /// Missing image, blank prompt or empty request fields.
    #[error("{0}")]
    Validation(String),

    /// The uploaded file was rejected or unreadable.
    #[error(transparent)]
    Intake(#[from] IntakeError),

    /// API key missing or invalid.
    #[error("authentication failed: {0}")]
    Auth(String),

    /// API returned an error response.
    #[error("API error: {status} - {message}")]
    Api { status: u16, message: String },

    /// Rate limit exceeded.
    #[error("rate limited, retry after {retry_after:?}")]
    RateLimited { retry_after: Option<Duration> },

    /// Content was blocked by safety filters.
    #[error("content blocked: {0}")]
    ContentBlocked(String),

    /// Invalid request parameters (e.g. unknown model).
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// The service answered but without an image.
    #[error("unexpected response: {0}")]
    UnexpectedResponse(String),

    /// Opaque service failure, displayed as-is.
    #[error("{0}")]
    Service(String),

    /// Network or HTTP error.
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    /// Failed to decode base64 data.
    #[error("failed to decode: {0}")]
    Decode(String),

    /// I/O error (e.g., saving file).
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl EditorError {
    /// Returns true if the service declined the request (safety filtering).
    pub fn is_refusal(&self) -> bool {
        matches!(self, Self::ContentBlocked(_))
    }

    /// Returns true for failures detected before any I/O.
    pub fn is_validation(&self) -> bool {
        matches!(self, Self::Validation(_))
    }

    /// Returns true if this error came from the remote edit call.
    pub fn is_service(&self) -> bool {
        !matches!(self, Self::Validation(_) | Self::Intake(_) | Self::Io(_))
    }

    /// Returns the suggested retry delay, if the service gave one.
    ///
    /// Nothing is retried automatically; this is only surfaced to the user.
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            Self::RateLimited { retry_after } => *retry_after,
            _ => None,
        }
    }
}

/// Result type alias for editor operations.
pub type Result<T> = std::result::Result<T, EditorError>;

/// Parses a `Retry-After` header given in seconds.
pub(crate) fn parse_retry_after(headers: &reqwest::header::HeaderMap) -> Option<u64> {
    headers
        .get(reqwest::header::RETRY_AFTER)?
        .to_str()
        .ok()?
        .trim()
        .parse()
        .ok()
}

/// Trims an upstream error body into something fit for display.
///
/// Prefers the `error.message` field of a JSON body, collapses whitespace and
/// caps the length.
pub(crate) fn sanitize_error_message(text: &str) -> String {
    let extracted = serde_json::from_str::<serde_json::Value>(text)
        .ok()
        .and_then(|v| {
            v.get("error")
                .and_then(|e| e.get("message"))
                .and_then(|m| m.as_str())
                .map(str::to_owned)
        })
        .unwrap_or_else(|| text.to_owned());

    let collapsed = extracted.split_whitespace().collect::<Vec<_>>().join(" ");
    if collapsed.chars().count() > MAX_ERROR_MESSAGE_LEN {
        let truncated: String = collapsed.chars().take(MAX_ERROR_MESSAGE_LEN).collect();
        format!("{truncated}...")
    } else {
        collapsed
    }
}
