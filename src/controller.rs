//! Submission controller: ties intake, prompt and editor together.
//!
//! The controller owns the [`ViewState`] and exposes every transition as a
//! named method. At most one edit request is outstanding at a time; a second
//! `submit()` while one is in flight is a no-op.

use crate::error::{EditorError, IntakeError, Result, VALIDATION_MESSAGE};
use crate::image::{accept_file, DataUrl, EditRequest, ImageEditor, ImageSource, IntakeOptions};
use crate::view::{SubmissionStatus, ViewState};
use parking_lot::Mutex;
use std::sync::Arc;

/// Stored when a request ends without reporting back (panic or dropped future).
pub const INTERRUPTED_MESSAGE: &str = "The edit request was interrupted.";

/// How a call to [`SubmissionController::submit`] ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmitOutcome {
    /// The editor returned an image.
    Succeeded,
    /// The editor returned an error.
    Failed,
    /// Missing image or blank prompt; nothing was sent.
    Rejected,
    /// A request was already in flight; nothing was sent.
    Busy,
    /// A new image was uploaded while waiting; the result was dropped.
    Superseded,
}

/// Drives one editing session.
pub struct SubmissionController<E> {
    editor: Arc<E>,
    state: Arc<Mutex<ViewState>>,
    intake: IntakeOptions,
}

impl<E> Clone for SubmissionController<E> {
    fn clone(&self) -> Self {
        Self {
            editor: Arc::clone(&self.editor),
            state: Arc::clone(&self.state),
            intake: self.intake,
        }
    }
}

impl<E: ImageEditor> SubmissionController<E> {
    /// Creates a controller with default intake options.
    pub fn new(editor: E) -> Self {
        Self::with_editor(Arc::new(editor))
    }

    /// Creates a controller around a shared editor.
    pub fn with_editor(editor: Arc<E>) -> Self {
        Self {
            editor,
            state: Arc::new(Mutex::new(ViewState::default())),
            intake: IntakeOptions::default(),
        }
    }

    /// Sets the intake options used by [`upload`](Self::upload).
    pub fn with_intake_options(mut self, options: IntakeOptions) -> Self {
        self.intake = options;
        self
    }

    /// Returns the editor.
    pub fn editor(&self) -> &E {
        &self.editor
    }

    /// Returns a copy of the current view state.
    pub fn snapshot(&self) -> ViewState {
        self.state.lock().clone()
    }

    /// Returns the current status.
    pub fn status(&self) -> SubmissionStatus {
        self.state.lock().status
    }

    /// Replaces the editing instruction.
    pub fn set_prompt(&self, prompt: impl Into<String>) {
        self.state.lock().prompt = prompt.into();
    }

    /// Reads a file and makes it the current image.
    ///
    /// On success any previous result or error is cleared; the prompt is
    /// kept. A non-image file is rejected without touching the state. A read
    /// failure keeps the previous image and reports
    /// [`READ_FAILURE_MESSAGE`](crate::READ_FAILURE_MESSAGE).
    pub async fn upload(&self, source: &dyn ImageSource) -> Result<()> {
        let image = match accept_file(source, &self.intake).await {
            Ok(image) => image,
            Err(err @ IntakeError::NotAnImage { .. }) => {
                tracing::debug!(file = source.name(), "ignoring non-image upload");
                return Err(err.into());
            }
            Err(err) => {
                tracing::warn!(file = source.name(), "upload failed: {err}");
                let mut state = self.state.lock();
                if !state.status.is_in_flight() {
                    state.result = None;
                    state.error = Some(err.to_string());
                    state.status = SubmissionStatus::Failed;
                }
                return Err(err.into());
            }
        };

        let mut state = self.state.lock();
        state.original = Some(Arc::new(image));
        state.generation += 1;
        state.result = None;
        state.error = None;
        if !state.status.is_in_flight() {
            state.status = SubmissionStatus::Idle;
        }
        Ok(())
    }

    /// Sends the current image and prompt to the editor.
    ///
    /// Every failure ends up in the view state; the returned outcome only
    /// says which path was taken.
    pub async fn submit(&self) -> SubmitOutcome {
        let (request, generation) = match self.begin() {
            Ok(started) => started,
            Err(outcome) => return outcome,
        };

        let guard = InFlightGuard {
            state: Arc::clone(&self.state),
        };
        let response = self.editor.edit(&request).await;
        let outcome = self.finish(generation, &request.mime_type, response);
        drop(guard);
        outcome
    }

    /// Validates and moves to InFlight, or explains why not.
    fn begin(&self) -> std::result::Result<(EditRequest, u64), SubmitOutcome> {
        let mut state = self.state.lock();
        if state.status.is_in_flight() {
            tracing::debug!("submit ignored, request already in flight");
            return Err(SubmitOutcome::Busy);
        }

        let request = match state.original.as_deref() {
            Some(image) => EditRequest::from_upload(image, state.prompt.clone()),
            None => Err(EditorError::Validation(VALIDATION_MESSAGE.into())),
        };

        match request {
            Ok(request) => {
                state.status = SubmissionStatus::InFlight;
                state.result = None;
                state.error = None;
                tracing::debug!(
                    mime_type = %request.mime_type,
                    prompt_len = request.instruction.len(),
                    "submitting edit request"
                );
                Ok((request, state.generation))
            }
            Err(_) => {
                state.result = None;
                state.error = Some(VALIDATION_MESSAGE.to_string());
                state.status = SubmissionStatus::Failed;
                Err(SubmitOutcome::Rejected)
            }
        }
    }

    fn finish(&self, generation: u64, mime_type: &str, response: Result<String>) -> SubmitOutcome {
        let mut state = self.state.lock();

        if state.generation != generation {
            tracing::warn!("image replaced while editing, discarding result");
            state.status = SubmissionStatus::Idle;
            return SubmitOutcome::Superseded;
        }

        match response {
            Ok(payload) => {
                state.result = Some(DataUrl::new(mime_type, payload));
                state.error = None;
                state.status = SubmissionStatus::Succeeded;
                SubmitOutcome::Succeeded
            }
            Err(err) => {
                tracing::error!("edit failed: {err}");
                state.result = None;
                state.error = Some(err.to_string());
                state.status = SubmissionStatus::Failed;
                SubmitOutcome::Failed
            }
        }
    }
}

/// Clears the InFlight status when the submission scope ends, however it ends.
struct InFlightGuard {
    state: Arc<Mutex<ViewState>>,
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        let mut state = self.state.lock();
        if state.status.is_in_flight() {
            state.result = None;
            state.error = Some(INTERRUPTED_MESSAGE.to_string());
            state.status = SubmissionStatus::Failed;
        }
    }
}
