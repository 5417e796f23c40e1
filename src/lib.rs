#![warn(missing_docs)]
//! Gemini Editor - edit images with natural-language instructions.
//!
//! Upload an image, type what should change, and get back the edited image
//! from a generative-image service.
//!
//! # Quick Start
//!
//! ```no_run
//! use gemini_editor::{GeminiEditor, PathSource, SubmissionController, SubmitOutcome};
//!
//! #[tokio::main]
//! async fn main() -> gemini_editor::Result<()> {
//!     let editor = GeminiEditor::builder().build()?;
//!     let controller = SubmissionController::new(editor);
//!
//!     controller.upload(&PathSource::open("cat.png").await?).await?;
//!     controller.set_prompt("Give the cat a tiny wizard hat");
//!
//!     if controller.submit().await == SubmitOutcome::Succeeded {
//!         if let Some(bytes) = controller.snapshot().result_bytes()? {
//!             std::fs::write("cat-wizard.png", bytes)?;
//!         }
//!     }
//!     Ok(())
//! }
//! ```
//!
//! # Features
//!
//! - `gemini` (default): Gemini image models (Google)
//! - `cli`: Command-line interface

mod controller;
mod error;
pub mod image;
pub mod view;

pub use controller::{SubmissionController, SubmitOutcome, INTERRUPTED_MESSAGE};
pub use error::{EditorError, IntakeError, Result, READ_FAILURE_MESSAGE, VALIDATION_MESSAGE};
pub use image::{
    accept_file, DataUrl, EditRequest, ImageEditor, ImageFormat, ImageSource, IntakeOptions,
    MemorySource, PathSource, UploadedImage,
};
pub use view::{Panel, SubmissionStatus, ViewState};

#[cfg(feature = "gemini")]
pub use image::providers::{GeminiEditor, GeminiEditorBuilder, GeminiModel};

/// Prelude for convenient imports.
pub mod prelude {
    pub use crate::controller::{SubmissionController, SubmitOutcome};
    pub use crate::error::{EditorError, Result};
    pub use crate::image::{EditRequest, ImageEditor, ImageSource, MemorySource, PathSource};
    pub use crate::view::{SubmissionStatus, ViewState};

    #[cfg(feature = "gemini")]
    pub use crate::image::providers::GeminiEditor;
}
