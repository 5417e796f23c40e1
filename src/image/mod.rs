//! Image intake and editing.

pub mod intake;
mod provider;
pub mod providers;
mod types;

pub use intake::{
    accept_file, ImageSource, IntakeOptions, MemorySource, PathSource, RECOMMENDED_MAX_BYTES,
};
pub use provider::ImageEditor;
pub use types::{is_image_mime, DataUrl, EditRequest, ImageFormat, UploadedImage};
