//! Image editor trait.

use crate::error::Result;
use crate::image::types::EditRequest;
use async_trait::async_trait;

/// A remote service that applies a text instruction to an image.
///
/// Implementations perform exactly one exchange per call: no retries, no
/// caching.
#[async_trait]
pub trait ImageEditor: Send + Sync {
    /// Edits the image, returning the new image as base64.
    async fn edit(&self, request: &EditRequest) -> Result<String>;

    /// Returns the name of this editor for display.
    fn name(&self) -> &str;

    /// Checks if the service is reachable and authenticated.
    async fn health_check(&self) -> Result<()>;
}
