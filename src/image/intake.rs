//! Reading user-supplied files into uploaded images.

use crate::error::IntakeError;
use crate::image::types::{is_image_mime, ImageFormat, UploadedImage};
use async_trait::async_trait;
use std::path::{Path, PathBuf};

/// Upload size shown to users as a guideline (10 MB).
pub const RECOMMENDED_MAX_BYTES: u64 = 10 * 1024 * 1024;

/// A file-like object offered for upload.
#[async_trait]
pub trait ImageSource: Send + Sync {
    /// Display name of the file.
    fn name(&self) -> &str;

    /// Declared content type.
    fn mime_type(&self) -> &str;

    /// Size hint in bytes, if known without reading.
    async fn size_hint(&self) -> Option<u64> {
        None
    }

    /// Reads the full content.
    async fn read(&self) -> std::io::Result<Vec<u8>>;
}

/// A file on disk. The content type comes from the extension, falling back
/// to the leading bytes of the file.
#[derive(Debug, Clone)]
pub struct PathSource {
    path: PathBuf,
    name: String,
    mime_type: String,
}

impl PathSource {
    /// Opens a path, sniffing its content type.
    pub async fn open(path: impl AsRef<Path>) -> std::io::Result<Self> {
        let path = path.as_ref().to_path_buf();
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());

        let from_extension = path
            .extension()
            .and_then(|e| e.to_str())
            .and_then(ImageFormat::from_extension);

        let format = match from_extension {
            Some(format) => Some(format),
            None => sniff_format(&path).await?,
        };

        let mime_type = format
            .map(|f| f.mime_type().to_string())
            .unwrap_or_else(|| "application/octet-stream".to_string());

        Ok(Self {
            path,
            name,
            mime_type,
        })
    }

    /// Returns the underlying path.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

async fn sniff_format(path: &Path) -> std::io::Result<Option<ImageFormat>> {
    use tokio::io::AsyncReadExt;

    let mut file = tokio::fs::File::open(path).await?;
    let mut head = [0u8; 16];
    let mut filled = 0;
    while filled < head.len() {
        let n = file.read(&mut head[filled..]).await?;
        if n == 0 {
            break;
        }
        filled += n;
    }
    Ok(ImageFormat::from_magic_bytes(&head[..filled]))
}

#[async_trait]
impl ImageSource for PathSource {
    fn name(&self) -> &str {
        &self.name
    }

    fn mime_type(&self) -> &str {
        &self.mime_type
    }

    async fn size_hint(&self) -> Option<u64> {
        tokio::fs::metadata(&self.path).await.ok().map(|m| m.len())
    }

    async fn read(&self) -> std::io::Result<Vec<u8>> {
        tokio::fs::read(&self.path).await
    }
}

/// Bytes already in memory, e.g. from a drop or paste.
#[derive(Debug, Clone)]
pub struct MemorySource {
    name: String,
    mime_type: String,
    data: Vec<u8>,
}

impl MemorySource {
    /// Wraps bytes with a declared name and content type.
    pub fn new(name: impl Into<String>, mime_type: impl Into<String>, data: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            mime_type: mime_type.into(),
            data,
        }
    }
}

#[async_trait]
impl ImageSource for MemorySource {
    fn name(&self) -> &str {
        &self.name
    }

    fn mime_type(&self) -> &str {
        &self.mime_type
    }

    async fn size_hint(&self) -> Option<u64> {
        Some(self.data.len() as u64)
    }

    async fn read(&self) -> std::io::Result<Vec<u8>> {
        Ok(self.data.clone())
    }
}

/// Intake settings.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IntakeOptions {
    /// Hard size limit. When unset, sizes above
    /// [`RECOMMENDED_MAX_BYTES`] are only logged.
    pub max_bytes: Option<u64>,
}

impl IntakeOptions {
    /// Rejects files larger than `limit` bytes.
    pub fn with_max_bytes(mut self, limit: u64) -> Self {
        self.max_bytes = Some(limit);
        self
    }

    /// Rejects files larger than `mb` megabytes.
    pub fn with_max_megabytes(self, mb: u64) -> Self {
        self.with_max_bytes(mb.saturating_mul(1024 * 1024))
    }

    fn check_size(&self, name: &str, size: u64) -> Result<(), IntakeError> {
        if let Some(limit) = self.max_bytes {
            if size > limit {
                return Err(IntakeError::TooLarge { size, limit });
            }
        } else if size > RECOMMENDED_MAX_BYTES {
            tracing::warn!(
                file = name,
                size,
                recommended = RECOMMENDED_MAX_BYTES,
                "image exceeds the recommended upload size"
            );
        }
        Ok(())
    }
}

/// Accepts a file as an uploaded image.
///
/// Non-image content types are rejected before anything is read.
pub async fn accept_file(
    source: &dyn ImageSource,
    options: &IntakeOptions,
) -> Result<UploadedImage, IntakeError> {
    let mime_type = source.mime_type().trim().to_ascii_lowercase();
    if !is_image_mime(&mime_type) {
        return Err(IntakeError::NotAnImage { mime_type });
    }

    if let Some(size) = source.size_hint().await {
        options.check_size(source.name(), size)?;
    }

    let data = source.read().await.map_err(IntakeError::Read)?;
    if data.is_empty() {
        return Err(IntakeError::Empty);
    }
    options.check_size(source.name(), data.len() as u64)?;

    tracing::debug!(
        file = source.name(),
        mime_type = %mime_type,
        size = data.len(),
        "image accepted"
    );

    Ok(UploadedImage::new(data, mime_type, source.name()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const PNG_BYTES: [u8; 12] = [0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A, 1, 2, 3, 4];

    struct BrokenSource;

    #[async_trait]
    impl ImageSource for BrokenSource {
        fn name(&self) -> &str {
            "broken.png"
        }

        fn mime_type(&self) -> &str {
            "image/png"
        }

        async fn read(&self) -> std::io::Result<Vec<u8>> {
            Err(std::io::Error::other("device unplugged"))
        }
    }

    #[tokio::test]
    async fn test_accept_memory_image() {
        let source = MemorySource::new("cat.png", "image/png", PNG_BYTES.to_vec());
        let image = accept_file(&source, &IntakeOptions::default()).await.unwrap();

        assert_eq!(image.mime_type, "image/png");
        assert_eq!(image.file_name, "cat.png");
        assert_eq!(image.raw_bytes, PNG_BYTES.to_vec());
        assert_eq!(image.encoded_preview.decode().unwrap(), PNG_BYTES.to_vec());
    }

    #[tokio::test]
    async fn test_mime_type_is_normalized() {
        let source = MemorySource::new("a.png", " IMAGE/PNG ", vec![1, 2, 3]);
        let image = accept_file(&source, &IntakeOptions::default()).await.unwrap();

        assert_eq!(image.mime_type, "image/png");
        assert_eq!(image.encoded_preview.to_string(), "data:image/png;base64,AQID");
    }

    #[tokio::test]
    async fn test_rejects_empty_file() {
        let source = MemorySource::new("empty.png", "image/png", Vec::new());
        let err = accept_file(&source, &IntakeOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, IntakeError::Empty));
    }

    #[test]
    fn test_max_megabytes_saturates() {
        assert_eq!(
            IntakeOptions::default().with_max_megabytes(10).max_bytes,
            Some(RECOMMENDED_MAX_BYTES)
        );
        assert_eq!(
            IntakeOptions::default().with_max_megabytes(u64::MAX).max_bytes,
            Some(u64::MAX)
        );
    }

    #[tokio::test]
    async fn test_rejects_non_image() {
        let source = MemorySource::new("notes.txt", "text/plain", b"hello".to_vec());
        let err = accept_file(&source, &IntakeOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, IntakeError::NotAnImage { .. }));
    }

    #[tokio::test]
    async fn test_read_failure_has_fixed_message() {
        let err = accept_file(&BrokenSource, &IntakeOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, IntakeError::Read(_)));
        assert_eq!(err.to_string(), "failed to read file");
    }

    #[tokio::test]
    async fn test_size_limit_is_advisory_by_default() {
        let source = MemorySource::new("big.png", "image/png", vec![0u8; 64]);
        assert!(accept_file(&source, &IntakeOptions::default()).await.is_ok());

        let strict = IntakeOptions::default().with_max_bytes(32);
        let err = accept_file(&source, &strict).await.unwrap_err();
        assert!(matches!(err, IntakeError::TooLarge { size: 64, limit: 32 }));
    }

    #[tokio::test]
    async fn test_path_source_uses_extension() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("photo.JPG");
        std::fs::write(&path, b"not really a jpeg").unwrap();

        let source = PathSource::open(&path).await.unwrap();
        assert_eq!(source.name(), "photo.JPG");
        assert_eq!(source.mime_type(), "image/jpeg");
        assert_eq!(source.size_hint().await, Some(17));
    }

    #[tokio::test]
    async fn test_path_source_sniffs_magic_bytes() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(&PNG_BYTES).unwrap();

        let source = PathSource::open(file.path()).await.unwrap();
        assert_eq!(source.mime_type(), "image/png");

        let image = accept_file(&source, &IntakeOptions::default()).await.unwrap();
        assert_eq!(image.size(), PNG_BYTES.len());
    }

    #[tokio::test]
    async fn test_path_source_unknown_content_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("readme");
        std::fs::write(&path, b"just some text").unwrap();

        let source = PathSource::open(&path).await.unwrap();
        assert_eq!(source.mime_type(), "application/octet-stream");
        assert!(accept_file(&source, &IntakeOptions::default()).await.is_err());
    }
}
