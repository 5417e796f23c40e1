//! Core types for image editing.

use crate::error::{EditorError, Result, VALIDATION_MESSAGE};
use base64::Engine;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Image formats recognised when sniffing files.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImageFormat {
    /// PNG format (lossless).
    Png,
    /// JPEG format (lossy).
    Jpeg,
    /// WebP format.
    WebP,
    /// GIF format.
    Gif,
}

impl ImageFormat {
    /// Returns the MIME type for this format.
    pub fn mime_type(&self) -> &'static str {
        match self {
            Self::Png => "image/png",
            Self::Jpeg => "image/jpeg",
            Self::WebP => "image/webp",
            Self::Gif => "image/gif",
        }
    }

    /// Attempts to detect format from file extension.
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_lowercase().as_str() {
            "png" => Some(Self::Png),
            "jpg" | "jpeg" => Some(Self::Jpeg),
            "webp" => Some(Self::WebP),
            "gif" => Some(Self::Gif),
            _ => None,
        }
    }

    /// Detects image format from magic bytes.
    pub fn from_magic_bytes(data: &[u8]) -> Option<Self> {
        // PNG: 89 50 4E 47 0D 0A 1A 0A
        if data.starts_with(&[0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A]) {
            return Some(Self::Png);
        }

        // JPEG: FF D8 FF
        if data.starts_with(&[0xFF, 0xD8, 0xFF]) {
            return Some(Self::Jpeg);
        }

        // GIF87a / GIF89a
        if data.starts_with(b"GIF87a") || data.starts_with(b"GIF89a") {
            return Some(Self::Gif);
        }

        // WebP: RIFF....WEBP
        if data.len() >= 12 && data.starts_with(b"RIFF") && &data[8..12] == b"WEBP" {
            return Some(Self::WebP);
        }

        None
    }
}

/// Returns true if the MIME type declares an image.
pub fn is_image_mime(mime: &str) -> bool {
    mime.trim().to_ascii_lowercase().starts_with("image/")
}

/// A base64 data URL (`data:<mime>;base64,<payload>`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataUrl {
    mime_type: String,
    payload: String,
}

impl DataUrl {
    /// Pairs an already-encoded base64 payload with its MIME type.
    pub fn new(mime_type: impl Into<String>, payload: impl Into<String>) -> Self {
        Self {
            mime_type: mime_type.into(),
            payload: payload.into(),
        }
    }

    /// Encodes raw bytes into a data URL.
    pub fn encode(mime_type: impl Into<String>, bytes: &[u8]) -> Self {
        Self::new(
            mime_type,
            base64::engine::general_purpose::STANDARD.encode(bytes),
        )
    }

    /// Returns the MIME type.
    pub fn mime_type(&self) -> &str {
        &self.mime_type
    }

    /// Returns the base64 payload without the `data:` prefix.
    pub fn payload(&self) -> &str {
        &self.payload
    }

    /// Decodes the payload into raw bytes.
    pub fn decode(&self) -> Result<Vec<u8>> {
        base64::engine::general_purpose::STANDARD
            .decode(&self.payload)
            .map_err(|e| EditorError::Decode(e.to_string()))
    }
}

impl fmt::Display for DataUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "data:{};base64,{}", self.mime_type, self.payload)
    }
}

impl FromStr for DataUrl {
    type Err = EditorError;

    fn from_str(s: &str) -> Result<Self> {
        let rest = s
            .strip_prefix("data:")
            .ok_or_else(|| EditorError::Decode("missing data: prefix".into()))?;
        let (header, payload) = rest
            .split_once(',')
            .ok_or_else(|| EditorError::Decode("missing ',' in data URL".into()))?;
        let mime_type = header
            .strip_suffix(";base64")
            .ok_or_else(|| EditorError::Decode("data URL is not base64-encoded".into()))?;

        Ok(Self::new(mime_type, payload))
    }
}

/// An image accepted by intake, held by the current editing session.
#[derive(Debug, Clone)]
pub struct UploadedImage {
    /// Raw file bytes.
    pub raw_bytes: Vec<u8>,
    /// Declared MIME type (e.g. `image/png`).
    pub mime_type: String,
    /// Name of the file the image came from.
    pub file_name: String,
    /// Data URL used both for display and for the outbound request.
    pub encoded_preview: DataUrl,
}

impl UploadedImage {
    /// Builds an uploaded image, encoding the preview from the raw bytes.
    pub fn new(
        raw_bytes: Vec<u8>,
        mime_type: impl Into<String>,
        file_name: impl Into<String>,
    ) -> Self {
        let mime_type = mime_type.into();
        let encoded_preview = DataUrl::encode(mime_type.clone(), &raw_bytes);
        Self {
            raw_bytes,
            mime_type,
            file_name: file_name.into(),
            encoded_preview,
        }
    }

    /// Returns the size of the image in bytes.
    pub fn size(&self) -> usize {
        self.raw_bytes.len()
    }

    /// Returns the base64 payload with the data-URL prefix stripped.
    pub fn base64_payload(&self) -> &str {
        self.encoded_preview.payload()
    }
}

/// A single edit instruction for the remote service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EditRequest {
    /// Source image as base64 (no data-URL prefix).
    pub image_base64: String,
    /// MIME type of the source image.
    pub mime_type: String,
    /// Natural-language editing instruction.
    pub instruction: String,
}

impl EditRequest {
    /// Creates a request, rejecting empty fields and blank instructions.
    pub fn new(
        image_base64: impl Into<String>,
        mime_type: impl Into<String>,
        instruction: impl Into<String>,
    ) -> Result<Self> {
        let request = Self {
            image_base64: image_base64.into(),
            mime_type: mime_type.into(),
            instruction: instruction.into(),
        };

        if request.image_base64.is_empty()
            || request.mime_type.is_empty()
            || request.instruction.trim().is_empty()
        {
            return Err(EditorError::Validation(VALIDATION_MESSAGE.into()));
        }

        Ok(request)
    }

    /// Builds a request from an uploaded image and a prompt.
    pub fn from_upload(image: &UploadedImage, instruction: impl Into<String>) -> Result<Self> {
        Self::new(image.base64_payload(), image.mime_type.clone(), instruction)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PNG_MAGIC: [u8; 12] = [0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A, 0, 0, 0, 0];
    const JPEG_MAGIC: [u8; 12] = [0xFF, 0xD8, 0xFF, 0xE0, 0, 0, 0, 0, 0, 0, 0, 0];
    const WEBP_MAGIC: [u8; 12] = *b"RIFF\x00\x00\x00\x00WEBP";

    #[test]
    fn test_format_from_magic_bytes() {
        assert_eq!(
            ImageFormat::from_magic_bytes(&PNG_MAGIC),
            Some(ImageFormat::Png)
        );
        assert_eq!(
            ImageFormat::from_magic_bytes(&JPEG_MAGIC),
            Some(ImageFormat::Jpeg)
        );
        assert_eq!(
            ImageFormat::from_magic_bytes(&WEBP_MAGIC),
            Some(ImageFormat::WebP)
        );
        assert_eq!(
            ImageFormat::from_magic_bytes(b"GIF89a\x01\x00"),
            Some(ImageFormat::Gif)
        );
        assert_eq!(ImageFormat::from_magic_bytes(b"hello"), None);
    }

    #[test]
    fn test_format_from_extension() {
        assert_eq!(ImageFormat::from_extension("PNG"), Some(ImageFormat::Png));
        assert_eq!(ImageFormat::from_extension("jpeg"), Some(ImageFormat::Jpeg));
        assert_eq!(ImageFormat::from_extension("txt"), None);
    }

    #[test]
    fn test_is_image_mime() {
        assert!(is_image_mime("image/png"));
        assert!(is_image_mime("Image/HEIC"));
        assert!(!is_image_mime("text/plain"));
        assert!(!is_image_mime(""));
    }

    #[test]
    fn test_data_url_display_and_parse() {
        let url = DataUrl::new("image/png", "ZZZ");
        assert_eq!(url.to_string(), "data:image/png;base64,ZZZ");

        let parsed: DataUrl = "data:image/jpeg;base64,AAAA".parse().unwrap();
        assert_eq!(parsed.mime_type(), "image/jpeg");
        assert_eq!(parsed.payload(), "AAAA");
    }

    #[test]
    fn test_data_url_rejects_malformed() {
        assert!("image/png;base64,AAAA".parse::<DataUrl>().is_err());
        assert!("data:image/png;base64".parse::<DataUrl>().is_err());
        assert!("data:text/plain,hello".parse::<DataUrl>().is_err());
    }

    #[test]
    fn test_data_url_decode() {
        let url = DataUrl::encode("image/png", &PNG_MAGIC);
        assert_eq!(url.decode().unwrap(), PNG_MAGIC.to_vec());

        let bad = DataUrl::new("image/png", "!!not base64!!");
        assert!(matches!(bad.decode(), Err(EditorError::Decode(_))));
    }

    #[test]
    fn test_uploaded_image_payload_strips_prefix() {
        let image = UploadedImage::new(PNG_MAGIC.to_vec(), "image/png", "cat.png");
        assert!(!image.base64_payload().starts_with("data:"));
        assert!(image
            .encoded_preview
            .to_string()
            .starts_with("data:image/png;base64,"));
        assert_eq!(image.size(), 12);
    }

    #[test]
    fn test_edit_request_validation() {
        assert!(EditRequest::new("AAAA", "image/png", "make it blue").is_ok());

        for (data, mime, prompt) in [
            ("", "image/png", "make it blue"),
            ("AAAA", "", "make it blue"),
            ("AAAA", "image/png", ""),
            ("AAAA", "image/png", "   \n"),
        ] {
            let err = EditRequest::new(data, mime, prompt).unwrap_err();
            assert!(err.is_validation());
        }
    }
}
