//! Gemini (Google) image editing.

use crate::error::{parse_retry_after, sanitize_error_message, EditorError, Result};
use crate::image::provider::ImageEditor;
use crate::image::types::EditRequest;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Instant;

/// Public Gemini REST endpoint.
pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

/// Gemini image model variants.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum GeminiModel {
    /// Gemini 2.5 Flash Image (fast, economical).
    #[default]
    Flash,
    /// Gemini 3 Pro Image (highest quality).
    Pro,
}

impl GeminiModel {
    /// Returns the API model identifier.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Flash => "gemini-2.5-flash-image",
            Self::Pro => "gemini-3-pro-image-preview",
        }
    }
}

/// Builder for [`GeminiEditor`].
#[derive(Debug, Clone, Default)]
pub struct GeminiEditorBuilder {
    api_key: Option<String>,
    model: GeminiModel,
    base_url: Option<String>,
}

impl GeminiEditorBuilder {
    /// Creates a new builder with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the API key. Falls back to `GOOGLE_API_KEY` env var.
    pub fn api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }

    /// Sets the Gemini model variant.
    pub fn model(mut self, model: GeminiModel) -> Self {
        self.model = model;
        self
    }

    /// Overrides the API base URL (proxies, local test servers).
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = Some(url.into());
        self
    }

    /// Builds the editor, resolving the API key.
    pub fn build(self) -> Result<GeminiEditor> {
        let api_key = self
            .api_key
            .or_else(|| std::env::var("GOOGLE_API_KEY").ok())
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| {
                EditorError::Auth("GOOGLE_API_KEY not set and no API key provided".into())
            })?;

        let base_url = self
            .base_url
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string())
            .trim_end_matches('/')
            .to_string();

        Ok(GeminiEditor {
            client: reqwest::Client::new(),
            api_key,
            model: self.model,
            base_url,
        })
    }
}

/// Image editor backed by Gemini `generateContent`.
pub struct GeminiEditor {
    client: reqwest::Client,
    api_key: String,
    model: GeminiModel,
    base_url: String,
}

impl GeminiEditor {
    /// Creates a new `GeminiEditorBuilder`.
    pub fn builder() -> GeminiEditorBuilder {
        GeminiEditorBuilder::new()
    }

    /// Returns the configured model.
    pub fn model(&self) -> GeminiModel {
        self.model
    }

    fn model_url(&self) -> String {
        format!("{}/models/{}", self.base_url, self.model.as_str())
    }

    async fn edit_impl(&self, request: &EditRequest) -> Result<String> {
        let start = Instant::now();
        let url = format!("{}:generateContent", self.model_url());
        let body = GeminiRequest::from_edit_request(request);

        tracing::debug!(
            model = self.model.as_str(),
            mime_type = %request.mime_type,
            payload_len = request.image_base64.len(),
            "sending Gemini edit request"
        );

        let response = self
            .client
            .post(&url)
            .header("x-goog-api-key", &self.api_key)
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let headers = response.headers().clone();
            let text = response.text().await.unwrap_or_default();
            return Err(parse_error(status.as_u16(), &text, &headers));
        }

        let gemini_response: GeminiResponse = response.json().await?;
        let data = extract_image(gemini_response)?;

        tracing::info!(
            model = self.model.as_str(),
            duration_ms = start.elapsed().as_millis() as u64,
            "Gemini edit complete"
        );

        Ok(data)
    }
}

#[async_trait]
impl ImageEditor for GeminiEditor {
    async fn edit(&self, request: &EditRequest) -> Result<String> {
        self.edit_impl(request).await
    }

    fn name(&self) -> &str {
        "Gemini (Google)"
    }

    async fn health_check(&self) -> Result<()> {
        let response = self
            .client
            .get(self.model_url())
            .header("x-goog-api-key", &self.api_key)
            .send()
            .await?;

        match response.status().as_u16() {
            401 | 403 => Err(EditorError::Auth("Invalid API key".into())),
            404 => Err(EditorError::InvalidRequest(
                "Model not found. Verify the model name is correct.".into(),
            )),
            s if !(200..300).contains(&s) => Err(EditorError::Api {
                status: s,
                message: "Health check failed".into(),
            }),
            _ => Ok(()),
        }
    }
}

/// Maps a non-success HTTP response to an error.
fn parse_error(status: u16, text: &str, headers: &reqwest::header::HeaderMap) -> EditorError {
    let text = sanitize_error_message(text);
    match status {
        401 | 403 => return EditorError::Auth(text),
        404 => {
            return EditorError::InvalidRequest(
                "Model not found. Verify the model name is correct.".into(),
            )
        }
        429 => {
            let retry_after = parse_retry_after(headers).map(std::time::Duration::from_secs);
            return EditorError::RateLimited { retry_after };
        }
        _ => {}
    }

    let lower = text.to_lowercase();
    if lower.contains("safety")
        || lower.contains("blocked")
        || lower.contains("content_policy")
        || lower.contains("prohibited")
    {
        return EditorError::ContentBlocked(text);
    }
    EditorError::Api {
        status,
        message: text,
    }
}

/// Pulls the edited image out of a successful response.
///
/// Blocks are reported with HTTP 200, so feedback and finish reasons are
/// checked before looking for inline data.
fn extract_image(response: GeminiResponse) -> Result<String> {
    if let Some(ref feedback) = response.prompt_feedback {
        if let Some(ref reason) = feedback.block_reason {
            let msg = feedback
                .block_reason_message
                .clone()
                .unwrap_or_else(|| format!("Prompt blocked: {}", reason));
            return Err(EditorError::ContentBlocked(msg));
        }
    }

    let candidate = response.candidates.into_iter().next().ok_or_else(|| {
        EditorError::UnexpectedResponse("No candidates in Gemini response".into())
    })?;

    if let Some(ref finish_reason) = candidate.finish_reason {
        match finish_reason.as_str() {
            "SAFETY"
            | "IMAGE_SAFETY"
            | "IMAGE_PROHIBITED_CONTENT"
            | "IMAGE_RECITATION"
            | "RECITATION"
            | "PROHIBITED_CONTENT"
            | "BLOCKLIST" => {
                return Err(EditorError::ContentBlocked(format!(
                    "Content blocked by Gemini safety filter: {}",
                    finish_reason
                )));
            }
            "IMAGE_OTHER" | "NO_IMAGE" => {
                return Err(EditorError::UnexpectedResponse(format!(
                    "Generation failed: {}. Try a different prompt.",
                    finish_reason
                )));
            }
            _ => {}
        }
    }

    let content = candidate.content.ok_or_else(|| {
        EditorError::UnexpectedResponse("No content in Gemini candidate".into())
    })?;

    let mut text_reply = Vec::new();
    for part in content.parts {
        if let Some(inline) = part.inline_data {
            if !inline.data.is_empty() {
                tracing::debug!(mime_type = ?inline.mime_type, "received edited image");
                return Ok(inline.data);
            }
        }
        if let Some(text) = part.text {
            text_reply.push(text);
        }
    }

    // The model sometimes answers in prose instead of editing.
    let reply = text_reply.join(" ");
    let reply = reply.trim();
    if reply.is_empty() {
        Err(EditorError::UnexpectedResponse(
            "No image data in Gemini response".into(),
        ))
    } else {
        Err(EditorError::UnexpectedResponse(format!(
            "No image returned. Model replied: {}",
            sanitize_error_message(reply)
        )))
    }
}

// Request/Response types
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiRequest {
    contents: Vec<GeminiContent>,
    generation_config: GeminiConfig,
}

#[derive(Debug, Serialize)]
struct GeminiContent {
    parts: Vec<GeminiRequestPart>,
}

/// A part in a Gemini request - either text or inline image data.
#[derive(Debug, Serialize)]
#[serde(untagged)]
enum GeminiRequestPart {
    Text {
        text: String,
    },
    InlineData {
        #[serde(rename = "inlineData")]
        inline_data: GeminiInlineData,
    },
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiInlineData {
    mime_type: String,
    data: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiConfig {
    response_modalities: Vec<String>,
}

impl GeminiRequest {
    fn from_edit_request(req: &EditRequest) -> Self {
        // Image first, then the instruction.
        let parts = vec![
            GeminiRequestPart::InlineData {
                inline_data: GeminiInlineData {
                    mime_type: req.mime_type.clone(),
                    data: req.image_base64.clone(),
                },
            },
            GeminiRequestPart::Text {
                text: req.instruction.clone(),
            },
        ];

        Self {
            contents: vec![GeminiContent { parts }],
            generation_config: GeminiConfig {
                response_modalities: vec!["IMAGE".to_string(), "TEXT".to_string()],
            },
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiResponse {
    #[serde(default)]
    candidates: Vec<GeminiCandidate>,
    #[serde(default)]
    prompt_feedback: Option<PromptFeedback>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiCandidate {
    #[serde(default)]
    content: Option<GeminiContentResponse>,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PromptFeedback {
    #[serde(default)]
    block_reason: Option<String>,
    #[serde(default)]
    block_reason_message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GeminiContentResponse {
    #[serde(default)]
    parts: Vec<GeminiPartResponse>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiPartResponse {
    #[serde(default)]
    inline_data: Option<InlineData>,
    #[serde(default)]
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct InlineData {
    #[serde(default)]
    mime_type: Option<String>,
    data: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(json: &str) -> GeminiResponse {
        serde_json::from_str(json).unwrap()
    }

    fn sample_request() -> EditRequest {
        EditRequest::new("iVBORw0KGgo=", "image/png", "Add a retro filter").unwrap()
    }

    #[test]
    fn test_gemini_model_as_str() {
        assert_eq!(GeminiModel::Flash.as_str(), "gemini-2.5-flash-image");
        assert_eq!(GeminiModel::Pro.as_str(), "gemini-3-pro-image-preview");
        assert_eq!(GeminiModel::default(), GeminiModel::Flash);
    }

    #[test]
    fn test_builder_with_explicit_key() {
        let editor = GeminiEditorBuilder::new()
            .api_key("test-key")
            .model(GeminiModel::Pro)
            .base_url("http://localhost:8080/v1beta/")
            .build()
            .unwrap();
        assert_eq!(editor.model(), GeminiModel::Pro);
        assert_eq!(
            editor.model_url(),
            "http://localhost:8080/v1beta/models/gemini-3-pro-image-preview"
        );
    }

    #[test]
    fn test_builder_rejects_blank_key() {
        let result = GeminiEditorBuilder::new().api_key("  ").build();
        assert!(matches!(result, Err(EditorError::Auth(_))));
    }

    #[test]
    fn test_request_puts_image_before_instruction() {
        let gemini_req = GeminiRequest::from_edit_request(&sample_request());
        let json = serde_json::to_value(&gemini_req).unwrap();

        let parts = json["contents"][0]["parts"].as_array().unwrap();
        assert_eq!(parts.len(), 2);
        assert_eq!(parts[0]["inlineData"]["mimeType"], "image/png");
        assert_eq!(parts[0]["inlineData"]["data"], "iVBORw0KGgo=");
        assert_eq!(parts[1]["text"], "Add a retro filter");
    }

    #[test]
    fn test_request_serialization_uses_camel_case() {
        let gemini_req = GeminiRequest::from_edit_request(&sample_request());
        let json = serde_json::to_value(&gemini_req).unwrap();

        assert!(json.get("generationConfig").is_some());
        assert!(json.get("generation_config").is_none());
        assert_eq!(
            json["generationConfig"]["responseModalities"],
            serde_json::json!(["IMAGE", "TEXT"])
        );
    }

    #[test]
    fn test_extract_image_success() {
        let resp = parse(
            r#"{
                "candidates": [{
                    "content": {
                        "parts": [
                            {"text": "Here you go"},
                            {"inlineData": {"mimeType": "image/png", "data": "ZZZ"}}
                        ]
                    },
                    "finishReason": "STOP"
                }]
            }"#,
        );
        assert_eq!(extract_image(resp).unwrap(), "ZZZ");
    }

    #[test]
    fn test_extract_image_prompt_feedback_block() {
        let resp = parse(
            r#"{
                "candidates": [],
                "promptFeedback": {
                    "blockReason": "SAFETY",
                    "blockReasonMessage": "Prompt was blocked due to safety"
                }
            }"#,
        );
        let err = extract_image(resp).unwrap_err();
        assert!(err.is_refusal());
        assert_eq!(
            err.to_string(),
            "content blocked: Prompt was blocked due to safety"
        );
    }

    #[test]
    fn test_extract_image_safety_finish_reason() {
        let resp = parse(r#"{"candidates": [{"finishReason": "IMAGE_SAFETY"}]}"#);
        let err = extract_image(resp).unwrap_err();
        assert!(err.is_refusal());
        assert!(err.to_string().contains("IMAGE_SAFETY"));
    }

    #[test]
    fn test_extract_image_no_image_finish_reason() {
        let resp = parse(r#"{"candidates": [{"finishReason": "NO_IMAGE"}]}"#);
        let err = extract_image(resp).unwrap_err();
        assert!(matches!(err, EditorError::UnexpectedResponse(_)));
        assert!(!err.is_refusal());
    }

    #[test]
    fn test_extract_image_text_only_reply() {
        let resp = parse(
            r#"{"candidates": [{"content": {"parts": [{"text": "I can't edit that."}]}}]}"#,
        );
        let err = extract_image(resp).unwrap_err();
        assert_eq!(
            err.to_string(),
            "unexpected response: No image returned. Model replied: I can't edit that."
        );
    }

    #[test]
    fn test_extract_image_no_candidates() {
        let err = extract_image(parse("{}")).unwrap_err();
        assert!(matches!(err, EditorError::UnexpectedResponse(_)));
    }

    #[test]
    fn test_parse_error_status_mapping() {
        let headers = reqwest::header::HeaderMap::new();

        assert!(matches!(
            parse_error(403, "forbidden", &headers),
            EditorError::Auth(_)
        ));
        assert!(matches!(
            parse_error(404, "", &headers),
            EditorError::InvalidRequest(_)
        ));
        assert!(matches!(
            parse_error(429, "", &headers),
            EditorError::RateLimited { retry_after: None }
        ));

        let blocked = parse_error(
            400,
            r#"{"error": {"message": "Request blocked by safety settings"}}"#,
            &headers,
        );
        assert!(blocked.is_refusal());

        let other = parse_error(500, r#"{"error": {"message": "Internal"}}"#, &headers);
        assert_eq!(other.to_string(), "API error: 500 - Internal");
    }

    #[test]
    fn test_parse_error_reads_retry_after() {
        let mut headers = reqwest::header::HeaderMap::new();
        headers.insert(reqwest::header::RETRY_AFTER, "12".parse().unwrap());

        let err = parse_error(429, "slow down", &headers);
        assert_eq!(
            err.retry_after(),
            Some(std::time::Duration::from_secs(12))
        );
    }
}
