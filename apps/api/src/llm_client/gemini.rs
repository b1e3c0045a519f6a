//! Gemini REST client: `generateContent` plus the Files API used for PDF attachments.
//!
//! No call is retried here. A failed request is terminal for the stage that made it;
//! retry policy belongs to whoever sits above the pipeline.

use async_trait::async_trait;
use bytes::{Bytes, BytesMut};
use reqwest::{Client, Response};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::debug;

use super::{
    ContentPart, DocumentService, DocumentState, GenerationRequest, LlmError, ProviderOutput,
    RemoteDocumentHandle, TextGenerator,
};

const GEMINI_API_BASE: &str = "https://generativelanguage.googleapis.com";
/// The model used for all provider calls.
/// This is intentionally hardcoded to prevent accidental drift.
pub const MODEL: &str = "gemini-2.5-flash";
const PDF_MIME_TYPE: &str = "application/pdf";
const UPLOAD_BOUNDARY: &str = "culturefit-upload-boundary";

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest<'a> {
    contents: Vec<Content<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    system_instruction: Option<Content<'a>>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tools: Vec<serde_json::Value>,
    generation_config: GenerationConfig,
}

#[derive(Debug, Serialize)]
struct Content<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    role: Option<&'a str>,
    parts: Vec<Part<'a>>,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
enum Part<'a> {
    Text {
        text: &'a str,
    },
    File {
        #[serde(rename = "fileData")]
        file_data: FileData<'a>,
    },
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct FileData<'a> {
    mime_type: &'a str,
    file_uri: &'a str,
}

#[derive(Debug, Serialize)]
struct GenerationConfig {
    temperature: f32,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    usage_metadata: Option<UsageMetadata>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    content: Option<CandidateContent>,
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<ContentPart>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UsageMetadata {
    #[serde(default)]
    prompt_token_count: u32,
    #[serde(default)]
    candidates_token_count: u32,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RemoteFile {
    name: String,
    #[serde(default)]
    uri: String,
    #[serde(default)]
    display_name: Option<String>,
    /// int64 values arrive as JSON strings.
    #[serde(default)]
    size_bytes: Option<String>,
    #[serde(default)]
    state: DocumentState,
}

#[derive(Debug, Deserialize)]
struct UploadResponse {
    file: RemoteFile,
}

#[derive(Debug, Deserialize)]
struct ApiErrorEnvelope {
    error: ApiErrorBody,
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    message: String,
}

/// Gemini client shared by every pipeline stage.
#[derive(Clone)]
pub struct GeminiClient {
    client: Client,
    api_key: String,
    base_url: String,
}

impl GeminiClient {
    pub fn new(api_key: String) -> Self {
        Self {
            client: Client::builder()
                .timeout(std::time::Duration::from_secs(300))
                .build()
                .expect("Failed to build HTTP client"),
            api_key,
            base_url: GEMINI_API_BASE.to_string(),
        }
    }

    fn file_url(&self, name: &str) -> String {
        format!("{}/v1beta/{}", self.base_url, name)
    }

    /// Turns a non-2xx response into `LlmError::Api`, keeping the provider's message when present.
    async fn check(response: Response) -> Result<Response, LlmError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        let message = serde_json::from_str::<ApiErrorEnvelope>(&body)
            .map(|e| e.error.message)
            .unwrap_or(body);
        Err(LlmError::Api {
            status: status.as_u16(),
            message,
        })
    }
}

#[async_trait]
impl TextGenerator for GeminiClient {
    async fn generate(&self, request: GenerationRequest<'_>) -> Result<ProviderOutput, LlmError> {
        let body = build_generate_request(&request);
        let url = format!(
            "{}/v1beta/models/{}:generateContent",
            self.base_url, MODEL
        );

        let response = self
            .client
            .post(&url)
            .header("x-goog-api-key", &self.api_key)
            .json(&body)
            .send()
            .await?;
        let response: GenerateContentResponse = Self::check(response).await?.json().await?;

        if let Some(usage) = &response.usage_metadata {
            debug!(
                "Gemini call succeeded: prompt_tokens={}, output_tokens={}, attachments={}",
                usage.prompt_token_count,
                usage.candidates_token_count,
                request.attachments.len()
            );
        }

        let candidate = response
            .candidates
            .into_iter()
            .next()
            .ok_or(LlmError::EmptyContent)?;
        let parts = candidate.content.map(|c| c.parts).unwrap_or_default();
        if parts.is_empty() {
            debug!("Gemini returned no parts (finish_reason={:?})", candidate.finish_reason);
            return Err(LlmError::EmptyContent);
        }

        Ok(ProviderOutput::Wrapped(parts))
    }
}

#[async_trait]
impl DocumentService for GeminiClient {
    async fn upload(
        &self,
        bytes: Bytes,
        display_name: &str,
    ) -> Result<RemoteDocumentHandle, LlmError> {
        let size = bytes.len();
        let body = multipart_body(&bytes, display_name)?;

        let response = self
            .client
            .post(format!("{}/upload/v1beta/files?uploadType=multipart", self.base_url))
            .header("x-goog-api-key", &self.api_key)
            .header("X-Goog-Upload-Protocol", "multipart")
            .header(
                "content-type",
                format!("multipart/related; boundary={UPLOAD_BOUNDARY}"),
            )
            .body(body)
            .send()
            .await?;
        let uploaded: UploadResponse = Self::check(response).await?.json().await?;
        let file = uploaded.file;

        debug!(
            "Uploaded {} ({} bytes) as {} [{}]",
            display_name, size, file.name, file.state
        );

        Ok(RemoteDocumentHandle {
            size_bytes: file
                .size_bytes
                .as_deref()
                .and_then(|s| s.parse().ok())
                .or(Some(size as u64)),
            display_name: file.display_name.unwrap_or_else(|| display_name.to_string()),
            name: file.name,
            uri: file.uri,
            state: file.state,
        })
    }

    async fn get_status(&self, handle: &RemoteDocumentHandle) -> Result<DocumentState, LlmError> {
        let response = self
            .client
            .get(self.file_url(&handle.name))
            .header("x-goog-api-key", &self.api_key)
            .send()
            .await?;
        let file: RemoteFile = Self::check(response).await?.json().await?;
        Ok(file.state)
    }

    async fn delete(&self, handle: &RemoteDocumentHandle) -> Result<(), LlmError> {
        let response = self
            .client
            .delete(self.file_url(&handle.name))
            .header("x-goog-api-key", &self.api_key)
            .send()
            .await?;
        Self::check(response).await?;
        Ok(())
    }
}

/// Attached documents go first, the prompt text last.
fn build_generate_request<'a>(request: &GenerationRequest<'a>) -> GenerateContentRequest<'a> {
    let mut parts: Vec<Part<'a>> = request
        .attachments
        .iter()
        .map(|handle| Part::File {
            file_data: FileData {
                mime_type: PDF_MIME_TYPE,
                file_uri: &handle.uri,
            },
        })
        .collect();
    parts.push(Part::Text {
        text: request.prompt,
    });

    GenerateContentRequest {
        contents: vec![Content {
            role: Some("user"),
            parts,
        }],
        system_instruction: request.system.map(|text| Content {
            role: None,
            parts: vec![Part::Text { text }],
        }),
        tools: if request.url_context {
            vec![json!({ "url_context": {} })]
        } else {
            Vec::new()
        },
        generation_config: GenerationConfig { temperature: 0.0 },
    }
}

/// Builds a single-request `multipart/related` body: JSON metadata, then the PDF bytes.
fn multipart_body(bytes: &[u8], display_name: &str) -> Result<Bytes, LlmError> {
    let metadata = serde_json::to_vec(&json!({ "file": { "display_name": display_name } }))?;

    let mut body = BytesMut::with_capacity(bytes.len() + metadata.len() + 256);
    body.extend_from_slice(
        format!("--{UPLOAD_BOUNDARY}\r\nContent-Type: application/json; charset=UTF-8\r\n\r\n")
            .as_bytes(),
    );
    body.extend_from_slice(&metadata);
    body.extend_from_slice(
        format!("\r\n--{UPLOAD_BOUNDARY}\r\nContent-Type: {PDF_MIME_TYPE}\r\n\r\n").as_bytes(),
    );
    body.extend_from_slice(bytes);
    body.extend_from_slice(format!("\r\n--{UPLOAD_BOUNDARY}--\r\n").as_bytes());

    Ok(body.freeze())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn handle(uri: &str) -> RemoteDocumentHandle {
        RemoteDocumentHandle {
            name: "files/abc".to_string(),
            uri: uri.to_string(),
            display_name: "resume.pdf".to_string(),
            state: DocumentState::Active,
            size_bytes: None,
        }
    }

    #[test]
    fn test_generate_request_puts_files_before_prompt() {
        let attachments = vec![handle("uri://one"), handle("uri://two")];
        let request = GenerationRequest::new("system text", "prompt text")
            .with_attachments(&attachments);
        let body = serde_json::to_value(build_generate_request(&request)).unwrap();

        let parts = body["contents"][0]["parts"].as_array().unwrap();
        assert_eq!(parts.len(), 3);
        assert_eq!(parts[0]["fileData"]["fileUri"], "uri://one");
        assert_eq!(parts[0]["fileData"]["mimeType"], "application/pdf");
        assert_eq!(parts[1]["fileData"]["fileUri"], "uri://two");
        assert_eq!(parts[2]["text"], "prompt text");
        assert_eq!(body["systemInstruction"]["parts"][0]["text"], "system text");
        assert_eq!(body["generationConfig"]["temperature"], 0.0);
        assert!(body.get("tools").is_none());
    }

    #[test]
    fn test_url_context_adds_tool() {
        let request = GenerationRequest::new("s", "p").with_url_context();
        let body = serde_json::to_value(build_generate_request(&request)).unwrap();
        assert!(body["tools"][0].get("url_context").is_some());
    }

    #[test]
    fn test_multipart_body_layout() {
        let body = multipart_body(b"%PDF-1.7", "resume.pdf").unwrap();
        let text = String::from_utf8_lossy(&body);
        assert!(text.starts_with(&format!("--{UPLOAD_BOUNDARY}\r\n")));
        assert!(text.contains(r#"{"file":{"display_name":"resume.pdf"}}"#));
        assert!(text.contains("Content-Type: application/pdf\r\n\r\n%PDF-1.7"));
        assert!(text.ends_with(&format!("--{UPLOAD_BOUNDARY}--\r\n")));
    }

    #[test]
    fn test_remote_file_parses_string_size() {
        let json = r#"{"file": {"name": "files/x1", "uri": "https://g/files/x1",
            "displayName": "portfolio.pdf", "sizeBytes": "2048", "state": "PROCESSING"}}"#;
        let parsed: UploadResponse = serde_json::from_str(json).unwrap();
        assert_eq!(parsed.file.name, "files/x1");
        assert_eq!(parsed.file.size_bytes.as_deref(), Some("2048"));
        assert_eq!(parsed.file.state, DocumentState::Processing);
    }

    #[test]
    fn test_generate_response_parses_candidate_parts() {
        let json = r#"{"candidates": [{"content": {"parts": [{"text": "{}"}], "role": "model"},
            "finishReason": "STOP"}], "usageMetadata": {"promptTokenCount": 10, "candidatesTokenCount": 2}}"#;
        let parsed: GenerateContentResponse = serde_json::from_str(json).unwrap();
        let parts = &parsed.candidates[0].content.as_ref().unwrap().parts;
        assert_eq!(parts[0].text.as_deref(), Some("{}"));
        assert_eq!(parsed.usage_metadata.unwrap().prompt_token_count, 10);
    }
}
