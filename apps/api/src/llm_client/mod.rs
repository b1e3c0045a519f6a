/// LLM Client: the single point of entry for every text-generation and
/// remote-document call in the analysis pipeline.
///
/// ARCHITECTURAL RULE: No other module may call the provider API directly.
/// Pipeline stages depend on the `TextGenerator` and `DocumentService` traits;
/// `GeminiClient` is the production implementation of both.
use std::fmt;

use async_trait::async_trait;
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub mod gemini;
pub mod prompts;

pub use gemini::GeminiClient;

#[derive(Debug, Error)]
pub enum LlmError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("JSON parse error: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("LLM returned empty content")]
    EmptyContent,
}

/// Processing state of a document held by the remote multimodal service.
/// Only `Active` documents may be attached to a generation request.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE", from = "String")]
pub enum DocumentState {
    #[default]
    Processing,
    Active,
    Failed,
}

impl From<String> for DocumentState {
    fn from(value: String) -> Self {
        match value.to_ascii_uppercase().as_str() {
            "ACTIVE" => DocumentState::Active,
            "FAILED" => DocumentState::Failed,
            // STATE_UNSPECIFIED and anything new is treated as not yet usable
            _ => DocumentState::Processing,
        }
    }
}

impl fmt::Display for DocumentState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            DocumentState::Processing => "PROCESSING",
            DocumentState::Active => "ACTIVE",
            DocumentState::Failed => "FAILED",
        };
        f.write_str(label)
    }
}

/// A document uploaded to the remote multimodal service.
/// Owned by exactly one pipeline call; see `analysis::documents::DocumentLease`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RemoteDocumentHandle {
    /// Remote identifier, e.g. `files/abc123`.
    pub name: String,
    pub uri: String,
    pub display_name: String,
    pub state: DocumentState,
    pub size_bytes: Option<u64>,
}

impl RemoteDocumentHandle {
    pub fn is_usable(&self) -> bool {
        self.state == DocumentState::Active
    }
}

/// One generation call: instructions, prompt text and the documents attached to it.
#[derive(Debug, Clone, Copy, Default)]
pub struct GenerationRequest<'a> {
    pub system: Option<&'a str>,
    pub prompt: &'a str,
    pub attachments: &'a [RemoteDocumentHandle],
    /// Lets the model read URLs mentioned in the prompt itself.
    pub url_context: bool,
}

impl<'a> GenerationRequest<'a> {
    pub fn new(system: &'a str, prompt: &'a str) -> Self {
        Self {
            system: Some(system),
            prompt,
            ..Default::default()
        }
    }

    pub fn with_attachments(mut self, attachments: &'a [RemoteDocumentHandle]) -> Self {
        self.attachments = attachments;
        self
    }

    pub fn with_url_context(mut self) -> Self {
        self.url_context = true;
        self
    }
}

/// One text part of a provider response.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ContentPart {
    #[serde(default)]
    pub text: Option<String>,
    /// Reasoning parts are never part of the answer.
    #[serde(default)]
    pub thought: bool,
}

/// Whatever the provider handed back, resolved to plain text exactly once
/// before it reaches the output extractor.
#[derive(Debug, Clone)]
pub enum ProviderOutput {
    PlainText(String),
    Wrapped(Vec<ContentPart>),
}

impl ProviderOutput {
    pub fn into_text(self) -> String {
        match self {
            ProviderOutput::PlainText(text) => text,
            ProviderOutput::Wrapped(parts) => parts
                .into_iter()
                .filter(|p| !p.thought)
                .filter_map(|p| p.text)
                .collect::<Vec<_>>()
                .join(""),
        }
    }
}

#[async_trait]
pub trait TextGenerator: Send + Sync {
    async fn generate(&self, request: GenerationRequest<'_>) -> Result<ProviderOutput, LlmError>;
}

/// Remote multimodal document service: upload, poll, delete.
#[async_trait]
pub trait DocumentService: Send + Sync {
    async fn upload(&self, bytes: Bytes, display_name: &str)
        -> Result<RemoteDocumentHandle, LlmError>;

    async fn get_status(&self, handle: &RemoteDocumentHandle) -> Result<DocumentState, LlmError>;

    async fn delete(&self, handle: &RemoteDocumentHandle) -> Result<(), LlmError>;
}
