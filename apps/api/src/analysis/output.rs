//! Output extractor: recovers exactly one JSON object from free-form provider text.
//!
//! Steps, in order:
//! 1. resolve the provider output to plain text
//! 2. keep the interior of the first ```json fence, else of the first ``` fence
//! 3. trim
//! 4. drop everything before the first `{`
//! 5. parse one value and ignore whatever follows it

use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

use super::error::{PipelineError, Stage};
use crate::llm_client::ProviderOutput;

const JSON_FENCE: &str = "```json";
const FENCE: &str = "```";

/// Parses provider output into a JSON object.
pub fn extract_object(output: ProviderOutput, stage: Stage) -> Result<Map<String, Value>, PipelineError> {
    extract_from_text(&output.into_text(), stage)
}

/// Parses provider output straight into a typed record.
pub fn extract_as<T: DeserializeOwned>(output: ProviderOutput, stage: Stage) -> Result<T, PipelineError> {
    let object = extract_object(output, stage)?;
    serde_json::from_value(Value::Object(object)).map_err(|e| PipelineError::MalformedOutput {
        stage,
        message: format!("JSON object does not match the expected record shape: {e}"),
    })
}

pub fn extract_from_text(raw: &str, stage: Stage) -> Result<Map<String, Value>, PipelineError> {
    let malformed = |message: String| PipelineError::MalformedOutput { stage, message };

    let text = unfence(raw).trim();
    let start = text
        .find('{')
        .ok_or_else(|| malformed(format!("no JSON object found in: {}", preview(text))))?;

    let first = serde_json::Deserializer::from_str(&text[start..])
        .into_iter::<Value>()
        .next()
        .ok_or_else(|| malformed("no JSON object found".to_string()))?
        .map_err(|e| malformed(format!("invalid JSON ({e}) in: {}", preview(&text[start..]))))?;

    match first {
        Value::Object(object) => Ok(object),
        other => Err(malformed(format!("expected a JSON object, got {other}"))),
    }
}

/// Interior of the first json-tagged fence, else of the first plain fence.
/// Text without a closed fence is returned unchanged.
fn unfence(text: &str) -> &str {
    let (open, skip) = match text.find(JSON_FENCE) {
        Some(i) => (i, JSON_FENCE.len()),
        None => match text.find(FENCE) {
            Some(i) => (i, FENCE.len()),
            None => return text,
        },
    };
    let body = &text[open + skip..];
    match body.find(FENCE) {
        Some(end) => &body[..end],
        None => text,
    }
}

fn preview(text: &str) -> String {
    const MAX_CHARS: usize = 120;
    let mut out: String = text.chars().take(MAX_CHARS).collect();
    if text.chars().count() > MAX_CHARS {
        out.push('…');
    }
    out
}
