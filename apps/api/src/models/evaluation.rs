use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::lenient;

pub const UNKNOWN_SUMMARY: &str = "unknown";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", from = "Value")]
pub enum Confidence {
    #[default]
    Low,
    Medium,
    High,
}

impl From<Value> for Confidence {
    fn from(value: Value) -> Self {
        let label = value.as_str().unwrap_or_default().trim().to_ascii_lowercase();
        match label.as_str() {
            "high" => Confidence::High,
            "medium" | "mid" => Confidence::Medium,
            _ => Confidence::Low,
        }
    }
}

impl fmt::Display for Confidence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Confidence::Low => "low",
            Confidence::Medium => "medium",
            Confidence::High => "high",
        })
    }
}

/// A `{doc_id, line_refs, quote}` triple grounding a non-zero score.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EvidenceItem {
    #[serde(default, deserialize_with = "lenient::text")]
    pub doc_id: String,
    #[serde(default, deserialize_with = "lenient::string_list")]
    pub line_refs: Vec<String>,
    #[serde(default, deserialize_with = "lenient::text")]
    pub quote: String,
}

/// One scored dimension of an evaluation record (0–4 scale).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AxisScore {
    #[serde(default, deserialize_with = "lenient::axis_score")]
    pub score: u8,
    #[serde(default)]
    pub confidence: Confidence,
    #[serde(default, deserialize_with = "lenient::text")]
    pub summary: String,
    #[serde(default, deserialize_with = "lenient::null_as_default")]
    pub evidence: Vec<EvidenceItem>,
    /// `subsignals` and anything else the provider adds.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProfileMeta {
    #[serde(
        default,
        alias = "company_name",
        alias = "candidate_name",
        skip_serializing_if = "Option::is_none"
    )]
    pub subject_name: Option<String>,
    #[serde(default, deserialize_with = "lenient::string_list")]
    pub source_document_ids: Vec<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExtractionQuality {
    #[serde(default)]
    pub unknown_policy_applied: bool,
    #[serde(default, deserialize_with = "lenient::string_list")]
    pub notes: Vec<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Provenance attached by the orchestrator after extraction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SourceInfo {
    Web {
        organization: String,
        primary_url: String,
        urls: Vec<String>,
    },
    Documents {
        files: Vec<String>,
    },
    Text {
        characters: usize,
    },
}

/// Structured result of analysing one subject (an organization or an applicant).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EvaluationRecord {
    #[serde(default, deserialize_with = "lenient::text")]
    pub schema_version: String,
    #[serde(default, deserialize_with = "lenient::null_as_default")]
    pub profile_meta: ProfileMeta,
    #[serde(default, deserialize_with = "lenient::null_as_default")]
    pub scoring_axes: BTreeMap<String, AxisScore>,
    #[serde(default, deserialize_with = "lenient::null_as_default")]
    pub extraction_quality: ExtractionQuality,
    #[serde(rename = "_source", default, skip_serializing_if = "Option::is_none")]
    pub source: Option<SourceInfo>,
    #[serde(rename = "_id", default, skip_serializing_if = "Option::is_none")]
    pub storage_id: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl EvaluationRecord {
    pub fn subject_name(&self) -> Option<&str> {
        self.profile_meta.subject_name.as_deref()
    }

    /// Makes `score > 0 ⟺ evidence non-empty` hold for every axis.
    ///
    /// Positive scores without evidence are reset to the unknown state, zero
    /// scores drop any evidence they carried. Each correction is noted in
    /// `extraction_quality.notes`. Returns the number of axes changed.
    pub fn enforce_evidence_policy(&mut self) -> usize {
        let mut notes = Vec::new();

        for (name, axis) in self.scoring_axes.iter_mut() {
            if axis.score > 0 && axis.evidence.is_empty() {
                notes.push(format!(
                    "{name}: score {} reset to 0 (no evidence provided)",
                    axis.score
                ));
                axis.score = 0;
                axis.confidence = Confidence::Low;
                axis.summary = UNKNOWN_SUMMARY.to_string();
            } else if axis.score == 0 && !axis.evidence.is_empty() {
                notes.push(format!(
                    "{name}: {} evidence item(s) dropped from zero score",
                    axis.evidence.len()
                ));
                axis.evidence.clear();
            }
        }

        let changed = notes.len();
        if changed > 0 {
            self.extraction_quality.unknown_policy_applied = true;
            self.extraction_quality.notes.extend(notes);
        }
        changed
    }

    pub fn to_value(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }
}
