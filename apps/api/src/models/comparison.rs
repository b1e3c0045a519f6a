use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::evaluation::EvidenceItem;
use super::lenient;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", from = "Value")]
pub enum AxisStatus {
    Scored,
    #[default]
    Unknown,
}

impl From<Value> for AxisStatus {
    fn from(value: Value) -> Self {
        match value.as_str().map(|s| s.trim().to_ascii_lowercase()) {
            Some(s) if s == "scored" => AxisStatus::Scored,
            _ => AxisStatus::Unknown,
        }
    }
}

/// Match band for the overall score: low (0–39), medium (40–69), high (70–100).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", from = "Value")]
pub enum ScoreBand {
    Low,
    Medium,
    High,
    #[default]
    Unknown,
}

impl ScoreBand {
    pub fn for_score(score: Option<u32>) -> Self {
        match score {
            None => ScoreBand::Unknown,
            Some(s) if s >= 70 => ScoreBand::High,
            Some(s) if s >= 40 => ScoreBand::Medium,
            Some(_) => ScoreBand::Low,
        }
    }
}

impl From<Value> for ScoreBand {
    fn from(value: Value) -> Self {
        match value.as_str().map(|s| s.trim().to_ascii_lowercase()).as_deref() {
            Some("low") => ScoreBand::Low,
            Some("medium") => ScoreBand::Medium,
            Some("high") => ScoreBand::High,
            _ => ScoreBand::Unknown,
        }
    }
}

impl fmt::Display for ScoreBand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ScoreBand::Low => "low",
            ScoreBand::Medium => "medium",
            ScoreBand::High => "high",
            ScoreBand::Unknown => "unknown",
        })
    }
}

/// One shared axis of a comparison. `score` is one of 0/25/50/75/100 when scored.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AxisComparison {
    #[serde(default)]
    pub status: AxisStatus,
    #[serde(default, alias = "axis_score", deserialize_with = "lenient::optional_percent")]
    pub score: Option<u32>,
    #[serde(default, deserialize_with = "lenient::unit_interval")]
    pub confidence: f64,
    #[serde(default, deserialize_with = "lenient::text")]
    pub summary: String,
    #[serde(default, deserialize_with = "lenient::null_as_default")]
    pub company_evidence: Vec<EvidenceItem>,
    #[serde(default, deserialize_with = "lenient::null_as_default")]
    pub developer_evidence: Vec<EvidenceItem>,
    /// `rationale` and other narrative fields.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl AxisComparison {
    pub fn unknown() -> Self {
        Self::default()
    }

    pub fn has_any_evidence(&self) -> bool {
        !self.company_evidence.is_empty() || !self.developer_evidence.is_empty()
    }

    pub fn is_one_sided(&self) -> bool {
        self.company_evidence.is_empty() != self.developer_evidence.is_empty()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ComparisonMeta {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub organization_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub applicant_name: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OverallScore {
    #[serde(default, deserialize_with = "lenient::optional_percent")]
    pub match_score: Option<u32>,
    #[serde(default, deserialize_with = "lenient::unit_interval")]
    pub confidence: f64,
    #[serde(default)]
    pub score_band: ScoreBand,
    #[serde(default, alias = "overall_notes", deserialize_with = "lenient::text")]
    pub notes: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Organization-versus-applicant comparison over the shared axes.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ComparisonRecord {
    #[serde(rename = "_meta", default)]
    pub meta: ComparisonMeta,
    #[serde(
        rename = "axis_comparisons",
        default,
        alias = "axes",
        deserialize_with = "lenient::null_as_default"
    )]
    pub axes: BTreeMap<String, AxisComparison>,
    #[serde(default, deserialize_with = "lenient::null_as_default")]
    pub overall: OverallScore,
    #[serde(rename = "_id", default, skip_serializing_if = "Option::is_none")]
    pub storage_id: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl ComparisonRecord {
    pub fn to_value(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }
}
