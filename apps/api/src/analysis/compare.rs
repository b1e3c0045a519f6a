//! Comparison stage. The provider writes the per-axis narrative; the numbers
//! (snapped scores, overall score, confidence, band) are recomputed here.

use std::collections::{BTreeMap, HashMap};

use serde_json::{json, Value};
use tracing::{info, warn};

use super::error::{PipelineError, Stage};
use super::output::extract_as;
use super::prompts::{compare_prompt, COMPARE_ROLE};
use crate::llm_client::prompts::system_message;
use crate::llm_client::{GenerationRequest, TextGenerator};
use crate::models::comparison::{AxisComparison, AxisStatus, ComparisonMeta, ComparisonRecord, ScoreBand};
use crate::models::evaluation::EvaluationRecord;

pub const SHARED_AXES: [&str; 6] = [
    "technical_fit",
    "execution_style",
    "collaboration_style",
    "growth_learning_orientation",
    "product_user_impact_orientation",
    "ops_quality_responsibility",
];

const UNKNOWN_AXIS_PENALTY: f64 = 0.10;
const ONE_SIDED_AXIS_PENALTY: f64 = 0.05;
const SCORE_STEP: f64 = 25.0;

pub async fn compare_records(
    generator: &dyn TextGenerator,
    organization: &EvaluationRecord,
    applicant: &EvaluationRecord,
) -> Result<ComparisonRecord, PipelineError> {
    let organization_name = organization.subject_name().map(str::to_string);
    let applicant_name = applicant.subject_name().map(str::to_string);
    info!(
        "Comparing '{}' with '{}'",
        organization_name.as_deref().unwrap_or("unknown organization"),
        applicant_name.as_deref().unwrap_or("unknown applicant")
    );

    let system = system_message(COMPARE_ROLE);
    let prompt = compare_prompt(&organization.to_value(), &applicant.to_value(), &SHARED_AXES);
    let output = generator.generate(GenerationRequest::new(&system, &prompt)).await?;
    let mut record: ComparisonRecord = extract_as(output, Stage::Compare)?;

    finalize_comparison(&mut record, &axis_weights(organization));
    record.meta = ComparisonMeta {
        organization_name,
        applicant_name,
    };
    info!(
        "Comparison done: match_score={:?} band={} confidence={:.2}",
        record.overall.match_score, record.overall.score_band, record.overall.confidence
    );
    Ok(record)
}

/// Positive `axis_weights` declared on the organization record, if any.
pub fn axis_weights(organization: &EvaluationRecord) -> HashMap<String, f64> {
    organization
        .extra
        .get("axis_weights")
        .and_then(Value::as_object)
        .map(|weights| {
            weights
                .iter()
                .filter_map(|(axis, w)| w.as_f64().filter(|w| *w > 0.0).map(|w| (axis.clone(), w)))
                .collect()
        })
        .unwrap_or_default()
}

/// Normalises provider output into the comparison contract:
/// exactly the shared axes, scores in {0, 25, 50, 75, 100}, no positive score
/// without evidence, and overall numbers derived from the axes.
pub fn finalize_comparison(record: &mut ComparisonRecord, weights: &HashMap<String, f64>) {
    let mut axes = BTreeMap::new();
    for name in SHARED_AXES {
        let mut axis = record.axes.remove(name).unwrap_or_else(|| {
            warn!("Comparison is missing axis '{name}'; marking unknown");
            AxisComparison::unknown()
        });
        normalize_axis(name, &mut axis);
        axes.insert(name.to_string(), axis);
    }
    if !record.axes.is_empty() {
        let extra: Vec<&String> = record.axes.keys().collect();
        warn!("Dropping non-shared comparison axes: {extra:?}");
    }
    record.axes = axes;

    let unknown = record.axes.values().filter(|a| a.status == AxisStatus::Unknown).count();
    let one_sided = record
        .axes
        .values()
        .filter(|a| a.status == AxisStatus::Scored && a.is_one_sided())
        .count();

    let overall = &mut record.overall;
    overall.match_score = weighted_score(&record.axes, weights);
    overall.confidence = confidence(unknown, one_sided);
    overall.score_band = ScoreBand::for_score(overall.match_score);
    overall.extra.insert("unknown_axes".to_string(), json!(unknown));
    overall.extra.insert("one_sided_axes".to_string(), json!(one_sided));
}

fn normalize_axis(name: &str, axis: &mut AxisComparison) {
    if axis.status == AxisStatus::Scored {
        match axis.score {
            None => {
                warn!("Axis '{name}' is scored without a score; marking unknown");
                axis.status = AxisStatus::Unknown;
            }
            Some(score) if score > 0 && !axis.has_any_evidence() => {
                warn!("Axis '{name}' scored {score} without evidence; marking unknown");
                axis.status = AxisStatus::Unknown;
            }
            Some(score) => axis.score = Some(snap_score(score)),
        }
    }
    if axis.status == AxisStatus::Unknown {
        axis.score = None;
    }
}

fn snap_score(score: u32) -> u32 {
    ((score.min(100) as f64 / SCORE_STEP).round() * SCORE_STEP) as u32
}

/// Weighted mean over scored axes; axes without a declared weight count 1.
fn weighted_score(axes: &BTreeMap<String, AxisComparison>, weights: &HashMap<String, f64>) -> Option<u32> {
    let (sum, total) = axes
        .iter()
        .filter(|(_, a)| a.status == AxisStatus::Scored)
        .filter_map(|(name, a)| a.score.map(|s| (name, s)))
        .fold((0.0, 0.0), |(sum, total), (name, score)| {
            let w = weights.get(name).copied().unwrap_or(1.0);
            (sum + w * score as f64, total + w)
        });

    (total > 0.0).then(|| (sum / total).round() as u32)
}

fn confidence(unknown: usize, one_sided: usize) -> f64 {
    let raw = 1.0 - UNKNOWN_AXIS_PENALTY * unknown as f64 - ONE_SIDED_AXIS_PENALTY * one_sided as f64;
    (raw.clamp(0.0, 1.0) * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::testing::{fixtures, ScriptedGenerator};
    use serde_json::json;

    fn evidence() -> Value {
        json!([{"doc_id": "D1", "line_refs": ["L1"], "quote": "q"}])
    }

    fn comparison(value: Value) -> ComparisonRecord {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_confidence_penalises_unknown_and_one_sided_axes() {
        let mut record = comparison(json!({
            "axis_comparisons": {
                "technical_fit": {"status": "scored", "axis_score": 100,
                    "company_evidence": evidence(), "developer_evidence": evidence()},
                "execution_style": {"status": "scored", "axis_score": 50,
                    "company_evidence": evidence(), "developer_evidence": evidence()},
                "collaboration_style": {"status": "scored", "axis_score": 75,
                    "company_evidence": evidence(), "developer_evidence": evidence()},
                "growth_learning_orientation": {"status": "scored", "axis_score": 25,
                    "company_evidence": evidence()},
                "product_user_impact_orientation": {"status": "unknown"},
                "ops_quality_responsibility": {"status": "unknown"}
            }
        }));

        finalize_comparison(&mut record, &HashMap::new());

        assert_eq!(record.overall.confidence, 0.75);
        // (100 + 50 + 75 + 25) / 4
        assert_eq!(record.overall.match_score, Some(63));
        assert_eq!(record.overall.score_band, ScoreBand::Medium);
    }

    #[test]
    fn test_missing_and_extra_axes_are_normalised() {
        let mut record = comparison(json!({
            "axis_comparisons": {
                "technical_fit": {"status": "scored", "axis_score": 60,
                    "company_evidence": evidence(), "developer_evidence": evidence()},
                "leadership": {"status": "scored", "axis_score": 100}
            }
        }));

        finalize_comparison(&mut record, &HashMap::new());

        assert_eq!(record.axes.len(), SHARED_AXES.len());
        assert!(!record.axes.contains_key("leadership"));
        assert_eq!(record.axes["technical_fit"].score, Some(50));
        assert_eq!(record.axes["execution_style"].status, AxisStatus::Unknown);
        assert_eq!(record.overall.match_score, Some(50));
        // five unknown axes
        assert_eq!(record.overall.confidence, 0.5);
    }

    #[test]
    fn test_positive_score_without_evidence_becomes_unknown() {
        let mut record = comparison(json!({
            "axis_comparisons": {
                "technical_fit": {"status": "scored", "axis_score": 75}
            }
        }));
        finalize_comparison(&mut record, &HashMap::new());

        let axis = &record.axes["technical_fit"];
        assert_eq!(axis.status, AxisStatus::Unknown);
        assert_eq!(axis.score, None);
        assert_eq!(record.overall.match_score, None);
        assert_eq!(record.overall.score_band, ScoreBand::Unknown);
        assert_eq!(record.overall.confidence, 0.4);
    }

    #[test]
    fn test_axis_weights_from_organization_record() {
        let organization: EvaluationRecord = serde_json::from_value(json!({
            "axis_weights": {"technical_fit": 3, "execution_style": 1, "bogus": -1}
        }))
        .unwrap();
        let weights = axis_weights(&organization);
        assert_eq!(weights.len(), 2);

        let mut record = comparison(json!({
            "axis_comparisons": {
                "technical_fit": {"status": "scored", "axis_score": 100,
                    "company_evidence": evidence(), "developer_evidence": evidence()},
                "execution_style": {"status": "scored", "axis_score": 0}
            }
        }));
        finalize_comparison(&mut record, &weights);
        // (3 * 100 + 1 * 0) / 4
        assert_eq!(record.overall.match_score, Some(75));
        assert_eq!(record.overall.score_band, ScoreBand::High);
    }

    #[test]
    fn test_confidence_bounds() {
        assert_eq!(confidence(0, 0), 1.0);
        assert_eq!(confidence(6, 0), 0.4);
        assert_eq!(confidence(0, 6), 0.7);
        assert_eq!(confidence(6, 6), 0.1);
        assert_eq!(confidence(12, 0), 0.0);
    }

    #[tokio::test]
    async fn test_compare_records_attaches_names() {
        let generator = ScriptedGenerator::new().reply("## Organization Profile", &fixtures::comparison_json());
        let organization: EvaluationRecord =
            serde_json::from_str(&fixtures::organization_record_json("토스")).unwrap();
        let applicant: EvaluationRecord = serde_json::from_str(&fixtures::applicant_record_json("Kim")).unwrap();

        let record = compare_records(&generator, &organization, &applicant).await.unwrap();

        assert_eq!(record.meta.organization_name.as_deref(), Some("토스"));
        assert_eq!(record.meta.applicant_name.as_deref(), Some("Kim"));
        assert_eq!(record.axes.len(), 6);
        assert!(generator.calls()[0].prompt.contains("ops_quality_responsibility"));
    }
}
