//! Tolerant field decoders for provider-produced JSON.
//!
//! The provider is asked for a fixed schema but routinely drifts on scalar types
//! (`"3"` for `3`, a single string for a list, `null` for an empty list). These
//! helpers accept the common drifts instead of rejecting the whole record.

use serde::{Deserialize, Deserializer};
use serde_json::Value;

/// Accepts a list of scalars, a single scalar, or null.
pub fn string_list<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(match value {
        Value::Null => Vec::new(),
        Value::Array(items) => items.into_iter().filter_map(scalar_to_string).collect(),
        other => scalar_to_string(other).into_iter().collect(),
    })
}

/// Any scalar as text; null becomes the empty string.
pub fn text<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(scalar_to_string(value).unwrap_or_default())
}

/// `null` decodes as the type's default instead of failing.
pub fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// Integer axis score clamped to 0–4. Non-numeric values count as 0.
pub fn axis_score<'de, D>(deserializer: D) -> Result<u8, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(as_f64(&value)
        .map(|n| n.round().clamp(0.0, 4.0) as u8)
        .unwrap_or(0))
}

/// Optional 0–100 score. `null`, `"unknown"` and other non-numbers become `None`.
pub fn optional_percent<'de, D>(deserializer: D) -> Result<Option<u32>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(as_f64(&value).map(|n| n.round().clamp(0.0, 100.0) as u32))
}

/// Fraction clamped to [0, 1]. Non-numbers become 0.
pub fn unit_interval<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(as_f64(&value).map(|n| n.clamp(0.0, 1.0)).unwrap_or(0.0))
}

fn as_f64(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }
    .filter(|n| n.is_finite())
}

fn scalar_to_string(value: Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Deserialize)]
    struct Sample {
        #[serde(default, deserialize_with = "string_list")]
        refs: Vec<String>,
        #[serde(default, deserialize_with = "axis_score")]
        score: u8,
        #[serde(default, deserialize_with = "optional_percent")]
        percent: Option<u32>,
        #[serde(default, deserialize_with = "unit_interval")]
        fraction: f64,
        #[serde(default, deserialize_with = "text")]
        label: String,
        #[serde(default, deserialize_with = "null_as_default")]
        items: Vec<u32>,
    }

    fn sample(json: &str) -> Sample {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn test_string_list_accepts_single_values_and_numbers() {
        assert_eq!(sample(r#"{"refs": "L12"}"#).refs, vec!["L12"]);
        assert_eq!(sample(r#"{"refs": [3, "L4"]}"#).refs, vec!["3", "L4"]);
        assert!(sample(r#"{"refs": null}"#).refs.is_empty());
        assert!(sample("{}").refs.is_empty());
    }

    #[test]
    fn test_axis_score_clamps_and_parses_strings() {
        assert_eq!(sample(r#"{"score": 7}"#).score, 4);
        assert_eq!(sample(r#"{"score": -2}"#).score, 0);
        assert_eq!(sample(r#"{"score": "3"}"#).score, 3);
        assert_eq!(sample(r#"{"score": "unknown"}"#).score, 0);
    }

    #[test]
    fn test_optional_percent_treats_unknown_as_none() {
        assert_eq!(sample(r#"{"percent": "unknown"}"#).percent, None);
        assert_eq!(sample(r#"{"percent": 75}"#).percent, Some(75));
        assert_eq!(sample(r#"{"percent": 140}"#).percent, Some(100));
    }

    #[test]
    fn test_text_and_null_defaults() {
        let p = sample(r#"{"label": 12, "items": null}"#);
        assert_eq!(p.label, "12");
        assert!(p.items.is_empty());
        assert_eq!(sample(r#"{"items": [1, 2]}"#).items, vec![1, 2]);
    }

    #[test]
    fn test_unit_interval_clamps() {
        assert_eq!(sample(r#"{"fraction": 1.7}"#).fraction, 1.0);
        assert_eq!(sample(r#"{"fraction": "0.4"}"#).fraction, 0.4);
        assert_eq!(sample(r#"{"fraction": "high"}"#).fraction, 0.0);
    }
}
