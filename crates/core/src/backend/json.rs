//! # JSON Extraction
//!
//! Backends return text that is *supposed* to be JSON. These helpers strip
//! markdown fences, parse into a typed contract, and provide lenient serde
//! adapters for the loosely typed fields models like to produce.

use std::sync::LazyLock;

use regex::Regex;
use serde::de::DeserializeOwned;

use crate::error::MalformedResponse;

static CODE_FENCE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"```(?:json|JSON)?").expect("code fence pattern is valid"));

/// Remove markdown code fences and surrounding whitespace
pub fn strip_code_fences(raw: &str) -> String {
    CODE_FENCE.replace_all(raw, "").trim().to_string()
}

/// Parse a backend payload into `T`, tolerating markdown fences
pub fn parse_json<T: DeserializeOwned>(
    raw: &str,
    expected: &'static str,
) -> Result<T, MalformedResponse> {
    let cleaned = strip_code_fences(raw);
    serde_json::from_str(&cleaned).map_err(|e| MalformedResponse::new(expected, e.to_string()))
}

/// Lenient `deserialize_with` adapters
pub mod lenient {
    use std::collections::BTreeMap;

    use serde::{Deserialize, Deserializer};
    use serde_json::Value;

    /// Confidence used whenever a payload omits or garbles its own
    pub const DEFAULT_CONFIDENCE: u8 = 50;

    /// Read a 0-100 score from a number, float or `"87%"` string
    pub fn coerce_percent(value: &Value) -> Option<u8> {
        let number = match value {
            Value::Number(n) => n.as_f64(),
            Value::String(s) => s.trim().trim_end_matches('%').trim().parse::<f64>().ok(),
            _ => None,
        }?;
        if !number.is_finite() {
            return None;
        }
        Some(number.round().clamp(0.0, 100.0) as u8)
    }

    /// Required-ish score; unreadable values fall back to [`DEFAULT_CONFIDENCE`]
    pub fn percent<'de, D>(deserializer: D) -> Result<u8, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = Value::deserialize(deserializer)?;
        Ok(coerce_percent(&value).unwrap_or(DEFAULT_CONFIDENCE))
    }

    /// Optional score; unreadable values become `None`
    pub fn percent_opt<'de, D>(deserializer: D) -> Result<Option<u8>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = Value::deserialize(deserializer)?;
        Ok(coerce_percent(&value))
    }

    fn stringify(value: Value) -> Option<String> {
        match value {
            Value::Null => None,
            Value::String(s) => Some(s),
            Value::Bool(b) => Some(b.to_string()),
            Value::Number(n) => Some(n.to_string()),
            other => Some(other.to_string()),
        }
    }

    fn object_to_strings(value: Value) -> Option<BTreeMap<String, String>> {
        match value {
            Value::Object(map) => Some(
                map.into_iter()
                    .filter_map(|(k, v)| stringify(v).map(|v| (k, v)))
                    .collect(),
            ),
            _ => None,
        }
    }

    /// Object whose scalar values are stringified; anything else is empty
    pub fn string_map<'de, D>(deserializer: D) -> Result<BTreeMap<String, String>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = Value::deserialize(deserializer)?;
        Ok(object_to_strings(value).unwrap_or_default())
    }

    /// Optional variant of [`string_map`]
    pub fn string_map_opt<'de, D>(
        deserializer: D,
    ) -> Result<Option<BTreeMap<String, String>>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = Value::deserialize(deserializer)?;
        Ok(object_to_strings(value))
    }

    /// A list of strings; a lone string becomes a one-element list
    pub fn string_list<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = Value::deserialize(deserializer)?;
        Ok(match value {
            Value::Array(items) => items.into_iter().filter_map(stringify).collect(),
            other => stringify(other).into_iter().collect(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::lenient::*;
    use super::*;
    use serde::Deserialize;
    use serde_json::json;
    use std::collections::BTreeMap;

    #[derive(Debug, Deserialize)]
    struct Sample {
        #[serde(default = "default_confidence", deserialize_with = "percent")]
        confidence: u8,
        #[serde(default, deserialize_with = "percent_opt")]
        risk: Option<u8>,
        #[serde(default, deserialize_with = "string_map_opt")]
        data: Option<BTreeMap<String, String>>,
        #[serde(default, deserialize_with = "string_list")]
        notes: Vec<String>,
    }

    fn default_confidence() -> u8 {
        DEFAULT_CONFIDENCE
    }

    #[test]
    fn test_strip_code_fences() {
        assert_eq!(strip_code_fences("```json\n[1, 2]\n```"), "[1, 2]");
        assert_eq!(strip_code_fences("  {\"a\": 1}  "), "{\"a\": 1}");
    }

    #[test]
    fn test_parse_json_reports_expected_contract() {
        let err = parse_json::<Vec<u32>>("not json", "task list").unwrap_err();
        assert_eq!(err.expected, "task list");

        let parsed: Vec<u32> = parse_json("```json\n[3]\n```", "task list").unwrap();
        assert_eq!(parsed, vec![3]);
    }

    #[test]
    fn test_coerce_percent() {
        assert_eq!(coerce_percent(&json!(92)), Some(92));
        assert_eq!(coerce_percent(&json!(87.6)), Some(88));
        assert_eq!(coerce_percent(&json!("45%")), Some(45));
        assert_eq!(coerce_percent(&json!(250)), Some(100));
        assert_eq!(coerce_percent(&json!(-3)), Some(0));
        assert_eq!(coerce_percent(&json!("high")), None);
        assert_eq!(coerce_percent(&json!(null)), None);
    }

    #[test]
    fn test_lenient_fields() {
        let sample: Sample = serde_json::from_value(json!({
            "confidence": "very",
            "risk": "70",
            "data": { "estimatedCost": 50000, "roi": "12%", "approved": true, "skip": null },
            "notes": "single note"
        }))
        .unwrap();

        assert_eq!(sample.confidence, DEFAULT_CONFIDENCE);
        assert_eq!(sample.risk, Some(70));
        let data = sample.data.unwrap();
        assert_eq!(data["estimatedCost"], "50000");
        assert_eq!(data["approved"], "true");
        assert!(!data.contains_key("skip"));
        assert_eq!(sample.notes, vec!["single note".to_string()]);
    }

    #[test]
    fn test_missing_fields_use_defaults() {
        let sample: Sample = serde_json::from_value(json!({})).unwrap();
        assert_eq!(sample.confidence, DEFAULT_CONFIDENCE);
        assert!(sample.risk.is_none());
        assert!(sample.data.is_none());
        assert!(sample.notes.is_empty());
    }
}
