//! Typed contracts exchanged between workers and the controller.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use schemars::JsonSchema;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::backend::json::{lenient, parse_json};
use crate::error::MalformedResponse;

/// Confidence assigned to a specialist that missed its deadline
pub const TIMEOUT_CONFIDENCE: u8 = 10;

/// `data` key flagging a timeout fallback
pub const STATUS_KEY: &str = "Status";

/// `data` value flagging a timeout fallback
pub const TIMEOUT_STATUS: &str = "TIMEOUT";

/// Task urgency as assigned during decomposition
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, JsonSchema)]
#[serde(rename_all = "UPPERCASE")]
pub enum Priority {
    Low,
    #[default]
    Medium,
    High,
    Critical,
}

impl Priority {
    pub fn as_str(&self) -> &'static str {
        match self {
            Priority::Low => "LOW",
            Priority::Medium => "MEDIUM",
            Priority::High => "HIGH",
            Priority::Critical => "CRITICAL",
        }
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Priority {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "LOW" => Ok(Priority::Low),
            "MEDIUM" => Ok(Priority::Medium),
            "HIGH" => Ok(Priority::High),
            "CRITICAL" => Ok(Priority::Critical),
            other => Err(format!("unknown priority: {}", other)),
        }
    }
}

// Case-insensitive; anything unreadable is treated as MEDIUM
impl<'de> Deserialize<'de> for Priority {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = Value::deserialize(deserializer)?;
        Ok(value
            .as_str()
            .and_then(|s| s.parse().ok())
            .unwrap_or_default())
    }
}

/// One unit of work for one specialist
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    #[serde(rename = "agentId", alias = "workerId", alias = "agent_id", alias = "worker_id")]
    pub worker_id: String,
    #[serde(rename = "task", alias = "description")]
    pub description: String,
    #[serde(default)]
    pub priority: Priority,
}

impl Task {
    pub fn new(worker_id: impl Into<String>, description: impl Into<String>, priority: Priority) -> Self {
        Self {
            worker_id: worker_id.into(),
            description: description.into(),
            priority,
        }
    }
}

fn default_confidence() -> u8 {
    lenient::DEFAULT_CONFIDENCE
}

/// A specialist's structured opinion
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct WorkerResult {
    /// Reasoning behind the analysis
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thought: Option<String>,
    /// Findings for the assigned task
    pub analysis: String,
    /// Key metrics, name to value
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "lenient::string_map_opt"
    )]
    pub data: Option<BTreeMap<String, String>>,
    /// Recommended course of action
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recommendation: Option<String>,
    /// Self-assessed confidence, 0 to 100
    #[serde(default = "default_confidence", deserialize_with = "lenient::percent")]
    #[schemars(range(min = 0, max = 100))]
    pub confidence: u8,
}

impl WorkerResult {
    /// Parse a backend payload, degrading instead of failing
    pub fn parse(raw: &str) -> Self {
        match Self::try_parse(raw) {
            Ok(result) => result,
            Err(e) => {
                tracing::warn!("{}", e);
                Self::degraded(raw)
            }
        }
    }

    pub fn try_parse(raw: &str) -> Result<Self, MalformedResponse> {
        parse_json(raw, "analyst result")
    }

    /// The raw text kept as the analysis at default confidence
    pub fn degraded(raw: &str) -> Self {
        Self {
            thought: None,
            analysis: raw.to_string(),
            data: None,
            recommendation: None,
            confidence: lenient::DEFAULT_CONFIDENCE,
        }
    }

    /// Fixed result for a specialist that missed its deadline
    pub fn timeout_fallback() -> Self {
        let data = BTreeMap::from([
            (STATUS_KEY.to_string(), TIMEOUT_STATUS.to_string()),
            ("Confidence".to_string(), "Low".to_string()),
        ]);
        Self {
            thought: Some("Computation limit exceeded. Reverting to failsafe.".to_string()),
            analysis: "Analyst timed out. Using fallback heuristics.".to_string(),
            data: Some(data),
            recommendation: Some("Proceed with caution (fallback mode)".to_string()),
            confidence: TIMEOUT_CONFIDENCE,
        }
    }

    pub fn is_timeout(&self) -> bool {
        self.data
            .as_ref()
            .and_then(|d| d.get(STATUS_KEY))
            .is_some_and(|s| s == TIMEOUT_STATUS)
    }
}

/// A result tagged with the worker and task that produced it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttributedResult {
    pub worker_id: String,
    pub task: String,
    #[serde(flatten)]
    pub result: WorkerResult,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_priority_is_lenient() {
        assert_eq!("high".parse::<Priority>(), Ok(Priority::High));
        let task: Task = serde_json::from_value(json!({
            "agentId": "finance", "task": "Audit costs", "priority": "critical"
        }))
        .unwrap();
        assert_eq!(task.priority, Priority::Critical);

        let task: Task =
            serde_json::from_value(json!({ "agentId": "ops", "task": "Check", "priority": 3 }))
                .unwrap();
        assert_eq!(task.priority, Priority::Medium);

        let task: Task =
            serde_json::from_value(json!({ "workerId": "hr", "description": "Review" })).unwrap();
        assert_eq!(task.worker_id, "hr");
        assert_eq!(task.priority, Priority::Medium);
    }

    #[test]
    fn test_task_wire_format() {
        let task = Task::new("market", "Scan competitors", Priority::High);
        let value = serde_json::to_value(&task).unwrap();
        assert_eq!(
            value,
            json!({ "agentId": "market", "task": "Scan competitors", "priority": "HIGH" })
        );
    }

    #[test]
    fn test_worker_result_parse() {
        let result = WorkerResult::parse(
            "```json\n{\"analysis\": \"Costs up\", \"data\": {\"Cost\": 15}, \"confidence\": \"92%\"}\n```",
        );
        assert_eq!(result.analysis, "Costs up");
        assert_eq!(result.data.unwrap()["Cost"], "15");
        assert_eq!(result.confidence, 92);
    }

    #[test]
    fn test_worker_result_degrades() {
        let result = WorkerResult::parse("I could not produce JSON today.");
        assert_eq!(result.analysis, "I could not produce JSON today.");
        assert_eq!(result.confidence, 50);

        let raw = r#"{"error": "Failed to generate insight."}"#;
        let result = WorkerResult::parse(raw);
        assert_eq!(result.analysis, raw);
        assert!(!result.is_timeout());
    }

    #[test]
    fn test_timeout_fallback() {
        let fallback = WorkerResult::timeout_fallback();
        assert!(fallback.is_timeout());
        assert_eq!(fallback.confidence, TIMEOUT_CONFIDENCE);
    }

    #[test]
    fn test_attributed_result_flattens() {
        let attributed = AttributedResult {
            worker_id: "finance".to_string(),
            task: "Audit".to_string(),
            result: WorkerResult::degraded("text"),
        };
        let value = serde_json::to_value(&attributed).unwrap();
        assert_eq!(value["worker_id"], "finance");
        assert_eq!(value["analysis"], "text");
        assert_eq!(value["confidence"], 50);
    }
}
