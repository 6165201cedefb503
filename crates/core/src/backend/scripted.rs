//! # Scripted Backend
//!
//! Deterministic responder used for demos, offline runs and tests.
//!
//! Two layers, checked in order:
//! 1. Rules: a marker substring found in the system prompt or prompt selects
//!    a canned response and an optional latency.
//! 2. Demo script: scenario-aware canned payloads loaded from
//!    `scripts/demo.json`, keyed on the `MODE:` line of the system prompt.
//!
//! Anything unmatched gets a plain-text reply, which callers treat as a
//! malformed payload.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;

use super::GenerationBackend;
use crate::workers::prompts::{ANALYZE_MODE, DECOMPOSE_MODE, PROBLEM_PREFIX, SYNTHESIZE_MODE};

const DEMO_SCRIPT: &str = include_str!("scripts/demo.json");

/// Reply for requests no rule or scenario covers
const UNSCRIPTED_REPLY: &str = "Process complete.";

/// A canned response selected by a marker substring
#[derive(Debug, Clone)]
pub struct ScriptRule {
    pub marker: String,
    pub response: String,
    /// Overrides the backend-wide latency when set
    pub latency: Option<Duration>,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct DemoScript {
    analysts: HashMap<String, Value>,
    scenarios: Vec<DemoScenario>,
}

#[derive(Debug, Clone, Deserialize)]
struct DemoScenario {
    name: String,
    keywords: Vec<String>,
    tasks: Value,
    #[serde(default)]
    analysts: HashMap<String, Value>,
    report: Value,
}

impl DemoScript {
    fn load() -> Option<Self> {
        match serde_json::from_str(DEMO_SCRIPT) {
            Ok(script) => Some(script),
            Err(e) => {
                tracing::error!("Demo script is invalid, scripted backend runs without it: {}", e);
                None
            }
        }
    }

    /// First scenario whose keyword appears in the problem, else the catch-all
    fn scenario(&self, problem: &str) -> Option<&DemoScenario> {
        let lower = problem.to_lowercase();
        self.scenarios
            .iter()
            .find(|s| s.keywords.iter().any(|k| lower.contains(k.as_str())))
            .or_else(|| self.scenarios.iter().find(|s| s.keywords.is_empty()))
    }

    fn respond(&self, prompt: &str, system_prompt: &str) -> Option<String> {
        let scenario = self.scenario(extract_problem(prompt))?;
        tracing::debug!(scenario = %scenario.name, "Scripted demo scenario selected");

        if system_prompt.contains(DECOMPOSE_MODE) {
            return Some(scenario.tasks.to_string());
        }
        if system_prompt.contains(SYNTHESIZE_MODE) {
            return Some(scenario.report.to_string());
        }

        let analyst = analyst_id(system_prompt)?;
        scenario
            .analysts
            .get(analyst)
            .or_else(|| self.analysts.get(analyst))
            .map(Value::to_string)
    }
}

/// The `PROBLEM:` line of a prompt, or the whole prompt when there is none
fn extract_problem(prompt: &str) -> &str {
    prompt
        .lines()
        .find_map(|line| line.strip_prefix(PROBLEM_PREFIX))
        .unwrap_or(prompt)
}

/// Analyst id from a `MODE: ANALYZE (<id>)` line
fn analyst_id(system_prompt: &str) -> Option<&str> {
    let start = system_prompt.find(ANALYZE_MODE)? + ANALYZE_MODE.len();
    let rest = system_prompt[start..].trim_start().strip_prefix('(')?;
    rest.split(')').next().map(str::trim)
}

/// Deterministic scripted responder
#[derive(Debug, Clone, Default)]
pub struct ScriptedBackend {
    rules: Vec<ScriptRule>,
    demo: Option<DemoScript>,
    latency: Duration,
}

impl ScriptedBackend {
    /// An empty script: every request gets the unscripted reply
    pub fn new() -> Self {
        Self::default()
    }

    /// Scenario-aware demo script bundled with the crate
    pub fn demo() -> Self {
        Self {
            demo: DemoScript::load(),
            ..Self::default()
        }
    }

    /// Simulated thinking time applied to every response
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    /// Answer requests containing `marker` with `response`
    pub fn on(mut self, marker: impl Into<String>, response: impl Into<String>) -> Self {
        self.rules.push(ScriptRule {
            marker: marker.into(),
            response: response.into(),
            latency: None,
        });
        self
    }

    /// Like [`ScriptedBackend::on`], with a latency specific to this rule
    pub fn on_delayed(
        mut self,
        marker: impl Into<String>,
        response: impl Into<String>,
        latency: Duration,
    ) -> Self {
        self.rules.push(ScriptRule {
            marker: marker.into(),
            response: response.into(),
            latency: Some(latency),
        });
        self
    }

    fn respond(&self, prompt: &str, system_prompt: &str) -> (String, Duration) {
        if let Some(rule) = self
            .rules
            .iter()
            .find(|r| system_prompt.contains(&r.marker) || prompt.contains(&r.marker))
        {
            return (rule.response.clone(), rule.latency.unwrap_or(self.latency));
        }

        let text = self
            .demo
            .as_ref()
            .and_then(|demo| demo.respond(prompt, system_prompt))
            .unwrap_or_else(|| UNSCRIPTED_REPLY.to_string());
        (text, self.latency)
    }
}

#[async_trait]
impl GenerationBackend for ScriptedBackend {
    fn name(&self) -> &'static str {
        "scripted"
    }

    async fn generate(&self, prompt: &str, system_prompt: &str) -> String {
        let (text, latency) = self.respond(prompt, system_prompt);
        if !latency.is_zero() {
            tokio::time::sleep(latency).await;
        }
        text
    }
}
