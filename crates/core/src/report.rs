//! # Decision Report
//!
//! The synthesized outcome of a run, with the JSON keys the coordinator is
//! asked to produce, and a plain-text renderer used by the CLI and by
//! history replay.

use std::collections::BTreeMap;
use std::fmt::{self, Write as _};

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::backend::json::{lenient, parse_json};

fn default_confidence() -> u8 {
    lenient::DEFAULT_CONFIDENCE
}

/// Scalar as text; `null` and missing become empty
fn text<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::Null => String::new(),
        Value::String(s) => s,
        other => other.to_string(),
    })
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ActionPlan {
    #[serde(
        rename = "Short_Term",
        alias = "short_term",
        alias = "shortTerm",
        default,
        deserialize_with = "text"
    )]
    pub short_term: String,
    #[serde(
        rename = "Long_Term",
        alias = "long_term",
        alias = "longTerm",
        default,
        deserialize_with = "text"
    )]
    pub long_term: String,
}

impl ActionPlan {
    pub fn is_empty(&self) -> bool {
        self.short_term.is_empty() && self.long_term.is_empty()
    }
}

/// A metric to watch after the decision
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(from = "KpiRepr")]
pub struct Kpi {
    pub name: String,
    pub target: String,
    pub rationale: String,
}

// Older reports list KPIs as bare strings
#[derive(Deserialize)]
#[serde(untagged)]
enum KpiRepr {
    Name(String),
    Full {
        #[serde(default, deserialize_with = "text")]
        name: String,
        #[serde(default, deserialize_with = "text")]
        target: String,
        #[serde(default, deserialize_with = "text")]
        rationale: String,
    },
}

impl From<KpiRepr> for Kpi {
    fn from(repr: KpiRepr) -> Self {
        match repr {
            KpiRepr::Name(name) => Kpi {
                name,
                ..Kpi::default()
            },
            KpiRepr::Full {
                name,
                target,
                rationale,
            } => Kpi {
                name,
                target,
                rationale,
            },
        }
    }
}

/// Baseline versus simulated value of one metric
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ScenarioRow {
    #[serde(default, deserialize_with = "text")]
    pub metric: String,
    #[serde(default, deserialize_with = "text")]
    pub baseline: String,
    #[serde(default, deserialize_with = "text")]
    pub simulated: String,
    #[serde(default, deserialize_with = "text")]
    pub delta: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PlainLanguage {
    #[serde(default, deserialize_with = "text")]
    pub findings: String,
    #[serde(default, deserialize_with = "text")]
    pub root_cause: String,
    #[serde(default, deserialize_with = "text")]
    pub meaning: String,
}

/// The final decision of a run
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Report {
    #[serde(default = "default_confidence", deserialize_with = "lenient::percent")]
    pub overall_confidence: u8,
    #[serde(default, deserialize_with = "lenient::string_list")]
    pub executive_summary: Vec<String>,
    #[serde(default, deserialize_with = "lenient::string_map")]
    pub department_insights: BTreeMap<String, String>,
    #[serde(default, deserialize_with = "lenient::string_list")]
    pub risks_constraints: Vec<String>,
    #[serde(rename = "recommended_action_plan", default)]
    pub action_plan: ActionPlan,
    #[serde(rename = "kpis_to_monitor", default)]
    pub kpis: Vec<Kpi>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scenario_comparison: Option<Vec<ScenarioRow>>,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "lenient::percent_opt"
    )]
    pub risk_score: Option<u8>,
    #[serde(
        rename = "plain_language_explanation",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub plain_language: Option<PlainLanguage>,
}

impl Report {
    /// Read a synthesis payload, degrading when it is unusable
    ///
    /// A payload that does not parse, or parses without an executive summary,
    /// becomes [`Report::degraded`].
    pub fn from_backend(raw: &str) -> Self {
        match parse_json::<Report>(raw, "report") {
            Ok(report) if !report.executive_summary.is_empty() => report,
            Ok(_) => {
                tracing::warn!("Synthesis returned a report without an executive summary");
                Self::degraded(raw)
            }
            Err(e) => {
                tracing::warn!("{}", e);
                Self::degraded(raw)
            }
        }
    }

    /// The raw text as the only summary bullet at default confidence
    pub fn degraded(raw: &str) -> Self {
        Self {
            overall_confidence: lenient::DEFAULT_CONFIDENCE,
            executive_summary: vec![raw.to_string()],
            ..Self::default()
        }
    }

    pub fn confidence_band(&self) -> ConfidenceBand {
        ConfidenceBand::of(self.overall_confidence)
    }

    /// Sections present in this report, in display order
    pub fn sections(&self) -> Vec<ReportSection> {
        let mut sections = vec![ReportSection::Confidence];
        if !self.executive_summary.is_empty() {
            sections.push(ReportSection::ExecutiveSummary);
        }
        if !self.department_insights.is_empty() {
            sections.push(ReportSection::DepartmentInsights);
        }
        if !self.risks_constraints.is_empty() {
            sections.push(ReportSection::Risks);
        }
        if !self.action_plan.is_empty() {
            sections.push(ReportSection::ActionPlan);
        }
        if !self.kpis.is_empty() {
            sections.push(ReportSection::Kpis);
        }
        if self.scenario_comparison.as_ref().is_some_and(|rows| !rows.is_empty()) {
            sections.push(ReportSection::ScenarioComparison);
        }
        if self.risk_score.is_some() {
            sections.push(ReportSection::RiskScore);
        }
        if self.plain_language.is_some() {
            sections.push(ReportSection::PlainLanguage);
        }
        sections
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConfidenceBand {
    High,
    Medium,
    Low,
}

impl ConfidenceBand {
    pub fn of(confidence: u8) -> Self {
        if confidence >= 80 {
            ConfidenceBand::High
        } else if confidence >= 60 {
            ConfidenceBand::Medium
        } else {
            ConfidenceBand::Low
        }
    }
}

impl fmt::Display for ConfidenceBand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ConfidenceBand::High => "high",
            ConfidenceBand::Medium => "medium",
            ConfidenceBand::Low => "low",
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReportSection {
    Confidence,
    ExecutiveSummary,
    DepartmentInsights,
    Risks,
    ActionPlan,
    Kpis,
    ScenarioComparison,
    RiskScore,
    PlainLanguage,
}

impl ReportSection {
    pub fn title(&self) -> &'static str {
        match self {
            ReportSection::Confidence => "CONFIDENCE",
            ReportSection::ExecutiveSummary => "EXECUTIVE SUMMARY",
            ReportSection::DepartmentInsights => "DEPARTMENT INSIGHTS",
            ReportSection::Risks => "RISKS & CONSTRAINTS",
            ReportSection::ActionPlan => "ACTION PLAN",
            ReportSection::Kpis => "KPIS TO MONITOR",
            ReportSection::ScenarioComparison => "SCENARIO COMPARISON",
            ReportSection::RiskScore => "RISK SCORE",
            ReportSection::PlainLanguage => "IN PLAIN LANGUAGE",
        }
    }
}

/// Render every present section as plain text
pub fn render_text(report: &Report) -> String {
    let mut out = String::new();
    for (i, section) in report.sections().into_iter().enumerate() {
        if i > 0 {
            out.push('\n');
        }
        let _ = writeln!(out, "== {} ==", section.title());
        render_section(&mut out, report, section);
    }
    out
}

fn render_section(out: &mut String, report: &Report, section: ReportSection) {
    match section {
        ReportSection::Confidence => {
            let _ = writeln!(
                out,
                "{}% ({})",
                report.overall_confidence,
                report.confidence_band()
            );
        }
        ReportSection::ExecutiveSummary => {
            for line in &report.executive_summary {
                let _ = writeln!(out, "- {}", line);
            }
        }
        ReportSection::DepartmentInsights => {
            for (department, insight) in &report.department_insights {
                let _ = writeln!(out, "{}: {}", department, insight);
            }
        }
        ReportSection::Risks => {
            for risk in &report.risks_constraints {
                let _ = writeln!(out, "! {}", risk);
            }
        }
        ReportSection::ActionPlan => {
            if !report.action_plan.short_term.is_empty() {
                let _ = writeln!(out, "Short term: {}", report.action_plan.short_term);
            }
            if !report.action_plan.long_term.is_empty() {
                let _ = writeln!(out, "Long term: {}", report.action_plan.long_term);
            }
        }
        ReportSection::Kpis => {
            for kpi in &report.kpis {
                let _ = match (kpi.target.is_empty(), kpi.rationale.is_empty()) {
                    (true, true) => writeln!(out, "- {}", kpi.name),
                    (false, true) => writeln!(out, "- {} [target {}]", kpi.name, kpi.target),
                    (true, false) => writeln!(out, "- {}: {}", kpi.name, kpi.rationale),
                    (false, false) => writeln!(
                        out,
                        "- {} [target {}]: {}",
                        kpi.name, kpi.target, kpi.rationale
                    ),
                };
            }
        }
        ReportSection::ScenarioComparison => {
            for row in report.scenario_comparison.iter().flatten() {
                let _ = writeln!(
                    out,
                    "{}: {} -> {} ({})",
                    row.metric, row.baseline, row.simulated, row.delta
                );
            }
        }
        ReportSection::RiskScore => {
            if let Some(score) = report.risk_score {
                let _ = writeln!(out, "{}/100", score);
            }
        }
        ReportSection::PlainLanguage => {
            if let Some(plain) = &report.plain_language {
                let _ = writeln!(out, "What we found: {}", plain.findings);
                let _ = writeln!(out, "Why: {}", plain.root_cause);
                let _ = writeln!(out, "What it means: {}", plain.meaning);
            }
        }
    }
}
