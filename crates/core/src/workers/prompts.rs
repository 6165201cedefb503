//! Prompt templates bundled at compile time.
//!
//! The wording is free to change; the structure is not. Every system prompt
//! carries a `MODE:` line and every user prompt that knows the problem
//! carries a `PROBLEM:` line, which the scripted backend relies on.

use super::types::WorkerResult;
use super::WorkerProfile;

/// Coordinator decomposition template
pub const DECOMPOSE: &str = include_str!("defaults/decompose.md");

/// Specialist analysis template
pub const ANALYST: &str = include_str!("defaults/analyst.md");

/// Coordinator synthesis template
pub const SYNTHESIZE: &str = include_str!("defaults/synthesize.md");

pub const DECOMPOSE_MODE: &str = "MODE: DECOMPOSE";
pub const SYNTHESIZE_MODE: &str = "MODE: SYNTHESIZE";
pub const ANALYZE_MODE: &str = "MODE: ANALYZE";
pub const PROBLEM_PREFIX: &str = "PROBLEM: ";

/// The `MODE:` line identifying a specialist's analysis request
pub fn analyze_mode(worker_id: &str) -> String {
    format!("{} ({})", ANALYZE_MODE, worker_id)
}

/// Problem statement collapsed onto a single `PROBLEM:` line
pub fn problem_line(problem: &str) -> String {
    format!(
        "{}{}",
        PROBLEM_PREFIX,
        problem.split_whitespace().collect::<Vec<_>>().join(" ")
    )
}

fn fill_profile(template: &str, profile: &WorkerProfile) -> String {
    template
        .replace("{id}", &profile.id)
        .replace("{name}", &profile.name)
        .replace("{role}", &profile.role)
        .replace("{capability}", &profile.capability)
}

/// System prompt for decomposition, listing the registered specialists
pub fn decompose_system(coordinator: &WorkerProfile, catalog: &[WorkerProfile]) -> String {
    let catalog = catalog
        .iter()
        .map(|p| format!("- id: '{}', role: '{}'", p.id, p.capability))
        .collect::<Vec<_>>()
        .join("\n");
    fill_profile(DECOMPOSE, coordinator).replace("{catalog}", &catalog)
}

/// System prompt for a specialist, embedding the `WorkerResult` JSON schema
pub fn analyst_system(profile: &WorkerProfile) -> String {
    let schema = schemars::schema_for!(WorkerResult);
    let schema = serde_json::to_string_pretty(&schema).unwrap_or_default();
    fill_profile(ANALYST, profile).replace("{schema}", &schema)
}

/// User prompt for a specialist
pub fn analyst_prompt(problem: Option<&str>, task: &str, context_json: &str) -> String {
    let mut prompt = String::new();
    if let Some(problem) = problem {
        prompt.push_str(&problem_line(problem));
        prompt.push('\n');
    }
    prompt.push_str(&format!(
        "TASK: {}\n\nSHARED CONTEXT:\n{}",
        task, context_json
    ));
    prompt
}

/// System prompt for synthesis with one `- id: weight` line per analyst
pub fn synthesize_system(coordinator: &WorkerProfile, weights: &[(String, f64)]) -> String {
    let weights = weights
        .iter()
        .map(|(id, weight)| format!("- {}: {:.1}", id, weight))
        .collect::<Vec<_>>()
        .join("\n");
    fill_profile(SYNTHESIZE, coordinator).replace("{weights}", &weights)
}

/// User prompt for synthesis
pub fn synthesize_prompt(problem: &str, reports_json: &str) -> String {
    format!(
        "{}\n\nANALYST REPORTS:\n{}",
        problem_line(problem),
        reports_json
    )
}

/// All default templates with their slugs
pub fn all_defaults() -> Vec<(&'static str, &'static str)> {
    vec![
        ("decompose", DECOMPOSE),
        ("analyst", ANALYST),
        ("synthesize", SYNTHESIZE),
    ]
}
