//! # Command Line Mode
//!
//! `run`, `history` and `weights` without the HTTP server.

use anyhow::{bail, Context, Result};
use boardroom_core::state::{BoardroomDb, KeyValueStore, RunHistory, WeightVector};
use boardroom_core::swarm::{Controller, PipelineEvent, PipelineEventKind};
use boardroom_core::workers::default_roster;
use tokio::sync::mpsc;

use crate::config::Settings;

/// Parse `id=value` as given to `weights --set`
pub fn parse_weight(raw: &str) -> Result<(String, f64), String> {
    let (id, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected id=value, got '{}'", raw))?;
    let id = id.trim();
    if id.is_empty() {
        return Err(format!("missing worker id in '{}'", raw));
    }
    let value = value
        .trim()
        .parse::<f64>()
        .map_err(|e| format!("invalid weight in '{}': {}", raw, e))?;
    Ok((id.to_string(), value))
}

/// One line per event, or nothing for events carried by a status line
fn describe(event: &PipelineEvent) -> Option<String> {
    match &event.kind {
        PipelineEventKind::Status { message } => Some(message.clone()),
        PipelineEventKind::TaskDecomposed { tasks } => Some(
            tasks
                .iter()
                .map(|t| format!("   -> {} [{}] {}", t.worker_id, t.priority, t.description))
                .collect::<Vec<_>>()
                .join("\n"),
        )
        .filter(|lines| !lines.is_empty()),
        PipelineEventKind::AgentResult {
            worker_id, result, ..
        } => Some(format!(
            "   <- {} confidence {}%{}",
            worker_id,
            result.confidence,
            if result.is_timeout() { " (timeout)" } else { "" }
        )),
        PipelineEventKind::AgentThinking { .. } | PipelineEventKind::FinalDecision { .. } => None,
    }
}

/// Run the pipeline once and store the report in history
pub async fn run(problem: &str, json: bool) -> Result<()> {
    let problem = problem.trim();
    if problem.is_empty() {
        bail!("problem must not be empty");
    }

    let settings = Settings::load_from(&Settings::default_path()).await;
    let config = settings.controller_config()?;
    let db = BoardroomDb::open()?;
    let weights = WeightVector::load(&db)?;

    let (tx, mut rx) = mpsc::unbounded_channel::<PipelineEvent>();
    let printer = tokio::spawn(async move {
        while let Some(event) = rx.recv().await {
            if let Some(line) = describe(&event) {
                // Keep stdout clean for the JSON document
                if json {
                    eprintln!("{}", line);
                } else {
                    println!("{}", line);
                }
            }
        }
    });

    let mut controller = Controller::new(config)
        .with_weights(weights)
        .with_event_channel(tx);
    let result = controller.run(problem).await;
    drop(controller);
    let _ = printer.await;
    let outcome = result?;

    let entry = RunHistory::new(&db).append(problem, &outcome.report)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&outcome.report)?);
    } else {
        println!();
        print!("{}", entry.replay());
        println!();
        println!("Saved as history entry {}", entry.id);
    }
    Ok(())
}

fn list_history(store: &dyn KeyValueStore) -> Result<Vec<String>> {
    let entries = RunHistory::new(store).list()?;
    Ok(entries
        .iter()
        .map(|e| {
            format!(
                "{}  {}  {:>3}% ({})  {}",
                e.id,
                e.timestamp.format("%Y-%m-%d %H:%M"),
                e.report.overall_confidence,
                e.report.confidence_band(),
                e.query
            )
        })
        .collect())
}

/// List stored runs, or replay one
pub async fn history(id: Option<String>) -> Result<()> {
    let db = BoardroomDb::open()?;
    match id {
        Some(id) => {
            let entry = RunHistory::new(&db)
                .find(&id)?
                .with_context(|| format!("No history entry '{}'", id))?;
            println!("{}", entry.query);
            println!();
            print!("{}", entry.replay());
        }
        None => {
            let lines = list_history(&db)?;
            if lines.is_empty() {
                println!("No runs yet. Try `boardroom run \"<problem>\"`.");
            }
            for line in lines {
                println!("{}", line);
            }
        }
    }
    Ok(())
}

/// Apply `updates` and return the roster's weights afterwards
fn update_weights(store: &dyn KeyValueStore, updates: Vec<(String, f64)>) -> Result<Vec<(String, f64)>> {
    let vector = if updates.is_empty() {
        WeightVector::load(store)?
    } else {
        WeightVector::update(store, |vector| {
            for (id, weight) in updates {
                let stored = vector.set(id.clone(), weight);
                if stored != weight {
                    tracing::warn!("Weight for '{}' clamped to {}", id, stored);
                }
            }
        })?
    };
    let roster = default_roster();
    Ok(vector.entries_for(roster.iter().map(|p| p.id.as_str())))
}

/// Show the weights, updating them first when `updates` is not empty
pub async fn weights(updates: Vec<(String, f64)>) -> Result<()> {
    let db = BoardroomDb::open()?;
    for (id, weight) in update_weights(&db, updates)? {
        println!("{:<10} {:.2}", id, weight);
    }
    Ok(())
}
