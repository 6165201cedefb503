//! Run history: newest first, capped, never deduplicated.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::kv::KeyValueStore;
use crate::report::{render_text, Report};

/// Storage key of the history list
pub const HISTORY_KEY: &str = "boardroom.history";

/// Entries kept; the oldest are evicted beyond this
pub const HISTORY_LIMIT: usize = 50;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub id: String,
    pub timestamp: DateTime<Utc>,
    pub query: String,
    pub report: Report,
}

impl HistoryEntry {
    /// Render the stored report as it was produced
    pub fn replay(&self) -> String {
        render_text(&self.report)
    }
}

/// History persisted in a [`KeyValueStore`]
pub struct RunHistory<'a> {
    store: &'a dyn KeyValueStore,
}

impl<'a> RunHistory<'a> {
    pub fn new(store: &'a dyn KeyValueStore) -> Self {
        Self { store }
    }

    /// All entries, newest first
    ///
    /// A corrupt payload is logged and read as an empty history.
    pub fn list(&self) -> Result<Vec<HistoryEntry>> {
        Ok(decode(self.store.get(HISTORY_KEY)?.as_deref()))
    }

    pub fn find(&self, id: &str) -> Result<Option<HistoryEntry>> {
        Ok(self.list()?.into_iter().find(|entry| entry.id == id))
    }

    /// Prepend a new entry and evict beyond [`HISTORY_LIMIT`]
    ///
    /// Runs as one store update, so concurrent appends never drop entries.
    pub fn append(&self, query: &str, report: &Report) -> Result<HistoryEntry> {
        let mut appended = None;
        self.store.update(HISTORY_KEY, &mut |raw| {
            let mut entries = decode(raw);
            let now = Utc::now();

            // Millisecond ids, bumped past the newest entry so they stay unique
            let mut id = now.timestamp_millis();
            if let Some(newest) = entries.first().and_then(|e| e.id.parse::<i64>().ok()) {
                id = id.max(newest + 1);
            }

            let entry = HistoryEntry {
                id: id.to_string(),
                timestamp: now,
                query: query.to_string(),
                report: report.clone(),
            };
            entries.insert(0, entry.clone());
            entries.truncate(HISTORY_LIMIT);
            appended = Some(entry);

            serde_json::to_string(&entries).context("Failed to serialize run history")
        })?;

        let entry = appended.context("History update did not run")?;
        tracing::debug!("Saved run {} to history", entry.id);
        Ok(entry)
    }
}

fn decode(raw: Option<&str>) -> Vec<HistoryEntry> {
    let Some(raw) = raw else {
        return Vec::new();
    };
    serde_json::from_str(raw).unwrap_or_else(|e| {
        tracing::warn!("Stored run history is unreadable, starting over: {}", e);
        Vec::new()
    })
}
