//! Per-analyst influence weights used as advice during synthesis.

use std::collections::BTreeMap;

use anyhow::{Context, Result};
use serde::Serialize;
use serde_json::Value;

use super::kv::KeyValueStore;

/// Storage key of the weight vector
pub const WEIGHTS_KEY: &str = "boardroom.agent_weights";

pub const MIN_WEIGHT: f64 = 0.1;
pub const MAX_WEIGHT: f64 = 3.0;
pub const DEFAULT_WEIGHT: f64 = 1.0;

/// Clamp into `[MIN_WEIGHT, MAX_WEIGHT]`; non-finite values become the default
pub fn clamp_weight(weight: f64) -> f64 {
    if weight.is_finite() {
        weight.clamp(MIN_WEIGHT, MAX_WEIGHT)
    } else {
        DEFAULT_WEIGHT
    }
}

/// Weights by worker id; absent workers weigh [`DEFAULT_WEIGHT`]
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct WeightVector {
    weights: BTreeMap<String, f64>,
}

impl WeightVector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, worker_id: &str) -> f64 {
        self.weights
            .get(worker_id)
            .copied()
            .unwrap_or(DEFAULT_WEIGHT)
    }

    /// Store a clamped weight and return the value kept
    pub fn set(&mut self, worker_id: impl Into<String>, weight: f64) -> f64 {
        let weight = clamp_weight(weight);
        self.weights.insert(worker_id.into(), weight);
        weight
    }

    pub fn with(mut self, worker_id: impl Into<String>, weight: f64) -> Self {
        self.set(worker_id, weight);
        self
    }

    /// Weights for `ids` in order, followed by any other stored worker
    pub fn entries_for<'a>(&self, ids: impl IntoIterator<Item = &'a str>) -> Vec<(String, f64)> {
        let mut entries: Vec<(String, f64)> = ids
            .into_iter()
            .map(|id| (id.to_string(), self.get(id)))
            .collect();
        for (id, weight) in &self.weights {
            if !entries.iter().any(|(known, _)| known == id) {
                entries.push((id.clone(), *weight));
            }
        }
        entries
    }

    pub fn as_map(&self) -> &BTreeMap<String, f64> {
        &self.weights
    }

    /// Read from a JSON object, clamping numbers and skipping anything else
    pub fn from_json(raw: &str) -> Result<Self> {
        let object: BTreeMap<String, Value> =
            serde_json::from_str(raw).context("Weights payload is not a JSON object")?;
        let mut vector = Self::new();
        for (id, value) in object {
            match value.as_f64() {
                Some(weight) => {
                    vector.set(id, weight);
                }
                None => tracing::warn!("Ignoring non-numeric weight for '{}'", id),
            }
        }
        Ok(vector)
    }

    fn decode(raw: Option<&str>) -> Self {
        let Some(raw) = raw else {
            return Self::default();
        };
        Self::from_json(raw).unwrap_or_else(|e| {
            tracing::warn!("{:#}, using default weights", e);
            Self::default()
        })
    }

    /// Load the stored vector; nothing stored or a corrupt payload gives defaults
    pub fn load(store: &dyn KeyValueStore) -> Result<Self> {
        Ok(Self::decode(store.get(WEIGHTS_KEY)?.as_deref()))
    }

    /// Apply `change` to the stored vector and write it back in one store update
    pub fn update(store: &dyn KeyValueStore, change: impl FnOnce(&mut Self)) -> Result<Self> {
        let mut change = Some(change);
        let mut updated = None;
        store.update(WEIGHTS_KEY, &mut |raw| {
            let mut vector = Self::decode(raw);
            if let Some(change) = change.take() {
                change(&mut vector);
            }
            let raw = serde_json::to_string(&vector.weights)?;
            updated = Some(vector);
            Ok(raw)
        })?;
        updated.context("Weights update did not run")
    }
}
