//! Key-value persistence seam used for weights and run history.

use std::collections::HashMap;
use std::sync::Mutex;

use anyhow::Result;

/// String values stored under string keys
///
/// Implementations must make a `set` visible to every later `get`.
pub trait KeyValueStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>>;
    fn set(&self, key: &str, value: &str) -> Result<()>;
    fn remove(&self, key: &str) -> Result<()>;

    /// Replace the value under `key` with what `apply` computes from the
    /// current one, with no other write in between
    ///
    /// Nothing is written when `apply` fails.
    fn update(
        &self,
        key: &str,
        apply: &mut dyn FnMut(Option<&str>) -> Result<String>,
    ) -> Result<()>;
}

/// Process-local store for tests and ephemeral runs
#[derive(Debug, Default)]
pub struct InMemoryStore {
    values: Mutex<HashMap<String, String>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueStore for InMemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        let values = self
            .values
            .lock()
            .map_err(|e| anyhow::anyhow!("Lock error: {}", e))?;
        Ok(values.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        let mut values = self
            .values
            .lock()
            .map_err(|e| anyhow::anyhow!("Lock error: {}", e))?;
        values.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<()> {
        let mut values = self
            .values
            .lock()
            .map_err(|e| anyhow::anyhow!("Lock error: {}", e))?;
        values.remove(key);
        Ok(())
    }

    fn update(
        &self,
        key: &str,
        apply: &mut dyn FnMut(Option<&str>) -> Result<String>,
    ) -> Result<()> {
        let mut values = self
            .values
            .lock()
            .map_err(|e| anyhow::anyhow!("Lock error: {}", e))?;
        let next = apply(values.get(key).map(String::as_str))?;
        values.insert(key.to_string(), next);
        Ok(())
    }
}
