//! Layout of the `.boardroom` runtime directory: settings, secrets and the
//! database all live side by side in it.

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use tokio::fs;

/// Environment variable overriding the runtime directory
pub const RUNTIME_PATH_ENV: &str = "BOARDROOM_RUNTIME_PATH";

/// Secrets loaded at startup
pub const ENV_FILE: &str = ".env";

const GITIGNORE: &str = "# Never commit secrets\n.env\n*.env\nboardroom.db\n";

/// Get the runtime directory path (.boardroom)
pub fn get_runtime_path() -> PathBuf {
    if let Ok(path) = std::env::var(RUNTIME_PATH_ENV) {
        return PathBuf::from(path);
    }

    std::env::current_dir()
        .unwrap_or_else(|_| PathBuf::from("."))
        .join(".boardroom")
}

/// Path of `name` inside the runtime directory
pub fn runtime_file(name: &str) -> PathBuf {
    get_runtime_path().join(name)
}

/// Create the runtime directory on first use
pub async fn prepare_runtime_dir() -> Result<PathBuf> {
    let path = get_runtime_path();
    prepare_runtime_dir_at(&path).await?;
    Ok(path)
}

/// Create `dir` with a `.gitignore` for secrets and the database
///
/// An existing `.gitignore` is left as the user wrote it.
pub async fn prepare_runtime_dir_at(dir: &Path) -> Result<()> {
    fs::create_dir_all(dir)
        .await
        .with_context(|| format!("Failed to create runtime directory: {:?}", dir))?;

    let ignore = dir.join(".gitignore");
    if fs::metadata(&ignore).await.is_err() {
        fs::write(&ignore, GITIGNORE)
            .await
            .with_context(|| format!("Failed to write {:?}", ignore))?;
        tracing::debug!("Created {:?}", ignore);
    }
    Ok(())
}
