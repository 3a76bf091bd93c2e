//! Runtime environment helpers
//!
//! Thin wrapper around `common::env` to keep binary crates importing
//! `service::runtime::ensure_env` without depending directly on `common`.

use std::path::Path;

/// Ensure the storage root exists; warn on a missing frontend directory.
pub async fn ensure_env(frontend_dir: &Path, storage_root: &Path) -> anyhow::Result<()> {
    common::env::ensure_env(frontend_dir, storage_root).await
}
