//! Environment/runtime helpers
//!
//! Sanity checks to ensure expected directories exist at startup.

use std::path::Path;

use tracing::warn;

/// Ensure the storage root exists; warn when the viewer assets are missing.
pub async fn ensure_env(frontend_dir: &Path, storage_root: &Path) -> anyhow::Result<()> {
    if tokio::fs::metadata(frontend_dir).await.is_err() {
        warn!(frontend_dir = %frontend_dir.display(), "frontend assets directory not found; static assets may 404");
    }
    tokio::fs::create_dir_all(storage_root)
        .await
        .map_err(|e| anyhow::anyhow!("cannot create {}: {e}", storage_root.display()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn creates_missing_storage_root() -> anyhow::Result<()> {
        let base = std::env::temp_dir().join(format!("ensure_env_{}", uuid::Uuid::new_v4()));
        let root = base.join("nested").join("geojson");
        ensure_env(&base.join("no-frontend"), &root).await?;
        assert!(tokio::fs::metadata(&root).await?.is_dir());
        let _ = tokio::fs::remove_dir_all(&base).await;
        Ok(())
    }
}
