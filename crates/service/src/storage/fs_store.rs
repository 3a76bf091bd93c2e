use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::{fs, io::AsyncWriteExt};
use tracing::{debug, error};

use super::{DocumentId, DocumentStore, StoredDocument, StoredReceipt};
use crate::errors::ServiceError;
use crate::geojson::Document;

const RECORD_EXTENSION: &str = "geojson";

/// One pretty-printed JSON file per document: `<root>/<id>.geojson`.
///
/// Writes go to a hidden `.<id>.geojson.tmp` sibling, are fsynced, then renamed
/// into place, so a record path either does not exist or holds the full document.
#[derive(Debug, Clone)]
pub struct FsDocumentStore {
    root: PathBuf,
}

impl FsDocumentStore {
    /// Open a store rooted at `root`, creating the directory if missing.
    pub async fn new<P: Into<PathBuf>>(root: P) -> Result<Arc<Self>, ServiceError> {
        let root = root.into();
        fs::create_dir_all(&root).await?;
        Ok(Arc::new(Self { root }))
    }

    fn record_path(&self, id: &DocumentId) -> PathBuf {
        self.root.join(format!("{id}.{RECORD_EXTENSION}"))
    }

    fn temp_path(&self, id: &DocumentId) -> PathBuf {
        self.root.join(format!(".{id}.{RECORD_EXTENSION}.tmp"))
    }

    async fn write_atomic(tmp: &Path, dest: &Path, data: &[u8]) -> std::io::Result<()> {
        let mut file = fs::File::create(tmp).await?;
        file.write_all(data).await?;
        file.sync_all().await?;
        drop(file);
        fs::rename(tmp, dest).await
    }
}

#[async_trait]
impl DocumentStore for FsDocumentStore {
    async fn put(&self, document: &Document) -> Result<StoredReceipt, ServiceError> {
        let id = DocumentId::generate();
        let data = serde_json::to_vec_pretty(document)?;
        let tmp = self.temp_path(&id);
        let dest = self.record_path(&id);

        if let Err(e) = Self::write_atomic(&tmp, &dest, &data).await {
            let _ = fs::remove_file(&tmp).await;
            error!(phase = "persist", %id, bytes = data.len(), error = %e, "document write failed");
            return Err(e.into());
        }

        debug!(phase = "persist", %id, bytes = data.len(), kind = %document.kind(), "document stored");
        Ok(StoredReceipt { id, bytes: data.len() as u64 })
    }

    async fn get(&self, id: &DocumentId) -> Result<StoredDocument, ServiceError> {
        let path = self.record_path(id);
        let file = match fs::File::open(&path).await {
            Ok(f) => f,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(ServiceError::not_found(&format!("document {id}")));
            }
            Err(e) => return Err(e.into()),
        };
        let meta = file.metadata().await?;
        let modified = meta
            .modified()
            .map(DateTime::<Utc>::from)
            .unwrap_or_else(|_| Utc::now());

        Ok(StoredDocument { id: *id, size: meta.len(), modified, reader: Box::pin(file) })
    }
}
