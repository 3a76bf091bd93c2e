//! Storage abstractions for service layer
//!
//! Handlers only see [`DocumentStore`]; the filesystem layout lives entirely in
//! [`FsDocumentStore`] so another key-value backend can be dropped in.

use std::fmt;
use std::pin::Pin;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::io::{AsyncRead, AsyncReadExt};
use uuid::Uuid;

use crate::errors::ServiceError;
use crate::geojson::Document;

pub mod fs_store;

pub use fs_store::FsDocumentStore;

/// Opaque identifier of a stored document (UUID v4, canonical hyphenated form).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DocumentId(Uuid);

impl DocumentId {
    pub fn generate() -> Self {
        Self(Uuid::new_v4())
    }

    /// Parse a caller-supplied identifier. Only the 36-character hyphenated
    /// form is accepted, so each record has exactly one spelling.
    pub fn parse(raw: &str) -> Result<Self, ServiceError> {
        if raw.len() != 36 {
            return Err(ServiceError::InvalidIdentifier(truncate(raw)));
        }
        Uuid::try_parse(raw)
            .map(Self)
            .map_err(|_| ServiceError::InvalidIdentifier(truncate(raw)))
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl fmt::Display for DocumentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.hyphenated())
    }
}

// Keep hostile input out of logs and error bodies.
fn truncate(raw: &str) -> String {
    raw.chars().take(64).collect()
}

/// Result of a successful `put`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StoredReceipt {
    pub id: DocumentId,
    pub bytes: u64,
}

/// Byte source of a stored record, read lazily by the caller.
pub type DocumentReader = Pin<Box<dyn AsyncRead + Send>>;

/// An opened record plus the metadata the retrieval endpoint needs.
pub struct StoredDocument {
    pub id: DocumentId,
    pub size: u64,
    pub modified: DateTime<Utc>,
    pub reader: DocumentReader,
}

impl StoredDocument {
    /// Drain the reader into memory.
    pub async fn read_all(mut self) -> Result<Vec<u8>, ServiceError> {
        let mut bytes = Vec::with_capacity(self.size as usize);
        self.reader.read_to_end(&mut bytes).await?;
        Ok(bytes)
    }
}

impl fmt::Debug for StoredDocument {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StoredDocument")
            .field("id", &self.id)
            .field("size", &self.size)
            .field("modified", &self.modified)
            .finish_non_exhaustive()
    }
}

/// Write-once document storage: no update, delete or list.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Persist under a fresh identifier. A failed put leaves nothing retrievable.
    async fn put(&self, document: &Document) -> Result<StoredReceipt, ServiceError>;
    async fn get(&self, id: &DocumentId) -> Result<StoredDocument, ServiceError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_canonical_uuid() {
        let id = DocumentId::generate();
        let parsed = DocumentId::parse(&id.to_string()).unwrap();
        assert_eq!(parsed, id);
        let upper = id.to_string().to_ascii_uppercase();
        assert_eq!(DocumentId::parse(&upper).unwrap(), id);
    }

    #[test]
    fn rejects_paths_and_alternate_spellings() {
        let simple = Uuid::new_v4().simple().to_string();
        let braced = Uuid::new_v4().braced().to_string();
        for raw in ["", "../../etc/passwd", "..%2F..%2Fsecret", "abc", &simple, &braced] {
            assert!(
                matches!(DocumentId::parse(raw), Err(ServiceError::InvalidIdentifier(_))),
                "{raw} should be rejected"
            );
        }
        // 36 chars but not a uuid
        let dots = "../".repeat(12);
        assert!(matches!(DocumentId::parse(&dots), Err(ServiceError::InvalidIdentifier(_))));
    }
}
