//! Document storage.
//!
//! The editor only needs three calls from a store: load a document, create
//! one (the store assigns the id) and update one. [`MemoryStore`] backs
//! tests and can be told to fail; [`FileStore`] keeps one pretty-printed
//! JSON file per document.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

use crate::document::{DocumentId, DocumentStatus};
use crate::persist::DocumentContent;

/// Result type for store operations
pub type StoreResult<T> = Result<T, StoreError>;

/// Errors reported by a document store
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Document not found: {0}")]
    NotFound(DocumentId),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Malformed document: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Store unavailable: {0}")]
    Unavailable(String),
}

/// What a store keeps for one document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredDocument {
    #[serde(default)]
    pub status: DocumentStatus,
    pub content: DocumentContent,
}

/// Persistence collaborator for the editor.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Loads a stored document.
    async fn load_document(&self, id: &DocumentId) -> StoreResult<StoredDocument>;

    /// Stores a new document and returns the id assigned to it.
    async fn create_document(&self, document: &StoredDocument) -> StoreResult<DocumentId>;

    /// Replaces an existing document.
    async fn update_document(&self, id: &DocumentId, document: &StoredDocument) -> StoreResult<()>;
}

// ==================== Memory ====================

/// In-memory store.
#[derive(Default)]
pub struct MemoryStore {
    documents: RwLock<HashMap<DocumentId, StoredDocument>>,
    unavailable: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every following call fail with `Unavailable` until reset.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Returns a copy of a stored document.
    pub async fn get(&self, id: &DocumentId) -> Option<StoredDocument> {
        self.documents.read().await.get(id).cloned()
    }

    /// Returns the number of stored documents.
    pub async fn len(&self) -> usize {
        self.documents.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.documents.read().await.is_empty()
    }

    fn check_available(&self) -> StoreResult<()> {
        if self.unavailable.load(Ordering::SeqCst) {
            Err(StoreError::Unavailable("memory store is offline".to_string()))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn load_document(&self, id: &DocumentId) -> StoreResult<StoredDocument> {
        self.check_available()?;
        self.get(id).await.ok_or_else(|| StoreError::NotFound(id.clone()))
    }

    async fn create_document(&self, document: &StoredDocument) -> StoreResult<DocumentId> {
        self.check_available()?;
        let id = DocumentId::generate();
        self.documents.write().await.insert(id.clone(), document.clone());
        Ok(id)
    }

    async fn update_document(&self, id: &DocumentId, document: &StoredDocument) -> StoreResult<()> {
        self.check_available()?;
        let mut documents = self.documents.write().await;
        match documents.get_mut(id) {
            Some(slot) => {
                *slot = document.clone();
                Ok(())
            }
            None => Err(StoreError::NotFound(id.clone())),
        }
    }
}

// ==================== Files ====================

/// Directory-backed store: `<root>/<id>.json` per document.
#[derive(Debug, Clone)]
pub struct FileStore {
    root: PathBuf,
}

impl FileStore {
    /// Opens (and creates if needed) a store rooted at `root`.
    pub async fn open(root: impl AsRef<Path>) -> StoreResult<Self> {
        let root = root.as_ref().to_path_buf();
        tokio::fs::create_dir_all(&root).await?;
        tracing::debug!("Opened document store at {:?}", root);
        Ok(Self { root })
    }

    /// Returns the store directory.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Lists the ids of all stored documents, sorted.
    pub async fn list(&self) -> StoreResult<Vec<DocumentId>> {
        let mut ids = Vec::new();
        let mut entries = tokio::fs::read_dir(&self.root).await?;
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                ids.push(DocumentId::from(stem));
            }
        }
        ids.sort();
        Ok(ids)
    }

    fn path_for(&self, id: &DocumentId) -> StoreResult<PathBuf> {
        let name = id.as_str();
        let valid = !name.is_empty()
            && name
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
        if !valid {
            return Err(StoreError::NotFound(id.clone()));
        }
        Ok(self.root.join(format!("{name}.json")))
    }

    async fn write(&self, path: &Path, document: &StoredDocument) -> StoreResult<()> {
        let json = serde_json::to_string_pretty(document)?;

        // Write to a temporary file first, then rename (atomic write)
        let temp_path = path.with_extension("json.tmp");
        tokio::fs::write(&temp_path, json).await?;
        tokio::fs::rename(&temp_path, path).await?;
        Ok(())
    }
}

#[async_trait]
impl DocumentStore for FileStore {
    async fn load_document(&self, id: &DocumentId) -> StoreResult<StoredDocument> {
        let path = self.path_for(id)?;
        let json = match tokio::fs::read_to_string(&path).await {
            Ok(json) => json,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(StoreError::NotFound(id.clone()));
            }
            Err(e) => return Err(e.into()),
        };
        Ok(serde_json::from_str(&json)?)
    }

    async fn create_document(&self, document: &StoredDocument) -> StoreResult<DocumentId> {
        let id = DocumentId::generate();
        let path = self.path_for(&id)?;
        self.write(&path, document).await?;
        tracing::info!("Created document {} in {:?}", id, self.root);
        Ok(id)
    }

    async fn update_document(&self, id: &DocumentId, document: &StoredDocument) -> StoreResult<()> {
        let path = self.path_for(id)?;
        if !tokio::fs::try_exists(&path).await? {
            return Err(StoreError::NotFound(id.clone()));
        }
        self.write(&path, document).await?;
        tracing::debug!("Updated document {}", id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::persist::LessonRecord;
    use tempfile::tempdir;

    fn lesson(title: &str) -> StoredDocument {
        StoredDocument {
            status: DocumentStatus::Draft,
            content: DocumentContent::Lesson(LessonRecord {
                title: title.to_string(),
                editor_data: Vec::new(),
                duration_minutes: 10,
                order: 0,
                hidden: false,
            }),
        }
    }

    #[tokio::test]
    async fn test_memory_store_create_update_load() {
        let store = MemoryStore::new();
        let id = store.create_document(&lesson("One")).await.unwrap();
        store.update_document(&id, &lesson("Two")).await.unwrap();

        let loaded = store.load_document(&id).await.unwrap();
        assert_eq!(loaded.content.title(), "Two");
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test]
    async fn test_memory_store_update_missing() {
        let store = MemoryStore::new();
        let err = store
            .update_document(&DocumentId::from("nope"), &lesson("x"))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_memory_store_failure_injection() {
        let store = MemoryStore::new();
        store.set_unavailable(true);
        assert!(matches!(
            store.create_document(&lesson("x")).await,
            Err(StoreError::Unavailable(_))
        ));
        assert!(store.is_empty().await);

        store.set_unavailable(false);
        assert!(store.create_document(&lesson("x")).await.is_ok());
    }

    #[tokio::test]
    async fn test_file_store_round_trip() {
        let dir = tempdir().unwrap();
        let store = FileStore::open(dir.path().join("docs")).await.unwrap();

        let id = store.create_document(&lesson("On disk")).await.unwrap();
        assert!(store.root().join(format!("{id}.json")).exists());

        store.update_document(&id, &lesson("Renamed")).await.unwrap();
        let loaded = store.load_document(&id).await.unwrap();
        assert_eq!(loaded, lesson("Renamed"));

        assert_eq!(store.list().await.unwrap(), vec![id]);
    }

    #[tokio::test]
    async fn test_file_store_missing_and_bad_ids() {
        let dir = tempdir().unwrap();
        let store = FileStore::open(dir.path()).await.unwrap();

        let missing = store.load_document(&DocumentId::from("absent")).await;
        assert!(matches!(missing, Err(StoreError::NotFound(_))));

        let escape = store.load_document(&DocumentId::from("../etc/passwd")).await;
        assert!(matches!(escape, Err(StoreError::NotFound(_))));

        let update = store.update_document(&DocumentId::from("absent"), &lesson("x")).await;
        assert!(matches!(update, Err(StoreError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_file_store_rejects_malformed_json() {
        let dir = tempdir().unwrap();
        let store = FileStore::open(dir.path()).await.unwrap();
        tokio::fs::write(dir.path().join("broken.json"), "{not json").await.unwrap();

        let result = store.load_document(&DocumentId::from("broken")).await;
        assert!(matches!(result, Err(StoreError::Json(_))));
    }
}
