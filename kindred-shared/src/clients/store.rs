//! Whole-document JSON store.
//!
//! The document is loaded lazily on first access and kept in memory behind a
//! single `RwLock`. Every mutation runs as a transaction over a draft copy:
//! the draft is written to disk (temp file + rename) while the write lock is
//! still held, and only then replaces the in-memory state. A failed closure or
//! a failed write leaves both memory and disk untouched.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::io::AsyncWriteExt;
use tokio::sync::{OnceCell, RwLock};
use uuid::Uuid;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("failed to read document: {0}")]
    Read(String),

    #[error("document is corrupt: {0}")]
    Corrupt(String),

    #[error("failed to persist document: {0}")]
    Persistence(String),
}

/// A document that can live in a [`JsonStore`].
pub trait StoreDocument: Default + Clone + Serialize + DeserializeOwned + Send + Sync + 'static {
    /// Repairs derived state (id counters and the like) after deserialization.
    fn after_load(&mut self) {}
}

pub struct JsonStore<D> {
    inner: Arc<Inner<D>>,
}

struct Inner<D> {
    path: Option<PathBuf>,
    state: OnceCell<RwLock<D>>,
}

impl<D> Clone for JsonStore<D> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<D: StoreDocument> JsonStore<D> {
    /// No I/O happens here; the file is read on first use. `None` keeps the
    /// document in memory only.
    pub fn open(path: Option<PathBuf>) -> Self {
        Self {
            inner: Arc::new(Inner {
                path,
                state: OnceCell::new(),
            }),
        }
    }

    pub fn ephemeral() -> Self {
        Self::open(None)
    }

    pub fn path(&self) -> Option<&Path> {
        self.inner.path.as_deref()
    }

    pub fn is_loaded(&self) -> bool {
        self.inner.state.initialized()
    }

    /// Idempotent: the first successful call reads the file, later calls are no-ops.
    pub async fn load(&self) -> Result<&RwLock<D>, StoreError> {
        let path = self.inner.path.clone();
        self.inner
            .state
            .get_or_try_init(|| async move {
                let document = read_document::<D>(path.as_deref()).await?;
                Ok(RwLock::new(document))
            })
            .await
    }

    pub async fn read<T, F>(&self, f: F) -> Result<T, StoreError>
    where
        F: FnOnce(&D) -> T,
    {
        let state = self.load().await?;
        let guard = state.read().await;
        Ok(f(&guard))
    }

    pub async fn transaction<T, E, F>(&self, f: F) -> Result<T, E>
    where
        F: FnOnce(&mut D) -> Result<T, E>,
        E: From<StoreError>,
    {
        let state = self.load().await?;
        let mut guard = state.write().await;

        let mut draft = guard.clone();
        let result = f(&mut draft)?;

        self.persist(&draft).await?;
        *guard = draft;
        Ok(result)
    }

    /// Flushes the whole in-memory document.
    pub async fn save(&self) -> Result<(), StoreError> {
        let state = self.load().await?;
        let guard = state.write().await;
        self.persist(&guard).await
    }

    async fn persist(&self, document: &D) -> Result<(), StoreError> {
        let Some(path) = self.inner.path.as_ref() else {
            return Ok(());
        };

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| StoreError::Persistence(format!("failed to prepare directory: {e}")))?;
        }

        let payload = serde_json::to_vec_pretty(document)
            .map_err(|e| StoreError::Persistence(format!("failed to encode document: {e}")))?;

        let temp_path = path.with_extension(format!("{}.tmp", Uuid::new_v4().simple()));
        if let Err(e) = write_synced(&temp_path, &payload).await {
            let _ = tokio::fs::remove_file(&temp_path).await;
            return Err(StoreError::Persistence(format!("failed to write document: {e}")));
        }

        if let Err(e) = tokio::fs::rename(&temp_path, path).await {
            let _ = tokio::fs::remove_file(&temp_path).await;
            return Err(StoreError::Persistence(format!("failed to finalize document: {e}")));
        }

        Ok(())
    }
}

/// The rename is only atomic on disk if the temp file's contents are durable first.
async fn write_synced(path: &Path, payload: &[u8]) -> std::io::Result<()> {
    let mut file = tokio::fs::File::create(path).await?;
    file.write_all(payload).await?;
    file.sync_all().await
}

async fn read_document<D: StoreDocument>(path: Option<&Path>) -> Result<D, StoreError> {
    let Some(path) = path else {
        return Ok(D::default());
    };

    let raw = match tokio::fs::read_to_string(path).await {
        Ok(raw) => raw,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            tracing::info!(path = %path.display(), "no existing document, starting fresh");
            return Ok(D::default());
        }
        Err(e) => return Err(StoreError::Read(e.to_string())),
    };

    let mut document: D = serde_json::from_str(&raw)
        .map_err(|e| StoreError::Corrupt(format!("{}: {e}", path.display())))?;
    document.after_load();

    tracing::info!(path = %path.display(), "document loaded");
    Ok(document)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Clone, Default, Serialize, Deserialize)]
    #[serde(default)]
    struct Ledger {
        entries: Vec<u64>,
        next: u64,
    }

    impl StoreDocument for Ledger {
        fn after_load(&mut self) {
            let floor = self.entries.iter().max().copied().unwrap_or(0) + 1;
            self.next = self.next.max(floor);
        }
    }

    fn temp_file() -> PathBuf {
        std::env::temp_dir()
            .join(format!("kindred-store-{}", Uuid::new_v4().simple()))
            .join("data.json")
    }

    #[tokio::test]
    async fn committed_transaction_is_visible() {
        let store = JsonStore::<Ledger>::ephemeral();
        store
            .transaction(|doc| {
                doc.entries.push(1);
                Ok::<_, StoreError>(())
            })
            .await
            .unwrap();

        let entries = store.read(|doc| doc.entries.clone()).await.unwrap();
        assert_eq!(entries, vec![1]);
    }

    #[tokio::test]
    async fn failed_transaction_leaves_no_trace() {
        let store = JsonStore::<Ledger>::ephemeral();
        let result = store
            .transaction(|doc| {
                doc.entries.push(42);
                Err::<(), _>(StoreError::Persistence("boom".into()))
            })
            .await;

        assert!(result.is_err());
        assert!(store.read(|doc| doc.entries.is_empty()).await.unwrap());
    }

    #[tokio::test]
    async fn document_survives_reopen() {
        let path = temp_file();
        let store = JsonStore::<Ledger>::open(Some(path.clone()));
        store
            .transaction(|doc| {
                doc.entries.extend([3, 9]);
                Ok::<_, StoreError>(())
            })
            .await
            .unwrap();

        let reopened = JsonStore::<Ledger>::open(Some(path.clone()));
        assert!(!reopened.is_loaded());
        let (entries, next) = reopened.read(|doc| (doc.entries.clone(), doc.next)).await.unwrap();
        assert_eq!(entries, vec![3, 9]);
        assert_eq!(next, 10);

        let _ = std::fs::remove_dir_all(path.parent().unwrap());
    }

    #[tokio::test]
    async fn save_rewrites_the_file_from_memory() {
        let path = temp_file();
        let store = JsonStore::<Ledger>::open(Some(path.clone()));
        store
            .transaction(|doc| {
                doc.entries.extend([4, 7]);
                Ok::<_, StoreError>(())
            })
            .await
            .unwrap();

        std::fs::remove_file(&path).unwrap();
        store.save().await.unwrap();

        let files: Vec<_> = std::fs::read_dir(path.parent().unwrap())
            .unwrap()
            .map(|entry| entry.unwrap().file_name())
            .collect();
        assert_eq!(files, vec![std::ffi::OsString::from("data.json")]);

        let reopened = JsonStore::<Ledger>::open(Some(path.clone()));
        let (entries, next) = reopened.read(|doc| (doc.entries.clone(), doc.next)).await.unwrap();
        assert_eq!(entries, vec![4, 7]);
        assert_eq!(next, 8);

        let _ = std::fs::remove_dir_all(path.parent().unwrap());
    }

    #[tokio::test]
    async fn corrupt_document_is_an_error() {
        let path = temp_file();
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, "{ not json").unwrap();

        let store = JsonStore::<Ledger>::open(Some(path.clone()));
        let err = store.read(|_| ()).await.unwrap_err();
        assert!(matches!(err, StoreError::Corrupt(_)));

        let _ = std::fs::remove_dir_all(path.parent().unwrap());
    }

    #[tokio::test]
    async fn load_is_idempotent() {
        let store = JsonStore::<Ledger>::ephemeral();
        store.load().await.unwrap();
        store
            .transaction(|doc| {
                doc.entries.push(5);
                Ok::<_, StoreError>(())
            })
            .await
            .unwrap();
        store.load().await.unwrap();

        assert_eq!(store.read(|doc| doc.entries.len()).await.unwrap(), 1);
    }
}
