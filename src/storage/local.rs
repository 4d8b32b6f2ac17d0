use async_trait::async_trait;
use bytes::Bytes;
use sha2::{Digest, Sha256};
use std::path::PathBuf;
use std::time::Duration;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;

use crate::error::{AppError, Result};
use crate::storage::provider::{validate_object_name, BlobStore, Precondition, PutOptions, Revision};

/// Local file system storage provider.
///
/// Revisions are content hashes, so conditional writes need the
/// check-then-write sequence to be serialized within the process; a single
/// write lock is enough for a one-process deployment.
pub struct LocalStore {
    base_path: PathBuf,
    public_base: String,
    write_lock: Mutex<()>,
}

impl LocalStore {
    pub fn new(base_path: impl Into<PathBuf>, public_base: impl Into<String>) -> Self {
        Self {
            base_path: base_path.into(),
            public_base: public_base.into(),
            write_lock: Mutex::new(()),
        }
    }

    fn full_path(&self, name: &str) -> PathBuf {
        self.base_path.join(name)
    }

    fn revision_of(data: &[u8]) -> Revision {
        let mut hasher = Sha256::new();
        hasher.update(data);
        let digest = hasher.finalize();
        let hex: String = digest.iter().map(|b| format!("{:02x}", b)).collect();
        Revision::new(hex)
    }

    async fn read_current(&self, name: &str) -> Result<Option<Bytes>> {
        match fs::read(self.full_path(name)).await {
            Ok(data) => Ok(Some(Bytes::from(data))),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(AppError::StorageUnavailable(format!(
                "Failed to read {}: {}",
                name, e
            ))),
        }
    }
}

#[async_trait]
impl BlobStore for LocalStore {
    async fn get(&self, name: &str) -> Result<Option<(Bytes, Revision)>> {
        validate_object_name(name)?;
        Ok(self
            .read_current(name)
            .await?
            .map(|data| {
                let rev = Self::revision_of(&data);
                (data, rev)
            }))
    }

    async fn put(&self, name: &str, data: Bytes, opts: PutOptions) -> Result<Revision> {
        validate_object_name(name)?;
        let _guard = self.write_lock.lock().await;

        match &opts.precondition {
            Precondition::Any => {}
            Precondition::IfAbsent => {
                if self.full_path(name).exists() {
                    return Err(AppError::Conflict(format!("Object already exists: {}", name)));
                }
            }
            Precondition::IfRevision(expected) => {
                let current = self.read_current(name).await?.ok_or_else(|| {
                    AppError::Conflict(format!("Object disappeared: {}", name))
                })?;
                if Self::revision_of(&current) != *expected {
                    return Err(AppError::Conflict(format!(
                        "Object changed since read: {}",
                        name
                    )));
                }
            }
        }

        let full_path = self.full_path(name);
        if let Some(parent) = full_path.parent() {
            fs::create_dir_all(parent).await?;
        }

        let mut file = fs::File::create(&full_path).await?;
        file.write_all(&data).await?;
        file.flush().await?;

        tracing::debug!("Saved object to {:?}", full_path);
        Ok(Self::revision_of(&data))
    }

    async fn delete(&self, name: &str) -> Result<()> {
        validate_object_name(name)?;
        let full_path = self.full_path(name);
        match fs::remove_file(&full_path).await {
            Ok(()) => {
                tracing::debug!("Deleted object {:?}", full_path);
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    async fn exists(&self, name: &str) -> Result<bool> {
        validate_object_name(name)?;
        Ok(self.full_path(name).exists())
    }

    async fn list(&self, prefix: Option<&str>) -> Result<Vec<String>> {
        let mut names = Vec::new();
        let mut entries = match fs::read_dir(&self.base_path).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(names),
            Err(e) => return Err(e.into()),
        };

        while let Some(entry) = entries.next_entry().await? {
            if entry.file_type().await?.is_file() {
                let name = entry.file_name().to_string_lossy().to_string();
                if prefix.map_or(true, |p| name.starts_with(p)) {
                    names.push(name);
                }
            }
        }
        names.sort();
        Ok(names)
    }

    fn url(&self, name: &str) -> String {
        format!("{}/{}", self.public_base.trim_end_matches('/'), name)
    }

    /// Local files are served directly by the application; no signing.
    fn signed_url(&self, name: &str, _valid_for: Duration) -> String {
        self.url(name)
    }

    fn backend(&self) -> &'static str {
        "local"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_store() -> LocalStore {
        let dir = std::env::temp_dir().join(format!("inkstone-test-{}", uuid::Uuid::new_v4()));
        LocalStore::new(dir, "/media")
    }

    #[tokio::test]
    async fn test_put_get_roundtrip() {
        let store = temp_store();
        let rev = store
            .put("a.json", Bytes::from_static(b"[]"), PutOptions::json())
            .await
            .unwrap();

        let (data, read_rev) = store.get("a.json").await.unwrap().unwrap();
        assert_eq!(&data[..], b"[]");
        assert_eq!(rev, read_rev);
    }

    #[tokio::test]
    async fn test_get_missing_returns_none() {
        let store = temp_store();
        assert!(store.get("missing.json").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_conditional_put_conflicts_on_stale_revision() {
        let store = temp_store();
        let rev = store
            .put("doc.json", Bytes::from_static(b"[1]"), PutOptions::json())
            .await
            .unwrap();

        // Another writer sneaks in.
        store
            .put("doc.json", Bytes::from_static(b"[1,2]"), PutOptions::json())
            .await
            .unwrap();

        let err = store
            .put(
                "doc.json",
                Bytes::from_static(b"[1,3]"),
                PutOptions::json().with_precondition(Precondition::IfRevision(rev)),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));

        // The interloper's write survived.
        let (data, _) = store.get("doc.json").await.unwrap().unwrap();
        assert_eq!(&data[..], b"[1,2]");
    }

    #[tokio::test]
    async fn test_if_absent_precondition() {
        let store = temp_store();
        store
            .put(
                "once.json",
                Bytes::from_static(b"{}"),
                PutOptions::json().with_precondition(Precondition::IfAbsent),
            )
            .await
            .unwrap();

        let err = store
            .put(
                "once.json",
                Bytes::from_static(b"{}"),
                PutOptions::json().with_precondition(Precondition::IfAbsent),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));
    }

    #[tokio::test]
    async fn test_delete_is_idempotent() {
        let store = temp_store();
        store
            .put("x.bin", Bytes::from_static(b"x"), PutOptions::media("image/jpeg"))
            .await
            .unwrap();
        store.delete("x.bin").await.unwrap();
        store.delete("x.bin").await.unwrap();
        assert!(!store.exists("x.bin").await.unwrap());
    }

    #[tokio::test]
    async fn test_url_uses_public_base() {
        let store = temp_store();
        assert_eq!(store.url("a.jpg"), "/media/a.jpg");
        assert_eq!(
            store.signed_url("a.jpg", Duration::from_secs(60)),
            "/media/a.jpg"
        );
    }
}
