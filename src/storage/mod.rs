pub mod azure;
pub mod local;
pub mod provider;

#[cfg(test)]
pub mod memory;

pub use provider::{BlobStore, Precondition, PutOptions, Revision};

use serde::de::DeserializeOwned;
use serde::Serialize;
use std::sync::Arc;

use crate::config::{Config, StorageBackend};
use crate::error::{AppError, Result};

/// Build the two blob stores (collection documents, images) from
/// configuration. The backend is chosen exactly once, here.
pub async fn build_stores(config: &Config) -> Result<(Arc<dyn BlobStore>, Arc<dyn BlobStore>)> {
    match config.storage.backend {
        StorageBackend::Local => {
            let local = &config.storage.local;
            let documents = local::LocalStore::new(&local.data_dir, "/data");
            let images = local::LocalStore::new(&local.media_dir, local.public_base.as_str());
            Ok((Arc::new(documents), Arc::new(images)))
        }
        StorageBackend::Azure => {
            let azure = &config.storage.azure;
            let documents = azure::AzureStore::connect(azure, &azure.data_container).await?;
            let images = azure::AzureStore::connect(azure, &azure.images_container).await?;
            Ok((Arc::new(documents), Arc::new(images)))
        }
    }
}

/// A loaded collection document plus the revision it was read at.
#[derive(Debug)]
pub struct Document<T> {
    pub data: T,
    revision: Option<Revision>,
}

/// How many times a read-modify-write cycle is retried on `Conflict`
/// before the error is surfaced.
const MAX_SAVE_ATTEMPTS: u32 = 3;

/// Whole-document JSON persistence over a [`BlobStore`].
///
/// One collection lives in one named object and every write replaces the
/// whole document. `load` never fails with "not found": a missing object is
/// created with the caller's default and that default is returned.
pub struct DocumentStore {
    blobs: Arc<dyn BlobStore>,
}

impl DocumentStore {
    pub fn new(blobs: Arc<dyn BlobStore>) -> Self {
        Self { blobs }
    }

    /// Read a collection, creating it with `default` on first access.
    pub async fn load<T, F>(&self, name: &str, default: F) -> Result<Document<T>>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> T,
    {
        if let Some((bytes, revision)) = self.blobs.get(name).await? {
            let data = serde_json::from_slice(&bytes).map_err(|e| {
                AppError::CorruptDocument(format!("Failed to decode {}: {}", name, e))
            })?;
            return Ok(Document {
                data,
                revision: Some(revision),
            });
        }

        // First access: persist the default. Another request may race us to
        // the creation; whoever loses re-reads the winner's bytes.
        let data = default();
        let bytes = serde_json::to_vec_pretty(&data)?;
        match self
            .blobs
            .put(
                name,
                bytes.into(),
                PutOptions::json().with_precondition(Precondition::IfAbsent),
            )
            .await
        {
            Ok(revision) => Ok(Document {
                data,
                revision: Some(revision),
            }),
            Err(AppError::Conflict(_)) => {
                let (bytes, revision) = self.blobs.get(name).await?.ok_or_else(|| {
                    AppError::StorageUnavailable(format!(
                        "Object {} vanished after create conflict",
                        name
                    ))
                })?;
                let data = serde_json::from_slice(&bytes).map_err(|e| {
                    AppError::CorruptDocument(format!("Failed to decode {}: {}", name, e))
                })?;
                Ok(Document {
                    data,
                    revision: Some(revision),
                })
            }
            Err(e) => Err(e),
        }
    }

    /// Conditional save: fails with `Conflict` if the object moved past the
    /// revision this document was loaded at.
    pub async fn save<T: Serialize>(&self, name: &str, doc: &mut Document<T>) -> Result<()> {
        let bytes = serde_json::to_vec_pretty(&doc.data)?;
        let precondition = match &doc.revision {
            Some(revision) => Precondition::IfRevision(revision.clone()),
            None => Precondition::Any,
        };
        let revision = self
            .blobs
            .put(
                name,
                bytes.into(),
                PutOptions::json().with_precondition(precondition),
            )
            .await?;
        doc.revision = Some(revision);
        Ok(())
    }

    /// Last-writer-wins save. This is the source system's behavior and keeps
    /// its lost-update window; prefer [`DocumentStore::update`].
    pub async fn save_unchecked<T: Serialize>(&self, name: &str, data: &T) -> Result<()> {
        let bytes = serde_json::to_vec_pretty(data)?;
        self.blobs.put(name, bytes.into(), PutOptions::json()).await?;
        Ok(())
    }

    /// Read-modify-write with bounded retry on `Conflict`. `mutate` may run
    /// several times and must not have side effects beyond the document;
    /// returning an error from it aborts without writing.
    pub async fn update<T, F, D, R>(&self, name: &str, default: D, mut mutate: F) -> Result<R>
    where
        T: Serialize + DeserializeOwned,
        D: Fn() -> T,
        F: FnMut(&mut T) -> Result<R>,
    {
        let mut attempt = 0;
        loop {
            let mut doc = self.load(name, &default).await?;
            let result = mutate(&mut doc.data)?;
            match self.save(name, &mut doc).await {
                Ok(()) => return Ok(result),
                Err(AppError::Conflict(msg)) => {
                    attempt += 1;
                    if attempt >= MAX_SAVE_ATTEMPTS {
                        return Err(AppError::Conflict(msg));
                    }
                    tracing::debug!(
                        "Concurrent write to {}, retrying ({}/{})",
                        name,
                        attempt,
                        MAX_SAVE_ATTEMPTS
                    );
                }
                Err(e) => return Err(e),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::memory::MemoryStore;
    use super::*;

    fn store() -> (Arc<MemoryStore>, DocumentStore) {
        let blobs = Arc::new(MemoryStore::new("https://storage.test/blog-data"));
        let docs = DocumentStore::new(blobs.clone());
        (blobs, docs)
    }

    #[tokio::test]
    async fn test_load_creates_default_on_first_access() {
        let (blobs, docs) = store();

        let doc: Document<Vec<String>> = docs.load("posts.json", Vec::new).await.unwrap();
        assert!(doc.data.is_empty());

        // The default was persisted, not just returned.
        assert!(blobs.exists("posts.json").await.unwrap());
    }

    #[tokio::test]
    async fn test_load_rejects_corrupt_json() {
        let (blobs, docs) = store();
        blobs
            .put(
                "posts.json",
                bytes::Bytes::from_static(b"{not json"),
                PutOptions::json(),
            )
            .await
            .unwrap();

        let err = docs
            .load::<Vec<String>, _>("posts.json", Vec::new)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::CorruptDocument(_)));
    }

    #[tokio::test]
    async fn test_save_conflicts_after_concurrent_write() {
        let (_, docs) = store();

        let mut doc: Document<Vec<u32>> = docs.load("nums.json", Vec::new).await.unwrap();
        doc.data.push(1);

        // Concurrent writer bumps the revision.
        docs.save_unchecked("nums.json", &vec![9u32]).await.unwrap();

        let err = docs.save("nums.json", &mut doc).await.unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));
    }

    #[tokio::test]
    async fn test_update_retries_through_conflict() {
        let (blobs, docs) = store();
        docs.save_unchecked("nums.json", &vec![1u32]).await.unwrap();

        // Fail the first conditional put, as if someone else won the race.
        blobs.fail_next_conditional_put();

        let result = docs
            .update("nums.json", Vec::new, |nums: &mut Vec<u32>| {
                nums.push(2);
                Ok(nums.len())
            })
            .await
            .unwrap();
        assert_eq!(result, 2);

        let doc: Document<Vec<u32>> = docs.load("nums.json", Vec::new).await.unwrap();
        assert_eq!(doc.data, vec![1, 2]);
    }

    #[tokio::test]
    async fn test_update_mutation_error_aborts_without_write() {
        let (blobs, docs) = store();
        docs.save_unchecked("nums.json", &vec![1u32]).await.unwrap();
        let puts_before = blobs.put_count();

        let err = docs
            .update("nums.json", Vec::new, |_: &mut Vec<u32>| -> Result<()> {
                Err(AppError::NotFound("nope".to_string()))
            })
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
        assert_eq!(blobs.put_count(), puts_before);
    }
}
