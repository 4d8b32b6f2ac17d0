use async_trait::async_trait;
use bytes::Bytes;
use std::time::Duration;

use crate::error::Result;

/// Opaque revision token observed when an object is read (ETag for remote
/// storage, content hash for the local backend). Used as the optimistic
/// concurrency precondition on writes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Revision(String);

impl Revision {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Write precondition. `Any` is the legacy last-writer-wins write.
#[derive(Debug, Clone, Default)]
pub enum Precondition {
    #[default]
    Any,
    /// Fail with `Conflict` if the object already exists.
    IfAbsent,
    /// Fail with `Conflict` unless the object is still at this revision.
    IfRevision(Revision),
}

#[derive(Debug, Clone)]
pub struct PutOptions {
    pub content_type: String,
    pub cache_control: Option<String>,
    pub precondition: Precondition,
}

impl PutOptions {
    /// Options for collection documents.
    pub fn json() -> Self {
        Self {
            content_type: mime::APPLICATION_JSON.to_string(),
            cache_control: None,
            precondition: Precondition::Any,
        }
    }

    /// Options for uploaded media: long-lived cache headers.
    pub fn media(content_type: &str) -> Self {
        Self {
            content_type: content_type.to_string(),
            cache_control: Some("public, max-age=31536000".to_string()),
            precondition: Precondition::Any,
        }
    }

    pub fn with_precondition(mut self, precondition: Precondition) -> Self {
        self.precondition = precondition;
        self
    }
}

/// Storage provider trait, one instance per container.
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Read an object. Returns `None` if it does not exist.
    async fn get(&self, name: &str) -> Result<Option<(Bytes, Revision)>>;

    /// Write an object, fully replacing its bytes. Fails with `Conflict`
    /// when the precondition does not hold.
    async fn put(&self, name: &str, data: Bytes, opts: PutOptions) -> Result<Revision>;

    /// Delete an object. Deleting a missing object is not an error.
    async fn delete(&self, name: &str) -> Result<()>;

    /// Check if an object exists
    async fn exists(&self, name: &str) -> Result<bool>;

    /// List object names, optionally filtered by prefix
    async fn list(&self, prefix: Option<&str>) -> Result<Vec<String>>;

    /// Plain (unsigned) URL for an object
    fn url(&self, name: &str) -> String;

    /// Read-only access URL, signed when a key is configured; falls back to
    /// the plain URL otherwise.
    fn signed_url(&self, name: &str, valid_for: Duration) -> String;

    /// Get the storage backend name
    fn backend(&self) -> &'static str;
}

/// Object names come from file names and URL segments; keep them from
/// escaping the container.
pub fn validate_object_name(name: &str) -> Result<()> {
    if name.is_empty() || name.contains("..") || name.starts_with('/') || name.contains('\\') {
        return Err(crate::error::AppError::BadRequest(format!(
            "Invalid object name: {}",
            name
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_object_name() {
        assert!(validate_object_name("posts.json").is_ok());
        assert!(validate_object_name("1700000000000-a1b2c3.jpg").is_ok());
        assert!(validate_object_name("").is_err());
        assert!(validate_object_name("../etc/passwd").is_err());
        assert!(validate_object_name("/absolute").is_err());
        assert!(validate_object_name("a\\b").is_err());
    }
}
