use async_trait::async_trait;
use bytes::Bytes;
use std::time::Duration;

use crate::config::AzureStorageConfig;
use crate::error::Result;
use crate::storage::azure::client::AzureClient;
use crate::storage::provider::{validate_object_name, BlobStore, PutOptions, Revision};

/// Azure Blob Storage provider for one container.
pub struct AzureStore {
    client: AzureClient,
}

impl AzureStore {
    /// Build the provider and make sure its container exists.
    pub async fn connect(config: &AzureStorageConfig, container: &str) -> Result<Self> {
        let client = AzureClient::new(config, container)?;
        client.ensure_container().await?;
        Ok(Self { client })
    }
}

#[async_trait]
impl BlobStore for AzureStore {
    async fn get(&self, name: &str) -> Result<Option<(Bytes, Revision)>> {
        validate_object_name(name)?;
        self.client.get_blob(name).await
    }

    async fn put(&self, name: &str, data: Bytes, opts: PutOptions) -> Result<Revision> {
        validate_object_name(name)?;
        self.client.put_blob(name, data, &opts).await
    }

    async fn delete(&self, name: &str) -> Result<()> {
        validate_object_name(name)?;
        self.client.delete_blob(name).await
    }

    async fn exists(&self, name: &str) -> Result<bool> {
        validate_object_name(name)?;
        self.client.head_blob(name).await
    }

    async fn list(&self, prefix: Option<&str>) -> Result<Vec<String>> {
        self.client.list_blobs(prefix).await
    }

    fn url(&self, name: &str) -> String {
        self.client.blob_url(name)
    }

    fn signed_url(&self, name: &str, valid_for: Duration) -> String {
        self.client.presigned_url(name, valid_for)
    }

    fn backend(&self) -> &'static str {
        "azure"
    }
}
