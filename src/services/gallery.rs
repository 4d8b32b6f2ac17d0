use bytes::Bytes;
use chrono::Utc;
use rand::distributions::Alphanumeric;
use rand::Rng;

use crate::cache::{keys, CacheLayer};
use crate::error::{AppError, Result};
use crate::images::ImageStore;
use crate::models::{FolderSummary, GalleryData, GalleryFolder, GalleryImage};
use crate::storage::DocumentStore;

/// Collection document holding every gallery folder.
pub const GALLERY_DOC: &str = "gallery.json";

/// Gallery collection manager: folder lifecycle, cover semantics and image
/// ordering.
pub struct GalleryService;

impl GalleryService {
    async fn read_all(docs: &DocumentStore) -> Result<GalleryData> {
        match docs.load(GALLERY_DOC, GalleryData::default).await {
            Ok(doc) => Ok(doc.data),
            Err(AppError::CorruptDocument(msg)) => {
                tracing::error!("Gallery document corrupt, serving empty collection: {}", msg);
                Ok(GalleryData::default())
            }
            Err(e) => Err(e),
        }
    }

    pub async fn list_folders(
        docs: &DocumentStore,
        cache: &CacheLayer,
        skip_cache: bool,
    ) -> Result<Vec<FolderSummary>> {
        if !skip_cache {
            if let Some(folders) = cache.get::<Vec<GalleryFolder>>(keys::GALLERY_FOLDERS).await {
                return Ok(folders.into_iter().map(Self::summarize).collect());
            }
        }

        let data = Self::read_all(docs).await?;
        if !skip_cache {
            cache.set(keys::GALLERY_FOLDERS, &data.folders, None).await;
        }
        Ok(data.folders.into_iter().map(Self::summarize).collect())
    }

    fn summarize(folder: GalleryFolder) -> FolderSummary {
        let cover_image = folder.cover_image().cloned();
        FolderSummary {
            folder,
            cover_image,
        }
    }

    pub async fn get_folder(
        docs: &DocumentStore,
        cache: &CacheLayer,
        folder_id: &str,
        skip_cache: bool,
    ) -> Result<GalleryFolder> {
        let key = keys::gallery_folder(folder_id);
        if !skip_cache {
            if let Some(folder) = cache.get::<GalleryFolder>(&key).await {
                return Ok(folder);
            }
        }

        let data = Self::read_all(docs).await?;
        let folder = data
            .folders
            .into_iter()
            .find(|f| f.id == folder_id)
            .ok_or_else(|| AppError::NotFound(format!("Folder not found: {}", folder_id)))?;

        if !skip_cache {
            cache.set(&key, &folder, None).await;
        }
        Ok(folder)
    }

    pub async fn create_folder(
        docs: &DocumentStore,
        cache: &CacheLayer,
        name: String,
    ) -> Result<GalleryFolder> {
        if name.trim().is_empty() {
            return Err(AppError::BadRequest("Folder name must not be empty".to_string()));
        }

        let now = Utc::now();
        let folder = GalleryFolder {
            id: format!("folder-{}", now.timestamp_millis()),
            name,
            cover: None,
            images: Vec::new(),
            created_at: now.to_rfc3339(),
            updated_at: now.to_rfc3339(),
        };

        let created = docs
            .update(GALLERY_DOC, GalleryData::default, |data: &mut GalleryData| {
                data.folders.push(folder.clone());
                Ok(folder.clone())
            })
            .await?;

        cache.delete(keys::GALLERY_FOLDERS).await;
        Ok(created)
    }

    pub async fn rename_folder(
        docs: &DocumentStore,
        cache: &CacheLayer,
        folder_id: &str,
        new_name: String,
    ) -> Result<GalleryFolder> {
        let renamed = docs
            .update(GALLERY_DOC, GalleryData::default, |data: &mut GalleryData| {
                let folder = Self::folder_mut(data, folder_id)?;
                folder.name = new_name.clone();
                folder.updated_at = Utc::now().to_rfc3339();
                Ok(folder.clone())
            })
            .await?;

        Self::invalidate_folder(cache, folder_id).await;
        Ok(renamed)
    }

    /// Delete a folder and reclaim every image it owns. Physical deletes are
    /// best-effort; the folder removal itself always completes.
    pub async fn delete_folder(
        docs: &DocumentStore,
        cache: &CacheLayer,
        images: &ImageStore,
        folder_id: &str,
    ) -> Result<()> {
        let removed = docs
            .update(GALLERY_DOC, GalleryData::default, |data: &mut GalleryData| {
                let index = data
                    .folders
                    .iter()
                    .position(|f| f.id == folder_id)
                    .ok_or_else(|| {
                        AppError::NotFound(format!("Folder not found: {}", folder_id))
                    })?;
                Ok(data.folders.remove(index))
            })
            .await?;

        for image in &removed.images {
            if let Err(e) = images.delete_by_url(&image.original_url).await {
                tracing::warn!("Failed to delete image {}: {}", image.original_url, e);
            }
        }

        // Sub-keys of the folder are not individually known here.
        cache.delete_by_pattern("gallery:*").await;
        Ok(())
    }

    /// Ingest an upload into a folder. The first image of a folder becomes
    /// its cover.
    pub async fn upload_image(
        docs: &DocumentStore,
        cache: &CacheLayer,
        images: &ImageStore,
        folder_id: &str,
        data: Bytes,
        file_name: &str,
        content_type: &str,
    ) -> Result<GalleryImage> {
        // Fail before paying for the derivative pipeline.
        Self::get_folder(docs, cache, folder_id, true).await?;

        let uploaded = images.ingest(data, file_name, content_type).await?;

        let now = Utc::now();
        let random: String = rand::thread_rng()
            .sample_iter(&Alphanumeric)
            .take(6)
            .map(|c| (c as char).to_ascii_lowercase())
            .collect();
        let image = GalleryImage {
            id: format!("img-{}-{}", now.timestamp_millis(), random),
            thumbnail_url: uploaded.thumbnail_url.clone(),
            original_url: uploaded.original_url.clone(),
            file_name: file_name.to_string(),
            timestamp: now.timestamp_millis(),
        };

        let attach = docs
            .update(GALLERY_DOC, GalleryData::default, |data: &mut GalleryData| {
                let folder = Self::folder_mut(data, folder_id)?;
                folder.images.push(image.clone());
                if folder.cover.is_none() {
                    folder.cover = Some(image.id.clone());
                }
                folder.updated_at = Utc::now().to_rfc3339();
                Ok(())
            })
            .await;

        if let Err(e) = attach {
            // The folder vanished mid-upload; do not leave orphan objects.
            if let Err(cleanup) = images.delete_by_url(&uploaded.original_url).await {
                tracing::warn!("Failed to clean up orphan upload: {}", cleanup);
            }
            return Err(e);
        }

        Self::invalidate_folder(cache, folder_id).await;
        Ok(image)
    }

    /// Remove an image from a folder, deleting its physical objects. When
    /// the cover was removed, the first remaining image takes over (or the
    /// cover clears).
    pub async fn delete_image(
        docs: &DocumentStore,
        cache: &CacheLayer,
        images: &ImageStore,
        folder_id: &str,
        image_id: &str,
    ) -> Result<()> {
        let removed = docs
            .update(GALLERY_DOC, GalleryData::default, |data: &mut GalleryData| {
                let folder = Self::folder_mut(data, folder_id)?;
                let index = folder
                    .images
                    .iter()
                    .position(|img| img.id == image_id)
                    .ok_or_else(|| {
                        AppError::NotFound(format!("Image not found: {}", image_id))
                    })?;
                let removed = folder.images.remove(index);

                if folder.cover.as_deref() == Some(image_id) {
                    folder.cover = folder.images.first().map(|img| img.id.clone());
                }
                folder.updated_at = Utc::now().to_rfc3339();
                Ok(removed)
            })
            .await?;

        if let Err(e) = images.delete_by_url(&removed.original_url).await {
            tracing::warn!("Failed to delete image {}: {}", removed.original_url, e);
        }

        Self::invalidate_folder(cache, folder_id).await;
        Ok(())
    }

    pub async fn set_cover(
        docs: &DocumentStore,
        cache: &CacheLayer,
        folder_id: &str,
        image_id: &str,
    ) -> Result<()> {
        docs.update(GALLERY_DOC, GalleryData::default, |data: &mut GalleryData| {
            let folder = Self::folder_mut(data, folder_id)?;
            if !folder.images.iter().any(|img| img.id == image_id) {
                return Err(AppError::BadRequest(format!(
                    "Image {} is not in folder {}",
                    image_id, folder_id
                )));
            }
            folder.cover = Some(image_id.to_string());
            folder.updated_at = Utc::now().to_rfc3339();
            Ok(())
        })
        .await?;

        Self::invalidate_folder(cache, folder_id).await;
        Ok(())
    }

    /// Resequence a folder's images to match `ordered_ids`. The id set must
    /// be exactly the current one; anything else is `InvalidReorder` and
    /// leaves the stored order untouched.
    pub async fn reorder(
        docs: &DocumentStore,
        cache: &CacheLayer,
        folder_id: &str,
        ordered_ids: &[String],
    ) -> Result<()> {
        docs.update(GALLERY_DOC, GalleryData::default, |data: &mut GalleryData| {
            let folder = Self::folder_mut(data, folder_id)?;

            if ordered_ids.len() != folder.images.len() {
                return Err(AppError::InvalidReorder(format!(
                    "Expected {} image ids, got {}",
                    folder.images.len(),
                    ordered_ids.len()
                )));
            }

            let mut reordered = Vec::with_capacity(folder.images.len());
            let mut remaining: Vec<Option<GalleryImage>> =
                folder.images.iter().cloned().map(Some).collect();
            for id in ordered_ids {
                let index = remaining
                    .iter()
                    .position(|slot| slot.as_ref().map(|img| img.id.as_str()) == Some(id.as_str()))
                    .ok_or_else(|| {
                        AppError::InvalidReorder(format!("Unknown or duplicate image id: {}", id))
                    })?;
                if let Some(image) = remaining[index].take() {
                    reordered.push(image);
                }
            }

            folder.images = reordered;
            folder.updated_at = Utc::now().to_rfc3339();
            Ok(())
        })
        .await?;

        Self::invalidate_folder(cache, folder_id).await;
        Ok(())
    }

    fn folder_mut<'a>(data: &'a mut GalleryData, folder_id: &str) -> Result<&'a mut GalleryFolder> {
        data.folders
            .iter_mut()
            .find(|f| f.id == folder_id)
            .ok_or_else(|| AppError::NotFound(format!("Folder not found: {}", folder_id)))
    }

    async fn invalidate_folder(cache: &CacheLayer, folder_id: &str) {
        cache.delete(&keys::gallery_folder(folder_id)).await;
        cache.delete(keys::GALLERY_FOLDERS).await;
    }
}
