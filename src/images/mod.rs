//! Image store: two derivative objects per upload (thumbnail + original),
//! linked by an explicit name pair and served through signed URLs.

pub mod pipeline;

use bytes::Bytes;
use chrono::Utc;
use rand::distributions::Alphanumeric;
use rand::Rng;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;

use crate::config::ImageConfig;
use crate::error::{AppError, Result};
use crate::storage::{BlobStore, PutOptions};

/// Reserved infix inserted before the extension of thumbnail object names.
pub const THUMBNAIL_INFIX: &str = "-thumb";

/// Ingestion allow-list; everything else is rejected before decoding.
pub const ALLOWED_CONTENT_TYPES: [&str; 4] =
    ["image/jpeg", "image/png", "image/gif", "image/webp"];

/// The two physical object names behind one logical image. Carrying both
/// names explicitly keeps the pairing robust even when a file name happens
/// to contain the infix token somewhere else.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImagePair {
    pub original: String,
    pub thumbnail: String,
}

impl ImagePair {
    /// Fresh collision-resistant pair: `{millis}-{random}.{ext}` and
    /// `{millis}-{random}-thumb.{ext}`, extension taken from the uploaded
    /// file name.
    pub fn generate(original_file_name: &str) -> Self {
        let ext = original_file_name
            .rsplit_once('.')
            .map(|(_, ext)| ext.to_lowercase())
            .filter(|ext| !ext.is_empty())
            .unwrap_or_else(|| "jpg".to_string());

        let millis = Utc::now().timestamp_millis();
        let random: String = rand::thread_rng()
            .sample_iter(&Alphanumeric)
            .take(6)
            .map(|c| (c as char).to_ascii_lowercase())
            .collect();

        let stem = format!("{}-{}", millis, random);
        Self {
            original: format!("{}.{}", stem, ext),
            thumbnail: format!("{}{}.{}", stem, THUMBNAIL_INFIX, ext),
        }
    }

    /// Recover the pair from either of its object names. Only a `-thumb`
    /// directly before the final extension counts as the thumbnail marker.
    pub fn from_object_name(name: &str) -> Self {
        match name.rsplit_once('.') {
            Some((stem, ext)) => match stem.strip_suffix(THUMBNAIL_INFIX) {
                Some(base) => Self {
                    original: format!("{}.{}", base, ext),
                    thumbnail: name.to_string(),
                },
                None => Self {
                    original: name.to_string(),
                    thumbnail: format!("{}{}.{}", stem, THUMBNAIL_INFIX, ext),
                },
            },
            None => Self {
                original: name.to_string(),
                thumbnail: format!("{}{}", name, THUMBNAIL_INFIX),
            },
        }
    }
}

/// Result of ingesting one upload.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadedImage {
    pub thumbnail_url: String,
    pub original_url: String,
    pub file_name: String,
    #[serde(skip)]
    pub pair: ImagePair,
}

/// Thumbnail URL carrying a pointer to its high-resolution original, for
/// progressive loading inside Markdown content.
pub fn progressive_ref(thumbnail_url: &str, original_url: &str) -> String {
    format!(
        "{}#original={}",
        thumbnail_url,
        urlencoding::encode(original_url)
    )
}

/// Trailing path segment of a URL, with query string and fragment stripped.
fn object_name_from_url(url: &str) -> Option<String> {
    let without_fragment = url.split('#').next().unwrap_or(url);
    let without_query = without_fragment.split('?').next().unwrap_or(without_fragment);
    let name = without_query.rsplit('/').next()?;
    if name.is_empty() {
        return None;
    }
    urlencoding::decode(name).ok().map(|n| n.into_owned())
}

pub struct ImageStore {
    blobs: Arc<dyn BlobStore>,
    config: ImageConfig,
}

impl ImageStore {
    pub fn new(blobs: Arc<dyn BlobStore>, config: ImageConfig) -> Self {
        Self { blobs, config }
    }

    fn signed_ttl(&self) -> Duration {
        Duration::from_secs(self.config.signed_url_days * 24 * 60 * 60)
    }

    /// Ingest an upload: produce both derivatives, store them, and return
    /// their signed URLs.
    pub async fn ingest(
        &self,
        data: Bytes,
        original_file_name: &str,
        content_type: &str,
    ) -> Result<UploadedImage> {
        if !ALLOWED_CONTENT_TYPES.contains(&content_type) {
            return Err(AppError::UnsupportedMediaType(format!(
                "Only JPEG, PNG, GIF and WebP uploads are accepted, got {}",
                content_type
            )));
        }
        if data.len() > self.config.max_upload_bytes {
            return Err(AppError::BadRequest(format!(
                "Upload exceeds the {} byte limit",
                self.config.max_upload_bytes
            )));
        }

        let pair = ImagePair::generate(original_file_name);

        // Encoding is CPU-bound; keep it off the request executor.
        let thumb_input = data.clone();
        let (thumb_width, thumb_quality) =
            (self.config.thumbnail_max_width, self.config.thumbnail_quality);
        let thumbnail_bytes = tokio::task::spawn_blocking(move || {
            pipeline::compress(&thumb_input, thumb_width, thumb_quality)
        })
        .await
        .map_err(|e| AppError::Internal(format!("Thumbnail task failed: {}", e)))?;

        let original_input = data.clone();
        let (original_width, original_quality) =
            (self.config.original_max_width, self.config.original_quality);
        let original_bytes = tokio::task::spawn_blocking(move || {
            pipeline::compress(&original_input, original_width, original_quality)
        })
        .await
        .map_err(|e| AppError::Internal(format!("Original variant task failed: {}", e)))?;

        self.blobs
            .put(
                &pair.thumbnail,
                thumbnail_bytes.into(),
                PutOptions::media(content_type),
            )
            .await?;
        self.blobs
            .put(
                &pair.original,
                original_bytes.into(),
                PutOptions::media(content_type),
            )
            .await?;

        tracing::info!(
            "Stored image pair {} / {}",
            pair.original,
            pair.thumbnail
        );

        Ok(UploadedImage {
            thumbnail_url: self.blobs.signed_url(&pair.thumbnail, self.signed_ttl()),
            original_url: self.blobs.signed_url(&pair.original, self.signed_ttl()),
            file_name: original_file_name.to_string(),
            pair,
        })
    }

    /// Whether a URL points into this image container.
    pub fn owns_url(&self, url: &str) -> bool {
        let without_fragment = url.split('#').next().unwrap_or(url);
        let without_query = without_fragment.split('?').next().unwrap_or(without_fragment);
        without_query.starts_with(&self.blobs.url(""))
    }

    /// Delete both physical objects behind an image URL. Already-removed
    /// objects are not an error; callers treat any failure as best-effort.
    pub async fn delete_by_url(&self, url: &str) -> Result<()> {
        let Some(name) = object_name_from_url(url) else {
            return Ok(());
        };
        let pair = ImagePair::from_object_name(&name);
        self.blobs.delete(&pair.thumbnail).await?;
        self.blobs.delete(&pair.original).await?;
        tracing::debug!("Deleted image pair {} / {}", pair.original, pair.thumbnail);
        Ok(())
    }

    /// Every stored image URL (admin surface).
    pub async fn list(&self) -> Result<Vec<String>> {
        let names = self.blobs.list(None).await?;
        Ok(names.into_iter().map(|n| self.blobs.url(&n)).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::memory::MemoryStore;

    fn image_store() -> (Arc<MemoryStore>, ImageStore) {
        let blobs = Arc::new(MemoryStore::new("https://storage.test/blog-images"));
        let store = ImageStore::new(blobs.clone(), ImageConfig::default());
        (blobs, store)
    }

    fn jpeg_fixture() -> Bytes {
        let img = image::DynamicImage::ImageRgb8(image::RgbImage::from_pixel(
            1600,
            1200,
            image::Rgb([5, 5, 5]),
        ));
        let mut out = std::io::Cursor::new(Vec::new());
        img.write_with_encoder(image::codecs::jpeg::JpegEncoder::new_with_quality(
            &mut out, 90,
        ))
        .unwrap();
        Bytes::from(out.into_inner())
    }

    #[test]
    fn test_pair_generation_shares_stem() {
        let pair = ImagePair::generate("holiday photo.JPG");
        assert!(pair.original.ends_with(".jpg"));
        assert!(pair.thumbnail.ends_with("-thumb.jpg"));
        let stem = pair.original.trim_end_matches(".jpg");
        assert_eq!(pair.thumbnail, format!("{}-thumb.jpg", stem));
    }

    #[test]
    fn test_pair_generation_defaults_extension() {
        let pair = ImagePair::generate("no-extension");
        assert!(pair.original.ends_with(".jpg"));
    }

    #[test]
    fn test_pair_from_either_name() {
        let from_original = ImagePair::from_object_name("1700-ab12cd.png");
        assert_eq!(from_original.original, "1700-ab12cd.png");
        assert_eq!(from_original.thumbnail, "1700-ab12cd-thumb.png");

        let from_thumb = ImagePair::from_object_name("1700-ab12cd-thumb.png");
        assert_eq!(from_thumb, from_original);
    }

    #[test]
    fn test_infix_only_matches_before_extension() {
        // "-thumb" mid-name must not be treated as the thumbnail marker.
        let pair = ImagePair::from_object_name("my-thumb-drive.jpg");
        assert_eq!(pair.original, "my-thumb-drive.jpg");
        assert_eq!(pair.thumbnail, "my-thumb-drive-thumb.jpg");
    }

    #[test]
    fn test_progressive_ref_encodes_original() {
        let r = progressive_ref("https://x/t.jpg?sig=a", "https://x/o.jpg?sig=b");
        assert_eq!(
            r,
            "https://x/t.jpg?sig=a#original=https%3A%2F%2Fx%2Fo.jpg%3Fsig%3Db"
        );
    }

    #[test]
    fn test_object_name_from_url_strips_query_and_fragment() {
        assert_eq!(
            object_name_from_url("https://x/c/a.jpg?sv=1&sig=z#original=abc"),
            Some("a.jpg".to_string())
        );
        assert_eq!(object_name_from_url("https://x/c/"), None);
    }

    #[tokio::test]
    async fn test_ingest_stores_both_variants() {
        let (blobs, store) = image_store();
        let uploaded = store
            .ingest(jpeg_fixture(), "pic.jpg", "image/jpeg")
            .await
            .unwrap();

        let names = blobs.object_names();
        assert_eq!(names.len(), 2);
        assert!(names.contains(&uploaded.pair.original));
        assert!(names.contains(&uploaded.pair.thumbnail));

        // The two names differ only by the reserved infix.
        assert_eq!(
            uploaded.pair.thumbnail.replace(THUMBNAIL_INFIX, ""),
            uploaded.pair.original
        );

        // Thumbnail got capped, original variant kept its size (<=1920).
        let (thumb_data, _) = blobs.get(&uploaded.pair.thumbnail).await.unwrap().unwrap();
        let thumb = image::load_from_memory(&thumb_data).unwrap();
        assert!(thumb.width() <= 800);

        let (orig_data, _) = blobs.get(&uploaded.pair.original).await.unwrap().unwrap();
        let orig = image::load_from_memory(&orig_data).unwrap();
        assert_eq!(orig.width(), 1600);
    }

    #[tokio::test]
    async fn test_ingest_rejects_disallowed_type() {
        let (_, store) = image_store();
        let err = store
            .ingest(Bytes::from_static(b"x"), "a.svg", "image/svg+xml")
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::UnsupportedMediaType(_)));
    }

    #[tokio::test]
    async fn test_delete_by_url_removes_both_objects() {
        let (blobs, store) = image_store();
        let uploaded = store
            .ingest(jpeg_fixture(), "pic.jpg", "image/jpeg")
            .await
            .unwrap();

        // Delete via the signed thumbnail URL, fragment included.
        let url = progressive_ref(&uploaded.thumbnail_url, &uploaded.original_url);
        store.delete_by_url(&url).await.unwrap();

        assert!(blobs.object_names().is_empty());
        let deleted = blobs.deleted();
        assert!(deleted.contains(&uploaded.pair.original));
        assert!(deleted.contains(&uploaded.pair.thumbnail));
    }

    #[tokio::test]
    async fn test_owns_url() {
        let (_, store) = image_store();
        assert!(store.owns_url("https://storage.test/blog-images/a.jpg?sig=1"));
        assert!(!store.owns_url("https://elsewhere.example/a.jpg"));
    }
}
