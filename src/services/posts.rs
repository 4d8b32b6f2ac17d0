use regex::Regex;
use std::sync::LazyLock;

use crate::cache::{keys, CacheLayer};
use crate::error::{AppError, Result};
use crate::images::ImageStore;
use crate::models::{NewPost, Post, PostPatch};
use crate::storage::DocumentStore;

/// Collection document holding every post.
pub const POSTS_DOC: &str = "posts.json";

static MARKDOWN_IMAGE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"!\[[^\]]*\]\(([^)]+)\)").unwrap());
static HTML_IMAGE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"<img[^>]+src=["']([^"']+)["']"#).unwrap());

/// Posts collection manager.
pub struct PostService;

impl PostService {
    /// Read the whole collection, falling back to an empty list when the
    /// stored document is corrupt. Mutations never take this fallback.
    async fn read_all(docs: &DocumentStore) -> Result<Vec<Post>> {
        match docs.load(POSTS_DOC, Vec::new).await {
            Ok(doc) => Ok(doc.data),
            Err(AppError::CorruptDocument(msg)) => {
                tracing::error!("Posts document corrupt, serving empty collection: {}", msg);
                Ok(Vec::new())
            }
            Err(e) => Err(e),
        }
    }

    pub async fn list(
        docs: &DocumentStore,
        cache: &CacheLayer,
        skip_cache: bool,
    ) -> Result<Vec<Post>> {
        if !skip_cache {
            if let Some(posts) = cache.get::<Vec<Post>>(keys::POSTS_LIST).await {
                return Ok(posts);
            }
        }

        let posts = Self::read_all(docs).await?;
        if !skip_cache {
            cache.set(keys::POSTS_LIST, &posts, None).await;
        }
        Ok(posts)
    }

    pub async fn get_by_id(
        docs: &DocumentStore,
        cache: &CacheLayer,
        id: &str,
        skip_cache: bool,
    ) -> Result<Post> {
        let key = keys::post_by_id(id);
        if !skip_cache {
            if let Some(post) = cache.get::<Post>(&key).await {
                return Ok(post);
            }
        }

        let posts = Self::read_all(docs).await?;
        let post = posts
            .into_iter()
            .find(|p| p.id == id)
            .ok_or_else(|| AppError::NotFound(format!("Post not found: {}", id)))?;

        if !skip_cache {
            cache.set(&key, &post, None).await;
        }
        Ok(post)
    }

    pub async fn get_by_slug(
        docs: &DocumentStore,
        cache: &CacheLayer,
        slug: &str,
        skip_cache: bool,
    ) -> Result<Post> {
        let key = keys::post_by_slug(slug);
        if !skip_cache {
            if let Some(post) = cache.get::<Post>(&key).await {
                return Ok(post);
            }
        }

        let posts = Self::read_all(docs).await?;
        let post = posts
            .into_iter()
            .find(|p| p.slug == slug)
            .ok_or_else(|| AppError::NotFound(format!("Post not found: {}", slug)))?;

        if !skip_cache {
            cache.set(&key, &post, None).await;
        }
        Ok(post)
    }

    /// Create a post; the assigned id is `1 + max(existing numeric ids)` as
    /// a decimal string, keeping ids ordering-friendly and human-readable.
    pub async fn create(docs: &DocumentStore, cache: &CacheLayer, new: NewPost) -> Result<Post> {
        let created = docs
            .update(POSTS_DOC, Vec::new, |posts: &mut Vec<Post>| {
                let post = new.clone().into_post(Self::next_id(posts));
                posts.push(post.clone());
                Ok(post)
            })
            .await?;

        cache.delete_by_pattern("posts:*").await;
        Ok(created)
    }

    pub async fn update(
        docs: &DocumentStore,
        cache: &CacheLayer,
        id: &str,
        patch: PostPatch,
    ) -> Result<Post> {
        let updated = docs
            .update(POSTS_DOC, Vec::new, |posts: &mut Vec<Post>| {
                let post = posts
                    .iter_mut()
                    .find(|p| p.id == id)
                    .ok_or_else(|| AppError::NotFound(format!("Post not found: {}", id)))?;
                patch.clone().apply(post);
                Ok(post.clone())
            })
            .await?;

        cache.delete_by_pattern("posts:*").await;
        Ok(updated)
    }

    /// Delete a post and reclaim the images it owns: the cover image plus
    /// every Markdown/HTML image reference in its content that points into
    /// the image container. Image cleanup is best-effort and never blocks
    /// the deletion itself.
    pub async fn delete(
        docs: &DocumentStore,
        cache: &CacheLayer,
        images: &ImageStore,
        id: &str,
    ) -> Result<Post> {
        let removed = docs
            .update(POSTS_DOC, Vec::new, |posts: &mut Vec<Post>| {
                let index = posts
                    .iter()
                    .position(|p| p.id == id)
                    .ok_or_else(|| AppError::NotFound(format!("Post not found: {}", id)))?;
                Ok(posts.remove(index))
            })
            .await?;

        let mut urls = Vec::new();
        if let Some(cover) = &removed.cover_image {
            urls.push(cover.clone());
        }
        urls.extend(extract_image_urls(&removed.content));

        for url in urls {
            if !images.owns_url(&url) {
                continue;
            }
            if let Err(e) = images.delete_by_url(&url).await {
                tracing::warn!("Failed to delete orphaned image {}: {}", url, e);
            }
        }

        cache.delete_by_pattern("posts:*").await;
        Ok(removed)
    }

    fn next_id(posts: &[Post]) -> String {
        let max_id = posts
            .iter()
            .filter_map(|p| p.id.parse::<u64>().ok())
            .max()
            .unwrap_or(0);
        (max_id + 1).to_string()
    }
}

/// Every image URL referenced from Markdown `![..](url)` and HTML
/// `<img src="url">` syntax.
pub fn extract_image_urls(content: &str) -> Vec<String> {
    let mut urls = Vec::new();
    for capture in MARKDOWN_IMAGE_RE.captures_iter(content) {
        urls.push(capture[1].to_string());
    }
    for capture in HTML_IMAGE_RE.captures_iter(content) {
        urls.push(capture[1].to_string());
    }
    urls
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ImageConfig;
    use crate::images::progressive_ref;
    use crate::storage::memory::MemoryStore;
    use bytes::Bytes;
    use std::sync::Arc;

    fn setup() -> (DocumentStore, CacheLayer, Arc<MemoryStore>, ImageStore) {
        let doc_blobs = Arc::new(MemoryStore::new("https://storage.test/blog-data"));
        let image_blobs = Arc::new(MemoryStore::new("https://storage.test/blog-images"));
        (
            DocumentStore::new(doc_blobs),
            CacheLayer::disabled(60),
            image_blobs.clone(),
            ImageStore::new(image_blobs, ImageConfig::default()),
        )
    }

    fn new_post(slug: &str, content: &str) -> NewPost {
        NewPost {
            slug: slug.to_string(),
            title: slug.to_string(),
            excerpt: String::new(),
            content: content.to_string(),
            date: "2026-08-01".to_string(),
            author: "me".to_string(),
            tags: vec![],
            cover_image: None,
            read_time: None,
            is_draft: false,
        }
    }

    fn tiny_jpeg() -> Bytes {
        let img = image::DynamicImage::ImageRgb8(image::RgbImage::from_pixel(
            16,
            16,
            image::Rgb([9, 9, 9]),
        ));
        let mut out = std::io::Cursor::new(Vec::new());
        img.write_with_encoder(image::codecs::jpeg::JpegEncoder::new_with_quality(
            &mut out, 80,
        ))
        .unwrap();
        Bytes::from(out.into_inner())
    }

    #[test]
    fn test_extract_image_urls() {
        let content = "intro\n\
            ![alt](https://x/c/a-thumb.jpg#original=https%3A%2F%2Fx%2Fc%2Fa.jpg)\n\
            text <img src=\"https://x/c/b.jpg\" alt=\"b\"> end\n\
            ![](https://elsewhere/c.png)";
        let urls = extract_image_urls(content);
        assert_eq!(urls.len(), 3);
        assert!(urls[0].starts_with("https://x/c/a-thumb.jpg#original="));
        assert_eq!(urls[1], "https://elsewhere/c.png");
        assert_eq!(urls[2], "https://x/c/b.jpg");
    }

    #[tokio::test]
    async fn test_ids_strictly_increase() {
        let (docs, cache, _, _) = setup();
        for expected in 1..=4u32 {
            let post = PostService::create(&docs, &cache, new_post("p", "")).await.unwrap();
            assert_eq!(post.id, expected.to_string());
        }
    }

    #[tokio::test]
    async fn test_id_generation_skips_past_max() {
        let (docs, cache, _, images) = setup();
        let a = PostService::create(&docs, &cache, new_post("a", "")).await.unwrap();
        PostService::create(&docs, &cache, new_post("b", "")).await.unwrap();
        PostService::delete(&docs, &cache, &images, &a.id).await.unwrap();

        let c = PostService::create(&docs, &cache, new_post("c", "")).await.unwrap();
        assert_eq!(c.id, "3");
    }

    #[tokio::test]
    async fn test_get_by_id_and_slug() {
        let (docs, cache, _, _) = setup();
        PostService::create(&docs, &cache, new_post("hello-world", "")).await.unwrap();

        let by_id = PostService::get_by_id(&docs, &cache, "1", false).await.unwrap();
        assert_eq!(by_id.slug, "hello-world");

        let by_slug = PostService::get_by_slug(&docs, &cache, "hello-world", false)
            .await
            .unwrap();
        assert_eq!(by_slug.id, "1");

        let missing = PostService::get_by_id(&docs, &cache, "99", false).await;
        assert!(matches!(missing, Err(AppError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_update_preserves_id() {
        let (docs, cache, _, _) = setup();
        PostService::create(&docs, &cache, new_post("a", "old")).await.unwrap();

        let patch = PostPatch {
            content: Some("new".to_string()),
            ..PostPatch::default()
        };
        let updated = PostService::update(&docs, &cache, "1", patch).await.unwrap();
        assert_eq!(updated.id, "1");
        assert_eq!(updated.content, "new");
    }

    #[tokio::test]
    async fn test_delete_reclaims_owned_images() {
        let (docs, cache, image_blobs, images) = setup();

        let cover = images.ingest(tiny_jpeg(), "cover.jpg", "image/jpeg").await.unwrap();
        let inline = images.ingest(tiny_jpeg(), "inline.jpg", "image/jpeg").await.unwrap();

        let content = format!(
            "body ![pic]({}) and <img src='https://elsewhere.example/keep.jpg'>",
            progressive_ref(&inline.thumbnail_url, &inline.original_url)
        );
        let mut post = new_post("with-images", &content);
        post.cover_image = Some(cover.original_url.clone());
        let created = PostService::create(&docs, &cache, post).await.unwrap();

        PostService::delete(&docs, &cache, &images, &created.id).await.unwrap();

        let deleted = image_blobs.deleted();
        assert!(deleted.contains(&cover.pair.original));
        assert!(deleted.contains(&cover.pair.thumbnail));
        assert!(deleted.contains(&inline.pair.original));
        assert!(deleted.contains(&inline.pair.thumbnail));
        // Foreign URL untouched.
        assert!(!deleted.iter().any(|n| n.contains("keep")));
    }

    #[tokio::test]
    async fn test_double_delete_returns_not_found() {
        let (docs, cache, _, images) = setup();
        let created = PostService::create(&docs, &cache, new_post("once", "")).await.unwrap();

        PostService::delete(&docs, &cache, &images, &created.id).await.unwrap();
        let second = PostService::delete(&docs, &cache, &images, &created.id).await;
        assert!(matches!(second, Err(AppError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_list_survives_corrupt_document() {
        let (docs, cache, _, _) = setup();
        docs.save_unchecked(POSTS_DOC, &serde_json::json!("not an array"))
            .await
            .unwrap();
        // A corrupt collection reads as empty rather than failing the page.
        let posts = PostService::list(&docs, &cache, false).await.unwrap();
        assert!(posts.is_empty());
    }
}
