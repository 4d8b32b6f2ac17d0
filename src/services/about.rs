use std::time::{Duration, Instant};
use tokio::sync::RwLock;

use crate::cache::{keys, CacheLayer};
use crate::error::{AppError, Result};
use crate::models::{default_about, AboutContent};
use crate::storage::DocumentStore;

/// Singleton document holding the about-page content.
pub const ABOUT_DOC: &str = "about.json";

/// In-process tier: absorbs read bursts without a network round trip.
const MEMORY_TTL: Duration = Duration::from_secs(60);

/// TTL for the shared cache tier, shorter than the collection default.
const SHARED_CACHE_TTL: u64 = 600;

/// In-process memory cache for the about document. Constructed once at
/// startup and injected, like every other stateful collaborator.
pub struct AboutCache {
    entry: RwLock<Option<(AboutContent, Instant)>>,
}

impl AboutCache {
    pub fn new() -> Self {
        Self {
            entry: RwLock::new(None),
        }
    }

    async fn get(&self) -> Option<AboutContent> {
        let guard = self.entry.read().await;
        match guard.as_ref() {
            Some((content, stored_at)) if stored_at.elapsed() < MEMORY_TTL => {
                Some(content.clone())
            }
            _ => None,
        }
    }

    async fn put(&self, content: &AboutContent) {
        *self.entry.write().await = Some((content.clone(), Instant::now()));
    }

    async fn clear(&self) {
        *self.entry.write().await = None;
    }
}

impl Default for AboutCache {
    fn default() -> Self {
        Self::new()
    }
}

/// About-page manager: memory tier, then shared cache, then storage.
pub struct AboutService;

impl AboutService {
    pub async fn read(
        docs: &DocumentStore,
        cache: &CacheLayer,
        memory: &AboutCache,
    ) -> Result<AboutContent> {
        if let Some(content) = memory.get().await {
            return Ok(content);
        }

        if let Some(content) = cache.get::<AboutContent>(keys::ABOUT_CONTENT).await {
            memory.put(&content).await;
            return Ok(content);
        }

        let content = match docs.load(ABOUT_DOC, default_about).await {
            Ok(doc) => doc.data,
            Err(AppError::CorruptDocument(msg)) => {
                tracing::error!("About document corrupt, serving default content: {}", msg);
                default_about()
            }
            Err(e) => return Err(e),
        };

        cache
            .set(keys::ABOUT_CONTENT, &content, Some(SHARED_CACHE_TTL))
            .await;
        memory.put(&content).await;
        Ok(content)
    }

    pub async fn update(
        docs: &DocumentStore,
        cache: &CacheLayer,
        memory: &AboutCache,
        content: String,
    ) -> Result<AboutContent> {
        let updated = AboutContent::new(content);
        docs.update(ABOUT_DOC, default_about, |about: &mut AboutContent| {
            *about = updated.clone();
            Ok(())
        })
        .await?;

        // Invalidate, never update in place.
        memory.clear().await;
        cache.delete(keys::ABOUT_CONTENT).await;
        Ok(updated)
    }
}
