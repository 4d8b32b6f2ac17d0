//! Read-through cache in front of the document store.
//!
//! Every key is namespaced under a fixed prefix before touching Redis;
//! callers only ever see logical keys. The backing cache is an optimization:
//! any failure degrades to a miss or a no-op, never to a caller-visible
//! error.

use redis::{aio::ConnectionManager, AsyncCommands, Client};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

/// Namespace prefix applied to every key.
pub const CACHE_PREFIX: &str = "blog:";

/// Logical cache keys, scheme `{resource}:{identifier}`.
pub mod keys {
    pub const POSTS_LIST: &str = "posts:list";
    pub const ABOUT_CONTENT: &str = "about:content";
    pub const GALLERY_FOLDERS: &str = "gallery:folders";

    pub fn post_by_id(id: &str) -> String {
        format!("posts:{}", id)
    }

    pub fn post_by_slug(slug: &str) -> String {
        format!("posts:slug:{}", slug)
    }

    pub fn gallery_folder(folder_id: &str) -> String {
        format!("gallery:folder:{}", folder_id)
    }
}

/// Query parameters recognized on read endpoints; `?flight=skipCache`
/// bypasses the cache for one read. Writes are never skippable.
#[derive(Debug, Default, Deserialize)]
pub struct CacheQuery {
    pub flight: Option<String>,
}

impl CacheQuery {
    pub fn skip_cache(&self) -> bool {
        self.flight.as_deref() == Some("skipCache")
    }
}

pub struct CacheLayer {
    conn: Option<ConnectionManager>,
    default_ttl: u64,
}

impl CacheLayer {
    /// Connect to Redis. An empty URL or a failed connection yields a
    /// disabled layer where every read misses.
    pub async fn connect(url: &str, default_ttl: u64) -> Self {
        if url.is_empty() {
            tracing::warn!("No cache URL configured, caching disabled");
            return Self::disabled(default_ttl);
        }

        let client = match Client::open(url) {
            Ok(client) => client,
            Err(e) => {
                tracing::warn!("Invalid cache URL, caching disabled: {}", e);
                return Self::disabled(default_ttl);
            }
        };

        match ConnectionManager::new(client).await {
            Ok(conn) => {
                tracing::info!("Cache connected");
                Self {
                    conn: Some(conn),
                    default_ttl,
                }
            }
            Err(e) => {
                tracing::warn!("Cache connection failed, caching disabled: {}", e);
                Self::disabled(default_ttl)
            }
        }
    }

    pub fn disabled(default_ttl: u64) -> Self {
        Self {
            conn: None,
            default_ttl,
        }
    }

    fn prefixed(key: &str) -> String {
        format!("{}{}", CACHE_PREFIX, key)
    }

    pub async fn get<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let mut conn = self.conn.clone()?;
        let prefixed = Self::prefixed(key);

        let raw: Option<String> = match conn.get(&prefixed).await {
            Ok(value) => value,
            Err(e) => {
                tracing::warn!("Cache GET {} failed: {}", prefixed, e);
                return None;
            }
        };

        let raw = raw?;
        match serde_json::from_str(&raw) {
            Ok(value) => {
                tracing::debug!("Cache hit: {}", prefixed);
                Some(value)
            }
            Err(e) => {
                tracing::warn!("Cache entry {} undecodable, dropping: {}", prefixed, e);
                let _ = conn.del::<_, ()>(&prefixed).await;
                None
            }
        }
    }

    /// Store a value with a TTL in seconds (`None` uses the configured
    /// default).
    pub async fn set<T: Serialize>(&self, key: &str, value: &T, ttl: Option<u64>) {
        let Some(mut conn) = self.conn.clone() else {
            return;
        };
        let prefixed = Self::prefixed(key);

        let raw = match serde_json::to_string(value) {
            Ok(raw) => raw,
            Err(e) => {
                tracing::warn!("Cache SET {} skipped, unserializable: {}", prefixed, e);
                return;
            }
        };

        let ttl = ttl.unwrap_or(self.default_ttl);
        if let Err(e) = conn.set_ex::<_, _, ()>(&prefixed, raw, ttl).await {
            tracing::warn!("Cache SET {} failed: {}", prefixed, e);
        } else {
            tracing::debug!("Cache set: {} (ttl {}s)", prefixed, ttl);
        }
    }

    pub async fn delete(&self, key: &str) {
        let Some(mut conn) = self.conn.clone() else {
            return;
        };
        let prefixed = Self::prefixed(key);
        if let Err(e) = conn.del::<_, ()>(&prefixed).await {
            tracing::warn!("Cache DEL {} failed: {}", prefixed, e);
        }
    }

    /// Delete every key matching a glob pattern (logical, without prefix).
    /// Used after structural changes where the affected sub-keys are not
    /// individually known.
    pub async fn delete_by_pattern(&self, pattern: &str) {
        let Some(mut conn) = self.conn.clone() else {
            return;
        };
        let prefixed_pattern = Self::prefixed(pattern);

        let mut cursor: u64 = 0;
        let mut removed = 0usize;
        loop {
            let scanned: std::result::Result<(u64, Vec<String>), redis::RedisError> =
                redis::cmd("SCAN")
                    .arg(cursor)
                    .arg("MATCH")
                    .arg(&prefixed_pattern)
                    .arg("COUNT")
                    .arg(100)
                    .query_async(&mut conn)
                    .await;

            let (next, keys) = match scanned {
                Ok(page) => page,
                Err(e) => {
                    tracing::warn!("Cache SCAN {} failed: {}", prefixed_pattern, e);
                    return;
                }
            };

            if !keys.is_empty() {
                removed += keys.len();
                if let Err(e) = conn.del::<_, ()>(keys).await {
                    tracing::warn!("Cache bulk DEL failed: {}", e);
                    return;
                }
            }

            cursor = next;
            if cursor == 0 {
                break;
            }
        }
        if removed > 0 {
            tracing::debug!("Removed {} cache keys matching {}", removed, prefixed_pattern);
        }
    }
}
