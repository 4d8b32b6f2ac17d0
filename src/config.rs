use serde::Deserialize;
use std::env;
use std::fs;
use std::path::Path;

/// Application configuration
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub images: ImageConfig,
    #[serde(default)]
    pub auth: AuthConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

/// Storage backend, selected once at startup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    Local,
    Azure,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    #[serde(default = "default_backend")]
    pub backend: StorageBackend,
    #[serde(default)]
    pub local: LocalStorageConfig,
    #[serde(default)]
    pub azure: AzureStorageConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LocalStorageConfig {
    #[serde(default = "default_data_dir")]
    pub data_dir: String,
    #[serde(default = "default_media_dir")]
    pub media_dir: String,
    /// Base under which media files are served, prepended to object names
    /// when building image URLs.
    #[serde(default = "default_public_base")]
    pub public_base: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AzureStorageConfig {
    #[serde(default)]
    pub account: String,
    /// Base64 account access key. Empty means unauthenticated requests and
    /// unsigned URLs (public container assumed).
    #[serde(default)]
    pub access_key: String,
    /// Endpoint override, mainly for Azurite. Defaults to
    /// https://{account}.blob.core.windows.net
    #[serde(default)]
    pub endpoint: String,
    #[serde(default = "default_data_container")]
    pub data_container: String,
    #[serde(default = "default_images_container")]
    pub images_container: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CacheConfig {
    /// Redis URL. Empty disables caching entirely (every read is a miss).
    #[serde(default)]
    pub url: String,
    #[serde(default = "default_cache_ttl")]
    pub ttl_seconds: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ImageConfig {
    #[serde(default = "default_thumbnail_width")]
    pub thumbnail_max_width: u32,
    #[serde(default = "default_thumbnail_quality")]
    pub thumbnail_quality: u8,
    #[serde(default = "default_original_width")]
    pub original_max_width: u32,
    #[serde(default = "default_original_quality")]
    pub original_quality: u8,
    #[serde(default = "default_signed_url_days")]
    pub signed_url_days: u64,
    #[serde(default = "default_max_upload_bytes")]
    pub max_upload_bytes: usize,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct AuthConfig {
    /// Admin password. Empty disables login (all mutating routes 401).
    #[serde(default)]
    pub admin_password: String,
    #[serde(default = "default_session_ttl")]
    pub session_ttl_hours: u64,
}

// Default values
fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    1323
}

fn default_backend() -> StorageBackend {
    StorageBackend::Local
}

fn default_data_dir() -> String {
    "data/documents".to_string()
}

fn default_media_dir() -> String {
    "data/media".to_string()
}

fn default_public_base() -> String {
    "/media".to_string()
}

fn default_data_container() -> String {
    "blog-data".to_string()
}

fn default_images_container() -> String {
    "blog-images".to_string()
}

fn default_cache_ttl() -> u64 {
    3600
}

fn default_thumbnail_width() -> u32 {
    800
}

fn default_thumbnail_quality() -> u8 {
    80
}

fn default_original_width() -> u32 {
    1920
}

fn default_original_quality() -> u8 {
    100
}

fn default_signed_url_days() -> u64 {
    3650
}

fn default_max_upload_bytes() -> usize {
    20 * 1024 * 1024
}

fn default_session_ttl() -> u64 {
    24
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: default_backend(),
            local: LocalStorageConfig::default(),
            azure: AzureStorageConfig::default(),
        }
    }
}

impl Default for LocalStorageConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            media_dir: default_media_dir(),
            public_base: default_public_base(),
        }
    }
}

impl Default for AzureStorageConfig {
    fn default() -> Self {
        Self {
            account: String::new(),
            access_key: String::new(),
            endpoint: String::new(),
            data_container: default_data_container(),
            images_container: default_images_container(),
        }
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            ttl_seconds: default_cache_ttl(),
        }
    }
}

impl Default for ImageConfig {
    fn default() -> Self {
        Self {
            thumbnail_max_width: default_thumbnail_width(),
            thumbnail_quality: default_thumbnail_quality(),
            original_max_width: default_original_width(),
            original_quality: default_original_quality(),
            signed_url_days: default_signed_url_days(),
            max_upload_bytes: default_max_upload_bytes(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            storage: StorageConfig::default(),
            cache: CacheConfig::default(),
            images: ImageConfig::default(),
            auth: AuthConfig::default(),
        }
    }
}

impl Config {
    /// Load configuration from file and environment variables
    pub fn load() -> anyhow::Result<Self> {
        let mut config = Self::load_from_file()?;
        config.apply_env_overrides();
        config.ensure_directories()?;

        if config.auth.admin_password.is_empty() {
            tracing::warn!("No admin password configured; mutating routes will reject all logins");
        }
        if config.storage.backend == StorageBackend::Azure && config.storage.azure.account.is_empty() {
            anyhow::bail!("storage.azure.account is required for the azure backend");
        }

        Ok(config)
    }

    /// Load configuration from config.toml
    fn load_from_file() -> anyhow::Result<Self> {
        let config_paths = ["config.toml", "data/config.toml"];

        for path in config_paths {
            if Path::new(path).exists() {
                let content = fs::read_to_string(path)?;
                let config: Config = toml::from_str(&content)?;
                tracing::info!("Loaded configuration from {}", path);
                return Ok(config);
            }
        }

        tracing::info!("No configuration file found, using defaults");
        Ok(Config::default())
    }

    /// Apply environment variable overrides
    /// Format: INK_CONF_<SECTION>_<KEY>
    fn apply_env_overrides(&mut self) {
        // Server overrides
        if let Ok(val) = env::var("INK_CONF_SERVER_HOST") {
            self.server.host = val;
        }
        if let Ok(val) = env::var("INK_CONF_SERVER_PORT") {
            if let Ok(port) = val.parse() {
                self.server.port = port;
            }
        }

        // Storage overrides
        if let Ok(val) = env::var("INK_CONF_STORAGE_BACKEND") {
            match val.to_lowercase().as_str() {
                "local" => self.storage.backend = StorageBackend::Local,
                "azure" => self.storage.backend = StorageBackend::Azure,
                other => tracing::warn!("Unknown storage backend override: {}", other),
            }
        }
        if let Ok(val) = env::var("INK_CONF_LOCAL_DATA_DIR") {
            self.storage.local.data_dir = val;
        }
        if let Ok(val) = env::var("INK_CONF_LOCAL_MEDIA_DIR") {
            self.storage.local.media_dir = val;
        }
        if let Ok(val) = env::var("INK_CONF_AZURE_ACCOUNT") {
            self.storage.azure.account = val;
        }
        if let Ok(val) = env::var("INK_CONF_AZURE_ACCESS_KEY") {
            self.storage.azure.access_key = val;
        }
        if let Ok(val) = env::var("INK_CONF_AZURE_ENDPOINT") {
            self.storage.azure.endpoint = val;
        }

        // Cache overrides
        if let Ok(val) = env::var("INK_CONF_CACHE_URL") {
            self.cache.url = val;
        }
        if let Ok(val) = env::var("INK_CONF_CACHE_TTL") {
            if let Ok(ttl) = val.parse() {
                self.cache.ttl_seconds = ttl;
            }
        }

        // Auth overrides
        if let Ok(val) = env::var("INK_CONF_AUTH_ADMIN_PASSWORD") {
            self.auth.admin_password = val;
        }
        if let Ok(val) = env::var("INK_CONF_AUTH_SESSION_TTL") {
            if let Ok(hours) = val.parse() {
                self.auth.session_ttl_hours = hours;
            }
        }
    }

    /// Ensure required directories exist for the local backend
    fn ensure_directories(&self) -> anyhow::Result<()> {
        if self.storage.backend == StorageBackend::Local {
            fs::create_dir_all(&self.storage.local.data_dir)?;
            fs::create_dir_all(&self.storage.local.media_dir)?;
        }
        Ok(())
    }
}
