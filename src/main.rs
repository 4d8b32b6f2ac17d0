mod cache;
mod config;
mod error;
mod handlers;
mod images;
mod middleware;
mod models;
mod services;
mod storage;

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use std::time::Duration;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::cache::CacheLayer;
use crate::config::Config;
use crate::images::ImageStore;
use crate::services::{AboutCache, SessionStore};
use crate::storage::DocumentStore;

/// Application state shared across handlers. Everything stateful is
/// constructed exactly once here and injected; there is no ambient global
/// client or session map.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub documents: Arc<DocumentStore>,
    pub images: Arc<ImageStore>,
    pub cache: Arc<CacheLayer>,
    pub sessions: Arc<SessionStore>,
    pub about_memory: Arc<AboutCache>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "inkstone=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting inkstone...");

    // Load configuration
    let config = Arc::new(Config::load()?);
    tracing::info!("Configuration loaded");

    // Select the storage backend once, at startup
    let (document_blobs, image_blobs) = storage::build_stores(&config).await?;
    tracing::info!("Storage backend: {}", document_blobs.backend());

    let documents = Arc::new(DocumentStore::new(document_blobs));
    let images = Arc::new(ImageStore::new(image_blobs, config.images.clone()));
    let cache = Arc::new(CacheLayer::connect(&config.cache.url, config.cache.ttl_seconds).await);
    let sessions = Arc::new(SessionStore::new(Duration::from_secs(
        config.auth.session_ttl_hours * 60 * 60,
    )));
    let about_memory = Arc::new(AboutCache::new());

    // Hourly sweep of expired sessions
    let sweeper = sessions.clone();
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_secs(60 * 60));
        loop {
            interval.tick().await;
            sweeper.sweep().await;
        }
    });

    // Create app state
    let state = AppState {
        config: config.clone(),
        documents,
        images,
        cache,
        sessions,
        about_memory,
    };

    // Build router
    let app = create_router(state);

    // Start server
    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Server listening on {}", addr);

    axum::serve(listener, app).await?;

    Ok(())
}

fn create_router(state: AppState) -> Router {
    // CORS configuration
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let body_limit = state.config.images.max_upload_bytes + 1024 * 1024;

    let api = Router::new()
        // Auth
        .route("/auth/login", post(handlers::auth::login))
        .route("/auth/logout", post(handlers::auth::logout))
        // Posts
        .route(
            "/posts",
            get(handlers::posts::list_posts).post(handlers::posts::create_post),
        )
        .route(
            "/posts/:id",
            get(handlers::posts::get_post)
                .put(handlers::posts::update_post)
                .delete(handlers::posts::delete_post),
        )
        // Gallery
        .route(
            "/gallery",
            get(handlers::gallery::list_folders)
                .post(handlers::gallery::create_folder)
                .delete(handlers::gallery::delete_folder),
        )
        .route(
            "/gallery/:folder_id",
            get(handlers::gallery::get_folder)
                .post(handlers::gallery::upload_image)
                .put(handlers::gallery::update_folder)
                .delete(handlers::gallery::delete_image),
        )
        // About
        .route(
            "/about",
            get(handlers::about::get_about).put(handlers::about::update_about),
        )
        // Content images
        .route("/upload", post(handlers::upload::upload_image))
        .route("/images", get(handlers::upload::list_images));

    Router::new()
        .nest("/api", api)
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}
