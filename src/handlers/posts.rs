use axum::{
    extract::{Path, Query, State},
    http::HeaderMap,
    Json,
};

use crate::cache::CacheQuery;
use crate::error::{ApiResponse, AppError, Result};
use crate::middleware::auth::require_admin;
use crate::models::{NewPost, Post, PostPatch};
use crate::services::PostService;
use crate::AppState;

/// List all posts
/// GET /api/posts
pub async fn list_posts(
    State(state): State<AppState>,
    Query(query): Query<CacheQuery>,
) -> Result<Json<ApiResponse<Vec<Post>>>> {
    let posts = PostService::list(&state.documents, &state.cache, query.skip_cache()).await?;
    Ok(Json(ApiResponse::success(posts)))
}

/// Get one post by id, falling back to slug lookup
/// GET /api/posts/:id
pub async fn get_post(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Query(query): Query<CacheQuery>,
) -> Result<Json<ApiResponse<Post>>> {
    let skip_cache = query.skip_cache();
    let post = match PostService::get_by_id(&state.documents, &state.cache, &id, skip_cache).await
    {
        Ok(post) => post,
        Err(AppError::NotFound(_)) => {
            PostService::get_by_slug(&state.documents, &state.cache, &id, skip_cache).await?
        }
        Err(e) => return Err(e),
    };
    Ok(Json(ApiResponse::success(post)))
}

/// Create a post
/// POST /api/posts
pub async fn create_post(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<NewPost>,
) -> Result<Json<ApiResponse<Post>>> {
    require_admin(&state, &headers).await?;
    let post = PostService::create(&state.documents, &state.cache, req).await?;
    Ok(Json(ApiResponse::success(post)))
}

/// Update a post
/// PUT /api/posts/:id
pub async fn update_post(
    State(state): State<AppState>,
    Path(id): Path<String>,
    headers: HeaderMap,
    Json(req): Json<PostPatch>,
) -> Result<Json<ApiResponse<Post>>> {
    require_admin(&state, &headers).await?;
    let post = PostService::update(&state.documents, &state.cache, &id, req).await?;
    Ok(Json(ApiResponse::success(post)))
}

/// Delete a post and its owned images
/// DELETE /api/posts/:id
pub async fn delete_post(
    State(state): State<AppState>,
    Path(id): Path<String>,
    headers: HeaderMap,
) -> Result<Json<ApiResponse<Post>>> {
    require_admin(&state, &headers).await?;
    let post = PostService::delete(&state.documents, &state.cache, &state.images, &id).await?;
    Ok(Json(ApiResponse::success(post)))
}
