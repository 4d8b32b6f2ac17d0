use axum::{
    extract::{Multipart, Path, Query, State},
    http::HeaderMap,
    Json,
};

use crate::cache::CacheQuery;
use crate::error::{ApiResponse, AppError, Result};
use crate::handlers::upload::read_image_field;
use crate::middleware::auth::require_admin;
use crate::models::{
    CreateFolderRequest, DeleteFolderRequest, DeleteImageRequest, FolderActionRequest,
    FolderSummary, GalleryFolder, GalleryImage,
};
use crate::services::GalleryService;
use crate::AppState;

/// List folders with resolved covers
/// GET /api/gallery
pub async fn list_folders(
    State(state): State<AppState>,
    Query(query): Query<CacheQuery>,
) -> Result<Json<ApiResponse<Vec<FolderSummary>>>> {
    let folders =
        GalleryService::list_folders(&state.documents, &state.cache, query.skip_cache()).await?;
    Ok(Json(ApiResponse::success(folders)))
}

/// Get one folder
/// GET /api/gallery/:folder_id
pub async fn get_folder(
    State(state): State<AppState>,
    Path(folder_id): Path<String>,
    Query(query): Query<CacheQuery>,
) -> Result<Json<ApiResponse<GalleryFolder>>> {
    let folder = GalleryService::get_folder(
        &state.documents,
        &state.cache,
        &folder_id,
        query.skip_cache(),
    )
    .await?;
    Ok(Json(ApiResponse::success(folder)))
}

/// Create a folder
/// POST /api/gallery
pub async fn create_folder(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<CreateFolderRequest>,
) -> Result<Json<ApiResponse<GalleryFolder>>> {
    require_admin(&state, &headers).await?;
    let folder = GalleryService::create_folder(&state.documents, &state.cache, req.name).await?;
    Ok(Json(ApiResponse::success(folder)))
}

/// Delete a whole folder and its images
/// DELETE /api/gallery
pub async fn delete_folder(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<DeleteFolderRequest>,
) -> Result<Json<ApiResponse<()>>> {
    require_admin(&state, &headers).await?;
    GalleryService::delete_folder(&state.documents, &state.cache, &state.images, &req.folder_id)
        .await?;
    Ok(Json(ApiResponse::<()>::success_message("Folder deleted")))
}

/// Upload an image into a folder
/// POST /api/gallery/:folder_id
pub async fn upload_image(
    State(state): State<AppState>,
    Path(folder_id): Path<String>,
    headers: HeaderMap,
    multipart: Multipart,
) -> Result<Json<ApiResponse<GalleryImage>>> {
    require_admin(&state, &headers).await?;

    let (file_name, content_type, data) = read_image_field(multipart).await?;
    let image = GalleryService::upload_image(
        &state.documents,
        &state.cache,
        &state.images,
        &folder_id,
        data,
        &file_name,
        &content_type,
    )
    .await?;
    Ok(Json(ApiResponse::success(image)))
}

/// Rename, set cover or reorder
/// PUT /api/gallery/:folder_id
pub async fn update_folder(
    State(state): State<AppState>,
    Path(folder_id): Path<String>,
    headers: HeaderMap,
    Json(req): Json<FolderActionRequest>,
) -> Result<Json<ApiResponse<()>>> {
    require_admin(&state, &headers).await?;

    match req.action.as_str() {
        "rename" => {
            let new_name = req
                .new_name
                .ok_or_else(|| AppError::BadRequest("newName is required".to_string()))?;
            GalleryService::rename_folder(&state.documents, &state.cache, &folder_id, new_name)
                .await?;
        }
        "setCover" => {
            let image_id = req
                .image_id
                .ok_or_else(|| AppError::BadRequest("imageId is required".to_string()))?;
            GalleryService::set_cover(&state.documents, &state.cache, &folder_id, &image_id)
                .await?;
        }
        "reorder" => {
            let image_ids = req
                .image_ids
                .ok_or_else(|| AppError::BadRequest("imageIds is required".to_string()))?;
            GalleryService::reorder(&state.documents, &state.cache, &folder_id, &image_ids)
                .await?;
        }
        other => {
            return Err(AppError::BadRequest(format!("Unknown action: {}", other)));
        }
    }

    Ok(Json(ApiResponse::<()>::success_message("Folder updated")))
}

/// Delete one image from a folder
/// DELETE /api/gallery/:folder_id
pub async fn delete_image(
    State(state): State<AppState>,
    Path(folder_id): Path<String>,
    headers: HeaderMap,
    Json(req): Json<DeleteImageRequest>,
) -> Result<Json<ApiResponse<()>>> {
    require_admin(&state, &headers).await?;
    GalleryService::delete_image(
        &state.documents,
        &state.cache,
        &state.images,
        &folder_id,
        &req.image_id,
    )
    .await?;
    Ok(Json(ApiResponse::<()>::success_message("Image deleted")))
}
