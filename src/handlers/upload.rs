use axum::{
    extract::{Multipart, State},
    http::HeaderMap,
    Json,
};
use bytes::Bytes;
use serde::Serialize;

use crate::error::{ApiResponse, AppError, Result};
use crate::images::progressive_ref;
use crate::middleware::auth::require_admin;
use crate::AppState;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadResponse {
    pub thumbnail_url: String,
    pub original_url: String,
    /// Ready-to-paste Markdown reference whose thumbnail URL carries a
    /// pointer to the original for progressive loading.
    pub markdown: String,
}

/// Pull the `file` field out of a multipart body.
pub(crate) async fn read_image_field(
    mut multipart: Multipart,
) -> Result<(String, String, Bytes)> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::BadRequest(format!("Failed to process multipart: {}", e)))?
    {
        if field.name() != Some("file") {
            continue;
        }

        let file_name = field.file_name().unwrap_or("upload.jpg").to_string();
        let content_type = match field.content_type() {
            Some(content_type) => content_type.to_string(),
            None => mime_guess::from_path(&file_name)
                .first_or_octet_stream()
                .to_string(),
        };
        let data = field
            .bytes()
            .await
            .map_err(|e| AppError::BadRequest(format!("Failed to read upload: {}", e)))?;
        return Ok((file_name, content_type, data));
    }

    Err(AppError::BadRequest("No file provided".to_string()))
}

/// List every stored image URL
/// GET /api/images
pub async fn list_images(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<ApiResponse<Vec<String>>>> {
    require_admin(&state, &headers).await?;
    let images = state.images.list().await?;
    Ok(Json(ApiResponse::success(images)))
}

/// Ingest an image for embedding into post content
/// POST /api/upload
pub async fn upload_image(
    State(state): State<AppState>,
    headers: HeaderMap,
    multipart: Multipart,
) -> Result<Json<ApiResponse<UploadResponse>>> {
    require_admin(&state, &headers).await?;

    let (file_name, content_type, data) = read_image_field(multipart).await?;
    let uploaded = state.images.ingest(data, &file_name, &content_type).await?;

    let markdown = format!(
        "![{}]({})",
        uploaded.file_name,
        progressive_ref(&uploaded.thumbnail_url, &uploaded.original_url)
    );
    Ok(Json(ApiResponse::success(UploadResponse {
        thumbnail_url: uploaded.thumbnail_url,
        original_url: uploaded.original_url,
        markdown,
    })))
}
