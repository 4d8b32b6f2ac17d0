use axum::{
    extract::State,
    http::HeaderMap,
    Json,
};

use crate::error::{ApiResponse, Result};
use crate::middleware::auth::require_admin;
use crate::models::{AboutContent, UpdateAboutRequest};
use crate::services::AboutService;
use crate::AppState;

/// Read the about page
/// GET /api/about
pub async fn get_about(
    State(state): State<AppState>,
) -> Result<Json<ApiResponse<AboutContent>>> {
    let content =
        AboutService::read(&state.documents, &state.cache, &state.about_memory).await?;
    Ok(Json(ApiResponse::success(content)))
}

/// Replace the about page
/// PUT /api/about
pub async fn update_about(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<UpdateAboutRequest>,
) -> Result<Json<ApiResponse<AboutContent>>> {
    require_admin(&state, &headers).await?;
    let content = AboutService::update(
        &state.documents,
        &state.cache,
        &state.about_memory,
        req.content,
    )
    .await?;
    Ok(Json(ApiResponse::success(content)))
}
