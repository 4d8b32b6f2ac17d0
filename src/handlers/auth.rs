use axum::{
    extract::State,
    http::{header, HeaderMap},
    response::IntoResponse,
    Json,
};
use serde::{Deserialize, Serialize};

use crate::error::{ApiResponse, Result};
use crate::middleware::auth::{token_from_headers, SESSION_COOKIE};
use crate::services::SessionService;
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub token: String,
}

/// Login with the admin password
/// POST /api/auth/login
pub async fn login(
    State(state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> Result<impl IntoResponse> {
    let token = SessionService::login(&state.sessions, &state.config.auth, &req.password).await?;

    let cookie = format!(
        "{}={}; Path=/; HttpOnly; SameSite=Lax",
        SESSION_COOKIE, token
    );
    Ok((
        [(header::SET_COOKIE, cookie)],
        Json(ApiResponse::success(LoginResponse { token })),
    ))
}

/// Drop the current session
/// POST /api/auth/logout
pub async fn logout(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<impl IntoResponse> {
    if let Some(token) = token_from_headers(&headers) {
        SessionService::logout(&state.sessions, &token).await;
    }

    let cookie = format!("{}=; Path=/; HttpOnly; Max-Age=0", SESSION_COOKIE);
    Ok((
        [(header::SET_COOKIE, cookie)],
        Json(ApiResponse::<()>::success_message("Logged out")),
    ))
}
