use axum::http::HeaderMap;

use crate::error::{AppError, Result};
use crate::AppState;

/// Cookie carrying the admin session token.
pub const SESSION_COOKIE: &str = "admin_session";

/// Session token from either a bearer header or the session cookie.
pub fn token_from_headers(headers: &HeaderMap) -> Option<String> {
    if let Some(auth) = headers.get("Authorization").and_then(|h| h.to_str().ok()) {
        if let Some(token) = auth.strip_prefix("Bearer ") {
            return Some(token.to_string());
        }
    }

    let cookies = headers.get("Cookie")?.to_str().ok()?;
    let prefix = format!("{}=", SESSION_COOKIE);
    cookies
        .split(';')
        .map(str::trim)
        .find_map(|cookie| cookie.strip_prefix(prefix.as_str()).map(str::to_string))
}

/// Gate for every mutating operation: the core trusts this check and
/// performs no further authorization.
pub async fn require_admin(state: &AppState, headers: &HeaderMap) -> Result<()> {
    let token = token_from_headers(headers)
        .ok_or_else(|| AppError::Unauthorized("Missing session token".to_string()))?;

    if !state.sessions.verify(&token).await {
        return Err(AppError::Unauthorized(
            "Invalid or expired session".to_string(),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn test_bearer_token_extraction() {
        let mut headers = HeaderMap::new();
        headers.insert("Authorization", HeaderValue::from_static("Bearer abc123"));
        assert_eq!(token_from_headers(&headers), Some("abc123".to_string()));
    }

    #[test]
    fn test_cookie_token_extraction() {
        let mut headers = HeaderMap::new();
        headers.insert(
            "Cookie",
            HeaderValue::from_static("theme=dark; admin_session=tok-1; lang=en"),
        );
        assert_eq!(token_from_headers(&headers), Some("tok-1".to_string()));
    }

    #[test]
    fn test_missing_token() {
        assert_eq!(token_from_headers(&HeaderMap::new()), None);
    }
}
