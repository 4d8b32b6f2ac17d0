use std::collections::HashMap;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::config::AuthConfig;
use crate::error::{AppError, Result};

/// Admin session store: opaque token to creation time. Constructed once at
/// startup and injected into the application state.
pub struct SessionStore {
    sessions: RwLock<HashMap<String, Instant>>,
    ttl: Duration,
}

impl SessionStore {
    pub fn new(ttl: Duration) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            ttl,
        }
    }

    pub async fn create(&self) -> String {
        let token = Uuid::new_v4().to_string();
        self.sessions
            .write()
            .await
            .insert(token.clone(), Instant::now());
        token
    }

    pub async fn verify(&self, token: &str) -> bool {
        let expired = {
            let sessions = self.sessions.read().await;
            match sessions.get(token) {
                Some(created_at) => created_at.elapsed() >= self.ttl,
                None => return false,
            }
        };

        if expired {
            self.sessions.write().await.remove(token);
            return false;
        }
        true
    }

    pub async fn remove(&self, token: &str) {
        self.sessions.write().await.remove(token);
    }

    /// Drop expired sessions; called periodically from a background task.
    pub async fn sweep(&self) {
        let mut sessions = self.sessions.write().await;
        let before = sessions.len();
        sessions.retain(|_, created_at| created_at.elapsed() < self.ttl);
        let removed = before - sessions.len();
        if removed > 0 {
            tracing::debug!("Swept {} expired sessions", removed);
        }
    }
}

pub struct SessionService;

impl SessionService {
    /// Verify the admin password and mint a session token. An unset
    /// password disables login entirely.
    pub async fn login(
        sessions: &SessionStore,
        config: &AuthConfig,
        password: &str,
    ) -> Result<String> {
        if config.admin_password.is_empty() || password != config.admin_password {
            return Err(AppError::Unauthorized("Invalid password".to_string()));
        }
        Ok(sessions.create().await)
    }

    pub async fn logout(sessions: &SessionStore, token: &str) {
        sessions.remove(token).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(password: &str) -> AuthConfig {
        AuthConfig {
            admin_password: password.to_string(),
            session_ttl_hours: 24,
        }
    }

    #[tokio::test]
    async fn test_login_roundtrip() {
        let store = SessionStore::new(Duration::from_secs(60));
        let token = SessionService::login(&store, &config("hunter2"), "hunter2")
            .await
            .unwrap();
        assert!(store.verify(&token).await);

        SessionService::logout(&store, &token).await;
        assert!(!store.verify(&token).await);
    }

    #[tokio::test]
    async fn test_wrong_password_rejected() {
        let store = SessionStore::new(Duration::from_secs(60));
        let err = SessionService::login(&store, &config("hunter2"), "wrong")
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Unauthorized(_)));
    }

    #[tokio::test]
    async fn test_unset_password_disables_login() {
        let store = SessionStore::new(Duration::from_secs(60));
        let err = SessionService::login(&store, &config(""), "")
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Unauthorized(_)));
    }

    #[tokio::test]
    async fn test_sessions_expire() {
        let store = SessionStore::new(Duration::ZERO);
        let token = store.create().await;
        assert!(!store.verify(&token).await);

        let token = store.create().await;
        store.sweep().await;
        assert!(!store.verify(&token).await);
    }
}
