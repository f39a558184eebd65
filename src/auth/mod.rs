//! Admin authentication
//!
//! An [`AuthProvider`] turns an email/password pair into an [`AuthSession`].
//! The server keeps signed-in sessions in a [`SessionStore`] keyed by an
//! opaque cookie value, so the backend token never reaches the browser.

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};
use thiserror::Error;

/// Name of the admin session cookie
pub const SESSION_COOKIE: &str = "crianzas_session";

/// Lifetime of a session signed in against the configured admin account
const STATIC_SESSION_HOURS: i64 = 12;

/// Tokens this close to expiry are refreshed before use
const EXPIRY_MARGIN_SECS: i64 = 60;

/// Expired sessions are kept this long for a refresh before being dropped
const REFRESH_WINDOW_DAYS: i64 = 7;

/// Authentication failure
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("invalid email or password")]
    InvalidCredentials,

    #[error("auth request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("auth backend returned {status}: {message}")]
    Backend { status: u16, message: String },

    #[error("session expired")]
    SessionExpired,
}

/// A signed-in admin
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthSession {
    pub email: String,
    /// Token forwarded to the repository for admin operations
    pub access_token: String,
    pub refresh_token: Option<String>,
    /// When `access_token` stops being accepted; `None` never expires
    pub expires_at: Option<DateTime<Utc>>,
}

impl AuthSession {
    /// Whether the access token is expired, or about to, at `now`
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at
            .is_some_and(|at| at - Duration::seconds(EXPIRY_MARGIN_SECS) <= now)
    }

    /// Past any hope of a refresh
    fn is_stale(&self, now: DateTime<Utc>) -> bool {
        self.expires_at
            .is_some_and(|at| at + Duration::days(REFRESH_WINDOW_DAYS) <= now)
    }
}

#[async_trait]
pub trait AuthProvider: Send + Sync {
    async fn sign_in(&self, email: &str, password: &str) -> Result<AuthSession, AuthError>;

    /// Exchange an expired session for a fresh one
    async fn refresh(&self, session: &AuthSession) -> Result<AuthSession, AuthError>;

    async fn sign_out(&self, session: &AuthSession) -> Result<(), AuthError>;
}

/// GoTrue password grant (`/auth/v1`)
pub struct SupabaseAuth {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    refresh_token: Option<String>,
    /// Seconds from now
    #[serde(default)]
    expires_in: Option<i64>,
    /// Unix timestamp, preferred over `expires_in`
    #[serde(default)]
    expires_at: Option<i64>,
    #[serde(default)]
    user: Option<TokenUser>,
}

impl TokenResponse {
    fn into_session(self, fallback_email: &str) -> AuthSession {
        let expires_at = self
            .expires_at
            .and_then(|ts| DateTime::from_timestamp(ts, 0))
            .or_else(|| self.expires_in.map(|secs| Utc::now() + Duration::seconds(secs)));
        let email = self
            .user
            .and_then(|u| u.email)
            .unwrap_or_else(|| fallback_email.to_string());
        AuthSession {
            email,
            access_token: self.access_token,
            refresh_token: self.refresh_token.filter(|t| !t.is_empty()),
            expires_at,
        }
    }
}

#[derive(Deserialize)]
struct TokenUser {
    #[serde(default)]
    email: Option<String>,
}

impl SupabaseAuth {
    pub fn new(client: reqwest::Client, base_url: &str, api_key: &str) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
        }
    }

    /// POST a token grant; a 400/401 is reported as `rejected`
    async fn grant(
        &self,
        grant_type: &str,
        body: serde_json::Value,
        rejected: AuthError,
    ) -> Result<TokenResponse, AuthError> {
        let response = self
            .client
            .post(format!("{}/auth/v1/token", self.base_url))
            .query(&[("grant_type", grant_type)])
            .header("apikey", &self.api_key)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if status.as_u16() == 400 || status.as_u16() == 401 {
            return Err(rejected);
        }
        if !status.is_success() {
            return Err(AuthError::Backend {
                status: status.as_u16(),
                message: response.text().await.unwrap_or_default(),
            });
        }
        Ok(response.json().await?)
    }
}

#[async_trait]
impl AuthProvider for SupabaseAuth {
    async fn sign_in(&self, email: &str, password: &str) -> Result<AuthSession, AuthError> {
        let token = self
            .grant(
                "password",
                serde_json::json!({ "email": email, "password": password }),
                AuthError::InvalidCredentials,
            )
            .await?;
        Ok(token.into_session(email))
    }

    async fn refresh(&self, session: &AuthSession) -> Result<AuthSession, AuthError> {
        let Some(refresh_token) = session.refresh_token.as_deref() else {
            return Err(AuthError::SessionExpired);
        };
        let token = self
            .grant(
                "refresh_token",
                serde_json::json!({ "refresh_token": refresh_token }),
                AuthError::SessionExpired,
            )
            .await?;
        Ok(token.into_session(&session.email))
    }

    async fn sign_out(&self, session: &AuthSession) -> Result<(), AuthError> {
        let response = self
            .client
            .post(format!("{}/auth/v1/logout", self.base_url))
            .header("apikey", &self.api_key)
            .bearer_auth(&session.access_token)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(AuthError::Backend {
                status: status.as_u16(),
                message: response.text().await.unwrap_or_default(),
            });
        }
        Ok(())
    }
}

/// Single admin account taken from the site configuration
pub struct StaticAuth {
    email: String,
    password: String,
}

impl StaticAuth {
    /// An empty email disables sign-in entirely
    pub fn new(email: &str, password: &str) -> Self {
        Self {
            email: email.trim().to_string(),
            password: password.to_string(),
        }
    }
}

#[async_trait]
impl AuthProvider for StaticAuth {
    async fn sign_in(&self, email: &str, password: &str) -> Result<AuthSession, AuthError> {
        if self.email.is_empty()
            || !self.email.eq_ignore_ascii_case(email.trim())
            || self.password != password
        {
            return Err(AuthError::InvalidCredentials);
        }
        Ok(AuthSession {
            email: self.email.clone(),
            access_token: uuid::Uuid::new_v4().to_string(),
            refresh_token: None,
            expires_at: Some(Utc::now() + Duration::hours(STATIC_SESSION_HOURS)),
        })
    }

    async fn refresh(&self, _session: &AuthSession) -> Result<AuthSession, AuthError> {
        Err(AuthError::SessionExpired)
    }

    async fn sign_out(&self, _session: &AuthSession) -> Result<(), AuthError> {
        Ok(())
    }
}

/// Signed-in sessions keyed by cookie value
#[derive(Default)]
pub struct SessionStore {
    sessions: RwLock<HashMap<String, AuthSession>>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a session and return its new cookie value.
    /// Sessions past their refresh window are dropped on the way.
    pub fn insert(&self, session: AuthSession) -> String {
        let id = uuid::Uuid::new_v4().to_string();
        let now = Utc::now();
        let mut sessions = self.sessions.write().unwrap_or_else(PoisonError::into_inner);
        sessions.retain(|_, s| !s.is_stale(now));
        sessions.insert(id.clone(), session);
        id
    }

    /// Swap in a refreshed session; false when `id` was signed out meanwhile
    pub fn replace(&self, id: &str, session: AuthSession) -> bool {
        match self
            .sessions
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .get_mut(id)
        {
            Some(slot) => {
                *slot = session;
                true
            }
            None => false,
        }
    }

    pub fn get(&self, id: &str) -> Option<AuthSession> {
        self.sessions
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(id)
            .cloned()
    }

    pub fn remove(&self, id: &str) -> Option<AuthSession> {
        self.sessions
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_json, header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn session_expiring(expires_at: Option<DateTime<Utc>>, refresh: Option<&str>) -> AuthSession {
        AuthSession {
            email: "a@b.co".to_string(),
            access_token: "t".to_string(),
            refresh_token: refresh.map(str::to_string),
            expires_at,
        }
    }

    #[tokio::test]
    async fn test_static_auth() {
        let auth = StaticAuth::new("admin@example.com", "secreto");
        let session = auth.sign_in("Admin@Example.com", "secreto").await.unwrap();
        assert_eq!(session.email, "admin@example.com");
        assert!(matches!(
            auth.sign_in("admin@example.com", "otro").await,
            Err(AuthError::InvalidCredentials)
        ));

        let disabled = StaticAuth::new("", "");
        assert!(disabled.sign_in("", "").await.is_err());
    }

    #[tokio::test]
    async fn test_supabase_password_grant() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/auth/v1/token"))
            .and(query_param("grant_type", "password"))
            .and(header("apikey", "anon"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "access_token": "jwt-token",
                "token_type": "bearer",
                "refresh_token": "refresh-1",
                "expires_at": 4102444800_i64,
                "user": { "email": "mailen@example.com" }
            })))
            .mount(&server)
            .await;

        let auth = SupabaseAuth::new(reqwest::Client::new(), &server.uri(), "anon");
        let session = auth.sign_in("mailen@example.com", "pw").await.unwrap();
        assert_eq!(session.access_token, "jwt-token");
        assert_eq!(session.email, "mailen@example.com");
        assert_eq!(session.refresh_token.as_deref(), Some("refresh-1"));
        assert_eq!(
            session.expires_at,
            DateTime::from_timestamp(4_102_444_800, 0)
        );
    }

    #[tokio::test]
    async fn test_supabase_rejects_bad_password() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/auth/v1/token"))
            .respond_with(ResponseTemplate::new(400).set_body_json(json!({
                "error": "invalid_grant",
                "error_description": "Invalid login credentials"
            })))
            .mount(&server)
            .await;

        let auth = SupabaseAuth::new(reqwest::Client::new(), &server.uri(), "anon");
        assert!(matches!(
            auth.sign_in("mailen@example.com", "mal").await,
            Err(AuthError::InvalidCredentials)
        ));
    }

    #[test]
    fn test_session_store() {
        let store = SessionStore::new();
        let session = session_expiring(Some(Utc::now() + Duration::hours(1)), None);
        let id = store.insert(session.clone());
        assert_eq!(store.get(&id), Some(session.clone()));

        let mut refreshed = session.clone();
        refreshed.access_token = "nuevo".to_string();
        assert!(store.replace(&id, refreshed.clone()));
        assert_eq!(store.get(&id), Some(refreshed));

        assert!(store.remove(&id).is_some());
        assert!(store.get(&id).is_none());
        assert!(!store.replace(&id, session));
    }

    #[test]
    fn test_session_store_drops_stale_sessions() {
        let store = SessionStore::new();
        let old = store.insert(session_expiring(
            Some(Utc::now() - Duration::days(REFRESH_WINDOW_DAYS + 1)),
            Some("r"),
        ));
        let recent = store.insert(session_expiring(Some(Utc::now() - Duration::hours(1)), Some("r")));
        store.insert(session_expiring(None, None));

        assert!(store.get(&old).is_none());
        assert!(store.get(&recent).is_some());
    }

    #[test]
    fn test_session_expiry() {
        let now = Utc::now();
        assert!(!session_expiring(None, None).is_expired(now));
        assert!(!session_expiring(Some(now + Duration::hours(1)), None).is_expired(now));
        // inside the margin counts as expired
        assert!(session_expiring(Some(now + Duration::seconds(10)), None).is_expired(now));
        assert!(session_expiring(Some(now - Duration::hours(1)), None).is_expired(now));
    }

    #[tokio::test]
    async fn test_static_sessions_expire_without_refresh() {
        let auth = StaticAuth::new("admin@example.com", "secreto");
        let session = auth.sign_in("admin@example.com", "secreto").await.unwrap();
        assert!(session.expires_at.is_some());
        assert!(!session.is_expired(Utc::now()));
        assert!(matches!(
            auth.refresh(&session).await,
            Err(AuthError::SessionExpired)
        ));
    }

    #[tokio::test]
    async fn test_supabase_refresh_grant() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/auth/v1/token"))
            .and(query_param("grant_type", "refresh_token"))
            .and(body_json(json!({ "refresh_token": "r1" })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "access_token": "jwt-2",
                "refresh_token": "r2",
                "expires_in": 3600,
                "user": { "email": "mailen@example.com" }
            })))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/auth/v1/token"))
            .and(query_param("grant_type", "refresh_token"))
            .and(body_json(json!({ "refresh_token": "revocado" })))
            .respond_with(ResponseTemplate::new(400).set_body_json(json!({
                "error": "invalid_grant"
            })))
            .mount(&server)
            .await;

        let auth = SupabaseAuth::new(reqwest::Client::new(), &server.uri(), "anon");
        let expired = session_expiring(Some(Utc::now() - Duration::minutes(5)), Some("r1"));
        let fresh = auth.refresh(&expired).await.unwrap();
        assert_eq!(fresh.access_token, "jwt-2");
        assert_eq!(fresh.refresh_token.as_deref(), Some("r2"));
        assert!(!fresh.is_expired(Utc::now()));

        let revoked = session_expiring(Some(Utc::now()), Some("revocado"));
        assert!(matches!(
            auth.refresh(&revoked).await,
            Err(AuthError::SessionExpired)
        ));
        let no_token = session_expiring(Some(Utc::now()), None);
        assert!(matches!(
            auth.refresh(&no_token).await,
            Err(AuthError::SessionExpired)
        ));
    }
}
