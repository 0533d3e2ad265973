//! Client for the external user directory.
//!
//! The directory resolves opaque user identifiers to display names and serves
//! a bulk user listing. Access requires an OAuth2 client-credentials token;
//! [`HttpDirectory`] owns the cached token and serializes refreshes so
//! concurrent callers never race each other into redundant token requests.

use std::collections::BTreeMap;
use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;
use tokio::sync::Mutex;
use tokio::time::Instant;

/// Directory failures as seen by callers. A failure is never an authorization
/// answer; the service surfaces `Unavailable` instead of guessing.
#[derive(Debug, Error)]
pub enum DirectoryError {
    #[error("user not found in directory")]
    NotFound,
    #[error("directory unavailable: {0}")]
    Unavailable(String),
}

/// One directory entry: identifier plus display name.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DirectoryUser {
    pub id: String,
    pub name: String,
}

/// The lookup interface the permission service depends on.
#[async_trait::async_trait]
pub trait Directory: Send + Sync {
    /// Resolve a user identifier to a display name.
    async fn resolve_display_name(&self, user_id: &str) -> Result<String, DirectoryError>;

    /// Bulk listing of every known user.
    async fn list_users(&self) -> Result<Vec<DirectoryUser>, DirectoryError>;
}

// ───────────────────────────────── HTTP client ─────────────────────────────────

/// Connection settings for the real directory.
#[derive(Clone, Debug)]
pub struct DirectoryConfig {
    /// Issuer base URL, e.g. `https://tenant.auth0.com`.
    pub issuer_url: String,
    pub client_id: String,
    pub client_secret: String,
    pub audience: String,
    /// Per-request timeout; a hung directory fails the caller instead of hanging it.
    pub timeout: Duration,
}

/// Refresh a token this long before its reported expiry.
const EXPIRY_SKEW: Duration = Duration::from_secs(30);

struct CachedToken {
    access_token: String,
    expires_at: Instant,
}

impl CachedToken {
    fn is_valid(&self) -> bool {
        Instant::now() < self.expires_at
    }
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_in: u64,
}

#[derive(Deserialize)]
struct UserPayload {
    #[serde(default)]
    user_id: Option<String>,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    nickname: Option<String>,
    #[serde(default)]
    email: Option<String>,
}

impl UserPayload {
    fn display_name(&self) -> Option<String> {
        self.name
            .clone()
            .or_else(|| self.nickname.clone())
            .or_else(|| self.email.clone())
    }
}

/// Directory client over HTTP with a process-wide cached access token.
pub struct HttpDirectory {
    http: reqwest::Client,
    config: DirectoryConfig,
    token: Mutex<Option<CachedToken>>,
}

impl HttpDirectory {
    pub fn new(config: DirectoryConfig) -> Result<Self, DirectoryError> {
        let http = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| DirectoryError::Unavailable(e.to_string()))?;
        Ok(Self {
            http,
            config,
            token: Mutex::new(None),
        })
    }

    /// Return a token that is still valid, refreshing if needed. The cache
    /// mutex is held across the refresh so concurrent callers single-flight.
    async fn get_valid_token(&self) -> Result<String, DirectoryError> {
        let mut cached = self.token.lock().await;
        if let Some(token) = cached.as_ref() {
            if token.is_valid() {
                return Ok(token.access_token.clone());
            }
        }
        let fresh = self.fetch_token().await?;
        let access_token = fresh.access_token.clone();
        *cached = Some(fresh);
        Ok(access_token)
    }

    /// Drop the cached token so the next call fetches a fresh one.
    async fn invalidate_token(&self) {
        *self.token.lock().await = None;
    }

    async fn fetch_token(&self) -> Result<CachedToken, DirectoryError> {
        let url = format!("{}/oauth/token", self.config.issuer_url.trim_end_matches('/'));
        let params = [
            ("grant_type", "client_credentials"),
            ("client_id", self.config.client_id.as_str()),
            ("client_secret", self.config.client_secret.as_str()),
            ("audience", self.config.audience.as_str()),
        ];
        let response = self
            .http
            .post(&url)
            .form(&params)
            .send()
            .await
            .map_err(|e| DirectoryError::Unavailable(e.to_string()))?;
        if !response.status().is_success() {
            return Err(DirectoryError::Unavailable(format!(
                "token request failed with status {}",
                response.status()
            )));
        }
        let body: TokenResponse = response
            .json()
            .await
            .map_err(|e| DirectoryError::Unavailable(e.to_string()))?;
        let lifetime = Duration::from_secs(body.expires_in).saturating_sub(EXPIRY_SKEW);
        Ok(CachedToken {
            access_token: body.access_token,
            expires_at: Instant::now() + lifetime,
        })
    }

    /// GET with bearer auth. An auth-rejected response invalidates the cached
    /// token and retries exactly once with a fresh one; nothing else retries.
    async fn authorized_get(&self, url: &str) -> Result<reqwest::Response, DirectoryError> {
        for attempt in 0..2 {
            let token = self.get_valid_token().await?;
            let response = self
                .http
                .get(url)
                .bearer_auth(&token)
                .header("Accept", "application/json")
                .send()
                .await
                .map_err(|e| DirectoryError::Unavailable(e.to_string()))?;

            let status = response.status();
            if (status == reqwest::StatusCode::UNAUTHORIZED
                || status == reqwest::StatusCode::FORBIDDEN)
                && attempt == 0
            {
                tracing::debug!(%status, "directory rejected token, refreshing");
                self.invalidate_token().await;
                continue;
            }
            return Ok(response);
        }
        unreachable!("authorized_get returns within two attempts")
    }

    fn users_url(&self) -> String {
        format!(
            "{}/api/v2/users",
            self.config.issuer_url.trim_end_matches('/')
        )
    }
}

#[async_trait::async_trait]
impl Directory for HttpDirectory {
    async fn resolve_display_name(&self, user_id: &str) -> Result<String, DirectoryError> {
        let url = format!("{}/{}", self.users_url(), user_id);
        let response = self.authorized_get(&url).await?;
        match response.status() {
            reqwest::StatusCode::NOT_FOUND => Err(DirectoryError::NotFound),
            status if status.is_success() => {
                let payload: UserPayload = response
                    .json()
                    .await
                    .map_err(|e| DirectoryError::Unavailable(e.to_string()))?;
                payload.display_name().ok_or_else(|| {
                    DirectoryError::Unavailable("directory returned a user without a name".into())
                })
            }
            status => Err(DirectoryError::Unavailable(format!(
                "directory lookup failed with status {status}"
            ))),
        }
    }

    async fn list_users(&self) -> Result<Vec<DirectoryUser>, DirectoryError> {
        let response = self.authorized_get(&self.users_url()).await?;
        if !response.status().is_success() {
            return Err(DirectoryError::Unavailable(format!(
                "directory listing failed with status {}",
                response.status()
            )));
        }
        let payloads: Vec<UserPayload> = response
            .json()
            .await
            .map_err(|e| DirectoryError::Unavailable(e.to_string()))?;
        Ok(payloads
            .into_iter()
            .filter_map(|p| {
                let id = p.user_id.clone()?;
                let name = p.display_name().unwrap_or_else(|| id.clone());
                Some(DirectoryUser { id, name })
            })
            .collect())
    }
}

// ──────────────────────────────── Static variant ────────────────────────────────

/// Fixed in-memory directory for tests and offline runs.
#[derive(Default)]
pub struct StaticDirectory {
    users: BTreeMap<String, String>,
}

impl StaticDirectory {
    pub fn new(users: impl IntoIterator<Item = (String, String)>) -> Self {
        Self {
            users: users.into_iter().collect(),
        }
    }

    /// An empty directory: every lookup fails `NotFound`.
    pub fn empty() -> Self {
        Self::default()
    }
}

#[async_trait::async_trait]
impl Directory for StaticDirectory {
    async fn resolve_display_name(&self, user_id: &str) -> Result<String, DirectoryError> {
        self.users
            .get(user_id)
            .cloned()
            .ok_or(DirectoryError::NotFound)
    }

    async fn list_users(&self) -> Result<Vec<DirectoryUser>, DirectoryError> {
        Ok(self
            .users
            .iter()
            .map(|(id, name)| DirectoryUser {
                id: id.clone(),
                name: name.clone(),
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn static_directory_resolves_and_lists() {
        let dir = StaticDirectory::new([
            ("1".to_string(), "User One".to_string()),
            ("2".to_string(), "User Two".to_string()),
        ]);

        assert_eq!(dir.resolve_display_name("1").await.unwrap(), "User One");
        assert!(matches!(
            dir.resolve_display_name("3").await,
            Err(DirectoryError::NotFound)
        ));

        let users = dir.list_users().await.unwrap();
        assert_eq!(users.len(), 2);
        assert_eq!(users[0].id, "1");
    }

    #[tokio::test]
    async fn empty_directory_finds_nobody() {
        let dir = StaticDirectory::empty();
        assert!(matches!(
            dir.resolve_display_name("anyone").await,
            Err(DirectoryError::NotFound)
        ));
        assert!(dir.list_users().await.unwrap().is_empty());
    }
}
