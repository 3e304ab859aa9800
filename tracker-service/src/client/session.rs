use dashmap::DashMap;
use reqwest::{Client, Method, StatusCode};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use thiserror::Error;

use super::SingleFlight;

/// Outcome of a client call. Cloneable so one refresh result can be handed
/// to every caller waiting on it.
#[derive(Debug, Clone, Error)]
pub enum ClientError {
    #[error("Request failed: {0}")]
    Transport(String),

    #[error("Unauthorized")]
    Unauthorized,

    #[error("No tokens held for session '{0}'")]
    UnknownSession(String),

    #[error("Unexpected status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Invalid response body: {0}")]
    Decode(String),
}

impl From<reqwest::Error> for ClientError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_decode() {
            ClientError::Decode(e.to_string())
        } else {
            ClientError::Transport(e.to_string())
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SessionTokens {
    pub access_token: String,
    pub refresh_token: String,
    pub token_type: String,
    pub expires_in: i64,
}

struct Inner {
    client: Client,
    base_url: String,
    sessions: DashMap<String, SessionTokens>,
    refreshes: SingleFlight<String, Result<SessionTokens, ClientError>>,
}

/// Talks to the tracker API on behalf of any number of named sessions.
///
/// A request that comes back 401 triggers one token refresh and one retry.
/// Concurrent refreshes for the same session share a single
/// `POST /auth/refresh`, so a rotated refresh token is never presented twice.
#[derive(Clone)]
pub struct SessionClient {
    inner: Arc<Inner>,
}

impl SessionClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self::with_client(Client::new(), base_url)
    }

    pub fn with_client(client: Client, base_url: impl Into<String>) -> Self {
        Self {
            inner: Arc::new(Inner {
                client,
                base_url: base_url.into().trim_end_matches('/').to_string(),
                sessions: DashMap::new(),
                refreshes: SingleFlight::new(),
            }),
        }
    }

    pub fn tokens(&self, session_id: &str) -> Option<SessionTokens> {
        self.inner.sessions.get(session_id).map(|t| t.clone())
    }

    pub fn set_tokens(&self, session_id: impl Into<String>, tokens: SessionTokens) {
        self.inner.sessions.insert(session_id.into(), tokens);
    }

    pub async fn login(
        &self,
        session_id: &str,
        email: &str,
        password: &str,
    ) -> Result<SessionTokens, ClientError> {
        let response = self
            .inner
            .client
            .post(self.inner.url("/auth/login"))
            .json(&json!({ "email": email, "password": password }))
            .send()
            .await
            .map_err(|e| {
                tracing::error!("Failed to call login endpoint: {}", e);
                ClientError::from(e)
            })?;

        let tokens: SessionTokens = read_json(response).await?;
        self.set_tokens(session_id, tokens.clone());
        tracing::debug!(session_id, "Session logged in");
        Ok(tokens)
    }

    /// Revoke the session's refresh token server-side and forget it locally.
    pub async fn logout(&self, session_id: &str) -> Result<(), ClientError> {
        let result = self
            .send_authenticated::<serde_json::Value>(session_id, Method::POST, "/auth/logout", None)
            .await;
        self.inner.sessions.remove(session_id);
        result.map(|_| ())
    }

    /// Rotate the session's tokens. Concurrent callers for one session await
    /// the same request and get the same pair.
    pub async fn refresh(&self, session_id: &str) -> Result<SessionTokens, ClientError> {
        let inner = self.inner.clone();
        let key = session_id.to_string();
        self.inner
            .refreshes
            .run(key.clone(), move || async move { inner.refresh_now(&key).await })
            .await
    }

    pub async fn get<T: DeserializeOwned>(
        &self,
        session_id: &str,
        path: &str,
    ) -> Result<T, ClientError> {
        self.send_authenticated(session_id, Method::GET, path, None)
            .await
    }

    pub async fn post<T: DeserializeOwned>(
        &self,
        session_id: &str,
        path: &str,
        body: &serde_json::Value,
    ) -> Result<T, ClientError> {
        self.send_authenticated(session_id, Method::POST, path, Some(body))
            .await
    }

    pub async fn patch<T: DeserializeOwned>(
        &self,
        session_id: &str,
        path: &str,
        body: &serde_json::Value,
    ) -> Result<T, ClientError> {
        self.send_authenticated(session_id, Method::PATCH, path, Some(body))
            .await
    }

    pub async fn delete(&self, session_id: &str, path: &str) -> Result<(), ClientError> {
        self.send_authenticated::<serde_json::Value>(session_id, Method::DELETE, path, None)
            .await
            .map(|_| ())
    }

    /// Send with the session's access token; on 401 refresh once and retry.
    async fn send_authenticated<T: DeserializeOwned>(
        &self,
        session_id: &str,
        method: Method,
        path: &str,
        body: Option<&serde_json::Value>,
    ) -> Result<T, ClientError> {
        let used = self
            .tokens(session_id)
            .ok_or_else(|| ClientError::UnknownSession(session_id.to_string()))?;

        let response = self
            .inner
            .send(method.clone(), path, body, &used.access_token)
            .await?;
        if response.status() != StatusCode::UNAUTHORIZED {
            return read_json(response).await;
        }

        tracing::debug!(session_id, path, "Access token rejected, refreshing");

        // Another caller may have rotated the pair while this request was out
        let fresh = match self.tokens(session_id) {
            Some(current) if current.access_token != used.access_token => current,
            _ => self.refresh(session_id).await?,
        };

        let response = self
            .inner
            .send(method, path, body, &fresh.access_token)
            .await?;
        read_json(response).await
    }
}

impl Inner {
    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn send(
        &self,
        method: Method,
        path: &str,
        body: Option<&serde_json::Value>,
        access_token: &str,
    ) -> Result<reqwest::Response, ClientError> {
        let mut request = self
            .client
            .request(method, self.url(path))
            .bearer_auth(access_token);
        if let Some(body) = body {
            request = request.json(body);
        }

        request.send().await.map_err(|e| {
            tracing::error!("Failed to call {}: {}", path, e);
            ClientError::from(e)
        })
    }

    async fn refresh_now(&self, session_id: &str) -> Result<SessionTokens, ClientError> {
        let refresh_token = self
            .sessions
            .get(session_id)
            .map(|t| t.refresh_token.clone())
            .ok_or_else(|| ClientError::UnknownSession(session_id.to_string()))?;

        let response = self
            .client
            .post(self.url("/auth/refresh"))
            .json(&json!({ "refresh_token": refresh_token }))
            .send()
            .await
            .map_err(|e| {
                tracing::error!("Failed to call refresh endpoint: {}", e);
                ClientError::from(e)
            })?;

        match read_json::<SessionTokens>(response).await {
            Ok(tokens) => {
                self.sessions.insert(session_id.to_string(), tokens.clone());
                tracing::debug!(session_id, "Session tokens rotated");
                Ok(tokens)
            }
            Err(ClientError::Unauthorized) => {
                // The refresh token is dead; the session must log in again
                self.sessions.remove(session_id);
                tracing::warn!(session_id, "Refresh rejected, session dropped");
                Err(ClientError::Unauthorized)
            }
            Err(e) => Err(e),
        }
    }
}

async fn read_json<T: DeserializeOwned>(response: reqwest::Response) -> Result<T, ClientError> {
    let status = response.status();
    if status == StatusCode::UNAUTHORIZED {
        return Err(ClientError::Unauthorized);
    }
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(ClientError::Status {
            status: status.as_u16(),
            body,
        });
    }
    if status == StatusCode::NO_CONTENT {
        return serde_json::from_value(serde_json::Value::Null)
            .map_err(|e| ClientError::Decode(e.to_string()));
    }

    response.json::<T>().await.map_err(ClientError::from)
}
