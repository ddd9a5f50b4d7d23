//! Client for the external session refresh endpoint.
//!
//! # Purpose
//! Exchanges the caller's refresh token for a new access token when the
//! presented access token has expired.
//!
//! # Key invariants
//! - Exactly one `POST` per call; no retries.
//! - Every call is bounded by the configured timeout; a timeout is a failure.
//! - Only a 2xx response with a string `accessToken` field is a success.
//!
//! # Security considerations
//! - Refresh and access tokens are never logged.
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, thiserror::Error)]
pub enum RefreshError {
    #[error("refresh request timed out")]
    Timeout,
    #[error("refresh transport error: {0}")]
    Transport(#[source] reqwest::Error),
    #[error("refresh endpoint returned status {0}")]
    Status(u16),
    #[error("refresh response body unreadable: {0}")]
    Body(#[source] reqwest::Error),
    #[error("refresh response has no access token")]
    MissingAccessToken,
}

impl RefreshError {
    pub fn as_str(&self) -> &'static str {
        match self {
            RefreshError::Timeout => "timeout",
            RefreshError::Transport(_) => "transport",
            RefreshError::Status(_) => "status",
            RefreshError::Body(_) => "body",
            RefreshError::MissingAccessToken => "missing_access_token",
        }
    }
}

/// What the gate forwards from the incoming request.
#[derive(Debug, Clone, Copy, Default)]
pub struct RefreshRequest<'a> {
    pub cookie_header: Option<&'a str>,
    pub refresh_token: Option<&'a str>,
}

#[async_trait]
pub trait TokenRefresher: Send + Sync {
    async fn refresh(&self, request: RefreshRequest<'_>) -> Result<String, RefreshError>;
}

#[derive(Debug, Serialize)]
struct RefreshBody<'a> {
    #[serde(rename = "refreshToken", skip_serializing_if = "Option::is_none")]
    refresh_token: Option<&'a str>,
}

#[derive(Debug, Deserialize)]
struct RefreshResponse {
    #[serde(rename = "accessToken", default)]
    access_token: Option<String>,
}

#[derive(Debug, Clone)]
pub struct RefreshClient {
    url: String,
    client: reqwest::Client,
}

impl RefreshClient {
    pub fn new(url: impl Into<String>, timeout: Duration) -> reqwest::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .no_proxy()
            .redirect(reqwest::redirect::Policy::none())
            .build()?;
        Ok(Self {
            url: url.into(),
            client,
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl TokenRefresher for RefreshClient {
    async fn refresh(&self, request: RefreshRequest<'_>) -> Result<String, RefreshError> {
        let mut builder = self.client.post(&self.url).json(&RefreshBody {
            refresh_token: request.refresh_token,
        });
        if let Some(cookie) = request.cookie_header {
            builder = builder.header(reqwest::header::COOKIE, cookie);
        }
        let response = builder.send().await.map_err(classify_transport)?;
        let status = response.status();
        if !status.is_success() {
            return Err(RefreshError::Status(status.as_u16()));
        }
        let body: RefreshResponse = response.json().await.map_err(|err| {
            if err.is_timeout() {
                RefreshError::Timeout
            } else {
                RefreshError::Body(err)
            }
        })?;
        body.access_token
            .filter(|token| !token.is_empty())
            .ok_or(RefreshError::MissingAccessToken)
    }
}

fn classify_transport(err: reqwest::Error) -> RefreshError {
    if err.is_timeout() {
        RefreshError::Timeout
    } else {
        RefreshError::Transport(err)
    }
}
