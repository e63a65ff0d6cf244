//! HTTP client for the remote environments API.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response};
use thiserror::Error;
use url::Url;

use super::Environment;
use crate::buildlog::BuildLogStream;

/// Connection timeout for HTTP requests.
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Timeout for short request/response calls. Build log streams have none.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Header carrying the session token.
pub const SESSION_HEADER: &str = "Session-Token";

/// User alias for the authenticated user.
pub const DEFAULT_USER: &str = "me";

/// Errors from API client operations.
#[derive(Error, Debug)]
pub enum ApiError {
    #[error("Invalid API URL {url:?}: {reason}")]
    InvalidUrl { url: String, reason: String },
    #[error("API request failed: {0}")]
    RequestFailed(String),
    #[error("API request timed out")]
    Timeout,
    #[error("HTTP {status}: {body}")]
    Status { status: u16, body: String },
    #[error("Failed to parse response: {0}")]
    ParseError(String),
    #[error("environment {name:?} not found for user {user:?}")]
    EnvironmentNotFound { name: String, user: String },
}

/// Environment operations the commands need.
#[async_trait]
pub trait EnvironmentsApi: Send + Sync {
    /// List the environments of `user`.
    async fn environments(&self, user: &str) -> Result<Vec<Environment>, ApiError>;

    /// Start a rebuild of an environment.
    async fn rebuild_environment(&self, env_id: &str) -> Result<(), ApiError>;

    /// Open the build log of an environment.
    async fn follow_build_log(&self, env_id: &str) -> Result<BuildLogStream, ApiError>;

    /// Find an environment of `user` by name.
    async fn find_environment(&self, user: &str, name: &str) -> Result<Environment, ApiError> {
        self.environments(user)
            .await?
            .into_iter()
            .find(|env| env.name == name)
            .ok_or_else(|| ApiError::EnvironmentNotFound {
                name: name.to_string(),
                user: user.to_string(),
            })
    }
}

fn map_send_error(e: &reqwest::Error) -> ApiError {
    if e.is_timeout() {
        ApiError::Timeout
    } else {
        ApiError::RequestFailed(e.to_string())
    }
}

/// Authenticated client for one remote.
#[derive(Debug, Clone)]
pub struct ApiClient {
    client: Client,
    base_url: Url,
    token: String,
}

impl ApiClient {
    /// Create a client for `base_url` authenticating with `token`.
    ///
    /// # Errors
    ///
    /// Returns `ApiError::InvalidUrl` if `base_url` cannot carry paths, or
    /// `ApiError::RequestFailed` if the HTTP client cannot be built.
    pub fn new(base_url: Url, token: impl Into<String>) -> Result<Self, ApiError> {
        if base_url.cannot_be_a_base() {
            return Err(ApiError::InvalidUrl {
                url: base_url.to_string(),
                reason: "not a base URL".to_string(),
            });
        }

        let client = Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .build()
            .map_err(|e| ApiError::RequestFailed(e.to_string()))?;

        Ok(Self {
            client,
            base_url,
            token: token.into(),
        })
    }

    /// Base URL of the remote.
    #[must_use]
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Build an endpoint URL from path segments, escaping each one.
    ///
    /// # Errors
    ///
    /// Returns `ApiError::InvalidUrl` if the base URL cannot carry paths.
    pub fn endpoint(&self, segments: &[&str]) -> Result<Url, ApiError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|()| ApiError::InvalidUrl {
                url: self.base_url.to_string(),
                reason: "not a base URL".to_string(),
            })?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    async fn send(&self, request: RequestBuilder) -> Result<Response, ApiError> {
        let response = request
            .header(SESSION_HEADER, &self.token)
            .send()
            .await
            .map_err(|e| map_send_error(&e))?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        tracing::debug!(status = status.as_u16(), body = %body, "API request rejected");
        Err(ApiError::Status {
            status: status.as_u16(),
            body,
        })
    }
}

#[async_trait]
impl EnvironmentsApi for ApiClient {
    async fn environments(&self, user: &str) -> Result<Vec<Environment>, ApiError> {
        let url = self.endpoint(&["api", "users", user, "environments"])?;
        tracing::debug!(url = %url, "Listing environments");

        let response = self
            .send(self.client.get(url).timeout(REQUEST_TIMEOUT))
            .await?;
        response
            .json()
            .await
            .map_err(|e| ApiError::ParseError(e.to_string()))
    }

    async fn rebuild_environment(&self, env_id: &str) -> Result<(), ApiError> {
        let url = self.endpoint(&["api", "environments", env_id, "rebuild"])?;
        tracing::info!(env_id = %env_id, "Requesting environment rebuild");

        self.send(self.client.post(url).timeout(REQUEST_TIMEOUT))
            .await?;
        Ok(())
    }

    async fn follow_build_log(&self, env_id: &str) -> Result<BuildLogStream, ApiError> {
        let mut url = self.endpoint(&["api", "environments", env_id, "buildlog"])?;
        url.query_pairs_mut().append_pair("follow", "true");
        tracing::debug!(url = %url, "Opening build log");

        let response = self.send(self.client.get(url)).await?;
        Ok(BuildLogStream::from_response(response))
    }
}
