use anyhow::{Context, Result};
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

use crate::auth::{AuthManager, RefreshFailure};

/// Failure of one upstream call
#[derive(Debug, Error)]
pub enum UpstreamError {
    /// 401: the bearer token was not accepted
    #[error("upstream rejected the bearer token")]
    Unauthorized,

    #[error("upstream error: {status} - {body}")]
    Status { status: u16, body: String },

    #[error("upstream request failed ({kind}): {message}")]
    Transport { kind: &'static str, message: String },

    #[error("failed to decode upstream response: {0}")]
    Decode(String),
}

impl UpstreamError {
    pub fn is_unauthorized(&self) -> bool {
        matches!(self, UpstreamError::Unauthorized)
    }

    fn from_reqwest(e: reqwest::Error) -> Self {
        // Categorize the error for better debugging
        let kind = if e.is_timeout() {
            "timeout"
        } else if e.is_connect() {
            "connection_failed"
        } else if e.is_request() {
            "request_error"
        } else if e.is_body() {
            "body_error"
        } else if e.is_decode() {
            "decode_error"
        } else {
            "unknown"
        };
        UpstreamError::Transport {
            kind,
            message: e.to_string(),
        }
    }
}

/// Outcome of an authenticated call that did not succeed
#[derive(Debug, Error)]
pub enum CallError {
    /// Still 401 after the one permitted refresh and retry
    #[error("authentication failed after refreshing the token")]
    AuthExhausted,

    #[error("token refresh failed: {0}")]
    RefreshFailed(RefreshFailure),

    #[error(transparent)]
    Upstream(UpstreamError),
}

/// Send a request and map the response status onto [`UpstreamError`]
pub async fn send(request: RequestBuilder) -> Result<Response, UpstreamError> {
    let response = request.send().await.map_err(|e| {
        let err = UpstreamError::from_reqwest(e);
        tracing::warn!(error = %err, "HTTP request error");
        err
    })?;

    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    if status == StatusCode::UNAUTHORIZED {
        tracing::debug!("Received 401 from upstream");
        return Err(UpstreamError::Unauthorized);
    }

    let body = response.text().await.unwrap_or_default();
    tracing::error!(
        status = status.as_u16(),
        response_body = %body,
        "HTTP request failed with error response"
    );
    Err(UpstreamError::Status {
        status: status.as_u16(),
        body: body.trim().to_string(),
    })
}

/// HTTP client for the upstream API with a single refresh-and-retry on 401
pub struct ResilientHttpClient {
    /// Shared HTTP client with connection pooling
    client: Client,

    auth_manager: Arc<AuthManager>,
}

impl ResilientHttpClient {
    pub fn new(
        auth_manager: Arc<AuthManager>,
        connect_timeout: u64,
        request_timeout: u64,
    ) -> Result<Self> {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(connect_timeout))
            .timeout(Duration::from_secs(request_timeout))
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            client,
            auth_manager,
        })
    }

    /// Run `request_fn` with the current bearer token
    ///
    /// On a 401 the token is refreshed and `request_fn` runs once more with the
    /// new token. That is the only retry: a second 401 is `AuthExhausted`, a
    /// failed refresh is `RefreshFailed`, and every other error is returned
    /// as-is without refreshing.
    pub async fn call_with_auth<T, F, Fut>(&self, mut request_fn: F) -> Result<T, CallError>
    where
        F: FnMut(String) -> Fut,
        Fut: Future<Output = Result<T, UpstreamError>>,
    {
        let mut refreshed = false;

        loop {
            let token = self.auth_manager.bearer_token();

            match request_fn(token).await {
                Ok(value) => return Ok(value),
                Err(e) if e.is_unauthorized() && !refreshed => {
                    tracing::info!("Access token expired or invalid. Attempting refresh...");
                    if let Err(failure) = self.auth_manager.refresh().await {
                        tracing::error!(error = %failure, "Failed to refresh token. Aborting.");
                        return Err(CallError::RefreshFailed(failure));
                    }
                    tracing::info!("Token refreshed. Retrying API call...");
                    refreshed = true;
                }
                Err(e) if e.is_unauthorized() => {
                    tracing::error!("Upstream still returned 401 after token refresh");
                    return Err(CallError::AuthExhausted);
                }
                Err(e) => return Err(CallError::Upstream(e)),
            }
        }
    }

    /// Get the underlying HTTP client
    pub fn client(&self) -> &Client {
        &self.client
    }

    pub fn auth_manager(&self) -> &Arc<AuthManager> {
        &self.auth_manager
    }
}
