// Authentication types

use chrono::{DateTime, Utc};
use serde::Deserialize;
use std::fmt;
use thiserror::Error;

/// The live bearer/refresh token pair
///
/// Both tokens always travel together; nothing updates one without the other.
#[derive(Clone, PartialEq, Eq)]
pub struct CredentialPair {
    pub bearer_token: String,
    pub refresh_token: String,
    pub updated_at: DateTime<Utc>,
}

impl CredentialPair {
    pub fn new(bearer_token: impl Into<String>, refresh_token: impl Into<String>) -> Self {
        Self {
            bearer_token: bearer_token.into(),
            refresh_token: refresh_token.into(),
            updated_at: Utc::now(),
        }
    }

    /// Same tokens, compared without the timestamp
    pub fn same_tokens(&self, other: &CredentialPair) -> bool {
        self.bearer_token == other.bearer_token && self.refresh_token == other.refresh_token
    }
}

impl fmt::Debug for CredentialPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CredentialPair")
            .field("bearer_token", &token_prefix(&self.bearer_token))
            .field("refresh_token", &token_prefix(&self.refresh_token))
            .field("updated_at", &self.updated_at)
            .finish()
    }
}

/// First 8 characters of a token, for logs and diagnostics
pub fn token_prefix(token: &str) -> String {
    let prefix: String = token.chars().take(8).collect();
    format!("{}...", prefix)
}

/// Where and how to run the refresh grant
#[derive(Clone, Debug)]
pub struct TokenEndpoint {
    pub url: String,
    /// Client credentials are only sent when both are configured
    pub client_id: Option<String>,
    pub client_secret: Option<String>,
}

impl TokenEndpoint {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            client_id: None,
            client_secret: None,
        }
    }

    pub fn client_credentials(&self) -> Option<(&str, &str)> {
        match (&self.client_id, &self.client_secret) {
            (Some(id), Some(secret)) if !id.is_empty() && !secret.is_empty() => {
                Some((id.as_str(), secret.as_str()))
            }
            _ => None,
        }
    }
}

/// Token endpoint response body
#[derive(Debug, Deserialize)]
pub struct TokenResponse {
    #[serde(default)]
    pub access_token: Option<String>,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub expires_in: Option<u64>,
}

/// Token data from a successful exchange
#[derive(Debug, Clone)]
pub struct TokenData {
    pub access_token: String,
    /// `None` means the endpoint did not rotate; keep the current refresh token
    pub refresh_token: Option<String>,
}

/// Why a refresh did not produce a new bearer token
///
/// Cloneable so a single outcome can be handed to every coalesced caller.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RefreshFailure {
    /// Token endpoint unreachable or timed out
    #[error("token endpoint unreachable: {0}")]
    Network(String),

    /// Token endpoint answered 4xx; the refresh token is likely invalid or expired
    #[error("token endpoint rejected the refresh token: {status} - {body}")]
    Rejected { status: u16, body: String },

    /// Token endpoint answered with another non-success status
    #[error("token endpoint error: {status} - {body}")]
    Upstream { status: u16, body: String },

    /// Success status but no usable access token
    #[error("malformed token response: {0}")]
    MalformedResponse(String),

    /// The refresh task died before reporting
    #[error("refresh aborted: {0}")]
    Aborted(String),
}

impl RefreshFailure {
    /// Needs an operator to supply a new refresh token
    pub fn is_terminal(&self) -> bool {
        matches!(self, RefreshFailure::Rejected { .. })
    }
}

/// Result of persisting a rotated pair
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Persistence {
    Saved,
    /// In-memory pair is live but will not survive a restart
    Failed(String),
    /// No store configured or the store was unavailable at startup
    Disabled,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefreshSuccess {
    pub refresh_token_rotated: bool,
    pub persistence: Persistence,
}

pub type RefreshOutcome = Result<RefreshSuccess, RefreshFailure>;
