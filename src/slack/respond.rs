// Slack response delivery
//
// Results go to the incoming webhook when one is configured; a failed webhook
// post falls back to the command's response_url.

use reqwest::Client;
use std::time::Duration;
use thiserror::Error;

use crate::models::slack::SlackMessage;

#[derive(Debug, Error)]
pub enum DeliveryError {
    #[error("no delivery target available")]
    NoTarget,

    #[error("Slack request failed: {0}")]
    Transport(String),

    #[error("Slack returned HTTP {status}: {body}")]
    Status { status: u16, body: String },
}

/// Where a message ended up
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryTarget {
    Webhook,
    ResponseUrl,
}

pub struct SlackResponder {
    client: Client,
    webhook_url: Option<String>,
}

impl SlackResponder {
    pub fn new(webhook_url: Option<String>, timeout: Duration) -> anyhow::Result<Self> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            webhook_url: webhook_url.filter(|u| !u.trim().is_empty()),
        })
    }

    pub fn has_webhook(&self) -> bool {
        self.webhook_url.is_some()
    }

    /// Webhook first, then `response_url`
    pub async fn deliver(
        &self,
        message: &SlackMessage,
        response_url: Option<&str>,
    ) -> Result<DeliveryTarget, DeliveryError> {
        if let Some(webhook) = &self.webhook_url {
            match self.post(webhook, message).await {
                Ok(()) => return Ok(DeliveryTarget::Webhook),
                Err(e) => {
                    tracing::warn!(error = %e, "Webhook delivery failed, falling back to response_url");
                }
            }
        }

        let response_url = response_url
            .filter(|u| !u.trim().is_empty())
            .ok_or(DeliveryError::NoTarget)?;
        self.post(response_url, message).await?;
        Ok(DeliveryTarget::ResponseUrl)
    }

    /// Post straight to a `response_url`
    pub async fn respond(
        &self,
        response_url: &str,
        message: &SlackMessage,
    ) -> Result<(), DeliveryError> {
        self.post(response_url, message).await
    }

    async fn post(&self, url: &str, message: &SlackMessage) -> Result<(), DeliveryError> {
        let response = self
            .client
            .post(url)
            .json(message)
            .send()
            .await
            .map_err(|e| DeliveryError::Transport(e.to_string()))?;

        let status = response.status();
        if status.is_success() {
            return Ok(());
        }
        let body = response.text().await.unwrap_or_default();
        Err(DeliveryError::Status {
            status: status.as_u16(),
            body: body.trim().to_string(),
        })
    }
}
