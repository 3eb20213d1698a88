use serde::{Deserialize, Serialize};
use serde_json::Value;

// ==================================================================================================
// Inbound Models
// ==================================================================================================

/// Slash command form body (`application/x-www-form-urlencoded`)
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct SlashCommand {
    pub command: String,
    pub text: String,
    pub response_url: Option<String>,
    pub user_id: String,
    pub user_name: String,
    pub channel_id: String,
}

impl SlashCommand {
    /// `text` as `MC [DOT]`; `None` when blank
    pub fn carrier_query(&self) -> Option<CarrierQuery> {
        let mut parts = self.text.split_whitespace();
        let mc_number = parts.next()?.to_string();
        let dot_number = parts.next().map(str::to_string);
        Some(CarrierQuery {
            mc_number,
            dot_number,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CarrierQuery {
    pub mc_number: String,
    pub dot_number: Option<String>,
}

/// Interactive payloads arrive form-encoded with the JSON in `payload`
#[derive(Debug, Deserialize)]
pub struct InteractionForm {
    pub payload: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct InteractionPayload {
    #[serde(rename = "type")]
    pub kind: String,
    pub user: SlackUser,
    #[serde(default)]
    pub actions: Vec<BlockAction>,
    pub response_url: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SlackUser {
    pub id: String,
    #[serde(default)]
    pub username: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BlockAction {
    pub action_id: String,
    #[serde(default)]
    pub value: Option<String>,
}

// ==================================================================================================
// Outbound Models
// ==================================================================================================

/// Message body for incoming webhooks and `response_url`
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct SlackMessage {
    pub response_type: ResponseType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub blocks: Vec<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub replace_original: Option<bool>,
}

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ResponseType {
    InChannel,
    Ephemeral,
}

impl SlackMessage {
    pub fn in_channel(blocks: Vec<Value>) -> Self {
        Self {
            response_type: ResponseType::InChannel,
            text: None,
            blocks,
            replace_original: None,
        }
    }

    pub fn ephemeral(text: impl Into<String>) -> Self {
        Self {
            response_type: ResponseType::Ephemeral,
            text: Some(text.into()),
            blocks: Vec::new(),
            replace_original: None,
        }
    }
}
