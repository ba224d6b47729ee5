//! Anthropic messages API wire types and client.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use keyrelay_common::{MessageRole, ModelConfig, ModelRequest};

pub mod client;
pub use client::AnthropicClient;

/// Anthropic requires `max_tokens`; used when neither request nor config sets it.
pub const DEFAULT_MAX_TOKENS: u32 = 4096;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnthropicMessage {
    pub role: MessageRole,
    pub content: String,
}

/// Request body for `POST /v1/messages`.
#[derive(Debug, Serialize)]
pub struct CreateMessageRequest {
    pub model: String,
    pub max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system: Option<String>,
    pub messages: Vec<AnthropicMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    #[serde(flatten)]
    pub extra: HashMap<String, serde_json::Value>,
}

impl From<(&ModelRequest, &ModelConfig)> for CreateMessageRequest {
    /// System messages are lifted into the top-level `system` field, joined by blank lines.
    fn from((request, config): (&ModelRequest, &ModelConfig)) -> Self {
        let (system, conversation): (Vec<_>, Vec<_>) = request
            .messages
            .iter()
            .partition(|message| message.role == MessageRole::System);

        let system = if system.is_empty() {
            None
        } else {
            Some(
                system
                    .iter()
                    .map(|message| message.content.as_str())
                    .collect::<Vec<_>>()
                    .join("\n\n"),
            )
        };

        let extra = request
            .options
            .extra_args
            .iter()
            .filter(|(key, _)| {
                !matches!(
                    key.as_str(),
                    "model" | "max_tokens" | "system" | "messages" | "temperature" | "api_key"
                )
            })
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect();

        Self {
            model: request
                .model
                .clone()
                .unwrap_or_else(|| config.model.clone()),
            max_tokens: request
                .max_tokens
                .or(config.max_tokens)
                .unwrap_or(DEFAULT_MAX_TOKENS),
            system,
            messages: conversation
                .into_iter()
                .map(|message| AnthropicMessage {
                    role: message.role,
                    content: message.content.clone(),
                })
                .collect(),
            temperature: request.temperature.or(config.temperature),
            extra,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct ContentBlock {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub text: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct AnthropicUsage {
    pub input_tokens: u32,
    pub output_tokens: u32,
}

/// Response body of `POST /v1/messages`.
#[derive(Debug, Deserialize)]
pub struct MessageResponse {
    pub id: String,
    pub model: String,
    pub content: Vec<ContentBlock>,
    pub stop_reason: Option<String>,
    pub usage: Option<AnthropicUsage>,
}

impl MessageResponse {
    /// Concatenated text of all `text` blocks.
    #[must_use]
    pub fn text(&self) -> String {
        self.content
            .iter()
            .filter(|block| block.kind == "text")
            .filter_map(|block| block.text.as_deref())
            .collect()
    }
}
