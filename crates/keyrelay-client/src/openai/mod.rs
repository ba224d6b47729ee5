//! `OpenAI` chat completions wire types and client.
//!
//! Works with any OpenAI-compatible endpoint (`LiteLLM`, vLLM, Azure `OpenAI`
//! behind a compatible gateway, ...).

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use keyrelay_common::{Message, MessageRole, ModelConfig, ModelRequest, Usage};

pub mod client;
pub use client::OpenAIClient;

/// Body fields owned by the client; `extra_args` may not override them.
pub(crate) const RESERVED_ARGS: &[&str] = &[
    "model",
    "messages",
    "stream",
    "temperature",
    "max_tokens",
    "api_key",
];

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpenAIMessage {
    pub role: MessageRole,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
}

impl From<&Message> for OpenAIMessage {
    fn from(message: &Message) -> Self {
        Self {
            role: message.role,
            content: Some(message.content.clone()),
        }
    }
}

/// Request body for `POST /chat/completions`.
#[derive(Debug, Serialize)]
pub struct ChatCompletionRequest {
    pub model: String,
    pub messages: Vec<OpenAIMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stream: Option<bool>,
    /// Per-call extra arguments, merged into the top level of the body.
    #[serde(flatten)]
    pub extra: HashMap<String, serde_json::Value>,
}

impl From<(&ModelRequest, &ModelConfig)> for ChatCompletionRequest {
    fn from((request, config): (&ModelRequest, &ModelConfig)) -> Self {
        let extra = request
            .options
            .extra_args
            .iter()
            .filter(|(key, _)| !RESERVED_ARGS.contains(&key.as_str()))
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect();

        Self {
            model: request
                .model
                .clone()
                .unwrap_or_else(|| config.model.clone()),
            messages: request.messages.iter().map(OpenAIMessage::from).collect(),
            temperature: request.temperature.or(config.temperature),
            max_tokens: request.max_tokens.or(config.max_tokens),
            stream: Some(false),
            extra,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct ChatChoice {
    #[serde(default)]
    pub index: u32,
    pub message: OpenAIMessage,
    pub finish_reason: Option<String>,
}

/// Response body of `POST /chat/completions`.
#[derive(Debug, Deserialize)]
pub struct ChatCompletionResponse {
    pub id: String,
    #[serde(default)]
    pub created: u64,
    pub model: String,
    pub choices: Vec<ChatChoice>,
    pub usage: Option<Usage>,
}
