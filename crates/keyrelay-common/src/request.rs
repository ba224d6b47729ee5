use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use typed_builder::TypedBuilder;
use uuid::Uuid;

/// The author of a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    System,
    User,
    Assistant,
}

/// A single chat message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub role: MessageRole,
    pub content: String,
}

impl Message {
    pub fn new(role: MessageRole, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::new(MessageRole::System, content)
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(MessageRole::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(MessageRole::Assistant, content)
    }
}

/// Per-call options merged into the outgoing request at dispatch time.
///
/// `api_key` is the per-call authorization slot: when set it overrides the
/// client's static key for this call only and is dropped with the request.
/// `extra_args` are merged into the provider request body.
#[derive(Debug, Clone, Default)]
pub struct CallOptions {
    pub api_key: Option<SecretString>,
    pub extra_args: HashMap<String, serde_json::Value>,
}

impl CallOptions {
    #[must_use]
    pub const fn has_api_key(&self) -> bool {
        self.api_key.is_some()
    }
}

/// An outgoing model request, as handed to plugins just before dispatch.
///
/// # Examples
///
/// ```
/// use keyrelay_common::{Message, ModelRequest};
///
/// let request = ModelRequest::builder()
///     .messages(vec![Message::user("Hello!")])
///     .model("gpt-4o")
///     .temperature(0.2)
///     .build();
///
/// assert_eq!(request.model.as_deref(), Some("gpt-4o"));
/// assert!(request.validate().is_ok());
/// ```
#[derive(Debug, Clone, TypedBuilder)]
pub struct ModelRequest {
    /// Identifies this call in logs.
    #[builder(default = Uuid::new_v4())]
    pub invocation_id: Uuid,
    /// Model override. `None` uses the client's configured model.
    #[builder(default, setter(strip_option, into))]
    pub model: Option<String>,
    #[builder(setter(into))]
    pub messages: Vec<Message>,
    #[builder(default, setter(strip_option))]
    pub temperature: Option<f32>,
    #[builder(default, setter(strip_option))]
    pub max_tokens: Option<u32>,
    #[builder(default)]
    pub options: CallOptions,
}

impl ModelRequest {
    pub fn new(messages: impl Into<Vec<Message>>) -> Self {
        Self::builder().messages(messages).build()
    }

    #[must_use]
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    #[must_use]
    pub fn with_extra_arg(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.options.extra_args.insert(key.into(), value);
        self
    }

    /// Stores a credential in this call's authorization slot.
    pub fn set_api_key(&mut self, api_key: SecretString) {
        self.options.api_key = Some(api_key);
    }

    /// # Errors
    ///
    /// Returns an error if there are no messages or `temperature` is outside 0.0 to 2.0.
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.messages.is_empty() {
            anyhow::bail!("Model request must have at least one message");
        }

        if let Some(temp) = self.temperature
            && !(0.0..=2.0).contains(&temp)
        {
            anyhow::bail!("Temperature must be between 0.0 and 2.0, got {temp}");
        }

        Ok(())
    }
}

/// Why the model stopped generating.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[non_exhaustive]
pub enum FinishReason {
    Stop,
    Length,
    ToolCalls,
    ContentFilter,
}

impl fmt::Display for FinishReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Stop => write!(f, "stop"),
            Self::Length => write!(f, "length"),
            Self::ToolCalls => write!(f, "tool_calls"),
            Self::ContentFilter => write!(f, "content_filter"),
        }
    }
}

impl FromStr for FinishReason {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            // Anthropic spells these differently
            "stop" | "end_turn" | "stop_sequence" => Ok(Self::Stop),
            "length" | "max_tokens" => Ok(Self::Length),
            "tool_calls" | "tool_use" => Ok(Self::ToolCalls),
            "content_filter" => Ok(Self::ContentFilter),
            _ => anyhow::bail!("Unknown finish reason: {s}"),
        }
    }
}

/// Token usage for a completed call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Usage {
    #[serde(alias = "input_tokens")]
    pub prompt_tokens: u32,
    #[serde(alias = "output_tokens")]
    pub completion_tokens: u32,
    pub total_tokens: u32,
}

/// The result of a model call, or a short-circuit response produced by a plugin.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelResponse {
    pub message: Message,
    pub model: String,
    pub finish_reason: Option<FinishReason>,
    pub usage: Option<Usage>,
    pub created_at: DateTime<Utc>,
    pub response_id: Option<String>,
}

impl ModelResponse {
    /// A plain assistant reply, as a plugin would return to skip the model call.
    pub fn text(model: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            message: Message::assistant(content),
            model: model.into(),
            finish_reason: Some(FinishReason::Stop),
            usage: None,
            created_at: Utc::now(),
            response_id: None,
        }
    }
}
