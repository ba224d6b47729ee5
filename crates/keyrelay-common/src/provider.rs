use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Version header value sent to Anthropic endpoints.
pub const ANTHROPIC_VERSION: &str = "2023-06-01";

/// The kind of model provider a client talks to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[non_exhaustive]
pub enum ModelProvider {
    /// `OpenAI` and OpenAI-compatible servers (`LiteLLM`, vLLM, ...).
    #[serde(alias = "OpenAI")]
    OpenAI,
    #[serde(alias = "AzureOpenAI")]
    AzureOpenAI,
    #[serde(alias = "Anthropic")]
    Anthropic,
    #[serde(alias = "Gemini")]
    Gemini,
    #[serde(alias = "GeminiVertexAI")]
    GeminiVertexAI,
    #[serde(alias = "AnthropicVertexAI")]
    AnthropicVertexAI,
    #[serde(alias = "Ollama")]
    Ollama,
    #[serde(alias = "Bedrock")]
    Bedrock,
}

/// How a provider expects its API key to be presented.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthStyle {
    /// `Authorization: Bearer <key>`
    Bearer,
    /// `x-api-key: <key>` plus `anthropic-version`
    ApiKeyHeader,
}

impl ModelProvider {
    /// The default API endpoint for this provider.
    ///
    /// Azure, Bedrock and the Vertex AI variants need user-specific endpoints
    /// and return `None`.
    #[must_use]
    pub const fn default_endpoint(self) -> Option<&'static str> {
        match self {
            Self::OpenAI => Some("https://api.openai.com/v1"),
            Self::Anthropic => Some("https://api.anthropic.com"),
            Self::Gemini => Some("https://generativelanguage.googleapis.com"),
            Self::Ollama => Some("http://localhost:11434"),
            Self::AzureOpenAI | Self::GeminiVertexAI | Self::AnthropicVertexAI | Self::Bedrock => {
                None
            }
        }
    }

    /// Whether calls to this provider need a credential. Only a local Ollama doesn't.
    #[must_use]
    pub const fn requires_secret(self) -> bool {
        !matches!(self, Self::Ollama)
    }

    #[must_use]
    pub const fn auth_style(self) -> AuthStyle {
        match self {
            Self::Anthropic | Self::AnthropicVertexAI => AuthStyle::ApiKeyHeader,
            _ => AuthStyle::Bearer,
        }
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::OpenAI => "openai",
            Self::AzureOpenAI => "azureopenai",
            Self::Anthropic => "anthropic",
            Self::Gemini => "gemini",
            Self::GeminiVertexAI => "geminivertexai",
            Self::AnthropicVertexAI => "anthropicvertexai",
            Self::Ollama => "ollama",
            Self::Bedrock => "bedrock",
        }
    }
}

impl fmt::Display for ModelProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ModelProvider {
    type Err = anyhow::Error;

    /// Parses a provider name, ignoring case, `-` and `_`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized: String = s
            .chars()
            .filter(|c| !matches!(c, '-' | '_'))
            .collect::<String>()
            .to_lowercase();

        match normalized.as_str() {
            "openai" => Ok(Self::OpenAI),
            "azureopenai" | "azure" => Ok(Self::AzureOpenAI),
            "anthropic" => Ok(Self::Anthropic),
            "gemini" => Ok(Self::Gemini),
            "geminivertexai" => Ok(Self::GeminiVertexAI),
            "anthropicvertexai" => Ok(Self::AnthropicVertexAI),
            "ollama" => Ok(Self::Ollama),
            "bedrock" => Ok(Self::Bedrock),
            _ => anyhow::bail!("Unknown model provider: {s}"),
        }
    }
}
