//! OpenAI-compatible client implementation.
//!
//! # Credential passthrough
//!
//! [`OpenAIClient`] implements [`PassthroughCapable`]. When its config sets
//! `api_key_passthrough`, a token stored on a request via
//! [`PassthroughCapable::set_passthrough_key`] is sent as
//! `Authorization: Bearer <token>` for that request only. Requests without a
//! forwarded token fall back to the static `api_key`.
//!
//! # Examples
//!
//! ```no_run
//! use keyrelay_client::{LLMClient, OpenAIClient};
//! use keyrelay_common::{Message, ModelConfig, ModelProvider, ModelRequest};
//!
//! # async fn example() -> anyhow::Result<()> {
//! let config = ModelConfig::new(ModelProvider::OpenAI, "gpt-4o").with_api_key("sk-...");
//! let client = OpenAIClient::new(config)?;
//!
//! let request = ModelRequest::new(vec![
//!     Message::system("You are a helpful assistant"),
//!     Message::user("Hello!"),
//! ]);
//! let response = client.chat(&request).await?;
//! println!("Response: {}", response.message.content);
//! # Ok(())
//! # }
//! ```
//!
//! # Security
//!
//! Keys and forwarded tokens are held as `SecretString`, never logged, never
//! placed in the request body, and marked sensitive on the outgoing header.

use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use log::{debug, warn};
use reqwest::header::CONTENT_TYPE;
use reqwest_middleware::ClientWithMiddleware;
use secrecy::SecretString;
use serde::{Serialize, de::DeserializeOwned};

use keyrelay_common::{Message, MessageRole, ModelConfig, ModelRequest, ModelResponse};

use crate::auth::{apply_auth_headers, require_static_credentials, resolve_api_key};
use crate::error::ClientError;
use crate::http::{apply_static_headers, base_url, build_http_client, read_error};
use crate::openai::{ChatCompletionRequest, ChatCompletionResponse};
use crate::{LLMClient, PassthroughCapable};

/// Client for `OpenAI`-compatible APIs.
#[derive(Clone)]
pub struct OpenAIClient {
    client: ClientWithMiddleware,
    base_url: String,
    config: Arc<ModelConfig>,
}

// Custom Debug implementation to avoid exposing API key
impl std::fmt::Debug for OpenAIClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenAIClient")
            .field("api_key", &"[REDACTED]")
            .field("base_url", &self.base_url)
            .field("model", &self.config.model)
            .field("api_key_passthrough", &self.config.api_key_passthrough)
            .finish_non_exhaustive()
    }
}

impl OpenAIClient {
    /// Create a new client from a configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - no static API key is set and passthrough is not enabled
    /// - no valid endpoint can be determined
    /// - the HTTP client cannot be built
    pub fn new(config: ModelConfig) -> Result<Self> {
        require_static_credentials(&config)?;
        let base_url = base_url(&config)?;
        let client = build_http_client(&config)?;

        Ok(Self {
            client,
            base_url,
            config: Arc::new(config),
        })
    }

    /// Set the model to use for chat completions.
    #[must_use]
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        Arc::make_mut(&mut self.config).model = model.into();
        self
    }

    async fn make_request<T: DeserializeOwned, B: Serialize + Sync>(
        &self,
        endpoint: &str,
        body: &B,
        api_key: Option<&SecretString>,
    ) -> Result<T, ClientError> {
        let url = format!("{}/{}", self.base_url, endpoint);

        url::Url::parse(&url)
            .map_err(|e| ClientError::ConfigurationError(format!("Invalid URL '{url}': {e}")))?;

        let request_builder = self
            .client
            .post(&url)
            .header(CONTENT_TYPE, "application/json");
        let request_builder = apply_static_headers(request_builder, &self.config.headers);
        let request_builder = apply_auth_headers(request_builder, self.config.provider, api_key)?;

        let response = request_builder
            .body(serde_json::to_string(body)?)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(read_error(response).await);
        }

        let response_text = response.text().await?;
        debug!("Raw API response: {response_text}");

        Ok(serde_json::from_str(&response_text)?)
    }
}

#[async_trait]
impl LLMClient for OpenAIClient {
    fn config(&self) -> &ModelConfig {
        &self.config
    }

    async fn chat(&self, request: &ModelRequest) -> Result<ModelResponse> {
        self.validate_request(request)?;

        let api_key = resolve_api_key(request, &self.config)?;
        if request.options.has_api_key() {
            debug!(
                "Authenticating invocation {} with forwarded credential",
                request.invocation_id
            );
        }

        let body = ChatCompletionRequest::from((request, self.config.as_ref()));
        let response: ChatCompletionResponse = self
            .make_request("chat/completions", &body, api_key)
            .await?;

        let Some(choice) = response.choices.into_iter().next() else {
            warn!(
                "Received empty choices array from API. Response ID: {}, Model: {}",
                response.id, response.model
            );
            return Err(
                ClientError::InvalidResponse("API returned no choices in response".to_string())
                    .into(),
            );
        };

        let finish_reason = choice
            .finish_reason
            .as_deref()
            .and_then(|reason| reason.parse().ok());

        Ok(ModelResponse {
            message: Message::new(
                MessageRole::Assistant,
                choice.message.content.unwrap_or_default(),
            ),
            model: response.model,
            finish_reason,
            usage: response.usage,
            created_at: DateTime::from_timestamp(i64::try_from(response.created).unwrap_or(0), 0)
                .unwrap_or_else(Utc::now),
            response_id: Some(response.id),
        })
    }

    fn as_passthrough(&self) -> Option<&dyn PassthroughCapable> {
        Some(self)
    }
}

impl PassthroughCapable for OpenAIClient {
    fn api_key_passthrough(&self) -> Option<bool> {
        self.config.api_key_passthrough
    }

    fn set_passthrough_key(&self, request: &mut ModelRequest, token: SecretString) {
        request.set_api_key(token);
    }
}
