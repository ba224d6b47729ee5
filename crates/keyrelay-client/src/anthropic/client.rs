//! Anthropic messages API client.
//!
//! Authenticates with `x-api-key`. This client does not accept forwarded
//! credentials: [`LLMClient::as_passthrough`] returns `None`, so a
//! passthrough plugin leaves its calls on the static key.

use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use chrono::Utc;
use log::debug;
use reqwest::header::CONTENT_TYPE;
use reqwest_middleware::ClientWithMiddleware;

use keyrelay_common::{Message, MessageRole, ModelConfig, ModelRequest, ModelResponse, Usage};

use crate::LLMClient;
use crate::anthropic::{CreateMessageRequest, MessageResponse};
use crate::auth::{apply_auth_headers, require_static_credentials, resolve_api_key};
use crate::error::ClientError;
use crate::http::{apply_static_headers, base_url, build_http_client, read_error};

#[derive(Clone)]
pub struct AnthropicClient {
    client: ClientWithMiddleware,
    base_url: String,
    config: Arc<ModelConfig>,
}

impl std::fmt::Debug for AnthropicClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AnthropicClient")
            .field("api_key", &"[REDACTED]")
            .field("base_url", &self.base_url)
            .field("model", &self.config.model)
            .finish_non_exhaustive()
    }
}

impl AnthropicClient {
    /// Create a new Anthropic client.
    ///
    /// # Errors
    ///
    /// Returns an error if the API key is missing, the endpoint is invalid, or
    /// HTTP client creation fails.
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

    /// `{base}/v1/messages`, without doubling a `/v1` already in the base URL.
    fn messages_url(&self) -> String {
        if self.base_url.ends_with("/v1") {
            format!("{}/messages", self.base_url)
        } else {
            format!("{}/v1/messages", self.base_url)
        }
    }

    async fn make_request(
        &self,
        body: &CreateMessageRequest,
        request: &ModelRequest,
    ) -> Result<MessageResponse, ClientError> {
        let url = self.messages_url();
        let api_key = resolve_api_key(request, &self.config)?;

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
impl LLMClient for AnthropicClient {
    fn config(&self) -> &ModelConfig {
        &self.config
    }

    async fn chat(&self, request: &ModelRequest) -> Result<ModelResponse> {
        self.validate_request(request)?;

        let body = CreateMessageRequest::from((request, self.config.as_ref()));
        if body.messages.is_empty() {
            return Err(ClientError::InvalidRequest(
                "Request must contain at least one non-system message".to_string(),
            )
            .into());
        }

        let response = self.make_request(&body, request).await?;

        Ok(ModelResponse {
            message: Message::new(MessageRole::Assistant, response.text()),
            finish_reason: response
                .stop_reason
                .as_deref()
                .and_then(|reason| reason.parse().ok()),
            usage: response.usage.map(|u| Usage {
                prompt_tokens: u.input_tokens,
                completion_tokens: u.output_tokens,
                total_tokens: u.input_tokens.saturating_add(u.output_tokens),
            }),
            model: response.model,
            created_at: Utc::now(),
            response_id: Some(response.id),
        })
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;
    use keyrelay_common::provider::ANTHROPIC_VERSION;
    use keyrelay_common::{FinishReason, ModelProvider, RetryConfig};
    use std::time::Duration;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn create_test_config(base_url: &str) -> ModelConfig {
        ModelConfig::new(ModelProvider::Anthropic, "claude-sonnet-4-5")
            .with_api_key("test-key")
            .with_base_url(base_url)
            .with_retry_config(RetryConfig {
                max_retries: 0,
                initial_delay: Duration::from_millis(1),
                max_delay: Duration::from_millis(1),
            })
    }

    fn message_body() -> serde_json::Value {
        serde_json::json!({
            "id": "msg_01XFDUDYJgAACzvnptvVoYEL",
            "type": "message",
            "role": "assistant",
            "content": [{
                "type": "text",
                "text": "Hello! How can I help you today?"
            }],
            "model": "claude-sonnet-4-5",
            "stop_reason": "end_turn",
            "usage": {
                "input_tokens": 12,
                "output_tokens": 8
            }
        })
    }

    #[tokio::test]
    async fn test_successful_message() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/v1/messages"))
            .and(header("x-api-key", "test-key"))
            .and(header("anthropic-version", ANTHROPIC_VERSION))
            .and(body_partial_json(serde_json::json!({
                "system": "Be brief.",
                "max_tokens": 4096
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(message_body()))
            .expect(1)
            .mount(&mock_server)
            .await;

        let client = AnthropicClient::new(create_test_config(&mock_server.uri())).unwrap();
        let request = ModelRequest::new(vec![Message::system("Be brief."), Message::user("Hello")]);
        let response = client.chat(&request).await.unwrap();

        assert_eq!(response.message.content, "Hello! How can I help you today?");
        assert_eq!(response.finish_reason, Some(FinishReason::Stop));
        assert_eq!(response.usage.unwrap().total_tokens, 20);
    }

    #[tokio::test]
    async fn test_base_url_with_v1_not_doubled() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/v1/messages"))
            .respond_with(ResponseTemplate::new(200).set_body_json(message_body()))
            .expect(1)
            .mount(&mock_server)
            .await;

        let config = create_test_config(&format!("{}/v1", mock_server.uri()));
        let client = AnthropicClient::new(config).unwrap();
        client
            .chat(&ModelRequest::new(vec![Message::user("Hello")]))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_usage_total_saturates() {
        let mock_server = MockServer::start().await;

        let mut body = message_body();
        body["usage"] = serde_json::json!({
            "input_tokens": u32::MAX,
            "output_tokens": 5
        });

        Mock::given(method("POST"))
            .and(path("/v1/messages"))
            .respond_with(ResponseTemplate::new(200).set_body_json(body))
            .mount(&mock_server)
            .await;

        let client = AnthropicClient::new(create_test_config(&mock_server.uri())).unwrap();
        let response = client
            .chat(&ModelRequest::new(vec![Message::user("Hello")]))
            .await
            .unwrap();
        assert_eq!(response.usage.unwrap().total_tokens, u32::MAX);
    }

    #[test]
    fn test_not_passthrough_capable() {
        let config = ModelConfig::new(ModelProvider::Anthropic, "claude-sonnet-4-5")
            .with_api_key("test-key")
            .with_api_key_passthrough(true);
        let client = AnthropicClient::new(config).unwrap();
        assert!(client.as_passthrough().is_none());
    }

    #[tokio::test]
    async fn test_system_only_request_rejected() {
        let client = AnthropicClient::new(create_test_config("http://127.0.0.1:9")).unwrap();
        let error = client
            .chat(&ModelRequest::new(vec![Message::system("Be brief.")]))
            .await
            .unwrap_err();
        let client_error = error.downcast_ref::<ClientError>().unwrap();
        assert!(matches!(client_error, ClientError::InvalidRequest(_)));
    }

    #[tokio::test]
    async fn test_rate_limit_error() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(429)
                    .insert_header("retry-after", "30")
                    .set_body_json(serde_json::json!({
                        "type": "error",
                        "error": {"type": "rate_limit_error", "message": "slow down"}
                    })),
            )
            .mount(&mock_server)
            .await;

        let client = AnthropicClient::new(create_test_config(&mock_server.uri())).unwrap();
        let error = client
            .chat(&ModelRequest::new(vec![Message::user("Hello")]))
            .await
            .unwrap_err();
        let client_error = error.downcast_ref::<ClientError>().unwrap();
        assert_eq!(client_error.retry_after(), Some(Duration::from_secs(30)));
    }
}
