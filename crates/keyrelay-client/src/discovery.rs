//! Model discovery against provider listing endpoints.
//!
//! Most providers expose an OpenAI-compatible `GET /v1/models`; only the
//! authentication headers differ. Ollama has its own `/api/tags` listing.

use std::time::Duration;

use log::debug;
use reqwest::header::CONTENT_TYPE;
use reqwest_middleware::ClientWithMiddleware;
use reqwest_retry::{RetryTransientMiddleware, policies::ExponentialBackoff};
use secrecy::SecretString;
use serde::Deserialize;

use keyrelay_common::{ModelConfig, ModelProvider};

use crate::auth::apply_auth_headers;
use crate::error::ClientError;
use crate::http::base_url;

/// Default timeout for discovery requests.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Deserialize)]
struct ModelsResponse {
    #[serde(default)]
    data: Vec<ModelEntry>,
}

#[derive(Debug, Deserialize)]
struct ModelEntry {
    #[serde(default)]
    id: String,
}

#[derive(Debug, Deserialize)]
struct OllamaTagsResponse {
    #[serde(default)]
    models: Vec<OllamaModel>,
}

#[derive(Debug, Deserialize)]
struct OllamaModel {
    #[serde(default)]
    name: String,
}

/// Fetches the model ids a provider endpoint serves.
#[derive(Debug, Clone)]
pub struct ModelDiscoverer {
    client: ClientWithMiddleware,
    timeout: Duration,
}

impl Default for ModelDiscoverer {
    fn default() -> Self {
        Self::new()
    }
}

impl ModelDiscoverer {
    /// A discoverer with the default 30 second timeout and no retries.
    #[must_use]
    pub fn new() -> Self {
        Self::with_timeout(DEFAULT_TIMEOUT)
    }

    #[must_use]
    pub fn with_timeout(timeout: Duration) -> Self {
        Self {
            client: build_client(timeout, 0),
            timeout,
        }
    }

    /// Adds transient-failure retries with exponential backoff.
    #[must_use]
    pub fn with_retries(self, max_retries: u32) -> Self {
        Self {
            client: build_client(self.timeout, max_retries),
            timeout: self.timeout,
        }
    }

    /// Lists the models served by the endpoint a model config points at.
    ///
    /// # Errors
    ///
    /// Returns `ConfigurationError` if the config has no usable endpoint, and
    /// otherwise the errors of [`Self::discover_models`].
    pub async fn discover_for(&self, config: &ModelConfig) -> Result<Vec<String>, ClientError> {
        let endpoint = base_url(config)?;
        self.discover_models(config.provider, &endpoint, config.api_key.as_ref())
            .await
    }

    /// Lists the model ids served at `endpoint`.
    ///
    /// # Errors
    ///
    /// - `AuthenticationError` on 401
    /// - `RequestError` on 403, 404 and any other non-success status
    /// - `NetworkError`/`MiddlewareError` if the request fails
    /// - `SerializationError` if the listing cannot be parsed
    pub async fn discover_models(
        &self,
        provider: ModelProvider,
        endpoint: &str,
        api_key: Option<&SecretString>,
    ) -> Result<Vec<String>, ClientError> {
        if provider == ModelProvider::Ollama {
            return self.discover_ollama_models(endpoint).await;
        }

        let url = models_url(endpoint, provider);
        debug!("Discovering models for provider {provider} at {url}");

        let request_builder = self
            .client
            .get(&url)
            .header(CONTENT_TYPE, "application/json");
        let response = apply_auth_headers(request_builder, provider, api_key)?
            .send()
            .await?;

        let status = response.status().as_u16();
        match status {
            200..=299 => {}
            401 => {
                return Err(ClientError::AuthenticationError(format!(
                    "invalid API key for provider {provider}"
                )));
            }
            403 => {
                return Err(ClientError::RequestError(format!(
                    "forbidden: API key lacks permission to list models for provider {provider}"
                )));
            }
            404 => {
                return Err(ClientError::RequestError(format!(
                    "models endpoint not found for provider {provider} (URL: {url})"
                )));
            }
            _ => {
                let body = response.text().await.unwrap_or_default();
                return Err(ClientError::RequestError(format!(
                    "API returned status {status} for provider {provider}: {body}"
                )));
            }
        }

        let listing: ModelsResponse = serde_json::from_str(&response.text().await?)?;
        Ok(listing
            .data
            .into_iter()
            .map(|model| model.id)
            .filter(|id| !id.is_empty())
            .collect())
    }

    async fn discover_ollama_models(&self, endpoint: &str) -> Result<Vec<String>, ClientError> {
        let url = format!("{}/api/tags", endpoint.trim_end_matches('/'));
        debug!("Discovering models from Ollama at {url}");

        let response = self.client.get(&url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(ClientError::RequestError(format!(
                "ollama API returned status {}",
                status.as_u16()
            )));
        }

        let tags: OllamaTagsResponse = serde_json::from_str(&response.text().await?)?;
        Ok(tags
            .models
            .into_iter()
            .map(|model| model.name)
            .filter(|name| !name.is_empty())
            .collect())
    }
}

fn build_client(timeout: Duration, max_retries: u32) -> ClientWithMiddleware {
    let reqwest_client = reqwest::Client::builder()
        .timeout(timeout)
        .build()
        .unwrap_or_default();

    let builder = reqwest_middleware::ClientBuilder::new(reqwest_client);
    if max_retries == 0 {
        return builder.build();
    }

    let retry_policy = ExponentialBackoff::builder().build_with_max_retries(max_retries);
    builder
        .with(RetryTransientMiddleware::new_with_policy(retry_policy))
        .build()
}

/// The listing URL for a provider's endpoint. Ollama is handled separately.
#[must_use]
pub fn models_url(endpoint: &str, provider: ModelProvider) -> String {
    let endpoint = endpoint.trim_end_matches('/');

    match provider {
        ModelProvider::Gemini => {
            if endpoint.contains("generativelanguage.googleapis.com") {
                format!("{endpoint}/v1beta/models")
            } else {
                format!("{endpoint}/v1/models")
            }
        }
        ModelProvider::GeminiVertexAI | ModelProvider::AnthropicVertexAI => {
            format!("{endpoint}/v1/models")
        }
        _ => {
            if endpoint.ends_with("/v1") {
                format!("{endpoint}/models")
            } else {
                format!("{endpoint}/v1/models")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;
    use keyrelay_common::provider::ANTHROPIC_VERSION;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[test]
    fn test_models_url() {
        assert_eq!(
            models_url("https://api.openai.com/v1", ModelProvider::OpenAI),
            "https://api.openai.com/v1/models"
        );
        assert_eq!(
            models_url("http://litellm:4000/", ModelProvider::OpenAI),
            "http://litellm:4000/v1/models"
        );
        assert_eq!(
            models_url("https://api.anthropic.com", ModelProvider::Anthropic),
            "https://api.anthropic.com/v1/models"
        );
        assert_eq!(
            models_url(
                "https://generativelanguage.googleapis.com",
                ModelProvider::Gemini
            ),
            "https://generativelanguage.googleapis.com/v1beta/models"
        );
        assert_eq!(
            models_url("https://gemini-proxy.local", ModelProvider::Gemini),
            "https://gemini-proxy.local/v1/models"
        );
        assert_eq!(
            models_url("https://vertex.local/v1", ModelProvider::AnthropicVertexAI),
            "https://vertex.local/v1/v1/models"
        );
    }

    #[tokio::test]
    async fn test_discover_openai_models() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/v1/models"))
            .and(header("authorization", "Bearer sk-test"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "object": "list",
                "data": [
                    {"id": "gpt-4o", "object": "model"},
                    {"id": "", "object": "model"},
                    {"id": "gpt-4o-mini", "object": "model"}
                ]
            })))
            .expect(1)
            .mount(&mock_server)
            .await;

        let key = SecretString::from("sk-test".to_owned());
        let models = ModelDiscoverer::new()
            .discover_models(ModelProvider::OpenAI, &mock_server.uri(), Some(&key))
            .await
            .unwrap();

        assert_eq!(models, vec!["gpt-4o", "gpt-4o-mini"]);
    }

    #[tokio::test]
    async fn test_discover_anthropic_uses_api_key_header() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/v1/models"))
            .and(header("x-api-key", "sk-ant"))
            .and(header("anthropic-version", ANTHROPIC_VERSION))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "data": [{"id": "claude-sonnet-4-5", "type": "model"}]
            })))
            .expect(1)
            .mount(&mock_server)
            .await;

        let key = SecretString::from("sk-ant".to_owned());
        let models = ModelDiscoverer::new()
            .discover_models(ModelProvider::Anthropic, &mock_server.uri(), Some(&key))
            .await
            .unwrap();

        assert_eq!(models, vec!["claude-sonnet-4-5"]);
    }

    #[tokio::test]
    async fn test_discover_ollama_models() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/api/tags"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "models": [{"name": "llama3.2:latest"}, {"name": "qwen2.5:7b"}]
            })))
            .expect(1)
            .mount(&mock_server)
            .await;

        let models = ModelDiscoverer::new()
            .discover_models(ModelProvider::Ollama, &format!("{}/", mock_server.uri()), None)
            .await
            .unwrap();

        assert_eq!(models, vec!["llama3.2:latest", "qwen2.5:7b"]);
    }

    #[tokio::test]
    async fn test_discover_status_mapping() {
        let mock_server = MockServer::start().await;

        let routes = [
            ("/unauth", 401),
            ("/forbidden", 403),
            ("/missing", 404),
            ("/broken", 502),
        ];
        for (prefix, status) in routes {
            Mock::given(method("GET"))
                .and(path(format!("{prefix}/v1/models")))
                .respond_with(ResponseTemplate::new(status).set_body_string("upstream says no"))
                .mount(&mock_server)
                .await;
        }

        let discoverer = ModelDiscoverer::new();
        let key = SecretString::from("sk-test".to_owned());
        let uri = mock_server.uri();
        let discover = async |prefix: &str| {
            discoverer
                .discover_models(ModelProvider::OpenAI, &format!("{uri}{prefix}"), Some(&key))
                .await
                .unwrap_err()
        };

        assert!(discover("/unauth").await.is_authentication_error());

        let forbidden = discover("/forbidden").await.to_string();
        assert!(forbidden.contains("forbidden"));

        let missing = discover("/missing").await.to_string();
        assert!(missing.contains("/missing/v1/models"));

        let broken = discover("/broken").await.to_string();
        assert!(broken.contains("502"));
        assert!(broken.contains("upstream says no"));
    }

    #[tokio::test]
    async fn test_discover_for_config() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/v1/models"))
            .and(header("authorization", "Bearer static-key"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "data": [{"id": "local-model"}]
            })))
            .mount(&mock_server)
            .await;

        let config = ModelConfig::new(ModelProvider::OpenAI, "local-model")
            .with_base_url(format!("{}/v1/", mock_server.uri()))
            .with_api_key("static-key");

        let models = ModelDiscoverer::default().discover_for(&config).await.unwrap();
        assert_eq!(models, vec!["local-model"]);
    }

    mod prop_tests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn models_url_has_single_models_suffix(
                host in "[a-z]{1,12}",
                version in prop::option::of(Just("/v1")),
                slashes in 0usize..3,
            ) {
                let endpoint = format!(
                    "http://{host}.local{}{}",
                    version.unwrap_or_default(),
                    "/".repeat(slashes)
                );
                for provider in [ModelProvider::OpenAI, ModelProvider::Anthropic, ModelProvider::AzureOpenAI] {
                    let url = models_url(&endpoint, provider);
                    prop_assert!(url.ends_with("/v1/models"));
                    prop_assert!(!url.contains("/v1/v1/"));
                    prop_assert!(!url.contains(".local//"));
                }
            }
        }
    }
}
