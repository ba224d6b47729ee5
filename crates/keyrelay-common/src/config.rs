use std::collections::HashMap;
use std::time::Duration;

use secrecy::SecretString;
use serde::{Deserialize, Serialize};

use crate::provider::ModelProvider;

/// Configuration for exponential backoff retry behavior.
///
/// Controls how transient failures (connection errors, 5xx, 429) are retried
/// by the HTTP clients.
///
/// # Examples
///
/// ```
/// use std::time::Duration;
/// use keyrelay_common::RetryConfig;
///
/// let config = RetryConfig {
///     max_retries: 5,
///     initial_delay: Duration::from_millis(500),
///     max_delay: Duration::from_secs(60),
/// };
/// ```
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Maximum number of retry attempts before failing.
    pub max_retries: u32,
    /// Initial delay before the first retry attempt.
    pub initial_delay: Duration,
    /// Maximum delay between retry attempts (caps exponential growth).
    pub max_delay: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_delay: Duration::from_millis(1000),
            max_delay: Duration::from_secs(30),
        }
    }
}

/// Static configuration of a long-lived model client.
///
/// Besides the usual provider/model/endpoint settings this carries the
/// passthrough opt-in: when `api_key_passthrough` is `Some(true)` the client
/// accepts a caller-supplied bearer token per call, overriding `api_key` for
/// that call only. `None` and `Some(false)` both leave passthrough disabled.
///
/// # Examples
///
/// ```
/// use keyrelay_common::{ModelConfig, ModelProvider};
///
/// let config = ModelConfig::new(ModelProvider::OpenAI, "gpt-4o")
///     .with_base_url("https://litellm.internal/v1")
///     .with_api_key_passthrough(true)
///     .with_timeout(60);
///
/// assert_eq!(config.endpoint().as_deref(), Some("https://litellm.internal/v1"));
/// assert!(config.passthrough_enabled());
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelConfig {
    /// The provider kind; selects the wire format and auth style.
    pub provider: ModelProvider,
    /// The default model identifier.
    pub model: String,
    /// Custom base URL. Falls back to the provider's default endpoint.
    pub base_url: Option<String>,
    /// Statically configured API key.
    ///
    /// Never serialized to prevent accidental exposure.
    #[serde(skip_serializing, default)]
    pub api_key: Option<SecretString>,
    /// Opt-in for per-call credential passthrough.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key_passthrough: Option<bool>,
    /// Request timeout in seconds. `None` means no timeout.
    pub timeout_seconds: Option<u64>,
    /// Extra headers sent with every request.
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub headers: HashMap<String, String>,
    /// Default sampling temperature (0.0 to 2.0).
    pub temperature: Option<f32>,
    /// Default maximum tokens to generate.
    pub max_tokens: Option<u32>,
    #[serde(skip)]
    pub retry_config: RetryConfig,
}

impl ModelConfig {
    /// Creates a configuration for the given provider and model.
    ///
    /// All optional fields start unset.
    pub fn new(provider: ModelProvider, model: impl Into<String>) -> Self {
        Self {
            provider,
            model: model.into(),
            base_url: None,
            api_key: None,
            api_key_passthrough: None,
            timeout_seconds: None,
            headers: HashMap::new(),
            temperature: None,
            max_tokens: None,
            retry_config: RetryConfig::default(),
        }
    }

    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = Some(base_url.into());
        self
    }

    /// Sets the static API key. The key is stored as a `SecretString`.
    #[must_use]
    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(SecretString::new(api_key.into().into()));
        self
    }

    #[must_use]
    pub const fn with_api_key_passthrough(mut self, enabled: bool) -> Self {
        self.api_key_passthrough = Some(enabled);
        self
    }

    #[must_use]
    pub const fn with_timeout(mut self, timeout_seconds: u64) -> Self {
        self.timeout_seconds = Some(timeout_seconds);
        self
    }

    #[must_use]
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    #[must_use]
    pub const fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    #[must_use]
    pub const fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    #[must_use]
    pub const fn with_retry_config(mut self, retry_config: RetryConfig) -> Self {
        self.retry_config = retry_config;
        self
    }

    /// Whether this client accepts forwarded credentials.
    #[must_use]
    pub fn passthrough_enabled(&self) -> bool {
        self.api_key_passthrough.unwrap_or(false)
    }

    /// The effective endpoint: `base_url`, or the provider's default.
    #[must_use]
    pub fn endpoint(&self) -> Option<String> {
        self.base_url
            .clone()
            .or_else(|| self.provider.default_endpoint().map(String::from))
    }

    /// Validates the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - the model identifier is empty
    /// - `base_url` doesn't start with `http://` or `https://`
    /// - no endpoint can be determined for the provider
    /// - `temperature` is outside 0.0 to 2.0
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.model.trim().is_empty() {
            anyhow::bail!("Model identifier must not be empty");
        }

        if let Some(base_url) = self.base_url.as_deref()
            && !(base_url.starts_with("http://") || base_url.starts_with("https://"))
        {
            anyhow::bail!("base_url must start with http:// or https://, got {base_url}");
        }

        if self.endpoint().is_none() {
            anyhow::bail!(
                "No default endpoint for provider {}; base_url is required",
                self.provider
            );
        }

        if let Some(temp) = self.temperature
            && !(0.0..=2.0).contains(&temp)
        {
            anyhow::bail!("Temperature must be between 0.0 and 2.0, got {temp}");
        }

        Ok(())
    }
}
