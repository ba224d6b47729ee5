//! Model profile configuration.
//!
//! Configuration is loaded from `~/.config/keyrelay/config.toml`.
//!
//! ## Example Configuration
//!
//! ```toml
//! active_model = "gateway"
//!
//! [[models]]
//! nickname = "gateway"
//! provider = "openai"
//! model = "gpt-4o"
//! base_url = "http://litellm.internal:4000/v1"
//! api_key_passthrough = true
//!
//! [[models]]
//! nickname = "sonnet"
//! provider = "anthropic"
//! model = "claude-sonnet-4-5-20250929"
//! api_key_env = "ANTHROPIC_API_KEY"
//!
//! [logging]
//! level = "debug"
//! format = "json"
//! ```

use std::collections::HashMap;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::debug;

use keyrelay_client::{AnthropicClient, LLMClient, OpenAIClient};
use keyrelay_common::{ModelConfig, ModelProvider};

use crate::error::{CoreError, Result};

/// Configuration loaded from TOML.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelayConfig {
    /// Nickname of the profile used when a caller doesn't pick one
    pub active_model: String,

    /// Available model profiles
    pub models: Vec<ModelProfile>,

    #[serde(default)]
    pub logging: LoggingSettings,
}

/// A named model a caller can select.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelProfile {
    /// User-friendly nickname for this model (e.g., "gateway", "sonnet")
    pub nickname: String,

    pub provider: ModelProvider,

    /// Full model identifier (e.g., "claude-sonnet-4-5-20250929")
    pub model: String,

    /// Environment variable holding the static API key (e.g., `OPENAI_API_KEY`)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key_env: Option<String>,

    /// Optional custom base URL (e.g., <https://openrouter.ai/api/v1>)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,

    /// Accept the caller's bearer token as this model's credential
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key_passthrough: Option<bool>,
}

impl ModelProfile {
    /// Builds the client configuration, reading the static key from the environment.
    ///
    /// An unset or empty `api_key_env` variable leaves the static key empty;
    /// client construction decides whether that is acceptable.
    #[must_use]
    pub fn to_model_config(&self) -> ModelConfig {
        let mut config = ModelConfig::new(self.provider, &self.model);

        if let Some(base_url) = &self.base_url {
            config = config.with_base_url(base_url);
        }

        if let Some(var) = &self.api_key_env {
            match std::env::var(var) {
                Ok(key) if !key.is_empty() => config = config.with_api_key(key),
                _ => debug!(profile = %self.nickname, env = %var, "API key variable not set"),
            }
        }

        config.api_key_passthrough = self.api_key_passthrough;
        config
    }

    /// Constructs the client for this profile.
    ///
    /// Anthropic models get the native messages client; every other provider
    /// is reached through an OpenAI-compatible endpoint.
    ///
    /// # Errors
    ///
    /// Returns `CoreError::Client` if the configuration is invalid or no
    /// credential can ever be supplied.
    pub fn build_client(&self) -> Result<Arc<dyn LLMClient>> {
        self.check_gateway_url()?;

        let config = self.to_model_config();
        config
            .validate()
            .map_err(|e| CoreError::Config(format!("model '{}': {e}", self.nickname)))?;

        let client: Arc<dyn LLMClient> = match self.provider {
            ModelProvider::Anthropic | ModelProvider::AnthropicVertexAI => Arc::new(
                AnthropicClient::new(config).map_err(|e| CoreError::Client(e.to_string()))?,
            ),
            _ => Arc::new(OpenAIClient::new(config).map_err(|e| CoreError::Client(e.to_string()))?),
        };

        Ok(client)
    }

    /// Providers whose native API isn't OpenAI-compatible are only reachable
    /// through an explicit gateway `base_url`.
    fn check_gateway_url(&self) -> Result<()> {
        let native_only = matches!(
            self.provider,
            ModelProvider::Gemini
                | ModelProvider::GeminiVertexAI
                | ModelProvider::Ollama
                | ModelProvider::Bedrock
        );

        if native_only && self.base_url.is_none() {
            return Err(CoreError::Config(format!(
                "Model '{}' uses provider {} which needs a base_url pointing at an \
                 OpenAI-compatible endpoint",
                self.nickname, self.provider
            )));
        }

        Ok(())
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

impl fmt::Display for LogFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pretty => write!(f, "pretty"),
            Self::Json => write!(f, "json"),
        }
    }
}

impl FromStr for LogFormat {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "pretty" | "text" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            other => Err(CoreError::Config(format!("Unknown log format: {other}"))),
        }
    }
}

/// `[logging]` table. Environment variables take precedence.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoggingSettings {
    /// Filter directive, e.g. `info` or `keyrelay=debug,warn`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub level: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub format: Option<LogFormat>,
}

impl RelayConfig {
    /// Loads configuration from the default location.
    ///
    /// Reads from `~/.config/keyrelay/config.toml`.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The config directory cannot be determined
    /// - The file doesn't exist
    /// - Deserialization or validation fails
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::config_path()?)
    }

    /// Loads configuration from an explicit path.
    ///
    /// # Errors
    ///
    /// Returns an error if the file is missing, unreadable, not valid TOML,
    /// or fails validation.
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(CoreError::Config(format!(
                "Configuration file not found: {}",
                path.display()
            )));
        }

        let contents = fs::read_to_string(path)?;
        let config: Self = toml::from_str(&contents)?;
        config.validate()?;

        debug!(path = %path.display(), models = config.models.len(), "loaded configuration");
        Ok(config)
    }

    /// Returns the default configuration file path.
    ///
    /// # Errors
    ///
    /// Returns an error if the config directory cannot be determined.
    pub fn config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| CoreError::Config("Failed to determine config directory".to_string()))?
            .join("keyrelay");

        Ok(config_dir.join("config.toml"))
    }

    /// Validates the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - No models are defined
    /// - The active model doesn't exist
    /// - Duplicate model nicknames are found
    /// - A profile has an empty model id or a non-HTTP base URL
    /// - A Gemini, Ollama or Bedrock profile has no base URL
    pub fn validate(&self) -> Result<()> {
        if self.models.is_empty() {
            return Err(CoreError::Config(
                "No models defined in configuration".to_string(),
            ));
        }

        if !self.models.iter().any(|m| m.nickname == self.active_model) {
            return Err(CoreError::Config(format!(
                "Active model '{}' not found in model profiles",
                self.active_model
            )));
        }

        let mut seen = HashMap::new();
        for model in &self.models {
            if let Some(existing) = seen.insert(&model.nickname, model.provider) {
                return Err(CoreError::Config(format!(
                    "Duplicate model nickname '{}' (providers: {existing}, {})",
                    model.nickname, model.provider
                )));
            }

            if model.model.trim().is_empty() {
                return Err(CoreError::Config(format!(
                    "Model '{}' has an empty model id",
                    model.nickname
                )));
            }

            if let Some(base_url) = &model.base_url
                && !(base_url.starts_with("http://") || base_url.starts_with("https://"))
            {
                return Err(CoreError::Config(format!(
                    "Model '{}' base_url must start with http:// or https://",
                    model.nickname
                )));
            }

            model.check_gateway_url()?;
        }

        Ok(())
    }

    /// Gets a model profile by nickname.
    ///
    /// # Errors
    ///
    /// Returns an error if the model is not found.
    pub fn get_model(&self, nickname: &str) -> Result<&ModelProfile> {
        self.models
            .iter()
            .find(|m| m.nickname == nickname)
            .ok_or_else(|| CoreError::ModelNotFound(nickname.to_string()))
    }

    /// Gets the active model profile.
    ///
    /// # Errors
    ///
    /// Returns an error if the active model is not found (should not happen after validation).
    pub fn get_active_model(&self) -> Result<&ModelProfile> {
        self.get_model(&self.active_model)
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;
    use std::io::Write;

    fn sample_config_toml() -> &'static str {
        r#"
active_model = "gateway"

[[models]]
nickname = "gateway"
provider = "openai"
model = "gpt-4o"
base_url = "http://litellm.internal:4000/v1"
api_key_passthrough = true

[[models]]
nickname = "sonnet"
provider = "anthropic"
model = "claude-sonnet-4-5-20250929"
api_key_env = "KEYRELAY_TEST_UNSET_ANTHROPIC_KEY"

[logging]
level = "debug"
format = "json"
        "#
    }

    #[test]
    fn test_parse_config() {
        let config: RelayConfig = toml::from_str(sample_config_toml()).unwrap();

        assert_eq!(config.active_model, "gateway");
        assert_eq!(config.models.len(), 2);
        assert_eq!(config.models[0].api_key_passthrough, Some(true));
        assert_eq!(config.models[1].api_key_passthrough, None);
        assert_eq!(config.logging.level.as_deref(), Some("debug"));
        assert_eq!(config.logging.format, Some(LogFormat::Json));
        config.validate().unwrap();
    }

    #[test]
    fn test_get_model() {
        let config: RelayConfig = toml::from_str(sample_config_toml()).unwrap();

        let model = config.get_model("sonnet").unwrap();
        assert_eq!(model.provider, ModelProvider::Anthropic);
        assert_eq!(model.model, "claude-sonnet-4-5-20250929");

        assert!(matches!(
            config.get_model("nonexistent"),
            Err(CoreError::ModelNotFound(_))
        ));
        assert_eq!(config.get_active_model().unwrap().nickname, "gateway");
    }

    #[test]
    fn test_validate_missing_active_model() {
        let toml = r#"
active_model = "nonexistent"

[[models]]
nickname = "gpt4"
provider = "openai"
model = "gpt-4o"
        "#;

        let config: RelayConfig = toml::from_str(toml).unwrap();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_duplicate_nicknames() {
        let toml = r#"
active_model = "gpt4"

[[models]]
nickname = "gpt4"
provider = "openai"
model = "gpt-4o"

[[models]]
nickname = "gpt4"
provider = "anthropic"
model = "claude-sonnet-4-5-20250929"
        "#;

        let config: RelayConfig = toml::from_str(toml).unwrap();
        let error = config.validate().unwrap_err().to_string();
        assert!(error.contains("Duplicate model nickname 'gpt4'"));
    }

    #[test]
    fn test_validate_rejects_non_http_base_url() {
        let toml = r#"
active_model = "local"

[[models]]
nickname = "local"
provider = "ollama"
model = "llama3.2"
base_url = "localhost:11434"
        "#;

        let config: RelayConfig = toml::from_str(toml).unwrap();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_unknown_provider_is_a_parse_error() {
        let toml = r#"
active_model = "x"

[[models]]
nickname = "x"
provider = "mystery"
model = "m"
        "#;

        assert!(toml::from_str::<RelayConfig>(toml).is_err());
    }

    #[test]
    fn test_logging_defaults() {
        let toml = r#"
active_model = "gpt4"

[[models]]
nickname = "gpt4"
provider = "openai"
model = "gpt-4o"
        "#;

        let config: RelayConfig = toml::from_str(toml).unwrap();
        assert_eq!(config.logging, LoggingSettings::default());
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(sample_config_toml().as_bytes()).unwrap();

        let config = RelayConfig::load_from(file.path()).unwrap();
        assert_eq!(config.models.len(), 2);
    }

    #[test]
    fn test_load_from_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let error = RelayConfig::load_from(&dir.path().join("config.toml")).unwrap_err();
        assert!(matches!(error, CoreError::Config(_)));
    }

    #[test]
    fn test_load_from_invalid_toml() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"active_model = [").unwrap();

        let error = RelayConfig::load_from(file.path()).unwrap_err();
        assert!(matches!(error, CoreError::Toml(_)));
    }

    #[test]
    fn test_config_path_ends_with_keyrelay() {
        if let Ok(path) = RelayConfig::config_path() {
            assert!(path.ends_with("keyrelay/config.toml"));
        }
    }

    #[test]
    fn test_passthrough_profile_builds_without_static_key() {
        let config: RelayConfig = toml::from_str(sample_config_toml()).unwrap();

        let client = config.get_model("gateway").unwrap().build_client().unwrap();
        let passthrough = client.as_passthrough().unwrap();
        assert_eq!(passthrough.api_key_passthrough(), Some(true));
        assert!(client.config().api_key.is_none());
    }

    #[test]
    fn test_profile_without_key_or_passthrough_fails() {
        let config: RelayConfig = toml::from_str(sample_config_toml()).unwrap();

        let error = config.get_model("sonnet").unwrap().build_client().err().unwrap();
        assert!(matches!(error, CoreError::Client(message) if message.contains("API key is required")));
    }

    #[test]
    fn test_anthropic_profile_is_not_passthrough_capable() {
        let profile = ModelProfile {
            nickname: "sonnet".to_string(),
            provider: ModelProvider::Anthropic,
            model: "claude-sonnet-4-5-20250929".to_string(),
            api_key_env: None,
            base_url: None,
            api_key_passthrough: Some(true),
        };

        // Passthrough relaxes the static-key requirement even for a client
        // that will ignore forwarded tokens.
        let client = profile.build_client().unwrap();
        assert!(client.as_passthrough().is_none());
    }

    #[test]
    fn test_gemini_profile_needs_gateway_url() {
        let mut profile = ModelProfile {
            nickname: "flash".to_string(),
            provider: ModelProvider::Gemini,
            model: "gemini-2.5-flash".to_string(),
            api_key_env: None,
            base_url: None,
            api_key_passthrough: Some(true),
        };

        let error = profile.build_client().err().unwrap();
        assert!(matches!(error, CoreError::Config(message) if message.contains("base_url")));

        let config = RelayConfig {
            active_model: "flash".to_string(),
            models: vec![profile.clone()],
            logging: LoggingSettings::default(),
        };
        assert!(config.validate().is_err());

        profile.base_url = Some("http://litellm.internal:4000/v1".to_string());
        let client = profile.build_client().unwrap();
        assert!(client.as_passthrough().is_some());
    }

    #[test]
    fn test_log_format_from_str() {
        assert_eq!("JSON".parse::<LogFormat>().unwrap(), LogFormat::Json);
        assert_eq!("pretty".parse::<LogFormat>().unwrap(), LogFormat::Pretty);
        assert!("xml".parse::<LogFormat>().is_err());
    }
}
