//! Provider authentication.
//!
//! Decides which credential a call uses and how it is presented on the wire.
//! A credential forwarded for the call wins over the client's static key; a
//! provider that needs no secret (local Ollama) may go without either.

use reqwest::header::{AUTHORIZATION, HeaderValue};
use reqwest_middleware::RequestBuilder;
use secrecy::{ExposeSecret, SecretString};

use keyrelay_common::provider::ANTHROPIC_VERSION;
use keyrelay_common::{AuthStyle, ModelConfig, ModelProvider, ModelRequest};

use crate::error::ClientError;

pub const API_KEY_HEADER: &str = "x-api-key";
pub const ANTHROPIC_VERSION_HEADER: &str = "anthropic-version";

/// Picks the credential for a call: forwarded, then static, then none.
///
/// # Errors
///
/// Returns `ConfigurationError` if the provider requires a secret and neither
/// a forwarded nor a static key is available.
pub fn resolve_api_key<'a>(
    request: &'a ModelRequest,
    config: &'a ModelConfig,
) -> Result<Option<&'a SecretString>, ClientError> {
    if let Some(forwarded) = request.options.api_key.as_ref() {
        return Ok(Some(forwarded));
    }

    if let Some(api_key) = config.api_key.as_ref() {
        return Ok(Some(api_key));
    }

    if config.provider.requires_secret() {
        return Err(ClientError::ConfigurationError(format!(
            "No API key configured for provider {} and none forwarded for this call",
            config.provider
        )));
    }

    Ok(None)
}

/// Checks at construction time that the client can ever authenticate.
///
/// A missing static key is fine when the provider needs no secret or the
/// client opted into passthrough.
///
/// # Errors
///
/// Returns `ConfigurationError("API key is required")` otherwise.
pub fn require_static_credentials(config: &ModelConfig) -> Result<(), ClientError> {
    if config.api_key.is_none() && config.provider.requires_secret() && !config.passthrough_enabled()
    {
        return Err(ClientError::ConfigurationError(
            "API key is required".to_string(),
        ));
    }
    Ok(())
}

/// Adds the provider's authentication headers to a request.
///
/// # Errors
///
/// Returns `ConfigurationError` if the key contains bytes that aren't valid in a header.
pub fn apply_auth_headers(
    builder: RequestBuilder,
    provider: ModelProvider,
    api_key: Option<&SecretString>,
) -> Result<RequestBuilder, ClientError> {
    let builder = match provider.auth_style() {
        AuthStyle::Bearer => builder,
        AuthStyle::ApiKeyHeader => builder.header(ANTHROPIC_VERSION_HEADER, ANTHROPIC_VERSION),
    };

    let Some(key) = api_key else {
        return Ok(builder);
    };

    Ok(match provider.auth_style() {
        AuthStyle::Bearer => builder.header(
            AUTHORIZATION,
            sensitive_value(&format!("Bearer {}", key.expose_secret()))?,
        ),
        AuthStyle::ApiKeyHeader => {
            builder.header(API_KEY_HEADER, sensitive_value(key.expose_secret())?)
        }
    })
}

/// Whether a configured static header would collide with the auth headers.
pub(crate) fn is_credential_header(name: &str) -> bool {
    name.eq_ignore_ascii_case(AUTHORIZATION.as_str()) || name.eq_ignore_ascii_case(API_KEY_HEADER)
}

fn sensitive_value(value: &str) -> Result<HeaderValue, ClientError> {
    let mut header = HeaderValue::from_str(value).map_err(|_| {
        ClientError::ConfigurationError(
            "API key contains characters that are not valid in an HTTP header".to_string(),
        )
    })?;
    header.set_sensitive(true);
    Ok(header)
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;
    use keyrelay_common::Message;

    fn request() -> ModelRequest {
        ModelRequest::new(vec![Message::user("hi")])
    }

    #[test]
    fn test_forwarded_key_wins() {
        let config = ModelConfig::new(ModelProvider::OpenAI, "gpt-4o").with_api_key("static");
        let mut request = request();
        request.set_api_key(SecretString::from("forwarded".to_owned()));

        let key = resolve_api_key(&request, &config).unwrap().unwrap();
        assert_eq!(key.expose_secret(), "forwarded");
    }

    #[test]
    fn test_static_key_used_without_forwarded() {
        let config = ModelConfig::new(ModelProvider::OpenAI, "gpt-4o").with_api_key("static");
        let request = request();

        let key = resolve_api_key(&request, &config).unwrap().unwrap();
        assert_eq!(key.expose_secret(), "static");
    }

    #[test]
    fn test_missing_key_is_error_when_required() {
        let config =
            ModelConfig::new(ModelProvider::OpenAI, "gpt-4o").with_api_key_passthrough(true);
        let request = request();
        let result = resolve_api_key(&request, &config);
        assert!(matches!(result, Err(ClientError::ConfigurationError(_))));
    }

    #[test]
    fn test_ollama_needs_no_key() {
        let config = ModelConfig::new(ModelProvider::Ollama, "llama3");
        assert!(resolve_api_key(&request(), &config).unwrap().is_none());
        assert!(require_static_credentials(&config).is_ok());
    }

    #[test]
    fn test_static_credentials_required_unless_passthrough() {
        let bare = ModelConfig::new(ModelProvider::Anthropic, "claude-sonnet-4-5");
        assert!(require_static_credentials(&bare).is_err());

        let passthrough = bare.clone().with_api_key_passthrough(true);
        assert!(require_static_credentials(&passthrough).is_ok());

        let disabled = bare.with_api_key_passthrough(false);
        assert!(require_static_credentials(&disabled).is_err());
    }

    #[test]
    fn test_credential_header_names() {
        assert!(is_credential_header("Authorization"));
        assert!(is_credential_header("X-API-KEY"));
        assert!(!is_credential_header("x-request-id"));
    }

    #[test]
    fn test_invalid_key_bytes_rejected() {
        let client = reqwest_middleware::ClientBuilder::new(reqwest::Client::new()).build();
        let builder = client.get("http://localhost/models");
        let key = SecretString::from("bad\nkey".to_owned());

        let result = apply_auth_headers(builder, ModelProvider::OpenAI, Some(&key));
        assert!(matches!(result, Err(ClientError::ConfigurationError(_))));
    }
}
