use std::collections::HashMap;
use std::time::Duration;

use log::{debug, error, warn};
use reqwest::header::RETRY_AFTER;
use reqwest_middleware::{ClientWithMiddleware, RequestBuilder};
use reqwest_retry::{RetryTransientMiddleware, policies::ExponentialBackoff};
use reqwest_retry_after::RetryAfterMiddleware;

use keyrelay_common::ModelConfig;

use crate::auth::is_credential_header;
use crate::error::ClientError;

/// Builds the HTTP client for a model config, with retry middleware.
pub fn build_http_client(config: &ModelConfig) -> Result<ClientWithMiddleware, ClientError> {
    let retry = &config.retry_config;
    let retry_policy = ExponentialBackoff::builder()
        .retry_bounds(retry.initial_delay.min(retry.max_delay), retry.max_delay)
        .build_with_max_retries(retry.max_retries);

    // None means no timeout (useful for slow hardware/long-running requests)
    let mut builder = reqwest::Client::builder();
    if let Some(timeout) = config.timeout_seconds {
        builder = builder.timeout(Duration::from_secs(timeout));
    }
    let reqwest_client = builder.build()?;

    // RetryAfterMiddleware goes first so Retry-After is honored before exponential backoff
    Ok(reqwest_middleware::ClientBuilder::new(reqwest_client)
        .with(RetryAfterMiddleware::new())
        .with(RetryTransientMiddleware::new_with_policy(retry_policy))
        .build())
}

/// The config's effective endpoint without a trailing slash.
pub fn base_url(config: &ModelConfig) -> Result<String, ClientError> {
    let endpoint = config.endpoint().ok_or_else(|| {
        ClientError::ConfigurationError(format!(
            "No endpoint configured for provider {}",
            config.provider
        ))
    })?;

    url::Url::parse(&endpoint).map_err(|e| {
        ClientError::ConfigurationError(format!("Invalid base URL '{endpoint}': {e}"))
    })?;

    Ok(endpoint.trim_end_matches('/').to_string())
}

/// Adds the configured static headers, skipping any that carry credentials.
pub fn apply_static_headers(
    mut builder: RequestBuilder,
    headers: &HashMap<String, String>,
) -> RequestBuilder {
    for (name, value) in headers {
        if is_credential_header(name) {
            warn!("Ignoring static header '{name}'; credentials come from the API key settings");
            continue;
        }
        builder = builder.header(name.as_str(), value.as_str());
    }
    builder
}

/// Converts a non-success response into a `ClientError`.
pub async fn read_error(response: reqwest::Response) -> ClientError {
    let status = response.status().as_u16();
    let retry_after = response
        .headers()
        .get(RETRY_AFTER)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.trim().parse::<u64>().ok())
        .map(Duration::from_secs);

    let body = match response.text().await {
        Ok(body) => body,
        Err(e) => {
            warn!("Failed to read error response body: {e}");
            return ClientError::NetworkError(e);
        }
    };

    let err = ClientError::from_status(status, &body, retry_after);
    error!("API request failed with status {status}: {err}");
    debug!("Error response body: {body}");
    err
}
