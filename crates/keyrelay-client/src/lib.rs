//! # keyrelay-client
//!
//! Client library for LLM inference providers that can authenticate each call
//! with a credential forwarded from the inbound request.
//!
//! Every client implements [`LLMClient`]. Clients that accept forwarded
//! credentials also implement [`PassthroughCapable`] and expose it through
//! [`LLMClient::as_passthrough`]; callers dispatch through that reference
//! rather than probing the concrete type.
//!
//! Currently supports:
//! - OpenAI-compatible APIs (passthrough-capable)
//! - Anthropic messages API
//! - Model discovery against provider listing endpoints
//!
//! ## Example
//!
//! ```no_run
//! use keyrelay_client::{LLMClient, OpenAIClient};
//! use keyrelay_common::{Message, ModelConfig, ModelProvider, ModelRequest};
//! use secrecy::SecretString;
//!
//! # async fn example() -> anyhow::Result<()> {
//! let config = ModelConfig::new(ModelProvider::OpenAI, "gpt-4o")
//!     .with_base_url("http://litellm.internal:4000/v1")
//!     .with_api_key_passthrough(true);
//!
//! let client = OpenAIClient::new(config)?;
//!
//! let mut request = ModelRequest::new(vec![Message::user("Hello, world!")]);
//! if let Some(passthrough) = client.as_passthrough()
//!     && passthrough.api_key_passthrough() == Some(true)
//! {
//!     passthrough.set_passthrough_key(&mut request, SecretString::from("sk-caller".to_owned()));
//! }
//!
//! let response = client.chat(&request).await?;
//! println!("Response: {}", response.message.content);
//! # Ok(())
//! # }
//! ```

use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use secrecy::SecretString;

use keyrelay_common::{ModelConfig, ModelRequest, ModelResponse};

pub mod anthropic;
pub mod auth;
pub mod discovery;
pub mod error;
mod http;
pub mod openai;

pub use anthropic::AnthropicClient;
pub use discovery::ModelDiscoverer;
pub use error::ClientError;
pub use openai::OpenAIClient;

/// Trait for LLM client implementations.
///
/// Implementations must be thread-safe (Send + Sync); a single client is
/// typically shared by every call an agent makes.
#[must_use = "LLMClient must be used to make requests"]
#[async_trait]
pub trait LLMClient: Send + Sync {
    /// The configuration used to build this client.
    fn config(&self) -> &ModelConfig;

    /// Send a chat completion request to the LLM.
    ///
    /// A credential in `request.options.api_key` authenticates this call in
    /// place of the configured static key.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The request fails validation
    /// - No usable credential is available
    /// - Network communication fails
    /// - The API returns an error (authentication, rate limit, etc.)
    /// - The response cannot be parsed
    async fn chat(&self, request: &ModelRequest) -> Result<ModelResponse>;

    /// This client's passthrough capability, if it has one.
    fn as_passthrough(&self) -> Option<&dyn PassthroughCapable> {
        None
    }

    /// Validate a request before sending.
    ///
    /// # Errors
    ///
    /// Returns `ClientError::InvalidRequest` if validation fails.
    fn validate_request(&self, request: &ModelRequest) -> Result<()> {
        request
            .validate()
            .map_err(|e| ClientError::InvalidRequest(e.to_string()))?;
        Ok(())
    }
}

/// Capability of a client to authenticate a call with a forwarded credential.
///
/// The opt-in is a static property of the client; the credential itself is
/// stored on the individual request, so a shared client never carries one
/// caller's token into another call.
pub trait PassthroughCapable: Send + Sync {
    /// The client's opt-in flag. `None` and `Some(false)` both mean disabled.
    fn api_key_passthrough(&self) -> Option<bool>;

    /// Stores `token` as the credential for the call described by `request`.
    fn set_passthrough_key(&self, request: &mut ModelRequest, token: SecretString);
}

#[async_trait]
impl<C: LLMClient + ?Sized> LLMClient for Arc<C> {
    fn config(&self) -> &ModelConfig {
        (**self).config()
    }

    async fn chat(&self, request: &ModelRequest) -> Result<ModelResponse> {
        (**self).chat(request).await
    }

    fn as_passthrough(&self) -> Option<&dyn PassthroughCapable> {
        (**self).as_passthrough()
    }

    fn validate_request(&self, request: &ModelRequest) -> Result<()> {
        (**self).validate_request(request)
    }
}
