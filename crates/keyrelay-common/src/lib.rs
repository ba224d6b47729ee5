//! # keyrelay-common
//!
//! Common types shared by the keyrelay client and plugin crates.
//!
//! This crate provides:
//! - [`RequestContext`]: per-request state handed to plugins by the host
//! - [`ModelProvider`]: supported providers, their default endpoints and auth styles
//! - [`ModelConfig`]: long-lived model client configuration, including the
//!   `api_key_passthrough` opt-in
//! - [`ModelRequest`] / [`ModelResponse`]: the outgoing call descriptor and its result
//!
//! ## Example
//!
//! ```
//! use keyrelay_common::{Message, ModelConfig, ModelProvider, ModelRequest, RequestContext};
//!
//! let config = ModelConfig::new(ModelProvider::OpenAI, "gpt-4o").with_api_key_passthrough(true);
//! assert!(config.passthrough_enabled());
//!
//! let state = RequestContext::new().with_header("Authorization", "Bearer sk-123");
//! assert_eq!(state.header("Authorization"), Some("Bearer sk-123"));
//!
//! let request = ModelRequest::new(vec![Message::user("Hello!")]).with_model("gpt-4o-mini");
//! assert!(request.options.api_key.is_none());
//! ```

/// Per-request state shared with plugins.
pub mod context;
/// Model client configuration.
///
/// Contains the static configuration of a model client, including credentials
/// and the passthrough opt-in.
pub mod config;
/// Model providers and their defaults.
pub mod provider;
/// Outgoing model requests and their responses.
pub mod request;

pub use config::{ModelConfig, RetryConfig};
pub use context::{HEADERS_KEY, RequestContext};
pub use provider::{AuthStyle, ModelProvider};
pub use request::{
    CallOptions, FinishReason, Message, MessageRole, ModelRequest, ModelResponse, Usage,
};
