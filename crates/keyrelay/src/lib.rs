//! # keyrelay
//!
//! Forwards the caller's bearer credential to the LLM provider.
//!
//! An agent host that serves many users often fronts a shared model gateway
//! (`LiteLLM` and friends) that authenticates each user separately. keyrelay
//! runs a [`CredentialForwarder`] plugin right before every model call: it
//! takes the token from the inbound `Authorization: Bearer <token>` header and,
//! if the model client opted in with `api_key_passthrough`, makes it the
//! credential for that one call.
//!
//! ## Quick Start
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use keyrelay::{
//!     Core, CredentialForwarder, Message, ModelConfig, ModelProvider, ModelRequest,
//!     OpenAIClient, PluginManager, RequestContext,
//! };
//!
//! # async fn example() -> anyhow::Result<()> {
//! keyrelay::logging::init_logging()?;
//!
//! let config = ModelConfig::new(ModelProvider::OpenAI, "gpt-4o")
//!     .with_base_url("http://litellm.internal:4000/v1")
//!     .with_api_key_passthrough(true);
//!
//! let core = Core::new(OpenAIClient::new(config)?)
//!     .with_plugins(PluginManager::new().with_plugin(Arc::new(CredentialForwarder::new())));
//!
//! // Normally filled in by the host from the inbound HTTP request.
//! let state = RequestContext::from_headers([("authorization", "Bearer sk-caller")]);
//!
//! let response = core
//!     .chat(&state, ModelRequest::new(vec![Message::user("Hello!")]))
//!     .await?;
//! println!("{}", response.message.content);
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod core;
pub mod error;
pub mod logging;
pub mod passthrough;
pub mod plugin;

pub use keyrelay_client::*;
pub use keyrelay_common::*;

pub use config::{LogFormat, LoggingSettings, ModelProfile, RelayConfig};
pub use core::Core;
pub use error::CoreError;
pub use passthrough::{CredentialForwarder, extract_bearer_token};
pub use plugin::{CallbackContext, Plugin, PluginManager};
