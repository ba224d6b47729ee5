//! Pre-call plugin hooks.
//!
//! A [`Plugin`] sees every model request right before it is dispatched and
//! may rewrite it or answer it outright. [`PluginManager`] runs plugins in
//! registration order.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use keyrelay_client::LLMClient;
use keyrelay_common::{ModelRequest, ModelResponse, RequestContext};

/// What a plugin can see about the call it is intercepting.
#[derive(Clone, Copy)]
pub struct CallbackContext<'a> {
    /// Per-request state supplied by the host (inbound headers and the like).
    pub state: &'a RequestContext,
    /// The client the request is about to be sent with.
    pub model: &'a dyn LLMClient,
}

impl fmt::Debug for CallbackContext<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CallbackContext")
            .field("state_keys", &self.state.keys().collect::<Vec<_>>())
            .field("model", &self.model.config().model)
            .finish()
    }
}

impl<'a> CallbackContext<'a> {
    #[must_use]
    pub const fn new(state: &'a RequestContext, model: &'a dyn LLMClient) -> Self {
        Self { state, model }
    }
}

#[async_trait]
pub trait Plugin: Send + Sync {
    /// Name used in logs and for lookups.
    fn name(&self) -> &str;

    /// Runs before a model request is sent.
    ///
    /// Returning `Some` short-circuits the call: the response is handed back
    /// to the caller and the model is never contacted. `None` lets the
    /// (possibly modified) request proceed.
    async fn before_model(
        &self,
        ctx: &CallbackContext<'_>,
        request: &mut ModelRequest,
    ) -> Option<ModelResponse>;
}

/// Ordered chain of plugins.
#[derive(Clone, Default)]
pub struct PluginManager {
    plugins: Vec<Arc<dyn Plugin>>,
}

impl fmt::Debug for PluginManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PluginManager")
            .field("plugins", &self.names())
            .finish()
    }
}

impl PluginManager {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, plugin: Arc<dyn Plugin>) {
        self.plugins.push(plugin);
    }

    #[must_use]
    pub fn with_plugin(mut self, plugin: Arc<dyn Plugin>) -> Self {
        self.register(plugin);
        self
    }

    #[must_use]
    pub fn names(&self) -> Vec<&str> {
        self.plugins.iter().map(|p| p.name()).collect()
    }

    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.plugins.iter().any(|p| p.name() == name)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.plugins.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.plugins.is_empty()
    }

    /// Runs every plugin in order until one short-circuits.
    pub async fn run_before_model(
        &self,
        ctx: &CallbackContext<'_>,
        request: &mut ModelRequest,
    ) -> Option<ModelResponse> {
        for plugin in &self.plugins {
            if let Some(response) = plugin.before_model(ctx, request).await {
                debug!(plugin = plugin.name(), "plugin short-circuited model call");
                return Some(response);
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use anyhow::Result;
    use keyrelay_common::{Message, ModelConfig, ModelProvider};

    struct StubClient {
        config: ModelConfig,
    }

    #[async_trait]
    impl LLMClient for StubClient {
        fn config(&self) -> &ModelConfig {
            &self.config
        }

        async fn chat(&self, _request: &ModelRequest) -> Result<ModelResponse> {
            Ok(ModelResponse::text("stub", "from model"))
        }
    }

    struct CountingPlugin {
        name: &'static str,
        calls: AtomicUsize,
        answer: Option<&'static str>,
    }

    impl CountingPlugin {
        fn new(name: &'static str, answer: Option<&'static str>) -> Arc<Self> {
            Arc::new(Self {
                name,
                calls: AtomicUsize::new(0),
                answer,
            })
        }
    }

    #[async_trait]
    impl Plugin for CountingPlugin {
        fn name(&self) -> &str {
            self.name
        }

        async fn before_model(
            &self,
            _ctx: &CallbackContext<'_>,
            request: &mut ModelRequest,
        ) -> Option<ModelResponse> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            request.messages.push(Message::system(self.name));
            self.answer.map(|text| ModelResponse::text(self.name, text))
        }
    }

    fn stub_client() -> StubClient {
        StubClient {
            config: ModelConfig::new(ModelProvider::OpenAI, "stub"),
        }
    }

    #[tokio::test]
    async fn test_plugins_run_in_registration_order() {
        let first = CountingPlugin::new("first", None);
        let second = CountingPlugin::new("second", None);
        let manager = PluginManager::new()
            .with_plugin(first.clone())
            .with_plugin(second.clone());

        let state = RequestContext::new();
        let client = stub_client();
        let ctx = CallbackContext::new(&state, &client);
        let mut request = ModelRequest::new(vec![Message::user("hi")]);

        assert!(manager.run_before_model(&ctx, &mut request).await.is_none());
        let appended: Vec<_> = request.messages[1..].iter().map(|m| m.content.as_str()).collect();
        assert_eq!(appended, vec!["first", "second"]);
        assert_eq!(manager.names(), vec!["first", "second"]);
    }

    #[tokio::test]
    async fn test_first_short_circuit_wins() {
        let first = CountingPlugin::new("first", Some("cached"));
        let second = CountingPlugin::new("second", Some("other"));
        let manager = PluginManager::new()
            .with_plugin(first.clone())
            .with_plugin(second.clone());

        let state = RequestContext::new();
        let client = stub_client();
        let ctx = CallbackContext::new(&state, &client);
        let mut request = ModelRequest::new(vec![Message::user("hi")]);

        let response = manager.run_before_model(&ctx, &mut request).await.unwrap();
        assert_eq!(response.message.content, "cached");
        assert_eq!(first.calls.load(Ordering::SeqCst), 1);
        assert_eq!(second.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_empty_manager_is_a_no_op() {
        let manager = PluginManager::default();
        assert!(manager.is_empty());

        let state = RequestContext::new();
        let client = stub_client();
        let ctx = CallbackContext::new(&state, &client);
        let mut request = ModelRequest::new(vec![Message::user("hi")]);

        assert!(manager.run_before_model(&ctx, &mut request).await.is_none());
        assert_eq!(request.messages.len(), 1);
    }
}
