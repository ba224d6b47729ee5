use anyhow::Result;
use tracing::{Instrument, debug, info_span};

use keyrelay_client::LLMClient;
use keyrelay_common::{ModelRequest, ModelResponse, RequestContext};

use crate::plugin::{CallbackContext, PluginManager};

/// Single-call invoker: runs the plugin chain, then sends the request.
pub struct Core<C: LLMClient> {
    pub client: C,
    pub plugins: PluginManager,
}

impl<C: LLMClient> Core<C> {
    pub fn new(client: C) -> Self {
        Self {
            client,
            plugins: PluginManager::new(),
        }
    }

    #[must_use]
    pub fn with_plugins(mut self, plugins: PluginManager) -> Self {
        self.plugins = plugins;
        self
    }

    /// Sends one model request on behalf of an inbound request.
    ///
    /// Every plugin sees the request before it is built for the wire; the
    /// first one to return a response answers the call without contacting
    /// the model.
    ///
    /// # Errors
    ///
    /// Returns the client's error if the model call fails.
    pub async fn chat(
        &self,
        state: &RequestContext,
        mut request: ModelRequest,
    ) -> Result<ModelResponse> {
        let span = info_span!(
            "model_call",
            invocation_id = %request.invocation_id,
            model = %request
                .model
                .as_deref()
                .unwrap_or(self.client.config().model.as_str()),
        );

        async move {
            let ctx = CallbackContext::new(state, &self.client);
            if let Some(response) = self.plugins.run_before_model(&ctx, &mut request).await {
                return Ok(response);
            }

            debug!(
                forwarded_credential = request.options.has_api_key(),
                messages = request.messages.len(),
                "dispatching model request"
            );
            self.client.chat(&request).await
        }
        .instrument(span)
        .await
    }
}
