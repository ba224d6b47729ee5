//! Forwarding the caller's bearer credential to the model provider.
//!
//! [`CredentialForwarder`] reads the inbound `Authorization` header from the
//! request context and, when the target client has opted in, makes that
//! token the credential for the outgoing model call. Every failure to find a
//! token or a willing client is a silent no-op: the call proceeds with the
//! client's own static key.

use async_trait::async_trait;
use secrecy::SecretString;
use tracing::{debug, trace};

use keyrelay_common::{ModelRequest, ModelResponse, RequestContext};

use crate::plugin::{CallbackContext, Plugin};

/// Registered name of the forwarder.
pub const PLUGIN_NAME: &str = "llm_passthrough";

/// Case-sensitive scheme prefix, including the single separating space.
pub const BEARER_PREFIX: &str = "Bearer ";

/// Returns the token carried by a `Bearer <token>` header value.
///
/// The prefix must match exactly. Surrounding whitespace is trimmed from the
/// token, and a token that is empty after trimming counts as absent.
///
/// ```
/// use keyrelay::passthrough::parse_bearer;
///
/// assert_eq!(parse_bearer("Bearer sk-123"), Some("sk-123"));
/// assert_eq!(parse_bearer("Bearer    "), None);
/// assert_eq!(parse_bearer("bearer sk-123"), None);
/// assert_eq!(parse_bearer("Basic abc"), None);
/// ```
#[must_use]
pub fn parse_bearer(value: &str) -> Option<&str> {
    let token = value.strip_prefix(BEARER_PREFIX)?.trim();
    (!token.is_empty()).then_some(token)
}

/// Extracts the bearer token from the request context's inbound headers.
///
/// `authorization` is consulted before `Authorization`; an empty or
/// non-string lowercase value falls through to the capitalized one.
#[must_use]
pub fn extract_bearer_token(state: &RequestContext) -> Option<SecretString> {
    let value = state
        .header("authorization")
        .filter(|value| !value.is_empty())
        .or_else(|| state.header("Authorization"))?;

    parse_bearer(value).map(|token| SecretString::from(token.to_owned()))
}

/// Plugin that forwards the inbound bearer token to opted-in model clients.
#[derive(Debug, Default, Clone, Copy)]
pub struct CredentialForwarder;

impl CredentialForwarder {
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Plugin for CredentialForwarder {
    fn name(&self) -> &str {
        PLUGIN_NAME
    }

    async fn before_model(
        &self,
        ctx: &CallbackContext<'_>,
        request: &mut ModelRequest,
    ) -> Option<ModelResponse> {
        let Some(token) = extract_bearer_token(ctx.state) else {
            trace!("no bearer token in request headers");
            return None;
        };

        let Some(client) = ctx.model.as_passthrough() else {
            trace!(
                model = %ctx.model.config().model,
                "model client does not accept forwarded credentials"
            );
            return None;
        };

        if client.api_key_passthrough() != Some(true) {
            trace!(model = %ctx.model.config().model, "api key passthrough not enabled");
            return None;
        }

        client.set_passthrough_key(request, token);
        debug!(
            invocation_id = %request.invocation_id,
            model = %ctx.model.config().model,
            "Set LLM API key from Bearer token"
        );

        None
    }
}
