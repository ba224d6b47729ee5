//! Sends one message through a configured model profile, forwarding a
//! caller token the way an agent host would.
//!
//! ```text
//! cargo run -p keyrelay --example forward_bearer -- \
//!     --model gateway --token sk-caller --message "Hello"
//! ```

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use tracing::info;

use keyrelay::{
    Core, CredentialForwarder, Message, ModelRequest, PluginManager, RelayConfig, RequestContext,
};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Config file (defaults to ~/.config/keyrelay/config.toml)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Profile nickname (defaults to `active_model`)
    #[arg(long)]
    model: Option<String>,

    /// Token to present as `Authorization: Bearer <token>`
    #[arg(long)]
    token: Option<String>,

    #[arg(long, default_value = "Hello")]
    message: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let config = match &args.config {
        Some(path) => RelayConfig::load_from(path)?,
        None => RelayConfig::load()?,
    };
    keyrelay::logging::init_logging_with(&config.logging)?;

    let profile = match &args.model {
        Some(nickname) => config.get_model(nickname)?,
        None => config.get_active_model()?,
    };
    info!(
        profile = %profile.nickname,
        provider = %profile.provider,
        passthrough = profile.api_key_passthrough.unwrap_or(false),
        "using model profile"
    );

    let plugins = PluginManager::new().with_plugin(Arc::new(CredentialForwarder::new()));
    let core = Core::new(profile.build_client()?).with_plugins(plugins);

    let state = args
        .token
        .as_deref()
        .map_or_else(RequestContext::new, |token| {
            RequestContext::from_headers([("Authorization", format!("Bearer {token}"))])
        });

    let response = core
        .chat(&state, ModelRequest::new(vec![Message::user(args.message)]))
        .await?;

    println!("{}", response.message.content);
    if let Some(usage) = response.usage {
        info!(
            prompt_tokens = usage.prompt_tokens,
            completion_tokens = usage.completion_tokens,
            "usage"
        );
    }

    Ok(())
}
