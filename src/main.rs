use std::sync::Arc;

use color_eyre::Result;
use tracing_subscriber::EnvFilter;

use longwave::adapters::{MemoryMessenger, OpenAiBackend};
use longwave::config::{Config, DEFAULT_CONFIG_PATH};
use longwave::relay::Relay;

/// One-shot console turn: send a prompt through the full relay pipeline
/// (chain resolution, backend stream, reconciliation) against an in-memory
/// message store, and print the final reply.
#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let prompt = std::env::args().skip(1).collect::<Vec<_>>().join(" ");
    if prompt.is_empty() {
        eprintln!("usage: longwave <prompt>");
        std::process::exit(2);
    }

    let config = Config::load(DEFAULT_CONFIG_PATH)?;
    let messenger = Arc::new(MemoryMessenger::new());
    let trigger = messenger.seed_user(prompt, None);

    let backend = OpenAiBackend::new(config.backend.clone(), config.system_prompt.clone());
    let relay = Relay::new(config, Arc::clone(&messenger), backend);

    let output = relay.handle_trigger(trigger).await?;
    println!("{}", output.final_text);
    Ok(())
}
