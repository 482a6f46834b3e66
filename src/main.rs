mod cli;

use std::sync::Arc;

use clap::Parser;
use cli::{Cli, Commands};
use relaybox::api;
use relaybox::config::Config;
use relaybox::engine::native::NativeEngine;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Server(args) => {
            let mut config =
                Config::load().map_err(|e| format!("Failed to load config: {e}"))?;
            if let Some(host) = args.host {
                config.server.host = host;
            }
            if let Some(port) = args.port {
                config.server.port = port;
            }

            let engine = Arc::new(NativeEngine::new(config.engine.clone()));
            api::run(config, engine).await?;
        }
    }

    Ok(())
}
