use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::chat::RestChatPlatform;
use crate::feed::HttpFeedSource;
use crate::load_config::load_config;
use crate::synchronise::Synchroniser;

/// CLI for media-sync: mirror website news and events into chat channels.
#[derive(Parser)]
#[clap(
    name = "media-sync",
    version,
    about = "Mirror website news/event posts into chat channels, reconciling on every run"
)]
pub struct Cli {
    #[clap(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run one synchronisation pass over both channels using the given
    /// config file
    Sync {
        /// Path to the YAML config file
        #[clap(long)]
        config: PathBuf,
        /// Chat platform API base URL
        #[clap(long, default_value = "https://discord.com/api/v10")]
        chat_api: String,
    },
}

/// Extracted async CLI logic entrypoint for integration tests and main()
pub async fn run(cli: Cli) -> Result<()> {
    tracing::info!("trace_initialised");

    match cli.command {
        Commands::Sync { config, chat_api } => {
            let loaded = load_config(config)?;
            let feed = HttpFeedSource::new(&loaded.config.site_base_url, &loaded.feed_api_key);
            let platform = RestChatPlatform::new(&chat_api, &loaded.chat_bot_token);
            let mut synchroniser = Synchroniser::new(&loaded.config, feed, platform);

            println!("Synchronise starting...");
            match synchroniser.run_pass().await {
                Ok(report) => {
                    println!("Synchronise complete.\nReport:");
                    println!("{:#?}", report);
                    Ok(())
                }
                Err(e) => {
                    eprintln!("[ERROR] Synchronisation failed: {}", e);
                    Err(anyhow::Error::new(e))
                }
            }
        }
    }
}
