/// `load_config` module: loads a static YAML config file and injects
/// environment secrets into the runtime configuration.
///
/// This is the only place where untrusted YAML is parsed and mapped to the
/// strongly-typed internal structs; credentials never live in the file.
///
/// # Responsibilities
/// - Parse the user-supplied YAML configuration into [`Config`]
/// - Inject environment variables for secret fields (feed API key, chat bot
///   token)
/// - Ensure robust error messages for CLI and tests: any failure in loading
///   must result in clear diagnostics
///
/// # Errors
/// All errors in this module use `anyhow::Error` for context-rich
/// diagnostics, surfaced at the CLI boundary.
use anyhow::{Context, Result};
use serde::Deserialize;
use std::fs;
use std::path::Path;
use tracing::{error, info};

use crate::config::Config;

/// Environment variable holding the feed API key.
pub const FEED_API_KEY_VAR: &str = "FEED_API_KEY";
/// Environment variable holding the chat platform bot token.
pub const CHAT_BOT_TOKEN_VAR: &str = "CHAT_BOT_TOKEN";

/// Fully resolved configuration: file-borne settings plus env secrets.
#[derive(Debug, Clone)]
pub struct CliConfig {
    pub config: Config,
    pub feed_api_key: String,
    pub chat_bot_token: String,
}

#[derive(Debug, Deserialize)]
struct RawConfig {
    site_base_url: String,
    channels: ChannelsSection,
    #[serde(default)]
    history_limit: Option<usize>,
}

#[derive(Debug, Deserialize)]
struct ChannelsSection {
    news: u64,
    events: u64,
}

/// Loads a static YAML config file (no secrets) and injects required env
/// vars for secrets. Returns a processable config for use by the CLI.
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<CliConfig> {
    let path_ref = path.as_ref();
    info!(config_path = ?path_ref, "Loading configuration from file");

    let config_content = match fs::read_to_string(path_ref) {
        Ok(content) => {
            info!(config_path = ?path_ref, "Config file read successfully");
            content
        }
        Err(e) => {
            error!(error = ?e, config_path = ?path_ref, "Failed to read config file");
            return Err(anyhow::anyhow!(
                "Failed to read config file {:?}: {}",
                path_ref,
                e
            ));
        }
    };

    let raw: RawConfig = match serde_yaml::from_str(&config_content) {
        Ok(conf) => {
            info!(config_path = ?path_ref, "Parsed config YAML successfully");
            conf
        }
        Err(e) => {
            error!(error = ?e, config_path = ?path_ref, "Failed to parse config YAML");
            return Err(anyhow::anyhow!("Failed to parse config YAML: {e}"));
        }
    };

    let feed_api_key = std::env::var(FEED_API_KEY_VAR)
        .with_context(|| format!("{FEED_API_KEY_VAR} env var must be set"))?;
    let chat_bot_token = std::env::var(CHAT_BOT_TOKEN_VAR)
        .with_context(|| format!("{CHAT_BOT_TOKEN_VAR} env var must be set"))?;

    let mut config = Config {
        site_base_url: raw.site_base_url,
        news_channel_id: raw.channels.news,
        events_channel_id: raw.channels.events,
        history_limit: crate::index::HISTORY_FETCH_LIMIT,
    };
    if let Some(limit) = raw.history_limit {
        config.history_limit = limit;
    }
    config.trace_loaded();

    Ok(CliConfig {
        config,
        feed_api_key,
        chat_bot_token,
    })
}
