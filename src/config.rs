use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::index::HISTORY_FETCH_LIMIT;

/// Runtime configuration for one synchroniser instance.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Origin of the source website, e.g. `https://media.example.org`.
    /// Also determines the host in the post identifier pattern.
    pub site_base_url: String,
    /// Destination channel for news posts.
    pub news_channel_id: u64,
    /// Destination channel for event posts.
    pub events_channel_id: u64,
    /// How many recent messages to scan when rebuilding an index.
    #[serde(default = "default_history_limit")]
    pub history_limit: usize,
}

fn default_history_limit() -> usize {
    HISTORY_FETCH_LIMIT
}

impl Config {
    pub fn trace_loaded(&self) {
        info!(
            site_base_url = %self.site_base_url,
            news_channel_id = self.news_channel_id,
            events_channel_id = self.events_channel_id,
            history_limit = self.history_limit,
            "Loaded Config"
        );
        debug!(?self, "Config loaded (full debug)");
    }
}
