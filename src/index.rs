//! Local index construction: scans a channel's message history, extracts
//! the source identifier of every synchronized post and deletes whatever
//! does not identify as one.
//!
//! The index is transient per-pass state. It is rebuilt wholesale at the
//! start of every reconciliation pass from the platform's own history; it
//! is never maintained incrementally across passes. Construction is not a
//! pure read: cleanup deletions are part of it and complete before the
//! index is handed to the engine.

use std::collections::BTreeMap;

use futures::future::try_join_all;
use regex::Regex;
use tracing::{debug, info};

use crate::contract::{ChatMessage, ChatPlatform, LocalPost, PlatformError};

/// Ordered mapping from source identifier to destination post, one per
/// channel, ascending by identifier.
pub type LocalIndex = BTreeMap<u64, LocalPost>;

/// How many recent messages to scan per channel, matching the destination
/// client's default cache window.
pub const HISTORY_FETCH_LIMIT: usize = 256;

/// Builds the identifier-extraction pattern for a site:
/// `^\s*https?://(?:www\.)?<host>/(?:news|events)/(\d+)/?\s*$`.
pub fn id_pattern_for(site_base_url: &str) -> Regex {
    let host = site_base_url
        .trim()
        .trim_start_matches("https://")
        .trim_start_matches("http://");
    let host = host.strip_prefix("www.").unwrap_or(host);
    let host = host.trim_end_matches('/');
    Regex::new(&format!(
        r"^\s*https?://(?:www\.)?{}/(?:news|events)/(\d+)/?\s*$",
        regex::escape(host)
    ))
    .expect("identifier pattern")
}

/// Extracts the source identifier of a synchronized post, or `None` if the
/// message is not one. A valid post has exactly one attached document whose
/// URL matches the identifier pattern.
pub fn post_id(pattern: &Regex, message: &ChatMessage) -> Option<u64> {
    let [document] = message.documents.as_slice() else {
        return None;
    };
    pattern
        .captures(&document.url)
        .and_then(|caps| caps[1].parse().ok())
}

/// Scans up to `limit` messages of the channel and builds the identifier
/// index. Every message that does not identify as a synchronized post is
/// deleted; all deletions complete before the index is returned. Duplicate
/// identifiers resolve to the last message seen in traversal order.
pub async fn build_index<P: ChatPlatform + ?Sized>(
    platform: &P,
    channel_id: u64,
    pattern: &Regex,
    limit: usize,
) -> Result<LocalIndex, PlatformError> {
    let history = platform.history(channel_id, limit).await?;

    let mut index = LocalIndex::new();
    let mut cleanup: Vec<u64> = Vec::new();
    for message in history {
        match post_id(pattern, &message) {
            Some(id) => {
                if let Some(document) = message.documents.into_iter().next() {
                    index.insert(
                        id,
                        LocalPost {
                            message_id: message.id,
                            document,
                        },
                    );
                }
            }
            None => cleanup.push(message.id),
        }
    }

    if !cleanup.is_empty() {
        info!(
            channel_id,
            count = cleanup.len(),
            "Deleting unidentifiable messages during index construction"
        );
        try_join_all(
            cleanup
                .iter()
                .map(|&message_id| platform.delete(channel_id, message_id)),
        )
        .await?;
    }

    debug!(
        channel_id,
        posts = index.len(),
        ids = ?index.keys().collect::<Vec<_>>(),
        "Local index built"
    );

    Ok(index)
}
