#![doc = "media-sync: mirrors a remote news/event feed into chat channels."]

//! The core is a reconciliation engine (a sorted merge of the remote feed
//! against the channel's own message history) plus a content transcoder
//! (rewriting the site's rich markup into the destination's reduced
//! dialect). The chat platform is the system of record for what was last
//! synchronized; no state is persisted on disk.

pub mod chat;
pub mod cli;
pub mod config;
pub mod contract;
pub mod equivalence;
pub mod feed;
pub mod index;
pub mod load_config;
pub mod synchronise;
pub mod transcode;
