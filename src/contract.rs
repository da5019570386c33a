//! Collaborator interfaces for the synchronisation core.
//!
//! This module defines the two traits the engine consumes (`FeedSource` for
//! the remote website feed, `ChatPlatform` for the destination chat service)
//! together with the plain data types flowing across them.
//!
//! ## Interface & Extensibility
//! - Implement [`FeedSource`] to plug in another feed backend (HTTP API,
//!   fixture files, a webhook replay log).
//! - Implement [`ChatPlatform`] for other destinations; the engine only ever
//!   talks through this trait.
//! - All methods are async, returning results with boxed error types.
//!
//! ## Mocking & Testing
//! - Both traits are annotated for `mockall` so consumers can generate
//!   deterministic mocks for unit/integration tests. The mocks are exported
//!   behind the `test-export-mocks` feature.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

#[cfg(any(test, feature = "test-export-mocks"))]
use mockall::automock;

/// Which destination channel (and feed endpoint) a post belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChannelKind {
    News,
    Events,
}

impl ChannelKind {
    /// The path segment used both by the feed API and the post URL pattern.
    pub fn path_segment(&self) -> &'static str {
        match self {
            ChannelKind::News => "news",
            ChannelKind::Events => "events",
        }
    }
}

impl std::fmt::Display for ChannelKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.path_segment())
    }
}

/// One post as published on the remote feed. Immutable once fetched and
/// scoped to a single reconciliation pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteItem {
    /// Monotonically increasing feed identifier, unique per feed.
    pub id: u64,
    pub title: String,
    /// Rich-markup body as published upstream; transcoded before display.
    pub description: String,
    /// Canonical URL of the post on the website.
    pub url: String,
    /// Drafts are excluded from reconciliation entirely.
    pub draft: bool,
    pub author: Option<RemoteAuthor>,
    pub footer: Option<String>,
}

/// Author block as delivered by the feed. The icon URL is path-relative to
/// the site origin.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteAuthor {
    pub name: String,
    pub url: String,
    pub icon_url: String,
}

/// The normalized structured-content shape shared by the transcoder, the
/// equivalence check and the chat wire layer.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PostDocument {
    pub title: String,
    /// `None` on the stored side when the platform round-trips an empty
    /// rich-text body as absent; freshly transcoded documents always carry
    /// `Some`.
    pub description: Option<String>,
    pub url: String,
    pub author: Option<Author>,
    pub footer: Option<Footer>,
    pub image: Option<Image>,
}

impl From<&RemoteItem> for PostDocument {
    /// The untranscoded document for a remote item; run it through the
    /// transcoder before handing it to the platform.
    fn from(item: &RemoteItem) -> Self {
        PostDocument {
            title: item.title.clone(),
            description: Some(item.description.clone()),
            url: item.url.clone(),
            author: item.author.as_ref().map(|author| Author {
                name: author.name.clone(),
                url: author.url.clone(),
                icon_url: author.icon_url.clone(),
            }),
            footer: item.footer.as_ref().map(|text| Footer { text: text.clone() }),
            image: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Author {
    pub name: String,
    pub url: String,
    pub icon_url: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Footer {
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Image {
    pub url: String,
}

/// A destination message as returned by the platform's history endpoint,
/// before it has been validated as a synchronized post.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatMessage {
    /// Message identifier owned by the destination platform.
    pub id: u64,
    /// All structured documents attached to the message. A valid
    /// synchronized post has exactly one.
    pub documents: Vec<PostDocument>,
}

/// A validated destination post: one message carrying exactly one document
/// whose URL matched the identifier pattern.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalPost {
    pub message_id: u64,
    pub document: PostDocument,
}

/// Shared error type for collaborator calls (network/platform failure).
pub type PlatformError = Box<dyn std::error::Error + Send + Sync>;

/// Trait for fetching the remote content feed.
///
/// Items are returned newest first; page 1 is assumed sufficient for a
/// reconciliation pass. Pagination policy beyond that is the implementor's
/// concern.
#[cfg_attr(any(test, feature = "test-export-mocks"), automock)]
#[async_trait]
pub trait FeedSource: Send + Sync {
    /// Fetch one page of the feed for the given channel kind.
    async fn fetch_items(
        &self,
        kind: ChannelKind,
        page: u32,
    ) -> Result<Vec<RemoteItem>, PlatformError>;
}

/// Trait for the destination chat platform hosting the mirrored posts.
///
/// The engine treats message ids as opaque handles; the platform is the
/// system of record for what was last synchronized.
#[cfg_attr(any(test, feature = "test-export-mocks"), automock)]
#[async_trait]
pub trait ChatPlatform: Send + Sync {
    /// Fetch up to `limit` most recent messages of a channel.
    async fn history(
        &self,
        channel_id: u64,
        limit: usize,
    ) -> Result<Vec<ChatMessage>, PlatformError>;

    /// Post a new message carrying the given document, returning the created
    /// message.
    async fn send(
        &self,
        channel_id: u64,
        document: &PostDocument,
    ) -> Result<ChatMessage, PlatformError>;

    /// Replace the document of an existing message.
    async fn edit(
        &self,
        channel_id: u64,
        message_id: u64,
        document: &PostDocument,
    ) -> Result<(), PlatformError>;

    /// Delete a message.
    async fn delete(&self, channel_id: u64, message_id: u64) -> Result<(), PlatformError>;
}
