//! Reconciliation engine: merges the remote feed against the local index
//! and keeps the destination channels consistent with the website.
//!
//! # Major Types
//! - [`Synchroniser`]: context object owning the collaborators, the
//!   transcoder and one per-channel index; constructed per pass or per
//!   process lifetime and passed by reference, never accessed globally
//! - [`SyncAction`]: one decision of the merge (create/update/no-op/warn)
//! - [`PassReport`]: output report with per-channel counts for audit
//!
//! # Responsibilities
//! - Rebuild the local index from destination history (with cleanup) before
//!   every pass; the index is transient per-pass state
//! - Merge the ascending remote feed against the ascending index with a
//!   one-entry lookahead carry, then apply the resulting actions in order
//! - Fail-fast orchestration: a feed outage or a failed destination
//!   mutation aborts the rest of the pass; applied mutations stand
//!
//! # Callable From
//! - The CLI and the integration tests; tests drive it with mocked
//!   [`FeedSource`]/[`ChatPlatform`] collaborators
//!
//! # Error Handling
//! Hard failures surface as [`SyncError`]; malformed local posts are
//! recovered by deletion during index construction and a remote item
//! missing locally is only warned about. A failed pass is simply retried on
//! the next scheduled invocation, which starts from a fresh index rebuild.
//!
//! # Navigation
//! - Pure merge: [`reconcile`] (unit-tested in isolation)
//! - Pass entrypoint: [`Synchroniser::run_pass`]
//! - Push-style entry points: [`Synchroniser::upsert`], [`Synchroniser::delete`]

use regex::Regex;
use tracing::{debug, error, info, warn};

use crate::config::Config;
use crate::contract::{
    ChannelKind, ChatPlatform, FeedSource, LocalPost, PlatformError, PostDocument, RemoteItem,
};
use crate::equivalence::equivalent;
use crate::index::{build_index, id_pattern_for, LocalIndex};
use crate::transcode::Transcoder;

/// Hard failure of a synchronisation pass or a manual operation.
#[derive(Debug)]
pub enum SyncError {
    /// The remote feed could not be fetched or returned no data; the pass
    /// aborts with destination state untouched.
    FeedUnavailable(ChannelKind),
    /// Manual delete requested for an identifier absent from the index.
    DeleteNonexistent { kind: ChannelKind, id: u64 },
    /// A destination send/edit/delete failed; aborts the rest of the pass
    /// without rolling back already-applied mutations.
    Platform(PlatformError),
}

impl std::fmt::Display for SyncError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SyncError::FeedUnavailable(kind) => {
                write!(f, "remote {kind} feed unavailable")
            }
            SyncError::DeleteNonexistent { kind, id } => {
                write!(f, "no {kind} post with id {id} to delete")
            }
            SyncError::Platform(e) => write!(f, "destination platform operation failed: {e}"),
        }
    }
}

impl std::error::Error for SyncError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            SyncError::Platform(e) => Some(e.as_ref()),
            _ => None,
        }
    }
}

impl From<PlatformError> for SyncError {
    fn from(e: PlatformError) -> Self {
        SyncError::Platform(e)
    }
}

/// One decision of the merge, in application order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncAction {
    /// The remote item has no local post and none can match it later.
    Create { id: u64, document: PostDocument },
    /// The local post exists but its stored document is stale.
    Update {
        id: u64,
        message_id: u64,
        document: PostDocument,
    },
    /// The local post matches the freshly transcoded document.
    UpToDate { id: u64 },
    /// The remote item is missing locally mid-sequence; warned, not
    /// auto-created by this pass.
    MissingLocal { id: u64 },
}

/// Merges one feed page against the local index.
///
/// `items` is the page as fetched, newest first; it is reversed here since
/// the merge consumes ascending identifiers, and drafts are excluded before
/// reconciliation begins.
///
/// The merge walks both ascending sequences with a single carried-over
/// local entry: when a remote item sorts before the current local entry,
/// that entry is carried to the next remote item instead of being consumed,
/// so a local post that legitimately matches a later remote item is not
/// lost when the two sequences desynchronize.
pub fn reconcile(
    transcoder: &Transcoder,
    mut items: Vec<RemoteItem>,
    index: &LocalIndex,
) -> Vec<SyncAction> {
    items.reverse();
    items.retain(|item| !item.draft);

    let mut actions = Vec::new();
    let mut locals = index.iter();
    let mut carried: Option<(&u64, &LocalPost)> = None;

    for item in items {
        debug!(id = item.id, "Searching local post for remote item");
        let fresh = transcoder.transcode(PostDocument::from(&item));

        loop {
            let Some((local_id, local_post)) = carried.take().or_else(|| locals.next()) else {
                debug!(id = item.id, "No local posts remain, creating");
                actions.push(SyncAction::Create {
                    id: item.id,
                    document: fresh,
                });
                break;
            };

            if item.id > *local_id {
                // An orphaned older post; leave it on the platform and keep
                // looking for this remote item.
                debug!(local_id, "Skipping outdated local post");
                continue;
            } else if item.id == *local_id {
                if equivalent(&local_post.document, &fresh) {
                    debug!(id = item.id, "Local post is up-to-date");
                    actions.push(SyncAction::UpToDate { id: item.id });
                } else {
                    debug!(id = item.id, "Local post is stale");
                    actions.push(SyncAction::Update {
                        id: item.id,
                        message_id: local_post.message_id,
                        document: fresh,
                    });
                }
                break;
            } else {
                warn!(id = item.id, "Remote post is missing locally, ignoring");
                actions.push(SyncAction::MissingLocal { id: item.id });
                carried = Some((local_id, local_post));
                break;
            }
        }
    }

    actions
}

/// Per-channel outcome counts of one pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelReport {
    pub kind: ChannelKind,
    pub created: usize,
    pub updated: usize,
    pub unchanged: usize,
    pub missing: usize,
}

impl ChannelReport {
    fn new(kind: ChannelKind) -> Self {
        Self {
            kind,
            created: 0,
            updated: 0,
            unchanged: 0,
            missing: 0,
        }
    }
}

/// Outcome of one full synchronisation pass over both channels.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PassReport {
    pub channels: Vec<ChannelReport>,
}

/// Context object for synchronisation: owns the collaborator handles, the
/// transcoder, the compiled identifier pattern and one index per channel.
pub struct Synchroniser<F, P> {
    feed: F,
    platform: P,
    transcoder: Transcoder,
    id_pattern: Regex,
    news_channel_id: u64,
    events_channel_id: u64,
    history_limit: usize,
    news: LocalIndex,
    events: LocalIndex,
}

impl<F, P> Synchroniser<F, P>
where
    F: FeedSource,
    P: ChatPlatform,
{
    pub fn new(config: &Config, feed: F, platform: P) -> Self {
        Self {
            feed,
            platform,
            transcoder: Transcoder::new(config.site_base_url.clone()),
            id_pattern: id_pattern_for(&config.site_base_url),
            news_channel_id: config.news_channel_id,
            events_channel_id: config.events_channel_id,
            history_limit: config.history_limit,
            news: LocalIndex::new(),
            events: LocalIndex::new(),
        }
    }

    fn channel_id(&self, kind: ChannelKind) -> u64 {
        match kind {
            ChannelKind::News => self.news_channel_id,
            ChannelKind::Events => self.events_channel_id,
        }
    }

    /// The channel's index as of the last rebuild or manual mutation.
    pub fn index(&self, kind: ChannelKind) -> &LocalIndex {
        match kind {
            ChannelKind::News => &self.news,
            ChannelKind::Events => &self.events,
        }
    }

    fn index_mut(&mut self, kind: ChannelKind) -> &mut LocalIndex {
        match kind {
            ChannelKind::News => &mut self.news,
            ChannelKind::Events => &mut self.events,
        }
    }

    /// Runs one full pass: news first, then events, same algorithm for
    /// both. Concurrent passes over the same channels must be serialized by
    /// the caller; the indices are rebuilt wholesale each pass.
    pub async fn run_pass(&mut self) -> Result<PassReport, SyncError> {
        info!("Updating news and event channels");

        let mut channels = Vec::new();
        for kind in [ChannelKind::News, ChannelKind::Events] {
            channels.push(self.sync_channel(kind).await?);
        }

        Ok(PassReport { channels })
    }

    async fn sync_channel(&mut self, kind: ChannelKind) -> Result<ChannelReport, SyncError> {
        let channel_id = self.channel_id(kind);

        // Cleanup deletions complete inside build_index; reconciliation
        // must not start before the index is trustworthy.
        let index = build_index(&self.platform, channel_id, &self.id_pattern, self.history_limit)
            .await
            .map_err(SyncError::Platform)?;
        info!(%kind, local_posts = index.len(), "Local index rebuilt");

        let items = match self.feed.fetch_items(kind, 1).await {
            Ok(items) if !items.is_empty() => items,
            Ok(_) => {
                error!(%kind, "Remote feed returned no items, aborting pass");
                return Err(SyncError::FeedUnavailable(kind));
            }
            Err(e) => {
                error!(%kind, error = ?e, "Remote feed fetch failed, aborting pass");
                return Err(SyncError::FeedUnavailable(kind));
            }
        };
        info!(%kind, remote_posts = items.len(), "Fetched remote feed page");

        let actions = reconcile(&self.transcoder, items, &index);
        *self.index_mut(kind) = index;

        let mut report = ChannelReport::new(kind);
        for action in actions {
            match action {
                SyncAction::Create { id, document } => {
                    debug!(%kind, id, "Posting new post");
                    let message = self
                        .platform
                        .send(channel_id, &document)
                        .await
                        .map_err(SyncError::Platform)?;
                    self.index_mut(kind).insert(
                        id,
                        LocalPost {
                            message_id: message.id,
                            document,
                        },
                    );
                    report.created += 1;
                }
                SyncAction::Update {
                    id,
                    message_id,
                    document,
                } => {
                    debug!(%kind, id, "Updating stale local post");
                    self.platform
                        .edit(channel_id, message_id, &document)
                        .await
                        .map_err(SyncError::Platform)?;
                    if let Some(post) = self.index_mut(kind).get_mut(&id) {
                        post.document = document;
                    }
                    report.updated += 1;
                }
                SyncAction::UpToDate { id } => {
                    debug!(%kind, id, "Post is up-to-date");
                    report.unchanged += 1;
                }
                SyncAction::MissingLocal { id } => {
                    debug!(%kind, id, "Post missing locally, not auto-created");
                    report.missing += 1;
                }
            }
        }

        info!(
            %kind,
            created = report.created,
            updated = report.updated,
            unchanged = report.unchanged,
            missing = report.missing,
            "Channel synchronised"
        );
        Ok(report)
    }

    /// Adds or edits a single post directly, bypassing the bulk pass.
    /// Used for push-style updates. Transcodes the document unless the
    /// caller states it already is.
    pub async fn upsert(
        &mut self,
        kind: ChannelKind,
        id: u64,
        document: PostDocument,
        already_transcoded: bool,
    ) -> Result<(), SyncError> {
        let document = if already_transcoded {
            document
        } else {
            self.transcoder.transcode(document)
        };
        let channel_id = self.channel_id(kind);

        match self.index(kind).get(&id).map(|post| post.message_id) {
            Some(message_id) => {
                debug!(%kind, id, message_id, "Editing existing post");
                self.platform
                    .edit(channel_id, message_id, &document)
                    .await
                    .map_err(SyncError::Platform)?;
                if let Some(post) = self.index_mut(kind).get_mut(&id) {
                    post.document = document;
                }
            }
            None => {
                debug!(%kind, id, "Creating new post");
                let message = self
                    .platform
                    .send(channel_id, &document)
                    .await
                    .map_err(SyncError::Platform)?;
                self.index_mut(kind).insert(
                    id,
                    LocalPost {
                        message_id: message.id,
                        document,
                    },
                );
            }
        }
        Ok(())
    }

    /// Deletes a post and its index entry. Requesting an identifier absent
    /// from the index is a caller error and deletes nothing.
    pub async fn delete(&mut self, kind: ChannelKind, id: u64) -> Result<(), SyncError> {
        let channel_id = self.channel_id(kind);
        let Some(post) = self.index_mut(kind).remove(&id) else {
            return Err(SyncError::DeleteNonexistent { kind, id });
        };
        self.platform
            .delete(channel_id, post.message_id)
            .await
            .map_err(SyncError::Platform)?;
        Ok(())
    }
}
