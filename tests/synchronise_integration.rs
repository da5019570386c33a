use media_sync::config::Config;
use media_sync::contract::{
    ChannelKind, ChatMessage, MockChatPlatform, MockFeedSource, PostDocument, RemoteItem,
};
use media_sync::index::{build_index, id_pattern_for};
use media_sync::synchronise::{SyncError, Synchroniser};
use media_sync::transcode::Transcoder;
use serial_test::serial;

const SITE: &str = "https://media.example.org";
const NEWS_CHANNEL: u64 = 10;
const EVENTS_CHANNEL: u64 = 20;
const HISTORY_LIMIT: usize = 50;

fn config() -> Config {
    Config {
        site_base_url: SITE.to_string(),
        news_channel_id: NEWS_CHANNEL,
        events_channel_id: EVENTS_CHANNEL,
        history_limit: HISTORY_LIMIT,
    }
}

fn item(kind: ChannelKind, id: u64, description: &str) -> RemoteItem {
    RemoteItem {
        id,
        title: format!("Post {id}"),
        description: description.to_string(),
        url: format!("{SITE}/{kind}/{id}"),
        draft: false,
        author: None,
        footer: None,
    }
}

/// A history message whose single document matches what transcoding the
/// given remote item would produce.
fn synced_message(message_id: u64, source: &RemoteItem) -> ChatMessage {
    ChatMessage {
        id: message_id,
        documents: vec![Transcoder::new(SITE).transcode(PostDocument::from(source))],
    }
}

fn stale_message(message_id: u64, source: &RemoteItem) -> ChatMessage {
    let mut message = synced_message(message_id, source);
    message.documents[0].description = Some("out of date".to_string());
    message
}

#[tokio::test]
#[serial]
async fn test_full_pass_creates_updates_and_skips() {
    let news_one = item(ChannelKind::News, 1, "same");
    let news_three = item(ChannelKind::News, 3, "fresh body");
    let event_seven = item(ChannelKind::Events, 7, "event body");

    let mut feed = MockFeedSource::new();
    let news_items = vec![news_three.clone(), item(ChannelKind::News, 2, "b"), news_one.clone()];
    feed.expect_fetch_items()
        .withf(|kind, page| *kind == ChannelKind::News && *page == 1)
        .return_once(move |_, _| Ok(news_items));
    let event_items = vec![event_seven.clone()];
    feed.expect_fetch_items()
        .withf(|kind, page| *kind == ChannelKind::Events && *page == 1)
        .return_once(move |_, _| Ok(event_items));

    let mut platform = MockChatPlatform::new();
    let news_history = vec![
        synced_message(100, &news_one),
        stale_message(300, &news_three),
    ];
    platform
        .expect_history()
        .withf(|channel_id, limit| *channel_id == NEWS_CHANNEL && *limit == HISTORY_LIMIT)
        .return_once(move |_, _| Ok(news_history));
    platform
        .expect_history()
        .withf(|channel_id, limit| *channel_id == EVENTS_CHANNEL && *limit == HISTORY_LIMIT)
        .return_once(|_, _| Ok(vec![]));

    // News post 3 is stale and must be edited in place.
    platform
        .expect_edit()
        .withf(move |channel_id, message_id, document| {
            *channel_id == NEWS_CHANNEL
                && *message_id == 300
                && document.description.as_deref() == Some("fresh body")
        })
        .times(1)
        .returning(|_, _, _| Ok(()));

    // Event post 7 has no local counterpart and must be created.
    platform
        .expect_send()
        .withf(|channel_id, document| {
            *channel_id == EVENTS_CHANNEL
                && document.url == format!("{SITE}/events/7")
        })
        .times(1)
        .returning(|_, _| {
            Ok(ChatMessage {
                id: 700,
                documents: vec![],
            })
        });

    let mut synchroniser = Synchroniser::new(&config(), feed, platform);
    let report = synchroniser
        .run_pass()
        .await
        .expect("Pass should succeed with both channels reachable");

    assert_eq!(report.channels.len(), 2, "Both channels should be reported");
    let news = &report.channels[0];
    assert_eq!(news.kind, ChannelKind::News);
    assert_eq!(
        (news.created, news.updated, news.unchanged, news.missing),
        (0, 1, 1, 1),
        "News pass should update 3, keep 1 and warn about 2"
    );
    let events = &report.channels[1];
    assert_eq!(events.kind, ChannelKind::Events);
    assert_eq!(events.created, 1, "Event 7 should be created");

    // The created post is recorded so push-style updates can find it.
    let recorded = synchroniser
        .index(ChannelKind::Events)
        .get(&7)
        .expect("Created event should be indexed");
    assert_eq!(recorded.message_id, 700);
}

#[tokio::test]
#[serial]
async fn test_index_construction_deletes_unidentifiable_messages() {
    let pattern = id_pattern_for(SITE);
    let valid = item(ChannelKind::News, 4, "body");

    let two_documents = ChatMessage {
        id: 900,
        documents: vec![
            synced_message(0, &valid).documents.remove(0),
            synced_message(0, &valid).documents.remove(0),
        ],
    };
    let unmatched_url = ChatMessage {
        id: 901,
        documents: vec![PostDocument {
            url: format!("{SITE}/about"),
            ..Default::default()
        }],
    };

    let mut platform = MockChatPlatform::new();
    let history = vec![
        two_documents,
        unmatched_url,
        synced_message(400, &valid),
    ];
    platform
        .expect_history()
        .return_once(move |_, _| Ok(history));
    platform
        .expect_delete()
        .withf(|channel_id, message_id| {
            *channel_id == NEWS_CHANNEL && (*message_id == 900 || *message_id == 901)
        })
        .times(2)
        .returning(|_, _| Ok(()));

    let index = build_index(&platform, NEWS_CHANNEL, &pattern, HISTORY_LIMIT)
        .await
        .expect("Index construction should succeed");

    assert_eq!(
        index.keys().collect::<Vec<_>>(),
        vec![&4],
        "Only the identifiable post should be indexed"
    );
    assert_eq!(index[&4].message_id, 400);
}

#[tokio::test]
#[serial]
async fn test_index_duplicate_identifiers_last_seen_wins() {
    let pattern = id_pattern_for(SITE);
    let post = item(ChannelKind::News, 4, "body");

    let mut platform = MockChatPlatform::new();
    let history = vec![synced_message(400, &post), synced_message(401, &post)];
    platform
        .expect_history()
        .return_once(move |_, _| Ok(history));

    let index = build_index(&platform, NEWS_CHANNEL, &pattern, HISTORY_LIMIT)
        .await
        .expect("Index construction should succeed");

    assert_eq!(index.len(), 1);
    assert_eq!(
        index[&4].message_id, 401,
        "Later history entry should replace the earlier one"
    );
}

#[tokio::test]
#[serial]
async fn test_feed_failure_aborts_pass_without_mutations() {
    let mut feed = MockFeedSource::new();
    feed.expect_fetch_items()
        .return_once(|_, _| Err("upstream unreachable".into()));

    let mut platform = MockChatPlatform::new();
    platform.expect_history().return_once(|_, _| Ok(vec![]));
    // No send/edit/delete expectations: any mutation would fail the test.

    let mut synchroniser = Synchroniser::new(&config(), feed, platform);
    let err = synchroniser
        .run_pass()
        .await
        .expect_err("Pass should abort when the feed is unreachable");
    assert!(matches!(err, SyncError::FeedUnavailable(ChannelKind::News)));
}

#[tokio::test]
#[serial]
async fn test_empty_feed_page_counts_as_unavailable() {
    let mut feed = MockFeedSource::new();
    feed.expect_fetch_items().return_once(|_, _| Ok(vec![]));

    let mut platform = MockChatPlatform::new();
    platform.expect_history().return_once(|_, _| Ok(vec![]));

    let mut synchroniser = Synchroniser::new(&config(), feed, platform);
    let err = synchroniser
        .run_pass()
        .await
        .expect_err("An empty feed page should abort the pass");
    assert!(matches!(err, SyncError::FeedUnavailable(ChannelKind::News)));
}

#[tokio::test]
#[serial]
async fn test_destination_failure_aborts_rest_of_pass() {
    let mut feed = MockFeedSource::new();
    let items = vec![
        item(ChannelKind::News, 2, "b"),
        item(ChannelKind::News, 1, "a"),
    ];
    feed.expect_fetch_items().return_once(move |_, _| Ok(items));

    let mut platform = MockChatPlatform::new();
    platform.expect_history().return_once(|_, _| Ok(vec![]));
    let mut sends = 0;
    platform
        .expect_send()
        .times(2)
        .returning(move |_, _| {
            sends += 1;
            if sends == 1 {
                Ok(ChatMessage {
                    id: 100,
                    documents: vec![],
                })
            } else {
                Err("chat API down".into())
            }
        });
    // The events channel is never reached after the abort.

    let mut synchroniser = Synchroniser::new(&config(), feed, platform);
    let err = synchroniser
        .run_pass()
        .await
        .expect_err("Pass should abort on a failed send");
    assert!(matches!(err, SyncError::Platform(_)));

    // The first create was applied and is not rolled back.
    assert_eq!(
        synchroniser.index(ChannelKind::News).get(&1).map(|p| p.message_id),
        Some(100)
    );
}

#[tokio::test]
#[serial]
async fn test_manual_upsert_creates_then_edits() {
    let feed = MockFeedSource::new();
    let mut platform = MockChatPlatform::new();
    platform
        .expect_send()
        .withf(|channel_id, _| *channel_id == NEWS_CHANNEL)
        .times(1)
        .returning(|_, _| {
            Ok(ChatMessage {
                id: 550,
                documents: vec![],
            })
        });
    platform
        .expect_edit()
        .withf(|channel_id, message_id, document| {
            *channel_id == NEWS_CHANNEL
                && *message_id == 550
                && document.description.as_deref() == Some("**__Heading__**")
        })
        .times(1)
        .returning(|_, _, _| Ok(()));

    let mut synchroniser = Synchroniser::new(&config(), feed, platform);

    let document = PostDocument {
        title: "Post 5".to_string(),
        description: Some("body".to_string()),
        url: format!("{SITE}/news/5"),
        ..Default::default()
    };
    synchroniser
        .upsert(ChannelKind::News, 5, document.clone(), true)
        .await
        .expect("First upsert should create");
    assert_eq!(
        synchroniser.index(ChannelKind::News).get(&5).map(|p| p.message_id),
        Some(550)
    );

    // Second upsert for the same id edits in place, transcoding first.
    let mut raw = document;
    raw.description = Some("# Heading".to_string());
    synchroniser
        .upsert(ChannelKind::News, 5, raw, false)
        .await
        .expect("Second upsert should edit");
}

#[tokio::test]
#[serial]
async fn test_manual_delete_removes_post_and_rejects_unknown_id() {
    let feed = MockFeedSource::new();
    let mut platform = MockChatPlatform::new();
    platform.expect_send().times(1).returning(|_, _| {
        Ok(ChatMessage {
            id: 660,
            documents: vec![],
        })
    });
    platform
        .expect_delete()
        .withf(|channel_id, message_id| *channel_id == EVENTS_CHANNEL && *message_id == 660)
        .times(1)
        .returning(|_, _| Ok(()));

    let mut synchroniser = Synchroniser::new(&config(), feed, platform);
    let document = PostDocument {
        title: "Event".to_string(),
        description: Some("body".to_string()),
        url: format!("{SITE}/events/6"),
        ..Default::default()
    };
    synchroniser
        .upsert(ChannelKind::Events, 6, document, true)
        .await
        .expect("Upsert should create the event post");

    synchroniser
        .delete(ChannelKind::Events, 6)
        .await
        .expect("Delete of an indexed id should succeed");
    assert!(synchroniser.index(ChannelKind::Events).get(&6).is_none());

    let err = synchroniser
        .delete(ChannelKind::Events, 6)
        .await
        .expect_err("Deleting an absent id should fail");
    assert!(matches!(
        err,
        SyncError::DeleteNonexistent {
            kind: ChannelKind::Events,
            id: 6
        }
    ));
}
