//! HTTP implementation of [`FeedSource`] against the website's JSON API.
//!
//! Pages are requested as `{base}/api/v1/{news|events}?page=N` with bearer
//! authentication and arrive newest first. Retry/backoff policy is left to
//! the underlying client and the scheduled retry of the whole pass.

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;
use tracing::{error, info};

use crate::contract::{ChannelKind, FeedSource, PlatformError, RemoteAuthor, RemoteItem};

pub struct HttpFeedSource {
    client: Client,
    base_url: String,
    api_key: String,
    timeout: Duration,
}

impl HttpFeedSource {
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        let mut base_url = base_url.into();
        while base_url.ends_with('/') {
            base_url.pop();
        }
        Self {
            client: Client::new(),
            base_url,
            api_key: api_key.into(),
            timeout: Duration::from_secs(10),
        }
    }

    pub fn with_timeout(mut self, secs: u64) -> Self {
        self.timeout = Duration::from_secs(secs);
        self
    }
}

/// One post as delivered by the feed API.
#[derive(Debug, Deserialize)]
struct FeedItemWire {
    id: u64,
    title: String,
    #[serde(default)]
    description: String,
    url: String,
    #[serde(default)]
    draft: bool,
    #[serde(default)]
    author: Option<FeedAuthorWire>,
    #[serde(default)]
    footer: Option<String>,
}

#[derive(Debug, Deserialize)]
struct FeedAuthorWire {
    name: String,
    #[serde(default)]
    url: String,
    #[serde(default)]
    icon_url: String,
}

impl From<FeedItemWire> for RemoteItem {
    fn from(wire: FeedItemWire) -> Self {
        RemoteItem {
            id: wire.id,
            title: wire.title,
            description: wire.description,
            url: wire.url,
            draft: wire.draft,
            author: wire.author.map(|author| RemoteAuthor {
                name: author.name,
                url: author.url,
                icon_url: author.icon_url,
            }),
            footer: wire.footer,
        }
    }
}

#[async_trait]
impl FeedSource for HttpFeedSource {
    async fn fetch_items(
        &self,
        kind: ChannelKind,
        page: u32,
    ) -> Result<Vec<RemoteItem>, PlatformError> {
        let url = format!(
            "{}/api/v1/{}?page={}",
            self.base_url,
            kind.path_segment(),
            page
        );
        info!(url = %url, "Fetching remote feed page");

        let response = self
            .client
            .get(&url)
            .bearer_auth(&self.api_key)
            .timeout(self.timeout)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| String::from("<failed to decode response body>"));
            error!(status = %status, url = %url, "Feed API returned error. Response body: {body}");
            return Err(format!("feed API returned {status} for {url}").into());
        }

        let items: Vec<FeedItemWire> = response.json().await?;
        Ok(items.into_iter().map(RemoteItem::from).collect())
    }
}
