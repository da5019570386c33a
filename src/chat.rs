//! REST implementation of [`ChatPlatform`] against a Discord-style message
//! API: `GET/POST /channels/{id}/messages`, `PATCH`/`DELETE`
//! `/channels/{id}/messages/{mid}`, structured documents carried as embeds.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, error};

use crate::contract::{
    Author, ChatMessage, ChatPlatform, Footer, Image, PlatformError, PostDocument,
};

pub struct RestChatPlatform {
    client: Client,
    api_base: String,
    token: String,
    timeout: Duration,
}

impl RestChatPlatform {
    pub fn new(api_base: impl Into<String>, token: impl Into<String>) -> Self {
        let mut api_base = api_base.into();
        while api_base.ends_with('/') {
            api_base.pop();
        }
        Self {
            client: Client::new(),
            api_base,
            token: token.into(),
            timeout: Duration::from_secs(10),
        }
    }

    pub fn with_timeout(mut self, secs: u64) -> Self {
        self.timeout = Duration::from_secs(secs);
        self
    }

    fn auth_header(&self) -> String {
        format!("Bot {}", self.token)
    }

    async fn check(response: reqwest::Response) -> Result<reqwest::Response, PlatformError> {
        let status = response.status();
        if !status.is_success() {
            let url = response.url().to_string();
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| String::from("<failed to decode response body>"));
            error!(status = %status, url = %url, "Chat API returned error. Response body: {body}");
            return Err(format!("chat API returned {status} for {url}").into());
        }
        Ok(response)
    }
}

/// Message ids are transported as strings (snowflake convention).
#[derive(Debug, Deserialize)]
struct MessageWire {
    id: String,
    #[serde(default)]
    embeds: Vec<EmbedWire>,
}

impl MessageWire {
    fn into_chat_message(self) -> Result<ChatMessage, PlatformError> {
        let id: u64 = self
            .id
            .parse()
            .map_err(|_| format!("non-numeric message id {:?}", self.id))?;
        Ok(ChatMessage {
            id,
            documents: self.embeds.into_iter().map(PostDocument::from).collect(),
        })
    }
}

#[derive(Debug, Serialize)]
struct MessagePayload {
    embeds: Vec<EmbedWire>,
}

impl MessagePayload {
    fn for_document(document: &PostDocument) -> Self {
        Self {
            embeds: vec![EmbedWire::from(document)],
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct EmbedWire {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    author: Option<EmbedAuthorWire>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    footer: Option<EmbedFooterWire>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    image: Option<EmbedImageWire>,
}

#[derive(Debug, Serialize, Deserialize)]
struct EmbedAuthorWire {
    name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    icon_url: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
struct EmbedFooterWire {
    text: String,
}

#[derive(Debug, Serialize, Deserialize)]
struct EmbedImageWire {
    url: String,
}

impl From<&PostDocument> for EmbedWire {
    fn from(document: &PostDocument) -> Self {
        EmbedWire {
            title: Some(document.title.clone()),
            description: document.description.clone(),
            url: Some(document.url.clone()),
            author: document.author.as_ref().map(|author| EmbedAuthorWire {
                name: author.name.clone(),
                url: Some(author.url.clone()),
                icon_url: Some(author.icon_url.clone()),
            }),
            footer: document.footer.as_ref().map(|footer| EmbedFooterWire {
                text: footer.text.clone(),
            }),
            image: document.image.as_ref().map(|image| EmbedImageWire {
                url: image.url.clone(),
            }),
        }
    }
}

impl From<EmbedWire> for PostDocument {
    fn from(wire: EmbedWire) -> Self {
        PostDocument {
            title: wire.title.unwrap_or_default(),
            // Absent stays absent: the platform round-trips empty bodies
            // this way and the equivalence check accounts for it.
            description: wire.description,
            url: wire.url.unwrap_or_default(),
            author: wire.author.map(|author| Author {
                name: author.name,
                url: author.url.unwrap_or_default(),
                icon_url: author.icon_url.unwrap_or_default(),
            }),
            footer: wire.footer.map(|footer| Footer { text: footer.text }),
            image: wire.image.map(|image| Image { url: image.url }),
        }
    }
}

#[async_trait]
impl ChatPlatform for RestChatPlatform {
    async fn history(
        &self,
        channel_id: u64,
        limit: usize,
    ) -> Result<Vec<ChatMessage>, PlatformError> {
        let url = format!(
            "{}/channels/{}/messages?limit={}",
            self.api_base, channel_id, limit
        );
        let response = self
            .client
            .get(&url)
            .header("Authorization", self.auth_header())
            .timeout(self.timeout)
            .send()
            .await?;
        let messages: Vec<MessageWire> = Self::check(response).await?.json().await?;
        messages
            .into_iter()
            .map(MessageWire::into_chat_message)
            .collect()
    }

    async fn send(
        &self,
        channel_id: u64,
        document: &PostDocument,
    ) -> Result<ChatMessage, PlatformError> {
        let url = format!("{}/channels/{}/messages", self.api_base, channel_id);
        let payload = MessagePayload::for_document(document);
        if let Ok(json) = serde_json::to_string(&payload) {
            debug!(json = %json, url = %url, "Sending message payload");
        }
        let response = self
            .client
            .post(&url)
            .header("Authorization", self.auth_header())
            .timeout(self.timeout)
            .json(&payload)
            .send()
            .await?;
        let message: MessageWire = Self::check(response).await?.json().await?;
        message.into_chat_message()
    }

    async fn edit(
        &self,
        channel_id: u64,
        message_id: u64,
        document: &PostDocument,
    ) -> Result<(), PlatformError> {
        let url = format!(
            "{}/channels/{}/messages/{}",
            self.api_base, channel_id, message_id
        );
        let payload = MessagePayload::for_document(document);
        let response = self
            .client
            .patch(&url)
            .header("Authorization", self.auth_header())
            .timeout(self.timeout)
            .json(&payload)
            .send()
            .await?;
        Self::check(response).await?;
        Ok(())
    }

    async fn delete(&self, channel_id: u64, message_id: u64) -> Result<(), PlatformError> {
        let url = format!(
            "{}/channels/{}/messages/{}",
            self.api_base, channel_id, message_id
        );
        let response = self
            .client
            .delete(&url)
            .header("Authorization", self.auth_header())
            .timeout(self.timeout)
            .send()
            .await?;
        Self::check(response).await?;
        Ok(())
    }
}
