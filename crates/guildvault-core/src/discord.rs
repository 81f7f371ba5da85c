//! Discord REST API v10 client.
//!
//! Production implementation of the [`Platform`] and [`HistorySource`]
//! traits. Every API call goes through `call_with_backoff`, which honors
//! 429 Retry-After and retries transient server errors.

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::time::Duration;
use tracing::warn;

use crate::platform::{
    ChannelInfo, HistorySource, Platform, ServerInfo, SourceAttachment, SourceAuthor,
    SourceMessage, ThreadInfo,
};

const HISTORY_PAGE_LIMIT: usize = 100;
const ARCHIVED_THREADS_PAGE_LIMIT: usize = 100;

// Guild channel types that carry a linear text history.
const CHANNEL_TYPE_TEXT: u8 = 0;
const CHANNEL_TYPE_ANNOUNCEMENT: u8 = 5;

pub struct DiscordClient {
    http: reqwest::Client,
    token: String,
    api_base: String,
}

impl DiscordClient {
    pub fn new(token: impl Into<String>, api_base: impl Into<String>) -> Result<Self> {
        let http = reqwest::Client::builder()
            .user_agent("guildvault")
            .timeout(Duration::from_secs(30))
            .build()?;
        Ok(Self {
            http,
            token: token.into(),
            api_base: api_base.into(),
        })
    }

    /// A plain client for attachment bodies (no bot authorization; CDN
    /// URLs are pre-signed).
    pub fn asset_client() -> Result<reqwest::Client> {
        Ok(reqwest::Client::builder()
            .user_agent("guildvault")
            .timeout(Duration::from_secs(60))
            .build()?)
    }

    fn authorization(&self) -> String {
        format!("Bot {}", self.token)
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        url: &str,
        params: &[(&str, String)],
    ) -> Result<T> {
        let response = call_with_backoff("discord", || {
            self.http
                .get(url)
                .header("Authorization", self.authorization())
                .query(params)
        })
        .await?;
        let status = response.status();
        response
            .json()
            .await
            .map_err(|e| anyhow!("failed to decode response from {} (status {}): {}", url, status, e))
    }
}

#[async_trait]
impl HistorySource for DiscordClient {
    async fn history_page(
        &self,
        conversation_id: &str,
        after: Option<&str>,
        limit: usize,
    ) -> Result<Vec<SourceMessage>> {
        let url = format!("{}/channels/{}/messages", self.api_base, conversation_id);
        let params = vec![
            ("limit", limit.min(HISTORY_PAGE_LIMIT).to_string()),
            // An explicit `after` cursor makes the API return ascending
            // order; "0" starts from the beginning of history.
            ("after", after.unwrap_or("0").to_string()),
        ];
        let mut messages: Vec<Message> = self.get_json(&url, &params).await?;
        messages.sort_by_key(|m| m.id.parse::<u64>().unwrap_or(0));
        Ok(messages.into_iter().map(normalize_message).collect())
    }
}

#[async_trait]
impl Platform for DiscordClient {
    async fn server(&self, server_id: &str) -> Result<ServerInfo> {
        let url = format!("{}/guilds/{}", self.api_base, server_id);
        let guild: Guild = self.get_json(&url, &[]).await?;
        Ok(ServerInfo {
            id: guild.id,
            name: guild.name,
        })
    }

    async fn text_channels(&self, server_id: &str) -> Result<Vec<ChannelInfo>> {
        let url = format!("{}/guilds/{}/channels", self.api_base, server_id);
        let channels: Vec<Channel> = self.get_json(&url, &[]).await?;
        Ok(channels
            .into_iter()
            .filter(|c| c.kind == CHANNEL_TYPE_TEXT || c.kind == CHANNEL_TYPE_ANNOUNCEMENT)
            .map(|c| ChannelInfo {
                name: c.name.unwrap_or_else(|| c.id.clone()),
                id: c.id,
            })
            .collect())
    }

    async fn channel_threads(
        &self,
        server_id: &str,
        channel_id: &str,
    ) -> Result<Vec<ThreadInfo>> {
        let mut threads = Vec::new();

        // Currently active threads are listed guild-wide; keep the ones
        // parented to this channel.
        let url = format!("{}/guilds/{}/threads/active", self.api_base, server_id);
        let active: ThreadList = self.get_json(&url, &[]).await?;
        for thread in active.threads {
            if thread.parent_id.as_deref() == Some(channel_id) {
                threads.push(thread_info(thread));
            }
        }

        // Archived threads, paginated backwards by archive timestamp, no
        // depth limit.
        let url = format!(
            "{}/channels/{}/threads/archived/public",
            self.api_base, channel_id
        );
        let mut before: Option<String> = None;
        loop {
            let mut params = vec![("limit", ARCHIVED_THREADS_PAGE_LIMIT.to_string())];
            if let Some(ts) = before.as_ref() {
                params.push(("before", ts.clone()));
            }
            let page: ThreadList = self.get_json(&url, &params).await?;
            before = page
                .threads
                .last()
                .and_then(|t| t.thread_metadata.as_ref())
                .and_then(|m| m.archive_timestamp.clone());
            let has_more = page.has_more.unwrap_or(false);
            threads.extend(page.threads.into_iter().map(thread_info));
            if !has_more || before.is_none() {
                break;
            }
        }

        Ok(threads)
    }
}

/// Retry helper for rate limiting and transient server errors, shared by
/// every API call.
async fn call_with_backoff<F>(what: &str, mut builder_fn: F) -> Result<reqwest::Response>
where
    F: FnMut() -> reqwest::RequestBuilder,
{
    let mut retries = 0;
    let mut delay = Duration::from_secs(1);
    let max_retries = 8;

    loop {
        let response = builder_fn().send().await?;
        let status = response.status();

        if status.is_success() {
            return Ok(response);
        }

        if status.as_u16() == 429 {
            if retries >= max_retries {
                return Err(anyhow!("{}: rate limited after {} retries", what, retries));
            }
            let wait = response
                .headers()
                .get("Retry-After")
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.parse::<f64>().ok())
                .map(Duration::from_secs_f64)
                .unwrap_or(delay);
            warn!("{}: rate limited, waiting {:?}", what, wait);
            tokio::time::sleep(wait).await;
            retries += 1;
            delay = std::cmp::min(delay * 2, Duration::from_secs(60));
            continue;
        }

        if status.is_server_error() && retries < 3 {
            warn!("{}: server error {}, retrying...", what, status);
            tokio::time::sleep(delay).await;
            retries += 1;
            delay *= 2;
            continue;
        }

        let body = response.text().await.unwrap_or_default();
        return Err(anyhow!("{}: HTTP {} - {}", what, status, body));
    }
}

// --- Normalization ---

fn normalize_message(message: Message) -> SourceMessage {
    SourceMessage {
        kind: message_kind(message.kind),
        timestamp: message.timestamp,
        edited_timestamp: message.edited_timestamp,
        pinned: message.pinned,
        content: message.content,
        author: SourceAuthor {
            name: message.author.username.clone(),
            discriminator: message.author.discriminator.clone(),
            display_name: message
                .author
                .global_name
                .clone()
                .unwrap_or_else(|| message.author.username.clone()),
            is_bot: message.author.bot,
            avatar_url: avatar_url(&message.author),
            id: message.author.id,
        },
        attachments: message
            .attachments
            .into_iter()
            .map(|a| SourceAttachment {
                filename: a.filename,
                url: a.url,
            })
            .collect(),
        embeds: message.embeds.iter().map(|e| e.to_string()).collect(),
        stickers: message
            .sticker_items
            .into_iter()
            .map(|s| s.name)
            .collect(),
        reactions: message.reactions.iter().map(|r| emoji_repr(&r.emoji)).collect(),
        mentions: message.mentions.into_iter().map(|u| u.id).collect(),
        id: message.id,
    }
}

/// Human-readable rendering of the numeric message type.
fn message_kind(kind: u8) -> String {
    match kind {
        0 => "default".to_string(),
        4 => "channel_name_change".to_string(),
        6 => "pins_add".to_string(),
        7 => "new_member".to_string(),
        8 => "premium_guild_subscription".to_string(),
        18 => "thread_created".to_string(),
        19 => "reply".to_string(),
        20 => "chat_input_command".to_string(),
        21 => "thread_starter_message".to_string(),
        23 => "context_menu_command".to_string(),
        other => format!("type_{}", other),
    }
}

/// Unicode emoji stay as-is; custom emoji render as `<:name:id>`.
fn emoji_repr(emoji: &Emoji) -> String {
    let name = emoji.name.as_deref().unwrap_or("_");
    match emoji.id.as_deref() {
        Some(id) => format!("<:{}:{}>", name, id),
        None => name.to_string(),
    }
}

fn avatar_url(user: &User) -> String {
    match user.avatar.as_deref() {
        Some(hash) => format!(
            "https://cdn.discordapp.com/avatars/{}/{}.png",
            user.id, hash
        ),
        None => {
            let index = user.id.parse::<u64>().map(|id| (id >> 22) % 6).unwrap_or(0);
            format!("https://cdn.discordapp.com/embed/avatars/{}.png", index)
        }
    }
}

fn thread_info(thread: ThreadChannel) -> ThreadInfo {
    ThreadInfo {
        name: thread.name.unwrap_or_else(|| thread.id.clone()),
        id: thread.id,
    }
}

// --- Wire types ---

#[derive(Debug, Deserialize)]
struct Guild {
    id: String,
    name: String,
}

#[derive(Debug, Deserialize)]
struct Channel {
    id: String,
    #[serde(rename = "type")]
    kind: u8,
    name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ThreadList {
    #[serde(default)]
    threads: Vec<ThreadChannel>,
    has_more: Option<bool>,
}

#[derive(Debug, Deserialize)]
struct ThreadChannel {
    id: String,
    name: Option<String>,
    parent_id: Option<String>,
    thread_metadata: Option<ThreadMetadata>,
}

#[derive(Debug, Deserialize)]
struct ThreadMetadata {
    archive_timestamp: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Message {
    id: String,
    #[serde(rename = "type")]
    kind: u8,
    timestamp: DateTime<Utc>,
    edited_timestamp: Option<DateTime<Utc>>,
    #[serde(default)]
    pinned: bool,
    #[serde(default)]
    content: String,
    author: User,
    #[serde(default)]
    attachments: Vec<Attachment>,
    #[serde(default)]
    embeds: Vec<serde_json::Value>,
    #[serde(default)]
    sticker_items: Vec<StickerItem>,
    #[serde(default)]
    reactions: Vec<Reaction>,
    #[serde(default)]
    mentions: Vec<User>,
}

#[derive(Debug, Deserialize)]
struct User {
    id: String,
    username: String,
    #[serde(default)]
    discriminator: String,
    global_name: Option<String>,
    #[serde(default)]
    bot: bool,
    avatar: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Attachment {
    filename: String,
    url: String,
}

#[derive(Debug, Deserialize)]
struct StickerItem {
    name: String,
}

#[derive(Debug, Deserialize)]
struct Reaction {
    emoji: Emoji,
}

#[derive(Debug, Deserialize)]
struct Emoji {
    id: Option<String>,
    name: Option<String>,
}
