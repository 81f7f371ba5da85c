//! Interface boundary to the source messaging platform.
//!
//! The archival engine only ever talks to these traits; the production
//! implementation lives in [`crate::discord`], tests supply fakes.

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};

#[derive(Debug, Clone)]
pub struct ServerInfo {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Clone)]
pub struct ChannelInfo {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Clone)]
pub struct ThreadInfo {
    pub id: String,
    pub name: String,
}

/// One message as delivered by the platform, already flattened to the
/// scalar/string representations the archive records. Ordering of the
/// sequence fields is the platform's original ordering.
#[derive(Debug, Clone)]
pub struct SourceMessage {
    pub id: String,
    pub kind: String,
    pub timestamp: DateTime<Utc>,
    pub edited_timestamp: Option<DateTime<Utc>>,
    pub pinned: bool,
    pub content: String,
    pub author: SourceAuthor,
    pub attachments: Vec<SourceAttachment>,
    pub embeds: Vec<String>,
    pub stickers: Vec<String>,
    pub reactions: Vec<String>,
    pub mentions: Vec<String>,
}

#[derive(Debug, Clone, Default)]
pub struct SourceAuthor {
    pub id: String,
    pub name: String,
    pub discriminator: String,
    pub display_name: String,
    pub is_bot: bool,
    pub avatar_url: String,
}

#[derive(Debug, Clone)]
pub struct SourceAttachment {
    pub filename: String,
    pub url: String,
}

/// Paginated history retrieval for one conversation (channel or thread).
#[async_trait]
pub trait HistorySource: Send + Sync {
    /// One page of messages, oldest first, strictly after `after` when
    /// given (from the start of history otherwise). A page shorter than
    /// `limit` means history is exhausted.
    async fn history_page(
        &self,
        conversation_id: &str,
        after: Option<&str>,
        limit: usize,
    ) -> Result<Vec<SourceMessage>>;
}

/// Everything the run orchestrator needs from the platform session.
#[async_trait]
pub trait Platform: HistorySource {
    async fn server(&self, server_id: &str) -> Result<ServerInfo>;

    /// Text channels of the server, in the platform's enumeration order.
    async fn text_channels(&self, server_id: &str) -> Result<Vec<ChannelInfo>>;

    /// Active and archived threads of one channel, unbounded.
    async fn channel_threads(
        &self,
        server_id: &str,
        channel_id: &str,
    ) -> Result<Vec<ThreadInfo>>;
}
