//! Resumable archival of one conversation's history.
//!
//! The persisted document is the only checkpoint: pagination resumes
//! strictly after the id of the last record already present, so a message
//! that was archived once is never requested again. The caller owns
//! persistence; this module only extends the record list it is handed.

use anyhow::Result;
use futures::future::join_all;
use tracing::info;

use crate::assets::AssetFetcher;
use crate::model::{ArchiveRecord, AssetRef, AuthorSnapshot};
use crate::platform::{HistorySource, SourceMessage};

const PAGE_LIMIT: usize = 100;
const PROGRESS_EVERY: usize = 100;

/// Fetch everything newer than the last element of `records` and return
/// the full ordered list: existing records first (untouched), then new
/// records in fetch order. Pagination failures propagate; attachment
/// failures degrade per attachment.
pub async fn archive_messages<H: HistorySource + ?Sized>(
    history: &H,
    fetcher: &AssetFetcher,
    conversation_id: &str,
    conversation_name: &str,
    mut records: Vec<ArchiveRecord>,
) -> Result<Vec<ArchiveRecord>> {
    let mut after = records.last().map(|r| r.id.clone());
    if let Some(id) = after.as_deref() {
        info!("[{}] resuming after message {}", conversation_name, id);
    }

    let mut fetched = 0usize;
    loop {
        let page = history
            .history_page(conversation_id, after.as_deref(), PAGE_LIMIT)
            .await?;
        if page.is_empty() {
            break;
        }
        let exhausted = page.len() < PAGE_LIMIT;
        after = page.last().map(|m| m.id.clone());

        for message in page {
            let attachments = fetch_attachments(fetcher, &message).await;
            records.push(into_record(message, attachments));
            fetched += 1;
            if fetched % PROGRESS_EVERY == 0 {
                info!("[{}] fetched {} messages so far...", conversation_name, fetched);
            }
        }

        if exhausted {
            break;
        }
    }

    Ok(records)
}

/// All attachments of one message are fetched together; results keep the
/// original attachment order.
async fn fetch_attachments(fetcher: &AssetFetcher, message: &SourceMessage) -> Vec<AssetRef> {
    let downloads = message
        .attachments
        .iter()
        .map(|att| fetcher.fetch(&message.id, &att.filename, &att.url));
    join_all(downloads).await
}

fn into_record(message: SourceMessage, attachments: Vec<AssetRef>) -> ArchiveRecord {
    ArchiveRecord {
        id: message.id,
        kind: message.kind,
        timestamp: message.timestamp,
        timestamp_edited: message.edited_timestamp,
        is_pinned: message.pinned,
        content: message.content,
        author: AuthorSnapshot {
            id: message.author.id,
            name: message.author.name,
            discriminator: message.author.discriminator,
            display_name: message.author.display_name,
            color: "#FFFFFF".to_string(),
            is_bot: message.author.is_bot,
            avatar_url: message.author.avatar_url,
        },
        attachments,
        embeds: message.embeds,
        stickers: message.stickers,
        reactions: message.reactions,
        mentions: message.mentions,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assets::AssetTransport;
    use crate::platform::{SourceAttachment, SourceAuthor};
    use anyhow::anyhow;
    use async_trait::async_trait;
    use chrono::Utc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};

    fn message(id: u64) -> SourceMessage {
        SourceMessage {
            id: id.to_string(),
            kind: "default".to_string(),
            timestamp: Utc::now(),
            edited_timestamp: None,
            pinned: false,
            content: format!("message {}", id),
            author: SourceAuthor {
                id: "1".to_string(),
                name: "alice".to_string(),
                discriminator: "0".to_string(),
                display_name: "Alice".to_string(),
                is_bot: false,
                avatar_url: String::new(),
            },
            attachments: vec![],
            embeds: vec![],
            stickers: vec![],
            reactions: vec![],
            mentions: vec![],
        }
    }

    fn message_with_attachments(id: u64, names: &[&str]) -> SourceMessage {
        let mut msg = message(id);
        msg.attachments = names
            .iter()
            .map(|name| SourceAttachment {
                filename: name.to_string(),
                url: format!("https://cdn.example/{}/{}", id, name),
            })
            .collect();
        msg
    }

    /// In-memory history honoring the after/limit contract, recording
    /// every requested cursor.
    struct FakeHistory {
        messages: Vec<SourceMessage>,
        requested_after: Mutex<Vec<Option<String>>>,
    }

    impl FakeHistory {
        fn new(messages: Vec<SourceMessage>) -> Self {
            Self {
                messages,
                requested_after: Mutex::new(Vec::new()),
            }
        }

        fn cursors(&self) -> Vec<Option<String>> {
            self.requested_after.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl HistorySource for FakeHistory {
        async fn history_page(
            &self,
            _conversation_id: &str,
            after: Option<&str>,
            limit: usize,
        ) -> Result<Vec<SourceMessage>> {
            self.requested_after
                .lock()
                .unwrap()
                .push(after.map(|s| s.to_string()));
            let floor = after.map(|a| a.parse::<u64>().unwrap()).unwrap_or(0);
            Ok(self
                .messages
                .iter()
                .filter(|m| m.id.parse::<u64>().unwrap() > floor)
                .take(limit)
                .cloned()
                .collect())
        }
    }

    struct FailingHistory;

    #[async_trait]
    impl HistorySource for FailingHistory {
        async fn history_page(
            &self,
            _conversation_id: &str,
            _after: Option<&str>,
            _limit: usize,
        ) -> Result<Vec<SourceMessage>> {
            Err(anyhow!("history unavailable"))
        }
    }

    struct NullTransport {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl AssetTransport for NullTransport {
        async fn get(&self, _url: &str) -> Result<Option<Vec<u8>>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(Some(b"body".to_vec()))
        }
    }

    struct RefusingTransport;

    #[async_trait]
    impl AssetTransport for RefusingTransport {
        async fn get(&self, _url: &str) -> Result<Option<Vec<u8>>> {
            Ok(None)
        }
    }

    fn fetcher_in(dir: &std::path::Path) -> AssetFetcher {
        AssetFetcher::new(
            Arc::new(NullTransport {
                calls: AtomicUsize::new(0),
            }),
            dir,
            150,
        )
    }

    #[tokio::test]
    async fn test_full_fetch_from_empty_document() {
        let dir = tempfile::tempdir().unwrap();
        let history = FakeHistory::new(vec![message(100), message(101), message(102)]);
        let records =
            archive_messages(&history, &fetcher_in(dir.path()), "c1", "general", vec![])
                .await
                .unwrap();
        let ids: Vec<_> = records.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, ["100", "101", "102"]);
        assert_eq!(history.cursors()[0], None);
    }

    #[tokio::test]
    async fn test_resume_requests_only_after_last_persisted_id() {
        let dir = tempfile::tempdir().unwrap();
        let history = FakeHistory::new(vec![message(100), message(101), message(102)]);

        let existing = archive_messages(
            &FakeHistory::new(vec![message(100)]),
            &fetcher_in(dir.path()),
            "c1",
            "general",
            vec![],
        )
        .await
        .unwrap();
        let original_first = existing[0].clone();

        let records = archive_messages(&history, &fetcher_in(dir.path()), "c1", "general", existing)
            .await
            .unwrap();

        let ids: Vec<_> = records.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, ["100", "101", "102"]);
        // Record 100 was not re-fetched and is byte-for-byte unchanged.
        assert_eq!(records[0], original_first);
        assert_eq!(history.cursors()[0], Some("100".to_string()));
    }

    #[tokio::test]
    async fn test_result_strictly_increasing() {
        let dir = tempfile::tempdir().unwrap();
        let messages: Vec<_> = (1..=250).map(|i| message(i * 3)).collect();
        let history = FakeHistory::new(messages);
        let records = archive_messages(&history, &fetcher_in(dir.path()), "c1", "general", vec![])
            .await
            .unwrap();
        assert_eq!(records.len(), 250);
        for pair in records.windows(2) {
            assert!(pair[0].id.parse::<u64>().unwrap() < pair[1].id.parse::<u64>().unwrap());
        }
        // 250 messages at 100 per page: three pages, cursors advance.
        assert_eq!(history.cursors().len(), 3);
    }

    #[tokio::test]
    async fn test_attachment_order_preserved() {
        let dir = tempfile::tempdir().unwrap();
        let history = FakeHistory::new(vec![message_with_attachments(7, &["one.png", "two.png", "three.png"])]);
        let records = archive_messages(&history, &fetcher_in(dir.path()), "c1", "general", vec![])
            .await
            .unwrap();
        let refs: Vec<_> = records[0].attachments.iter().map(|a| a.as_str()).collect();
        assert_eq!(
            refs,
            ["assets/7_one.png", "assets/7_two.png", "assets/7_three.png"]
        );
    }

    #[tokio::test]
    async fn test_failing_transport_still_yields_every_record() {
        let dir = tempfile::tempdir().unwrap();
        let history = FakeHistory::new(vec![
            message_with_attachments(1, &["a.png"]),
            message_with_attachments(2, &["b.png"]),
        ]);
        let fetcher = AssetFetcher::new(Arc::new(RefusingTransport), dir.path(), 150);
        let records = archive_messages(&history, &fetcher, "c1", "general", vec![])
            .await
            .unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(
            records[0].attachments[0],
            AssetRef::Remote("https://cdn.example/1/a.png".to_string())
        );
        assert_eq!(
            records[1].attachments[0],
            AssetRef::Remote("https://cdn.example/2/b.png".to_string())
        );
    }

    #[tokio::test]
    async fn test_pagination_failure_propagates() {
        let dir = tempfile::tempdir().unwrap();
        let result =
            archive_messages(&FailingHistory, &fetcher_in(dir.path()), "c1", "general", vec![])
                .await;
        assert!(result.is_err());
    }
}
