//! Channel-level reconciliation: merge freshly fetched history into the
//! persisted documents and write them back.
//!
//! The two merge strategies are deliberately different: message lists
//! merge by extension (append-only, handled inside the archiver), thread
//! entries merge by id-keyed replacement — each thread's own message list
//! carries its own resume state, so replacing the whole entry is safe.

use anyhow::Result;
use tracing::info;

use crate::archiver::archive_messages;
use crate::assets::AssetFetcher;
use crate::model::ThreadDocument;
use crate::platform::{ChannelInfo, Platform};
use crate::store::ArchiveStore;

#[derive(Debug, Clone, Copy, Default)]
pub struct ChannelOutcome {
    pub new_messages: usize,
    pub threads: usize,
}

/// Archive one channel and all of its threads (active and archived), then
/// persist the channel document. Thread documents are persisted as each
/// thread completes, so an abort mid-channel keeps every finished thread.
pub async fn reconcile_channel(
    platform: &dyn Platform,
    fetcher: &AssetFetcher,
    store: &ArchiveStore,
    server_id: &str,
    channel: &ChannelInfo,
    index: usize,
    total: usize,
) -> Result<ChannelOutcome> {
    info!("[{}/{}] archiving channel: {}", index, total, channel.name);

    let mut doc = store.load_channel(&channel.name)?;
    let already_archived = doc.messages.len();
    doc.messages = archive_messages(
        platform,
        fetcher,
        &channel.id,
        &channel.name,
        doc.messages,
    )
    .await?;
    let new_messages = doc.messages.len() - already_archived;

    let threads = platform.channel_threads(server_id, &channel.id).await?;
    for thread in &threads {
        let mut thread_doc = store
            .load_thread(&thread.name)?
            .unwrap_or_else(|| ThreadDocument::new(&thread.id, &thread.name));
        thread_doc.messages = archive_messages(
            platform,
            fetcher,
            &thread.id,
            &thread.name,
            thread_doc.messages,
        )
        .await?;
        store.save_thread(&thread_doc)?;

        // Full replace, not a field merge: drop any stale entry for this
        // thread id, append the fresh document.
        doc.threads.retain(|t| t.id != thread_doc.id);
        doc.threads.push(thread_doc);
    }

    store.save_channel(&channel.name, &doc)?;

    info!(
        "[{}/{}] completed channel: {} ({} new messages, {} threads)",
        index,
        total,
        channel.name,
        new_messages,
        doc.threads.len()
    );

    Ok(ChannelOutcome {
        new_messages,
        threads: doc.threads.len(),
    })
}
