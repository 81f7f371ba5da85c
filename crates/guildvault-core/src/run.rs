//! Whole-server archival run.
//!
//! Channels are processed strictly one at a time: sequential ordering
//! bounds API pressure and keeps the progress log readable. One channel
//! failing must not block the archival of the others.

use anyhow::{Context, Result};
use tracing::{info, warn};

use crate::assets::AssetFetcher;
use crate::platform::Platform;
use crate::reconcile::reconcile_channel;
use crate::store::ArchiveStore;

#[derive(Debug, Clone, Copy, Default)]
pub struct RunSummary {
    pub channels: usize,
    pub archived: usize,
    pub failed: usize,
    pub new_messages: usize,
    pub threads: usize,
}

/// Enumerate the server's text channels and reconcile each in turn.
/// A missing/inaccessible server is fatal before any archival work; a
/// failing channel is logged and skipped.
pub async fn run_archive(
    platform: &dyn Platform,
    fetcher: &AssetFetcher,
    store: &ArchiveStore,
    server_id: &str,
) -> Result<RunSummary> {
    let server = platform
        .server(server_id)
        .await
        .with_context(|| format!("server {} not found or not accessible", server_id))?;
    info!("archiving server: {} ({})", server.name, server.id);

    store.ensure_dirs()?;

    let channels = platform.text_channels(server_id).await?;
    let total = channels.len();
    let mut summary = RunSummary {
        channels: total,
        ..Default::default()
    };

    for (idx, channel) in channels.iter().enumerate() {
        match reconcile_channel(platform, fetcher, store, server_id, channel, idx + 1, total).await
        {
            Ok(outcome) => {
                summary.archived += 1;
                summary.new_messages += outcome.new_messages;
                summary.threads += outcome.threads;
            }
            Err(e) => {
                warn!(
                    "[{}/{}] channel {} failed, continuing: {:#}",
                    idx + 1,
                    total,
                    channel.name,
                    e
                );
                summary.failed += 1;
            }
        }
        info!("overall progress: {}/{} channels", idx + 1, total);
    }

    info!(
        "archival complete: {} channels archived, {} new messages, {} threads, {} failed",
        summary.archived, summary.new_messages, summary.threads, summary.failed
    );
    Ok(summary)
}
