use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};

use guildvault_core::{
    run_archive, ArchiveConfig, ArchiveStore, AssetFetcher, DiscordClient, HttpTransport,
};

use crate::ui;

pub async fn run(
    config_path: &Path,
    server: Option<String>,
    dir: Option<PathBuf>,
) -> Result<()> {
    // Tokens commonly live in a local .env during development.
    dotenvy::dotenv().ok();

    let mut config = ArchiveConfig::load(config_path)?;
    if let Some(server) = server {
        config.server_id = Some(server);
    }
    if let Some(dir) = dir {
        config.archive_dir = dir;
    }

    let server_id = config.server_id.clone().with_context(|| {
        format!(
            "no server id: pass --server or set server_id in {}",
            config_path.display()
        )
    })?;
    let token = config.token().map_err(|e| {
        ui::error(&format!("{:#}", e));
        e
    })?;

    let client = DiscordClient::new(token, &config.api_base_url)?;
    let store = ArchiveStore::new(&config.archive_dir);
    let transport = Arc::new(HttpTransport::new(DiscordClient::asset_client()?));
    let fetcher = AssetFetcher::new(transport, store.assets_dir(), config.max_filename_len);

    ui::header(&format!(
        "Archiving server {} into {}",
        server_id,
        config.archive_dir.display()
    ));

    // Detailed per-channel progress goes to the tracing log; the spinner
    // is the default face of a long run.
    let spinner = ui::spinner("Archiving (set RUST_LOG=info for details)");
    let result = run_archive(&client, &fetcher, &store, &server_id).await;
    spinner.finish_and_clear();

    match result {
        Ok(summary) => {
            ui::success(&format!(
                "Archived {} of {} channels",
                summary.archived, summary.channels
            ));
            ui::info(&format!("{} new messages", summary.new_messages));
            ui::info(&format!("{} threads", summary.threads));
            if summary.failed > 0 {
                ui::error(&format!(
                    "{} channels failed; re-run to retry them",
                    summary.failed
                ));
            }
            Ok(())
        }
        Err(e) => {
            ui::error(&format!("archival failed: {:#}", e));
            Err(e)
        }
    }
}
