//! Attachment download with on-disk deduplication.
//!
//! Each unique `(messageId, attachmentName)` pair is downloaded at most
//! once; a file already present at the computed path short-circuits the
//! network entirely, which is what makes re-runs cheap. A failed download
//! degrades to recording the original remote URL instead of aborting the
//! message or channel being archived.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use tracing::warn;

use crate::model::AssetRef;
use crate::sanitize::sanitize_filename;

/// Scoped binary GET. `Ok(None)` means the server answered with a
/// non-success status; transport-level failures surface as `Err`.
#[async_trait]
pub trait AssetTransport: Send + Sync {
    async fn get(&self, url: &str) -> Result<Option<Vec<u8>>>;
}

/// Production transport over reqwest.
pub struct HttpTransport {
    client: reqwest::Client,
}

impl HttpTransport {
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl AssetTransport for HttpTransport {
    async fn get(&self, url: &str) -> Result<Option<Vec<u8>>> {
        let response = self.client.get(url).send().await?;
        if !response.status().is_success() {
            return Ok(None);
        }
        let body = response.bytes().await?;
        Ok(Some(body.to_vec()))
    }
}

pub struct AssetFetcher {
    transport: Arc<dyn AssetTransport>,
    assets_dir: PathBuf,
    max_name_len: usize,
}

impl AssetFetcher {
    pub fn new(transport: Arc<dyn AssetTransport>, assets_dir: impl Into<PathBuf>, max_name_len: usize) -> Self {
        Self {
            transport,
            assets_dir: assets_dir.into(),
            max_name_len,
        }
    }

    /// Ensure the attachment body is present on disk exactly once and
    /// return the reference to record: a relative path on success (or when
    /// the file already exists), the original URL otherwise.
    pub async fn fetch(&self, message_id: &str, filename: &str, url: &str) -> AssetRef {
        let name = local_asset_name(message_id, filename, self.max_name_len);
        let path = self.assets_dir.join(&name);
        if path.exists() {
            return AssetRef::Stored(format!("assets/{}", name));
        }
        match self.transport.get(url).await {
            Ok(Some(body)) => match write_asset(&path, &body) {
                Ok(()) => AssetRef::Stored(format!("assets/{}", name)),
                Err(e) => {
                    warn!("failed to store attachment {}: {:#}", name, e);
                    AssetRef::Remote(url.to_string())
                }
            },
            Ok(None) => {
                warn!("attachment download refused, keeping remote URL: {}", url);
                AssetRef::Remote(url.to_string())
            }
            Err(e) => {
                warn!("attachment download failed, keeping remote URL: {} ({:#})", url, e);
                AssetRef::Remote(url.to_string())
            }
        }
    }
}

/// `{messageId}_{sanitizedName}`, truncated to the filename length limit.
/// Truncation happens after prefixing, so the limit bounds the whole name;
/// distinct long names may collide, which matches the existing archive
/// layout on disk.
fn local_asset_name(message_id: &str, filename: &str, max_len: usize) -> String {
    let composed = format!("{}_{}", message_id, sanitize_filename(filename));
    composed.chars().take(max_len).collect()
}

fn write_asset(path: &Path, body: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    if let Err(e) = fs::write(path, body) {
        // Do not leave a partial body behind: it would satisfy the
        // existence check on the next run.
        let _ = fs::remove_file(path);
        return Err(e.into());
    }
    Ok(())
}
