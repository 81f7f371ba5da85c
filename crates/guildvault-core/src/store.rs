//! Persisted conversation documents.
//!
//! One JSON file per channel and per thread under the archive root, named
//! from the sanitized conversation name. Writes are atomic at the document
//! level: full serialize, write to a sibling temp file, rename over the
//! target. A crash never leaves a half-written file visible as valid state.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Serialize;

use crate::model::{ChannelDocument, ThreadDocument};
use crate::sanitize::sanitize_filename;

pub struct ArchiveStore {
    root: PathBuf,
}

impl ArchiveStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn assets_dir(&self) -> PathBuf {
        self.root.join("assets")
    }

    pub fn ensure_dirs(&self) -> Result<()> {
        fs::create_dir_all(self.assets_dir())
            .with_context(|| format!("failed to create archive directory: {}", self.root.display()))?;
        Ok(())
    }

    pub fn document_path(&self, name: &str) -> PathBuf {
        self.root.join(format!("{}.json", sanitize_filename(name)))
    }

    /// Load a channel document, or the empty document if none exists yet.
    pub fn load_channel(&self, name: &str) -> Result<ChannelDocument> {
        let path = self.document_path(name);
        if !path.exists() {
            return Ok(ChannelDocument::default());
        }
        let contents = fs::read_to_string(&path)
            .with_context(|| format!("failed to read document: {}", path.display()))?;
        serde_json::from_str(&contents)
            .with_context(|| format!("failed to parse document: {}", path.display()))
    }

    /// Load a thread document if one was persisted under this name.
    pub fn load_thread(&self, name: &str) -> Result<Option<ThreadDocument>> {
        let path = self.document_path(name);
        if !path.exists() {
            return Ok(None);
        }
        let contents = fs::read_to_string(&path)
            .with_context(|| format!("failed to read document: {}", path.display()))?;
        let doc = serde_json::from_str(&contents)
            .with_context(|| format!("failed to parse document: {}", path.display()))?;
        Ok(Some(doc))
    }

    pub fn save_channel(&self, name: &str, doc: &ChannelDocument) -> Result<()> {
        self.write_atomic(&self.document_path(name), doc)
    }

    pub fn save_thread(&self, doc: &ThreadDocument) -> Result<()> {
        self.write_atomic(&self.document_path(&doc.name), doc)
    }

    fn write_atomic<T: Serialize>(&self, path: &Path, value: &T) -> Result<()> {
        let mut body = serde_json::to_vec_pretty(value)?;
        body.push(b'\n');
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, &body)
            .with_context(|| format!("failed to write document: {}", tmp.display()))?;
        fs::rename(&tmp, path)
            .with_context(|| format!("failed to replace document: {}", path.display()))?;
        Ok(())
    }
}
