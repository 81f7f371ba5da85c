use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde_json::Value;

use guildvault_core::ArchiveConfig;

use crate::ui;

#[derive(Debug, PartialEq, Eq)]
pub enum DocumentKind {
    Channel,
    Thread,
}

#[derive(Debug, PartialEq, Eq)]
pub struct DocumentEntry {
    pub name: String,
    pub kind: DocumentKind,
    pub messages: usize,
    pub threads: usize,
}

#[derive(Debug, Default, PartialEq, Eq)]
pub struct ArchiveReport {
    pub documents: Vec<DocumentEntry>,
    pub assets: usize,
}

impl ArchiveReport {
    fn channels(&self) -> usize {
        self.documents
            .iter()
            .filter(|d| d.kind == DocumentKind::Channel)
            .count()
    }

    fn total_messages(&self) -> usize {
        self.documents.iter().map(|d| d.messages).sum()
    }
}

pub fn run(config_path: &Path, dir: Option<PathBuf>) -> Result<()> {
    let config = ArchiveConfig::load(config_path)?;
    let dir = dir.unwrap_or(config.archive_dir);

    if !dir.exists() {
        ui::error(&format!("no archive at {}", dir.display()));
        return Ok(());
    }

    let report = scan(&dir)?;
    ui::header(&format!("Archive at {}", dir.display()));
    for doc in &report.documents {
        match doc.kind {
            DocumentKind::Channel => ui::info(&format!(
                "#{}: {} messages, {} threads",
                doc.name, doc.messages, doc.threads
            )),
            DocumentKind::Thread => {
                ui::info(&format!("{} (thread): {} messages", doc.name, doc.messages))
            }
        }
    }
    println!();
    ui::success(&format!(
        "{} channels, {} messages total, {} downloaded attachments",
        report.channels(),
        report.total_messages(),
        report.assets
    ));
    Ok(())
}

/// Walk the archive directory and tally its documents. Purely local; never
/// touches the network. Channel documents are told apart from thread
/// documents by shape: only channel documents carry a `threads` array.
pub fn scan(dir: &Path) -> Result<ArchiveReport> {
    let mut report = ArchiveReport::default();

    let mut paths: Vec<PathBuf> = fs::read_dir(dir)
        .with_context(|| format!("failed to read archive directory: {}", dir.display()))?
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .filter(|p| p.extension().and_then(|e| e.to_str()) == Some("json"))
        .collect();
    paths.sort();

    for path in paths {
        let contents = fs::read_to_string(&path)?;
        let doc: Value = match serde_json::from_str(&contents) {
            Ok(doc) => doc,
            // A half-written or foreign file does not invalidate the rest.
            Err(_) => continue,
        };
        let name = path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or_default()
            .to_string();
        let messages = doc
            .get("messages")
            .and_then(Value::as_array)
            .map(Vec::len)
            .unwrap_or(0);
        if let Some(threads) = doc.get("threads").and_then(Value::as_array) {
            report.documents.push(DocumentEntry {
                name,
                kind: DocumentKind::Channel,
                messages,
                threads: threads.len(),
            });
        } else if doc.get("id").is_some() {
            report.documents.push(DocumentEntry {
                name,
                kind: DocumentKind::Thread,
                messages,
                threads: 0,
            });
        }
    }

    let assets_dir = dir.join("assets");
    if assets_dir.exists() {
        report.assets = fs::read_dir(&assets_dir)?
            .filter_map(|e| e.ok())
            .filter(|e| e.path().is_file())
            .count();
    }

    Ok(report)
}
