//! Run configuration.
//!
//! Loaded once at startup from a TOML file (`guildvault.toml` by default)
//! and immutable for the run. Every field has a sensible default so a
//! missing file is not an error; the server id may instead come from the
//! command line.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Deserialize;

pub const DEFAULT_CONFIG_FILE: &str = "guildvault.toml";

#[derive(Debug, Clone, Deserialize)]
pub struct ArchiveConfig {
    /// Identifier of the server to archive.
    #[serde(default)]
    pub server_id: Option<String>,

    /// Root directory for documents and downloaded assets.
    #[serde(default = "default_archive_dir")]
    pub archive_dir: PathBuf,

    /// Environment variable holding the bot token.
    #[serde(default = "default_token_env")]
    pub token_env: String,

    /// Maximum length of a stored attachment filename.
    #[serde(default = "default_max_filename_len")]
    pub max_filename_len: usize,

    /// REST API base URL.
    #[serde(default = "default_api_base_url")]
    pub api_base_url: String,
}

fn default_archive_dir() -> PathBuf {
    PathBuf::from("archive")
}

fn default_token_env() -> String {
    "DISCORD_TOKEN".to_string()
}

fn default_max_filename_len() -> usize {
    150
}

fn default_api_base_url() -> String {
    "https://discord.com/api/v10".to_string()
}

impl Default for ArchiveConfig {
    fn default() -> Self {
        Self {
            server_id: None,
            archive_dir: default_archive_dir(),
            token_env: default_token_env(),
            max_filename_len: default_max_filename_len(),
            api_base_url: default_api_base_url(),
        }
    }
}

impl ArchiveConfig {
    /// Load configuration from a TOML file, falling back to defaults when
    /// the file does not exist.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file: {}", path.display()))?;
        toml::from_str(&contents)
            .with_context(|| format!("failed to parse config file: {}", path.display()))
    }

    /// Read the bot token from the configured environment variable.
    pub fn token(&self) -> Result<String> {
        let token = std::env::var(&self.token_env)
            .with_context(|| format!("no bot token in ${}", self.token_env))?;
        if token.trim().is_empty() {
            anyhow::bail!("bot token in ${} is empty", self.token_env);
        }
        Ok(token)
    }
}
