//! Resumable, incremental archival of messaging-server history.
//!
//! The engine walks a server's text channels and threads, appends any
//! messages newer than the last persisted record, downloads attachments
//! into a local asset directory, and writes one JSON document per
//! conversation. Interrupted runs resume from whatever was last written.

pub mod archiver;
pub mod assets;
pub mod config;
pub mod discord;
pub mod model;
pub mod platform;
pub mod reconcile;
pub mod run;
pub mod sanitize;
pub mod store;

pub use archiver::archive_messages;
pub use assets::{AssetFetcher, AssetTransport, HttpTransport};
pub use config::{ArchiveConfig, DEFAULT_CONFIG_FILE};
pub use discord::DiscordClient;
pub use model::{ArchiveRecord, AssetRef, AuthorSnapshot, ChannelDocument, ThreadDocument};
pub use platform::{
    ChannelInfo, HistorySource, Platform, ServerInfo, SourceAttachment, SourceAuthor,
    SourceMessage, ThreadInfo,
};
pub use reconcile::{reconcile_channel, ChannelOutcome};
pub use run::{run_archive, RunSummary};
pub use sanitize::sanitize_filename;
pub use store::ArchiveStore;
