//! Persisted archive document shapes.
//!
//! Field names mirror the JSON layout of existing archives, so documents
//! written by earlier runs keep loading and resume cleanly.

use chrono::{DateTime, Utc};
use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// One archived message. Immutable once written; append-only within a
/// conversation, strictly increasing by numeric `id`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArchiveRecord {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub timestamp: DateTime<Utc>,
    #[serde(rename = "timestampEdited")]
    pub timestamp_edited: Option<DateTime<Utc>>,
    #[serde(rename = "isPinned")]
    pub is_pinned: bool,
    pub content: String,
    pub author: AuthorSnapshot,
    pub attachments: Vec<AssetRef>,
    pub embeds: Vec<String>,
    pub stickers: Vec<String>,
    pub reactions: Vec<String>,
    pub mentions: Vec<String>,
}

/// Author fields denormalized at fetch time, never re-resolved.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuthorSnapshot {
    pub id: String,
    pub name: String,
    pub discriminator: String,
    #[serde(rename = "nickname")]
    pub display_name: String,
    pub color: String,
    #[serde(rename = "isBot")]
    pub is_bot: bool,
    #[serde(rename = "avatarUrl")]
    pub avatar_url: String,
}

/// The recorded value of one attachment: either a relative path into the
/// local asset store or the original remote URL when the download was
/// skipped or failed. Both are valid terminal states, not errors, and both
/// serialize as a bare string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AssetRef {
    Stored(String),
    Remote(String),
}

impl AssetRef {
    pub fn as_str(&self) -> &str {
        match self {
            AssetRef::Stored(path) => path,
            AssetRef::Remote(url) => url,
        }
    }

    /// Classify a recorded string: remote locators carry a URL scheme,
    /// local references are relative paths.
    pub fn from_recorded(value: String) -> Self {
        if value.starts_with("http://") || value.starts_with("https://") {
            AssetRef::Remote(value)
        } else {
            AssetRef::Stored(value)
        }
    }
}

impl Serialize for AssetRef {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for AssetRef {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = String::deserialize(deserializer)?;
        if value.is_empty() {
            return Err(D::Error::custom("empty asset reference"));
        }
        Ok(AssetRef::from_recorded(value))
    }
}

/// Per-channel document: the channel's own history plus the full documents
/// of its threads, keyed by thread id.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChannelDocument {
    #[serde(default)]
    pub messages: Vec<ArchiveRecord>,
    #[serde(default)]
    pub threads: Vec<ThreadDocument>,
}

/// Per-thread document. Persisted standalone and embedded wholesale in the
/// parent channel's `threads` list (replace-by-id on re-merge).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ThreadDocument {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub messages: Vec<ArchiveRecord>,
}

impl ThreadDocument {
    pub fn new(id: &str, name: &str) -> Self {
        Self {
            id: id.to_string(),
            name: name.to_string(),
            messages: Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn sample_record() -> ArchiveRecord {
        ArchiveRecord {
            id: "100".to_string(),
            kind: "default".to_string(),
            timestamp: Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap(),
            timestamp_edited: None,
            is_pinned: false,
            content: "héllo".to_string(),
            author: AuthorSnapshot {
                id: "7".to_string(),
                name: "alice".to_string(),
                discriminator: "0".to_string(),
                display_name: "Alice".to_string(),
                color: "#FFFFFF".to_string(),
                is_bot: false,
                avatar_url: "https://cdn.example/a.png".to_string(),
            },
            attachments: vec![
                AssetRef::Stored("assets/100_cat.png".to_string()),
                AssetRef::Remote("https://cdn.example/dog.png".to_string()),
            ],
            embeds: vec![],
            stickers: vec![],
            reactions: vec!["👍".to_string()],
            mentions: vec!["8".to_string()],
        }
    }

    #[test]
    fn test_record_json_field_names() {
        let json = serde_json::to_value(sample_record()).unwrap();
        assert!(json.get("type").is_some());
        assert!(json.get("isPinned").is_some());
        assert!(json.get("timestampEdited").is_some());
        let author = json.get("author").unwrap();
        assert!(author.get("nickname").is_some());
        assert!(author.get("isBot").is_some());
        assert!(author.get("avatarUrl").is_some());
    }

    #[test]
    fn test_record_round_trip() {
        let record = sample_record();
        let json = serde_json::to_string(&record).unwrap();
        let back: ArchiveRecord = serde_json::from_str(&json).unwrap();
        assert_eq!(back, record);
    }

    #[test]
    fn test_asset_ref_serializes_as_bare_string() {
        let stored = AssetRef::Stored("assets/5_a.png".to_string());
        let remote = AssetRef::Remote("https://cdn.example/a.png".to_string());
        assert_eq!(serde_json::to_string(&stored).unwrap(), "\"assets/5_a.png\"");
        assert_eq!(
            serde_json::to_string(&remote).unwrap(),
            "\"https://cdn.example/a.png\""
        );
    }

    #[test]
    fn test_asset_ref_classified_on_load() {
        let stored: AssetRef = serde_json::from_str("\"assets/5_a.png\"").unwrap();
        assert_eq!(stored, AssetRef::Stored("assets/5_a.png".to_string()));
        let remote: AssetRef = serde_json::from_str("\"https://cdn.example/a.png\"").unwrap();
        assert_eq!(remote, AssetRef::Remote("https://cdn.example/a.png".to_string()));
    }

    #[test]
    fn test_channel_document_tolerates_missing_fields() {
        let doc: ChannelDocument = serde_json::from_str("{}").unwrap();
        assert!(doc.messages.is_empty());
        assert!(doc.threads.is_empty());

        let doc: ChannelDocument = serde_json::from_str(r#"{"messages": []}"#).unwrap();
        assert!(doc.threads.is_empty());
    }

    #[test]
    fn test_non_ascii_survives_round_trip() {
        let record = sample_record();
        let json = serde_json::to_string_pretty(&record).unwrap();
        assert!(json.contains("héllo"));
    }
}
