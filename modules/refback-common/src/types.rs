use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// --- Metadata keys ---

/// Fixed metadata vocabulary for refback comment records, plus the keys
/// other linkback mechanisms write that dedupe still has to match against.
pub mod meta {
    pub const PROTOCOL: &str = "protocol";
    pub const SOURCE_URL: &str = "source_url";
    pub const TARGET_URL: &str = "target_url";
    pub const MODIFIED: &str = "modified";
    /// Repeat-visit counter bumped instead of creating a duplicate record.
    pub const VISIT_COUNT: &str = "visit_count";

    /// Written by webmention installs that predate source-URL unification.
    pub const WEBMENTION_SOURCE_URL: &str = "webmention_source_url";
    /// Written by crossposting tools that key on a private link field.
    pub const CROSSPOSTING_LINK: &str = "_crossposting_link";
}

// --- Comment kinds ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CommentKind {
    Comment,
    Pingback,
    Trackback,
    Refback,
}

impl CommentKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            CommentKind::Comment => "comment",
            CommentKind::Pingback => "pingback",
            CommentKind::Trackback => "trackback",
            CommentKind::Refback => "refback",
        }
    }

    /// Plural label for type-filter dropdowns and moderation views.
    pub fn label(&self) -> &'static str {
        match self {
            CommentKind::Comment => "Comments",
            CommentKind::Pingback => "Pingbacks",
            CommentKind::Trackback => "Trackbacks",
            CommentKind::Refback => "Refbacks",
        }
    }

    /// Whether listings should render an avatar for this kind. Refbacks
    /// carry a real author URL, so they qualify alongside plain comments.
    pub fn shows_avatar(&self) -> bool {
        matches!(self, CommentKind::Comment | CommentKind::Refback)
    }
}

impl std::fmt::Display for CommentKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// --- Post formats ---

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PostFormat {
    #[default]
    Standard,
    Aside,
    Audio,
    Chat,
    Gallery,
    Image,
    Link,
    Quote,
    Status,
    Video,
}

impl PostFormat {
    /// Label used inside generated comment bodies. An ordinary post reads
    /// as "Article" rather than "Standard".
    pub fn display_label(&self) -> &'static str {
        match self {
            PostFormat::Standard => "Article",
            PostFormat::Aside => "Aside",
            PostFormat::Audio => "Audio",
            PostFormat::Chat => "Chat",
            PostFormat::Gallery => "Gallery",
            PostFormat::Image => "Image",
            PostFormat::Link => "Link",
            PostFormat::Quote => "Quote",
            PostFormat::Status => "Status",
            PostFormat::Video => "Video",
        }
    }
}

/// The minimal view of a post the pipeline needs from its host.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TargetPost {
    pub id: u64,
    pub format: PostFormat,
}

// --- Signals and records ---

/// One captured (source, target) pair. Built at request time, queued to the
/// deferred phase, and discarded after processing; never persisted itself.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RefbackSignal {
    pub source_url: String,
    pub target_url: String,
    pub received_at: DateTime<Utc>,
    /// Captured at request time; the deferred phase has no access to the
    /// original connection.
    pub client_ip: String,
    pub user_agent: String,
}

/// A comment record as the external store holds it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommentRecord {
    /// Assigned by the store; `None` until the record is persisted.
    pub id: Option<u64>,
    pub post_id: u64,
    pub author_name: String,
    pub author_url: String,
    /// Always empty for refbacks; kept for store-schema parity.
    pub author_email: String,
    pub author_ip: String,
    pub user_agent: String,
    pub content: String,
    pub approved: bool,
    pub kind: CommentKind,
    pub created_at: DateTime<Utc>,
    pub metadata: BTreeMap<String, String>,
}

impl CommentRecord {
    /// Current repeat-visit count; 0 when the key is absent or unparsable.
    pub fn visit_count(&self) -> u64 {
        self.metadata
            .get(meta::VISIT_COUNT)
            .and_then(|v| v.parse().ok())
            .unwrap_or(0)
    }

    pub fn meta_value(&self, key: &str) -> Option<&str> {
        self.metadata.get(key).map(String::as_str)
    }
}

/// The metadata block every fresh refback record carries.
pub fn refback_meta(
    source_url: &str,
    target_url: &str,
    received_at: DateTime<Utc>,
) -> BTreeMap<String, String> {
    BTreeMap::from([
        (
            meta::PROTOCOL.to_string(),
            CommentKind::Refback.as_str().to_string(),
        ),
        (meta::SOURCE_URL.to_string(), source_url.to_string()),
        (meta::TARGET_URL.to_string(), target_url.to_string()),
        (
            meta::MODIFIED.to_string(),
            received_at.timestamp().to_string(),
        ),
    ])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn visit_count_defaults_to_zero() {
        let record = CommentRecord {
            id: Some(1),
            post_id: 1,
            author_name: "a.test".to_string(),
            author_url: "http://a.test/".to_string(),
            author_email: String::new(),
            author_ip: "203.0.113.7".to_string(),
            user_agent: String::new(),
            content: String::new(),
            approved: false,
            kind: CommentKind::Refback,
            created_at: Utc::now(),
            metadata: BTreeMap::new(),
        };
        assert_eq!(record.visit_count(), 0);

        let mut counted = record.clone();
        counted
            .metadata
            .insert(meta::VISIT_COUNT.to_string(), "3".to_string());
        assert_eq!(counted.visit_count(), 3);

        let mut garbled = record;
        garbled
            .metadata
            .insert(meta::VISIT_COUNT.to_string(), "lots".to_string());
        assert_eq!(garbled.visit_count(), 0);
    }

    #[test]
    fn refback_meta_carries_the_full_vocabulary() {
        let now = Utc::now();
        let block = refback_meta("http://a.test/", "http://b.test/post/", now);
        assert_eq!(block.get(meta::PROTOCOL).map(String::as_str), Some("refback"));
        assert_eq!(
            block.get(meta::SOURCE_URL).map(String::as_str),
            Some("http://a.test/")
        );
        assert_eq!(
            block.get(meta::TARGET_URL).map(String::as_str),
            Some("http://b.test/post/")
        );
        assert_eq!(
            block.get(meta::MODIFIED).map(String::as_str),
            Some(now.timestamp().to_string().as_str())
        );
    }

    #[test]
    fn only_comments_and_refbacks_show_avatars() {
        assert!(CommentKind::Comment.shows_avatar());
        assert!(CommentKind::Refback.shows_avatar());
        assert!(!CommentKind::Pingback.shows_avatar());
        assert!(!CommentKind::Trackback.shows_avatar());
    }
}
