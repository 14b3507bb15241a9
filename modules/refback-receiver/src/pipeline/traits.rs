// Trait abstractions for the deferred pipeline's dependencies.
//
// Fetcher: outbound retrieval of referring pages.
// PostResolver: URL-to-post mapping owned by the hosting site.
// CommentStore: the host's comment persistence.
//
// These enable deterministic testing with MockFetcher, MockPostResolver and
// MockCommentStore: no network, no real site. `cargo test` in seconds.

use async_trait::async_trait;
use thiserror::Error;

use refback_common::{CommentRecord, TargetPost};

// ---------------------------------------------------------------------------
// Fetcher: outbound page retrieval
// ---------------------------------------------------------------------------

/// A retrieved remote document.
#[derive(Debug, Clone)]
pub struct FetchedDocument {
    pub body: String,
    pub content_type: Option<String>,
}

/// Why a fetch produced no document. Coarse on purpose; the pipeline treats
/// every variant as a terminal abort for the signal.
#[derive(Error, Debug, Clone)]
pub enum FetchError {
    #[error("Request timed out")]
    Timeout,

    #[error("Request failed: {0}")]
    Transport(String),

    #[error("Unexpected status {0}")]
    Status(u16),
}

#[async_trait]
pub trait Fetcher: Send + Sync {
    /// Fetch the document at `url`. Implementations own their timeout.
    async fn fetch(&self, url: &str) -> Result<FetchedDocument, FetchError>;
}

// ---------------------------------------------------------------------------
// PostResolver: URL-to-post mapping
// ---------------------------------------------------------------------------

#[async_trait]
pub trait PostResolver: Send + Sync {
    /// The id of the post a URL refers to, if it is one of the host's.
    async fn resolve_post_id(&self, url: &str) -> Option<u64>;

    /// Load the post view the pipeline needs.
    async fn get_post(&self, id: u64) -> Option<TargetPost>;
}

// ---------------------------------------------------------------------------
// CommentStore: comment persistence
// ---------------------------------------------------------------------------

/// Record filter for store queries. `meta_any` pairs are OR-combined;
/// `author_url` is a plain field equality. Both are scoped to one post.
#[derive(Debug, Clone, Default)]
pub struct CommentFilter {
    pub post_id: u64,
    pub meta_any: Vec<(String, String)>,
    pub author_url: Option<String>,
}

impl CommentFilter {
    /// All records for a post.
    pub fn for_post(post_id: u64) -> Self {
        Self {
            post_id,
            ..Default::default()
        }
    }

    /// Records for a post carrying any of the given metadata key/value pairs.
    pub fn meta_any(post_id: u64, pairs: Vec<(String, String)>) -> Self {
        Self {
            post_id,
            meta_any: pairs,
            ..Default::default()
        }
    }

    /// Records for a post whose author-URL field equals `url`.
    pub fn by_author_url(post_id: u64, url: &str) -> Self {
        Self {
            post_id,
            author_url: Some(url.to_string()),
            ..Default::default()
        }
    }
}

/// The host's comment storage.
///
/// `create` must not apply generic duplicate rejection to refback-kind
/// records; the pipeline's own dedupe decides update-vs-create for those.
/// `update_metadata` must replace the key atomically per record.
#[async_trait]
pub trait CommentStore: Send + Sync {
    async fn query(&self, filter: &CommentFilter) -> anyhow::Result<Vec<CommentRecord>>;

    /// Persist a new record and return its assigned id.
    async fn create(&self, record: &CommentRecord) -> anyhow::Result<u64>;

    async fn update_metadata(&self, id: u64, key: &str, value: &str) -> anyhow::Result<()>;

    async fn get(&self, id: u64) -> anyhow::Result<Option<CommentRecord>>;
}
