// Test mocks for the refback pipeline.
//
// Four mocks matching the four trait boundaries:
// - MockFetcher (Fetcher): HashMap-based URL→body, records every call
// - MockPostResolver (PostResolver): registered URL→post mappings
// - MockCommentStore (CommentStore): stateful in-memory records
// - CollectingNotifier (RefbackNotifier): captures emitted events
//
// Plus helpers for constructing signals and seedable records.

use std::collections::HashMap;
use std::sync::Mutex;

use anyhow::{bail, Result};
use async_trait::async_trait;
use chrono::Utc;

use refback_common::{refback_meta, CommentKind, CommentRecord, PostFormat, RefbackSignal, TargetPost};

use crate::events::{RefbackEvent, RefbackNotifier};
use crate::pipeline::traits::{
    CommentFilter, CommentStore, FetchError, FetchedDocument, Fetcher, PostResolver,
};

// ---------------------------------------------------------------------------
// Test constants
// ---------------------------------------------------------------------------

/// Client address used by generated signals.
pub const TEST_CLIENT_IP: &str = "203.0.113.7";

// ---------------------------------------------------------------------------
// MockFetcher
// ---------------------------------------------------------------------------

/// HashMap-based page fetcher. Returns `Err` for unregistered URLs and
/// records every call, so tests can assert a fetch never happened.
pub struct MockFetcher {
    pages: HashMap<String, String>,
    fetched: Mutex<Vec<String>>,
}

impl MockFetcher {
    pub fn new() -> Self {
        Self {
            pages: HashMap::new(),
            fetched: Mutex::new(Vec::new()),
        }
    }

    pub fn on_page(mut self, url: &str, body: &str) -> Self {
        self.pages.insert(url.to_string(), body.to_string());
        self
    }

    /// URLs fetched so far, in call order.
    pub fn fetched(&self) -> Vec<String> {
        self.fetched.lock().unwrap().clone()
    }

    pub fn fetch_count(&self) -> usize {
        self.fetched.lock().unwrap().len()
    }
}

#[async_trait]
impl Fetcher for MockFetcher {
    async fn fetch(&self, url: &str) -> std::result::Result<FetchedDocument, FetchError> {
        self.fetched.lock().unwrap().push(url.to_string());
        match self.pages.get(url) {
            Some(body) => Ok(FetchedDocument {
                body: body.clone(),
                content_type: Some("text/html".to_string()),
            }),
            None => Err(FetchError::Status(404)),
        }
    }
}

// ---------------------------------------------------------------------------
// MockPostResolver
// ---------------------------------------------------------------------------

/// Registered URL→post mappings. Unregistered URLs resolve to nothing.
pub struct MockPostResolver {
    by_url: HashMap<String, u64>,
    posts: HashMap<u64, TargetPost>,
}

impl MockPostResolver {
    pub fn new() -> Self {
        Self {
            by_url: HashMap::new(),
            posts: HashMap::new(),
        }
    }

    pub fn with_post(mut self, id: u64, url: &str, format: PostFormat) -> Self {
        self.by_url.insert(url.to_string(), id);
        self.posts.insert(id, TargetPost { id, format });
        self
    }

    /// Map an extra URL onto an already-registered post.
    pub fn with_alias(mut self, url: &str, id: u64) -> Self {
        self.by_url.insert(url.to_string(), id);
        self
    }
}

#[async_trait]
impl PostResolver for MockPostResolver {
    async fn resolve_post_id(&self, url: &str) -> Option<u64> {
        self.by_url.get(url).copied()
    }

    async fn get_post(&self, id: u64) -> Option<TargetPost> {
        self.posts.get(&id).cloned()
    }
}

// ---------------------------------------------------------------------------
// MockCommentStore
// ---------------------------------------------------------------------------

struct MockCommentStoreInner {
    next_id: u64,
    records: Vec<CommentRecord>,
    fail_on_create: bool,
}

/// Stateful in-memory comment store. Thread-safe via interior Mutex.
/// `seed` pre-populates records, `records` reads everything back.
pub struct MockCommentStore {
    inner: Mutex<MockCommentStoreInner>,
}

impl MockCommentStore {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(MockCommentStoreInner {
                next_id: 1,
                records: Vec::new(),
                fail_on_create: false,
            }),
        }
    }

    /// Make `create` return an error for every call.
    pub fn failing_creates(self) -> Self {
        self.inner.lock().unwrap().fail_on_create = true;
        self
    }

    /// Pre-populate a record, returning its assigned id.
    pub fn seed(&self, mut record: CommentRecord) -> u64 {
        let mut inner = self.inner.lock().unwrap();
        let id = inner.next_id;
        inner.next_id += 1;
        record.id = Some(id);
        inner.records.push(record);
        id
    }

    pub fn records(&self) -> Vec<CommentRecord> {
        self.inner.lock().unwrap().records.clone()
    }

    pub fn record(&self, id: u64) -> Option<CommentRecord> {
        self.inner
            .lock()
            .unwrap()
            .records
            .iter()
            .find(|r| r.id == Some(id))
            .cloned()
    }

    pub fn visit_count_of(&self, id: u64) -> u64 {
        self.record(id).map(|r| r.visit_count()).unwrap_or(0)
    }
}

fn matches_filter(record: &CommentRecord, filter: &CommentFilter) -> bool {
    if record.post_id != filter.post_id {
        return false;
    }
    if let Some(author_url) = &filter.author_url {
        if &record.author_url != author_url {
            return false;
        }
    }
    if !filter.meta_any.is_empty()
        && !filter
            .meta_any
            .iter()
            .any(|(key, value)| record.metadata.get(key.as_str()) == Some(value))
    {
        return false;
    }
    true
}

#[async_trait]
impl CommentStore for MockCommentStore {
    async fn query(&self, filter: &CommentFilter) -> Result<Vec<CommentRecord>> {
        let inner = self.inner.lock().unwrap();
        Ok(inner
            .records
            .iter()
            .filter(|r| matches_filter(r, filter))
            .cloned()
            .collect())
    }

    async fn create(&self, record: &CommentRecord) -> Result<u64> {
        let mut inner = self.inner.lock().unwrap();
        if inner.fail_on_create {
            bail!("MockCommentStore: create failure injected");
        }
        let id = inner.next_id;
        inner.next_id += 1;
        let mut stored = record.clone();
        stored.id = Some(id);
        inner.records.push(stored);
        Ok(id)
    }

    async fn update_metadata(&self, id: u64, key: &str, value: &str) -> Result<()> {
        let mut inner = self.inner.lock().unwrap();
        match inner.records.iter_mut().find(|r| r.id == Some(id)) {
            Some(record) => {
                record.metadata.insert(key.to_string(), value.to_string());
                Ok(())
            }
            None => bail!("MockCommentStore: no record with id {id}"),
        }
    }

    async fn get(&self, id: u64) -> Result<Option<CommentRecord>> {
        Ok(self.record(id))
    }
}

// ---------------------------------------------------------------------------
// CollectingNotifier
// ---------------------------------------------------------------------------

/// Captures every emitted event for assertions.
#[derive(Default)]
pub struct CollectingNotifier {
    events: Mutex<Vec<RefbackEvent>>,
}

impl CollectingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<RefbackEvent> {
        self.events.lock().unwrap().clone()
    }

    /// Reasons of every `SignalRejected` seen, in emission order.
    pub fn rejection_reasons(&self) -> Vec<String> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                RefbackEvent::SignalRejected { reason, .. } => Some(reason),
                _ => None,
            })
            .collect()
    }
}

impl RefbackNotifier for CollectingNotifier {
    fn notify(&self, event: RefbackEvent) {
        self.events.lock().unwrap().push(event);
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// A signal as the request-time phase would queue it.
pub fn signal(source_url: &str, target_url: &str) -> RefbackSignal {
    RefbackSignal {
        source_url: source_url.to_string(),
        target_url: target_url.to_string(),
        received_at: Utc::now(),
        client_ip: TEST_CLIENT_IP.to_string(),
        user_agent: "test-agent/1.0".to_string(),
    }
}

/// A persisted-looking refback record for a (post, source, target) triple,
/// carrying the standard metadata block. Seed it into a store to simulate
/// an earlier visit.
pub fn refback_record(post_id: u64, source_url: &str, target_url: &str) -> CommentRecord {
    CommentRecord {
        id: None,
        post_id,
        author_name: crate::synthesize::host_without_www(source_url),
        author_url: source_url.to_string(),
        author_email: String::new(),
        author_ip: TEST_CLIENT_IP.to_string(),
        user_agent: "earlier-visit/1.0".to_string(),
        content: format!("This Article was mentioned on <a href=\"{source_url}\">earlier</a>"),
        approved: false,
        kind: CommentKind::Refback,
        created_at: Utc::now(),
        metadata: refback_meta(source_url, target_url, Utc::now()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use refback_common::meta;

    #[tokio::test]
    async fn mock_store_filters_by_meta_or_and_author_field() {
        let store = MockCommentStore::new();
        let id = store.seed(refback_record(3, "http://a.test/", "http://b.test/p"));

        let by_meta = CommentFilter::meta_any(
            3,
            vec![
                (meta::CROSSPOSTING_LINK.to_string(), "http://a.test/".to_string()),
                (meta::SOURCE_URL.to_string(), "http://a.test/".to_string()),
            ],
        );
        let found = store.query(&by_meta).await.unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].id, Some(id));

        let by_author = CommentFilter::by_author_url(3, "http://a.test/");
        assert_eq!(store.query(&by_author).await.unwrap().len(), 1);

        let wrong_post = CommentFilter::by_author_url(4, "http://a.test/");
        assert!(store.query(&wrong_post).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn mock_fetcher_records_calls() {
        let fetcher = MockFetcher::new().on_page("http://a.test/", "<html></html>");

        assert!(fetcher.fetch("http://a.test/").await.is_ok());
        assert!(fetcher.fetch("http://missing.test/").await.is_err());
        assert_eq!(fetcher.fetch_count(), 2);
        assert_eq!(
            fetcher.fetched(),
            vec!["http://a.test/".to_string(), "http://missing.test/".to_string()]
        );
    }
}
