use async_trait::async_trait;
use tokio::sync::Mutex;

use refback_common::{CommentKind, CommentRecord};
use refback_receiver::pipeline::{CommentFilter, CommentStore};

#[derive(Default)]
struct StoreInner {
    next_id: u64,
    records: Vec<CommentRecord>,
}

/// Comment storage for a single-process host. Every operation takes the
/// store lock, which is what makes the visit-count read-modify-write cycle
/// atomic per record.
pub struct MemoryCommentStore {
    inner: Mutex<StoreInner>,
}

impl MemoryCommentStore {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(StoreInner {
                next_id: 1,
                records: Vec::new(),
            }),
        }
    }
}

impl Default for MemoryCommentStore {
    fn default() -> Self {
        Self::new()
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

/// The blanket duplicate rejection applied to manually written comments:
/// same post, same author name, same text.
fn is_generic_duplicate(records: &[CommentRecord], candidate: &CommentRecord) -> bool {
    records.iter().any(|r| {
        r.post_id == candidate.post_id
            && r.author_name == candidate.author_name
            && r.content == candidate.content
    })
}

#[async_trait]
impl CommentStore for MemoryCommentStore {
    async fn query(&self, filter: &CommentFilter) -> anyhow::Result<Vec<CommentRecord>> {
        let inner = self.inner.lock().await;
        Ok(inner
            .records
            .iter()
            .filter(|r| matches_filter(r, filter))
            .cloned()
            .collect())
    }

    async fn create(&self, record: &CommentRecord) -> anyhow::Result<u64> {
        let mut inner = self.inner.lock().await;

        // Refbacks bypass the blanket check: the pipeline's own dedupe
        // already decided update-vs-create for them.
        if record.kind != CommentKind::Refback && is_generic_duplicate(&inner.records, record) {
            anyhow::bail!("duplicate comment");
        }

        let id = inner.next_id;
        inner.next_id += 1;
        let mut stored = record.clone();
        stored.id = Some(id);
        inner.records.push(stored);
        Ok(id)
    }

    async fn update_metadata(&self, id: u64, key: &str, value: &str) -> anyhow::Result<()> {
        let mut inner = self.inner.lock().await;
        match inner.records.iter_mut().find(|r| r.id == Some(id)) {
            Some(record) => {
                record.metadata.insert(key.to_string(), value.to_string());
                Ok(())
            }
            None => anyhow::bail!("no comment with id {id}"),
        }
    }

    async fn get(&self, id: u64) -> anyhow::Result<Option<CommentRecord>> {
        let inner = self.inner.lock().await;
        Ok(inner.records.iter().find(|r| r.id == Some(id)).cloned())
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use chrono::Utc;

    use refback_receiver::pipeline::{process_signal, RefbackOutcome};
    use refback_receiver::testing::{signal, MockFetcher};

    use crate::site::Site;

    use super::*;

    fn comment(kind: CommentKind) -> CommentRecord {
        CommentRecord {
            id: None,
            post_id: 1,
            author_name: "Taylor".to_string(),
            author_url: "http://a.test/".to_string(),
            author_email: String::new(),
            author_ip: "203.0.113.7".to_string(),
            user_agent: "test/1.0".to_string(),
            content: "same words".to_string(),
            approved: false,
            kind,
            created_at: Utc::now(),
            metadata: BTreeMap::new(),
        }
    }

    #[tokio::test]
    async fn identical_plain_comments_are_rejected() {
        let store = MemoryCommentStore::new();
        store.create(&comment(CommentKind::Comment)).await.unwrap();
        let second = store.create(&comment(CommentKind::Comment)).await;
        assert!(second.is_err());
    }

    #[tokio::test]
    async fn refbacks_bypass_the_blanket_duplicate_check() {
        let store = MemoryCommentStore::new();
        store.create(&comment(CommentKind::Refback)).await.unwrap();
        let second = store.create(&comment(CommentKind::Refback)).await;
        assert!(second.is_ok());
    }

    #[tokio::test]
    async fn update_metadata_replaces_the_key() {
        let store = MemoryCommentStore::new();
        let id = store.create(&comment(CommentKind::Refback)).await.unwrap();

        store.update_metadata(id, "visit_count", "1").await.unwrap();
        store.update_metadata(id, "visit_count", "2").await.unwrap();

        let record = store.get(id).await.unwrap().unwrap();
        assert_eq!(record.visit_count(), 2);

        let missing = store.update_metadata(99, "visit_count", "1").await;
        assert!(missing.is_err());
    }

    #[tokio::test]
    async fn the_full_pipeline_lands_refbacks_in_this_store() {
        let site = Site::with_sample_posts("http://site.test").unwrap();
        let store = MemoryCommentStore::new();
        let source = "http://blog.example/entry";
        let target = "http://site.test/posts/hello-world";
        let fetcher = MockFetcher::new().on_page(
            source,
            &format!(
                r#"<html><head><title>Neighbor</title></head><body><a href="{target}">x</a></body></html>"#
            ),
        );

        let outcome = process_signal(&fetcher, &site, &store, &signal(source, target))
            .await
            .unwrap();
        assert!(matches!(outcome, RefbackOutcome::Created { post_id: 1, .. }));

        let records = store.query(&CommentFilter::for_post(1)).await.unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].author_name, "Neighbor");
        assert_eq!(records[0].kind, CommentKind::Refback);

        // A second hit from the same source updates in place.
        let again = process_signal(&fetcher, &site, &store, &signal(source, target))
            .await
            .unwrap();
        assert!(matches!(again, RefbackOutcome::Updated { visit_count: 1, .. }));
        assert_eq!(store.query(&CommentFilter::for_post(1)).await.unwrap().len(), 1);
    }
}
