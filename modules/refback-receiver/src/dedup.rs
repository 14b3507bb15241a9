use refback_common::{meta, CommentRecord, RefbackError, Result};

use crate::pipeline::traits::{CommentFilter, CommentStore};

/// Find the canonical existing record for a (post, source URL) pair.
///
/// Two lookups in strict priority order:
/// 1. a metadata match on `source_url`, the legacy `webmention_source_url`,
///    or `_crossposting_link`
/// 2. a fallback on the author-URL field, for records written before
///    metadata keys were attached
///
/// The first record of the first non-empty result wins. A metadata match is
/// never reconciled against a differing field match; later records for the
/// same pair are simply shadowed.
pub async fn find_existing(
    store: &dyn CommentStore,
    post_id: u64,
    source_url: &str,
) -> Result<Option<CommentRecord>> {
    let by_meta = CommentFilter::meta_any(
        post_id,
        [
            meta::SOURCE_URL,
            meta::WEBMENTION_SOURCE_URL,
            meta::CROSSPOSTING_LINK,
        ]
        .into_iter()
        .map(|key| (key.to_string(), source_url.to_string()))
        .collect(),
    );
    let matches = store
        .query(&by_meta)
        .await
        .map_err(|e| RefbackError::StoreFailure(e.to_string()))?;
    if let Some(existing) = matches.into_iter().next() {
        return Ok(Some(existing));
    }

    let by_author = CommentFilter::by_author_url(post_id, source_url);
    let matches = store
        .query(&by_author)
        .await
        .map_err(|e| RefbackError::StoreFailure(e.to_string()))?;
    Ok(matches.into_iter().next())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{refback_record, MockCommentStore};

    const SOURCE: &str = "http://blog.example/entry";
    const TARGET: &str = "http://site.test/posts/hello";

    #[tokio::test]
    async fn matches_on_source_url_metadata() {
        let store = MockCommentStore::new();
        let id = store.seed(refback_record(7, SOURCE, TARGET));

        let found = find_existing(&store, 7, SOURCE).await.unwrap();
        assert_eq!(found.unwrap().id, Some(id));
    }

    #[tokio::test]
    async fn matches_on_legacy_webmention_metadata() {
        let store = MockCommentStore::new();
        let mut record = refback_record(7, "http://other.example/", TARGET);
        record.author_url = "http://other.example/".to_string();
        record.metadata.insert(
            meta::WEBMENTION_SOURCE_URL.to_string(),
            SOURCE.to_string(),
        );
        let id = store.seed(record);

        let found = find_existing(&store, 7, SOURCE).await.unwrap();
        assert_eq!(found.unwrap().id, Some(id));
    }

    #[tokio::test]
    async fn falls_back_to_the_author_url_field() {
        let store = MockCommentStore::new();
        let mut record = refback_record(7, SOURCE, TARGET);
        record.metadata.clear();
        let id = store.seed(record);

        let found = find_existing(&store, 7, SOURCE).await.unwrap();
        assert_eq!(found.unwrap().id, Some(id));
    }

    #[tokio::test]
    async fn metadata_match_shadows_a_field_match() {
        let store = MockCommentStore::new();

        // Field-only record seeded first; the metadata record still wins.
        let mut field_only = refback_record(7, SOURCE, TARGET);
        field_only.metadata.clear();
        store.seed(field_only);
        let meta_id = store.seed(refback_record(7, SOURCE, TARGET));

        let found = find_existing(&store, 7, SOURCE).await.unwrap();
        assert_eq!(found.unwrap().id, Some(meta_id));
    }

    #[tokio::test]
    async fn other_posts_never_match() {
        let store = MockCommentStore::new();
        store.seed(refback_record(8, SOURCE, TARGET));

        let found = find_existing(&store, 7, SOURCE).await.unwrap();
        assert!(found.is_none());
    }
}
