// The deferred pipeline: ordered, individually testable stages over a draft
// comment record.
//
// resolve_target: map the target URL to a post, guard cross-post self hits
// find_existing:  dedupe against earlier records (dedup module)
// verify_source:  fetch the source page, confirm the backlink
// enrich:         fill derived author name and content
// persist:        create the record, or bump the canonical one's counter
//
// The first failing stage aborts the signal with its reason; nothing is
// written before `persist`.

use chrono::{DateTime, Utc};

use refback_common::{
    meta, refback_meta, CommentKind, CommentRecord, PostFormat, RefbackError, RefbackSignal,
    Result, TargetPost,
};

use crate::dedup::find_existing;
use crate::pipeline::traits::{CommentStore, Fetcher, PostResolver};
use crate::synthesize::{derive_author_name, derive_content};
use crate::verify::verify_link;

/// A fetched source document that passed link verification.
#[derive(Debug, Clone)]
pub struct VerifiedSource {
    /// Raw body as fetched.
    pub html: String,
    /// Plain-text rendering with markup stripped.
    pub text: String,
    pub content_type: Option<String>,
}

/// The in-progress comment assembled stage by stage before persistence.
#[derive(Debug, Clone)]
pub struct Draft {
    pub post_id: u64,
    pub post_format: PostFormat,
    /// The referring page; doubles as the record's author URL.
    pub source_url: String,
    pub target_url: String,
    /// Set when dedupe found a canonical record; flips persistence from
    /// create to update and skips re-verification.
    pub existing_id: Option<u64>,
    pub approved: bool,
    pub author_name: String,
    pub content: String,
    pub author_ip: String,
    pub user_agent: String,
    pub received_at: DateTime<Utc>,
    pub source: Option<VerifiedSource>,
}

impl Draft {
    /// Base draft for a signal: author URL is the source, email empty,
    /// unapproved, refback kind. Name and content stay empty until
    /// enrichment.
    fn from_signal(signal: &RefbackSignal, post: &TargetPost) -> Self {
        Self {
            post_id: post.id,
            post_format: post.format,
            source_url: signal.source_url.clone(),
            target_url: signal.target_url.clone(),
            existing_id: None,
            approved: false,
            author_name: String::new(),
            content: String::new(),
            author_ip: signal.client_ip.clone(),
            user_agent: signal.user_agent.clone(),
            received_at: signal.received_at,
            source: None,
        }
    }

    fn into_record(self) -> CommentRecord {
        let metadata = refback_meta(&self.source_url, &self.target_url, self.received_at);
        CommentRecord {
            id: None,
            post_id: self.post_id,
            author_name: self.author_name,
            author_url: self.source_url,
            author_email: String::new(),
            author_ip: self.author_ip,
            user_agent: self.user_agent,
            content: self.content,
            approved: self.approved,
            kind: CommentKind::Refback,
            created_at: self.received_at,
            metadata,
        }
    }
}

/// Terminal outcome of a successfully processed signal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RefbackOutcome {
    Created {
        comment_id: u64,
        post_id: u64,
    },
    Updated {
        comment_id: u64,
        post_id: u64,
        visit_count: u64,
    },
}

/// Run the deferred pipeline for one captured signal.
pub async fn process_signal(
    fetcher: &dyn Fetcher,
    resolver: &dyn PostResolver,
    store: &dyn CommentStore,
    signal: &RefbackSignal,
) -> Result<RefbackOutcome> {
    let post = resolve_target(resolver, signal).await?;
    let mut draft = Draft::from_signal(signal, &post);

    match find_existing(store, post.id, &draft.source_url).await? {
        Some(CommentRecord {
            id: Some(id),
            approved,
            ..
        }) => {
            draft.existing_id = Some(id);
            draft.approved = approved;
        }
        // An id-less record cannot be updated; treat the signal as fresh.
        _ => {
            draft.source = Some(verify_source(fetcher, signal).await?);
            enrich(&mut draft);
        }
    }

    persist(store, draft).await
}

/// Locate the post the target URL refers to. A source that resolves to the
/// same post is still a self referral even when the host comparison at
/// capture time let it through.
async fn resolve_target(
    resolver: &dyn PostResolver,
    signal: &RefbackSignal,
) -> Result<TargetPost> {
    let Some(post_id) = resolver.resolve_post_id(&signal.target_url).await else {
        return Err(RefbackError::PostNotFound);
    };
    if resolver.resolve_post_id(&signal.source_url).await == Some(post_id) {
        return Err(RefbackError::SelfReferral);
    }
    resolver
        .get_post(post_id)
        .await
        .ok_or(RefbackError::PostNotFound)
}

/// Fetch the source page and confirm it links back to the target.
async fn verify_source(fetcher: &dyn Fetcher, signal: &RefbackSignal) -> Result<VerifiedSource> {
    let doc = fetcher
        .fetch(&signal.source_url)
        .await
        .map_err(|e| RefbackError::FetchFailed(e.to_string()))?;

    if !verify_link(&doc.body, &signal.target_url) {
        return Err(RefbackError::LinkNotVerified);
    }

    let text = html2text::from_read(doc.body.as_bytes(), 80).unwrap_or_default();
    Ok(VerifiedSource {
        html: doc.body,
        text,
        content_type: doc.content_type,
    })
}

/// Fill the derived author name and content on a freshly verified draft,
/// leaving any value already present. Does nothing without a verified
/// source.
fn enrich(draft: &mut Draft) {
    let Some(source) = &draft.source else {
        return;
    };
    if draft.author_name.is_empty() {
        draft.author_name = derive_author_name(&source.html, &draft.source_url);
    }
    if draft.content.is_empty() {
        draft.content = derive_content(draft.post_format, &draft.source_url);
    }
}

/// Create a fresh record, or bump the visit counter on the canonical one.
async fn persist(store: &dyn CommentStore, draft: Draft) -> Result<RefbackOutcome> {
    let post_id = draft.post_id;
    match draft.existing_id {
        Some(comment_id) => {
            let visits = store
                .get(comment_id)
                .await
                .map_err(|e| RefbackError::StoreFailure(e.to_string()))?
                .map(|record| record.visit_count())
                .unwrap_or(0);
            let visit_count = visits + 1;
            store
                .update_metadata(comment_id, meta::VISIT_COUNT, &visit_count.to_string())
                .await
                .map_err(|e| RefbackError::StoreFailure(e.to_string()))?;
            Ok(RefbackOutcome::Updated {
                comment_id,
                post_id,
                visit_count,
            })
        }
        None => {
            let record = draft.into_record();
            let comment_id = store
                .create(&record)
                .await
                .map_err(|e| RefbackError::StoreFailure(e.to_string()))?;
            Ok(RefbackOutcome::Created {
                comment_id,
                post_id,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn signal() -> RefbackSignal {
        RefbackSignal {
            source_url: "http://blog.example/entry".to_string(),
            target_url: "http://site.test/posts/hello".to_string(),
            received_at: Utc::now(),
            client_ip: "203.0.113.7".to_string(),
            user_agent: "test/1.0".to_string(),
        }
    }

    fn post() -> TargetPost {
        TargetPost {
            id: 5,
            format: PostFormat::Standard,
        }
    }

    #[test]
    fn fresh_draft_maps_to_an_unapproved_refback_record() {
        let signal = signal();
        let mut draft = Draft::from_signal(&signal, &post());
        draft.author_name = "Blog".to_string();
        draft.content = "body".to_string();

        let record = draft.into_record();
        assert_eq!(record.id, None);
        assert_eq!(record.post_id, 5);
        assert_eq!(record.author_url, "http://blog.example/entry");
        assert_eq!(record.author_email, "");
        assert!(!record.approved);
        assert_eq!(record.kind, CommentKind::Refback);
        assert_eq!(record.meta_value(meta::PROTOCOL), Some("refback"));
        assert_eq!(
            record.meta_value(meta::SOURCE_URL),
            Some("http://blog.example/entry")
        );
        assert_eq!(
            record.meta_value(meta::TARGET_URL),
            Some("http://site.test/posts/hello")
        );
    }

    #[test]
    fn enrich_fills_only_empty_fields() {
        let signal = signal();
        let mut draft = Draft::from_signal(&signal, &post());
        draft.source = Some(VerifiedSource {
            html: "<html><head><title>Seen Elsewhere</title></head></html>".to_string(),
            text: "Seen Elsewhere".to_string(),
            content_type: None,
        });
        draft.content = "kept as-is".to_string();

        enrich(&mut draft);
        assert_eq!(draft.author_name, "Seen Elsewhere");
        assert_eq!(draft.content, "kept as-is");
    }

    #[test]
    fn enrich_without_a_source_is_a_no_op() {
        let signal = signal();
        let mut draft = Draft::from_signal(&signal, &post());
        enrich(&mut draft);
        assert_eq!(draft.author_name, "");
        assert_eq!(draft.content, "");
    }
}
