use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    extract::{ConnectInfo, Path, State},
    http::{header, HeaderMap, StatusCode},
    response::{Html, IntoResponse, Json},
};
use serde_json::json;
use tracing::warn;

use refback_common::meta;
use refback_receiver::pipeline::{CommentFilter, PageView};

use crate::AppState;

pub async fn index(State(state): State<Arc<AppState>>) -> Html<String> {
    let items: String = state
        .site
        .posts()
        .iter()
        .map(|p| format!(r#"<li><a href="/posts/{}">{}</a></li>"#, p.slug, p.title))
        .collect();
    Html(format!(
        "<html><head><title>Posts</title></head><body><h1>Posts</h1><ul>{items}</ul></body></html>"
    ))
}

/// Serve a post page. Every hit is also offered to the refback receiver;
/// capture is O(1) and can never delay or fail the response.
pub async fn post_page(
    State(state): State<Arc<AppState>>,
    Path(slug): Path<String>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
) -> impl IntoResponse {
    let Some(post) = state.site.post_by_slug(&slug) else {
        return (StatusCode::NOT_FOUND, Html("<h1>Not found</h1>".to_string())).into_response();
    };

    let referer = headers
        .get(header::REFERER)
        .and_then(|v| v.to_str().ok())
        .map(String::from);
    let user_agent = headers
        .get(header::USER_AGENT)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string();

    state.receiver.accept(PageView {
        url: state.site.canonical_url(post),
        referer,
        client_ip: addr.ip().to_string(),
        user_agent,
    });

    Html(format!(
        "<html><head><title>{}</title></head><body><article><h1>{}</h1>{}</article></body></html>",
        post.title, post.title, post.body_html
    ))
    .into_response()
}

/// All comments for one post, refbacks included, as a moderation-style
/// JSON view.
pub async fn post_comments(
    State(state): State<Arc<AppState>>,
    Path(slug): Path<String>,
) -> impl IntoResponse {
    let Some(post) = state.site.post_by_slug(&slug) else {
        return (
            StatusCode::NOT_FOUND,
            Json(json!({"error": "unknown post"})),
        )
            .into_response();
    };

    let records = match state.store.query(&CommentFilter::for_post(post.id)).await {
        Ok(records) => records,
        Err(e) => {
            warn!(error = %e, slug, "Comment query failed");
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({"error": "comment store unavailable"})),
            )
                .into_response();
        }
    };

    let comments: Vec<_> = records
        .iter()
        .map(|r| {
            json!({
                "id": r.id,
                "kind": r.kind.as_str(),
                "kind_label": r.kind.label(),
                "shows_avatar": r.kind.shows_avatar(),
                "author_name": r.author_name,
                "author_url": r.author_url,
                "content": r.content,
                "approved": r.approved,
                "visit_count": r.visit_count(),
                "source_url": r.meta_value(meta::SOURCE_URL),
                "created_at": r.created_at,
            })
        })
        .collect();

    Json(json!({ "post_id": post.id, "comments": comments })).into_response()
}
