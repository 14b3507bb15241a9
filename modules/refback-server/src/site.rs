use async_trait::async_trait;
use url::Url;

use refback_common::{PostFormat, TargetPost};
use refback_receiver::pipeline::PostResolver;

/// A published post the server can render.
#[derive(Debug, Clone)]
pub struct Post {
    pub id: u64,
    pub slug: String,
    pub title: String,
    pub format: PostFormat,
    pub body_html: String,
}

/// The post registry plus the canonical URL scheme for one site. Post pages
/// live at `/posts/{slug}`.
pub struct Site {
    base: Url,
    posts: Vec<Post>,
}

impl Site {
    pub fn new(site_url: &str, posts: Vec<Post>) -> anyhow::Result<Self> {
        let base = Url::parse(site_url)?;
        Ok(Self { base, posts })
    }

    /// Starter content so a fresh install serves something linkable.
    pub fn with_sample_posts(site_url: &str) -> anyhow::Result<Self> {
        Self::new(
            site_url,
            vec![
                Post {
                    id: 1,
                    slug: "hello-world".to_string(),
                    title: "Hello world!".to_string(),
                    format: PostFormat::Standard,
                    body_html: "<p>Welcome. This is the first post.</p>".to_string(),
                },
                Post {
                    id: 2,
                    slug: "lake-superior-ice".to_string(),
                    title: "Lake Superior ice".to_string(),
                    format: PostFormat::Image,
                    body_html: "<p>Shoreline ice stacked by the wind.</p>".to_string(),
                },
            ],
        )
    }

    pub fn posts(&self) -> &[Post] {
        &self.posts
    }

    pub fn post_by_slug(&self, slug: &str) -> Option<&Post> {
        self.posts.iter().find(|p| p.slug == slug)
    }

    pub fn post_by_id(&self, id: u64) -> Option<&Post> {
        self.posts.iter().find(|p| p.id == id)
    }

    /// Canonical URL for a post page.
    pub fn canonical_url(&self, post: &Post) -> String {
        let mut url = self.base.clone();
        url.set_path(&format!("/posts/{}", post.slug));
        url.to_string()
    }
}

#[async_trait]
impl PostResolver for Site {
    /// Match any URL whose host is ours and whose path is a post page.
    /// Scheme and port are ignored, so http/https variants of the same
    /// page resolve identically.
    async fn resolve_post_id(&self, url: &str) -> Option<u64> {
        let parsed = Url::parse(url).ok()?;
        if parsed.host_str() != self.base.host_str() {
            return None;
        }
        let slug = parsed.path().strip_prefix("/posts/")?.trim_end_matches('/');
        self.post_by_slug(slug).map(|p| p.id)
    }

    async fn get_post(&self, id: u64) -> Option<TargetPost> {
        self.post_by_id(id).map(|p| TargetPost {
            id: p.id,
            format: p.format,
        })
    }
}
