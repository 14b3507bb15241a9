use scraper::{Html, Selector};
use url::Url;

use refback_common::PostFormat;

/// Derive a display name for the referring page, in priority order: a meta
/// author tag, an Open Graph title, the page `<title>`, and finally the
/// source host with any leading `www.` stripped.
pub fn derive_author_name(html: &str, source_url: &str) -> String {
    let doc = Html::parse_document(html);

    if let Some(author) = meta_content(&doc, "author") {
        return author;
    }
    if let Some(og_title) = meta_content(&doc, "og:title") {
        return og_title;
    }
    if let Some(title) = title_text(&doc) {
        return title;
    }
    host_without_www(source_url)
}

/// Render the fixed mention body for a verified refback. The post-format
/// label and the bare source host are the only variable parts.
pub fn derive_content(format: PostFormat, source_url: &str) -> String {
    format!(
        r#"This {} was mentioned on <a href="{}">{}</a>"#,
        format.display_label(),
        source_url,
        host_without_www(source_url)
    )
}

/// Host portion of a URL with a single leading `www.` dropped; empty when
/// the URL does not parse.
pub fn host_without_www(url: &str) -> String {
    Url::parse(url)
        .ok()
        .and_then(|u| {
            u.host_str()
                .map(|h| h.strip_prefix("www.").unwrap_or(h).to_string())
        })
        .unwrap_or_default()
}

/// First non-empty `content` of a meta tag with the given `name` or
/// `property` attribute.
fn meta_content(doc: &Html, key: &str) -> Option<String> {
    let selector = Selector::parse(&format!(r#"meta[name="{key}"], meta[property="{key}"]"#)).ok()?;
    doc.select(&selector)
        .filter_map(|el| el.value().attr("content"))
        .map(str::trim)
        .find(|content| !content.is_empty())
        .map(String::from)
}

fn title_text(doc: &Html) -> Option<String> {
    let selector = Selector::parse("title").ok()?;
    let title = doc.select(&selector).next()?.text().collect::<String>();
    let title = title.trim();
    (!title.is_empty()).then(|| title.to_string())
}
