/// Scheme and `www.` prefixes stripped from a target before matching, in
/// match order.
const TARGET_PREFIXES: [&str; 4] = ["http://www.", "http://", "https://www.", "https://"];

/// Reduce a normalized target URL to the bare fragment used for matching:
/// any `#fragment` dropped, trailing slashes dropped, then the first
/// matching scheme/`www.` prefix removed.
pub fn target_fragment(target_url: &str) -> &str {
    let bare = match target_url.split_once('#') {
        Some((before, _)) => before,
        None => target_url,
    };
    let bare = bare.trim_end_matches('/');
    for prefix in TARGET_PREFIXES {
        if let Some(rest) = bare.strip_prefix(prefix) {
            return rest;
        }
    }
    bare
}

/// Whether `body` contains a link back to `target_url`.
///
/// Deliberately a loose substring test rather than an anchor parse: the
/// target's scheme, a leading `www.`, and trailing slashes are all ignored,
/// and a match anywhere in the body counts, markup or not. Catching real
/// links matters more here than rejecting contrived non-link mentions.
pub fn verify_link(body: &str, target_url: &str) -> bool {
    let needle = target_fragment(target_url);
    if needle.is_empty() {
        return false;
    }
    decode_basic_entities(body).contains(needle)
}

/// Decode the named entities HTML templating escapes into, so a target URL
/// still matches after being embedded in an escaped attribute. `&amp;` goes
/// last to avoid double-decoding.
fn decode_basic_entities(body: &str) -> String {
    body.replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#039;", "'")
        .replace("&#39;", "'")
        .replace("&amp;", "&")
}
