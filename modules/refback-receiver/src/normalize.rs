use url::Url;

use refback_common::{RefbackError, Result};

/// Canonicalize a raw URL string into an absolute, comparable form.
///
/// Referer headers arrive in every shape: naked domains, protocol-relative
/// paths, mixed-case hosts. Canonicalizing both sides of a signal up front
/// keeps all later comparisons (same-host checks, dedupe lookups, substring
/// verification) on equal footing.
///
/// Rules, in order:
/// - a bare token with no scheme is reinterpreted as a host, so
///   `example.com` becomes `http://example.com/`
/// - the scheme defaults to `http`, or `https` when `force_ssl` is set;
///   `force_ssl` also overrides an explicit scheme
/// - the path defaults to `/`
/// - anything that does not end up `http` or `https` is invalid
///
/// The result is idempotent: normalizing an already-normalized URL returns
/// it unchanged.
pub fn normalize_url(raw: &str, force_ssl: bool) -> Result<Url> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(RefbackError::InvalidUrl(raw.to_string()));
    }

    let candidate = match trimmed.split_once("://") {
        Some((scheme, rest)) => {
            let scheme = if force_ssl { "https" } else { scheme };
            if scheme != "http" && scheme != "https" {
                return Err(RefbackError::InvalidUrl(raw.to_string()));
            }
            format!("{scheme}://{rest}")
        }
        None => {
            // Naked domain or protocol-relative referer.
            let scheme = if force_ssl { "https" } else { "http" };
            format!("{scheme}://{}", trimmed.trim_start_matches('/'))
        }
    };

    Url::parse(&candidate).map_err(|_| RefbackError::InvalidUrl(raw.to_string()))
}
