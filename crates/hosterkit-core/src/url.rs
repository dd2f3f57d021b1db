//! URL helper functions for hoster links
//!
//! Host normalization, domain matching and embed URL construction.
//! All functions here are pure.

use std::collections::BTreeSet;

use url::Url;

use crate::error::{ResolveError, Result};

/// Parses an absolute http(s) URL
///
/// # Errors
/// Returns `InvalidUrl` for unparsable input, non-http schemes
/// or URLs without a host
pub fn parse_url(raw: &str) -> Result<Url> {
    let url = Url::parse(raw.trim()).map_err(|e| ResolveError::InvalidUrl(format!("{raw}: {e}")))?;
    if !matches!(url.scheme(), "http" | "https") || url.host_str().is_none() {
        return Err(ResolveError::InvalidUrl(raw.to_string()));
    }
    Ok(url)
}

/// Returns the lowercased host of a URL without a leading `www.`
///
/// # Example
/// ```
/// use hosterkit_core::url::normalized_host;
/// assert_eq!(normalized_host("https://WWW.Katfile.com/abc"), Some("katfile.com".to_string()));
/// assert_eq!(normalized_host("not a url"), None);
/// ```
pub fn normalized_host(raw: &str) -> Option<String> {
    let url = parse_url(raw).ok()?;
    url.host_str().map(strip_www)
}

fn strip_www(host: &str) -> String {
    let host = host.to_ascii_lowercase();
    match host.strip_prefix("www.") {
        Some(rest) => rest.to_string(),
        None => host,
    }
}

/// Host with its last label removed ("katfile.com" → "katfile")
///
/// Returns `None` for single-label hosts.
pub fn host_without_tld(host: &str) -> Option<&str> {
    host.rsplit_once('.').map(|(name, _)| name)
}

/// Checks a normalized host against a domain entry
///
/// Entries containing a dot must equal the host. Dot-less entries name the
/// hoster independent of its TLD, so `katfile` matches `katfile.com` and
/// `katfile.cloud` but not `cdn.katfile.com`.
pub fn host_matches(host: &str, entry: &str) -> bool {
    let entry = entry.to_ascii_lowercase();
    if entry.contains('.') {
        return host == entry;
    }
    host_without_tld(host) == Some(entry.as_str())
}

/// Checks a normalized host against any entry of a domain set
pub fn host_in(host: &str, domains: &BTreeSet<String>) -> bool {
    domains.iter().any(|entry| host_matches(host, entry))
}

/// `scheme://host[:port]` of a URL
pub fn origin(url: &Url) -> String {
    url.origin().ascii_serialization()
}

/// Rewrites a URL to `{scheme}://{host}/e/{file_id}`
///
/// # Example
/// ```
/// use hosterkit_core::url::{build_embed_url, parse_url};
/// let url = parse_url("https://vidhost.to/d/abc123?ref=x").unwrap();
/// assert_eq!(build_embed_url(&url, "abc123"), "https://vidhost.to/e/abc123");
/// ```
pub fn build_embed_url(url: &Url, file_id: &str) -> String {
    format!("{}/e/{}", origin(url), file_id)
}

/// Builds an absolute URL on the same origin
pub fn build_origin_url(url: &Url, path: &str) -> String {
    format!("{}{}", origin(url), path)
}

/// Whether a post-redirect URL looks like a hoster error page
///
/// XFS sites redirect removed files to `/404` or to an `error` path.
pub fn is_error_redirect(final_url: &Url) -> bool {
    let path = final_url.path().to_ascii_lowercase();
    path.contains("/404") || path.contains("error")
}
