//! Filemoon resolver
//!
//! Filemoon moved to an attested SPA API (Byse) but still serves classic
//! packed-JS players for older uploads. Methods are tried in order and the
//! first hit wins:
//!
//! 1. Byse API handshake
//! 2. packed JavaScript on the `/e/{id}` page
//! 3. a bare `.m3u8` URL on the same page

use std::collections::BTreeSet;
use std::sync::Arc;

use async_trait::async_trait;
use regex::Regex;
use tracing::debug;
use url::Url;

use crate::client::{HosterClient, Page, USER_AGENT};
use crate::error::{ResolveError, Result};
use crate::parser::{extract_video_url, find_direct_hls, unpack_all_packed_js};
use crate::resolver::HosterResolver;
use crate::resolver::byse::ByseApi;
use crate::resolver::byse::entropy::{EntropySource, OsEntropy};
use crate::types::ResolvedStream;
use crate::url::{build_embed_url, host_in, normalized_host, origin, parse_url};

pub const FILEMOON_NAME: &str = "filemoon";

/// Filemoon hosts and mirrors. Dot-less entries match under any TLD.
pub const FILEMOON_DOMAINS: [&str; 14] = [
    "filemoon",
    "moonmov.pro",
    "kerapoxy.cc",
    "furher.in",
    "1azayf9w.xyz",
    "81u6xl9d.xyz",
    "smdfs40r.skin",
    "bf0skv.org",
    "z1ekv717.fun",
    "l1afav.net",
    "222i8x.lol",
    "8mhlloqo.fun",
    "96ar.com",
    "byse.sx",
];

/// Page texts meaning the video is gone or hidden behind a signup wall
pub const FILEMOON_OFFLINE_MARKERS: [&str; 3] =
    ["File Not Found", "file was deleted", "fake-signup"];

const VIDEO_ID_PATTERN: &str = r"^/(?:e|d|download)/([0-9A-Za-z]+)";

/// Extracts the video id from `/e/{id}`, `/d/{id}` or `/download/{id}`
pub fn extract_video_id(url: &Url) -> Option<String> {
    let Ok(re) = Regex::new(VIDEO_ID_PATTERN) else {
        return None;
    };
    re.captures(url.path())
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
}

/// Resolver for Filemoon and its mirror domains
#[derive(Debug, Clone)]
pub struct FilemoonResolver {
    client: HosterClient,
    byse: ByseApi,
    domains: BTreeSet<String>,
}

impl FilemoonResolver {
    /// Create a resolver drawing handshake randomness from the OS
    pub fn new(client: HosterClient) -> Self {
        Self::with_entropy(client, Arc::new(OsEntropy))
    }

    /// Create a resolver with an injected randomness source
    pub fn with_entropy(client: HosterClient, entropy: Arc<dyn EntropySource>) -> Self {
        Self {
            byse: ByseApi::new(client.clone(), entropy, USER_AGENT),
            client,
            domains: FILEMOON_DOMAINS.iter().map(|d| d.to_string()).collect(),
        }
    }

    async fn try_resolve(&self, url: &str) -> Result<ResolvedStream> {
        let parsed = parse_url(url)?;
        let host_ok = normalized_host(url)
            .map(|host| host_in(&host, &self.domains))
            .unwrap_or(false);
        if !host_ok {
            return Err(ResolveError::InvalidUrl(format!("{url} is not a Filemoon URL")));
        }
        let video_id = extract_video_id(&parsed)
            .ok_or_else(|| ResolveError::InvalidUrl(format!("no video id in {url}")))?;

        let base = origin(&parsed);
        let embed_url = build_embed_url(&parsed, &video_id);

        match self.byse.resolve(&base, &video_id, &embed_url).await {
            Ok(stream) => {
                debug!(hoster = FILEMOON_NAME, video_id = %video_id, method = "byse", "resolved");
                return Ok(stream);
            }
            Err(e) => {
                debug!(hoster = FILEMOON_NAME, video_id = %video_id, error = %e, "Byse API failed, falling back to embed page");
            }
        }

        let page = self
            .client
            .get(&embed_url, &[("User-Agent", USER_AGENT)])
            .await?
            .ensure_ok()?;

        if let Some(marker) = FILEMOON_OFFLINE_MARKERS
            .iter()
            .find(|marker| page.body.contains(*marker))
        {
            return Err(ResolveError::Offline(marker.to_string()));
        }

        if let Some(stream) = from_packed_js(&page) {
            debug!(hoster = FILEMOON_NAME, video_id = %video_id, method = "packed", "resolved");
            return Ok(stream);
        }

        if let Some(stream) = from_direct_hls(&page) {
            debug!(hoster = FILEMOON_NAME, video_id = %video_id, method = "hls", "resolved");
            return Ok(stream);
        }

        Err(ResolveError::NotFound(format!(
            "no stream on {} after all methods",
            page.url
        )))
    }
}

/// First packed block whose unpacked text names a player source
fn from_packed_js(page: &Page) -> Option<ResolvedStream> {
    let video_url = unpack_all_packed_js(&page.body)
        .iter()
        .find_map(|unpacked| extract_video_url(unpacked))?;
    stream_on_page(page, &video_url)
}

fn from_direct_hls(page: &Page) -> Option<ResolvedStream> {
    let video_url = find_direct_hls(&page.body)?;
    stream_on_page(page, &video_url)
}

fn stream_on_page(page: &Page, video_url: &str) -> Option<ResolvedStream> {
    let absolute = page
        .url
        .join(video_url)
        .map(|u| u.to_string())
        .unwrap_or_else(|_| video_url.to_string());
    ResolvedStream::new(absolute)
        .ok()
        .map(|stream| stream.with_referer(page.url.as_str()))
}

#[async_trait]
impl HosterResolver for FilemoonResolver {
    fn name(&self) -> &str {
        FILEMOON_NAME
    }

    fn supported_domains(&self) -> &BTreeSet<String> {
        &self.domains
    }

    async fn resolve(&self, url: &str) -> Option<ResolvedStream> {
        match self.try_resolve(url).await {
            Ok(stream) => Some(stream),
            Err(e) => {
                e.log(FILEMOON_NAME, url);
                None
            }
        }
    }
}
