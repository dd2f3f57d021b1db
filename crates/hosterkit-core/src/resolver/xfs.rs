//! Generic resolver for XFileSharingPro clone hosters
//!
//! XFS sites share one backend, so a single resolver covers all of them.
//! What differs per site (domains, file-id shape, "file deleted" wording,
//! whether it streams or serves downloads) lives in [`XfsConfig`].

use std::collections::BTreeSet;
use std::sync::Arc;

use async_trait::async_trait;
use regex::Regex;
use scraper::{Html, Selector};
use serde::{Deserialize, Serialize};
use tracing::debug;
use url::Url;

use crate::client::{HosterClient, Page};
use crate::error::{ResolveError, Result};
use crate::parser::extract_video_url;
use crate::resolver::HosterResolver;
use crate::types::ResolvedStream;
use crate::url::{
    build_embed_url, build_origin_url, host_in, is_error_redirect, normalized_host, parse_url,
};

/// File-id shape shared by most XFS installs: a 12-char code, optionally
/// behind `/e/`, `/d/`, `/f/` or `embed-`
pub const DEFAULT_FILE_ID_PATTERN: &str =
    r"^/(?:(?:e|d|f|v|file|embed)/|embed-)?([0-9A-Za-z]{8,16})(?:[/.\-]|$)";

/// Wording XFS templates use for removed files
pub const DEFAULT_OFFLINE_MARKERS: [&str; 6] = [
    "File Not Found",
    "file was deleted",
    "file was removed",
    "File is no longer available",
    "The file you were looking for could not be found",
    "Video not found",
];

/// Serializable hoster definition, as stored in the hoster table
///
/// Missing `file_id_pattern` / `offline_markers` fall back to
/// [`DEFAULT_FILE_ID_PATTERN`] / [`DEFAULT_OFFLINE_MARKERS`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct XfsConfigDef {
    pub name: String,
    pub domains: Vec<String>,
    #[serde(default)]
    pub extra_domains: Vec<String>,
    #[serde(default)]
    pub file_id_pattern: Option<String>,
    #[serde(default)]
    pub offline_markers: Option<Vec<String>>,
    #[serde(default)]
    pub is_video_hoster: bool,
    #[serde(default)]
    pub needs_captcha: bool,
}

/// Immutable per-hoster configuration
#[derive(Debug, Clone)]
pub struct XfsConfig {
    name: String,
    domains: BTreeSet<String>,
    extra_domains: BTreeSet<String>,
    all_domains: BTreeSet<String>,
    file_id_pattern: Regex,
    offline_markers: Vec<String>,
    is_video_hoster: bool,
    needs_captcha: bool,
}

impl TryFrom<XfsConfigDef> for XfsConfig {
    type Error = ResolveError;

    fn try_from(def: XfsConfigDef) -> Result<Self> {
        if def.name.trim().is_empty() {
            return Err(ResolveError::Config("hoster name is empty".to_string()));
        }
        let domains = normalize_domains(&def.domains);
        if domains.is_empty() {
            return Err(ResolveError::Config(format!("{}: no domains", def.name)));
        }
        let extra_domains = normalize_domains(&def.extra_domains);

        let pattern = def
            .file_id_pattern
            .as_deref()
            .unwrap_or(DEFAULT_FILE_ID_PATTERN);
        let file_id_pattern = Regex::new(pattern)
            .map_err(|e| ResolveError::Config(format!("{}: bad file_id_pattern: {e}", def.name)))?;
        if file_id_pattern.captures_len() < 2 {
            return Err(ResolveError::Config(format!(
                "{}: file_id_pattern has no capture group",
                def.name
            )));
        }

        let offline_markers = def.offline_markers.unwrap_or_else(|| {
            DEFAULT_OFFLINE_MARKERS
                .iter()
                .map(|m| m.to_string())
                .collect()
        });

        Ok(Self {
            name: def.name,
            all_domains: domains.union(&extra_domains).cloned().collect(),
            domains,
            extra_domains,
            file_id_pattern,
            offline_markers,
            is_video_hoster: def.is_video_hoster,
            needs_captcha: def.needs_captcha,
        })
    }
}

fn normalize_domains(entries: &[String]) -> BTreeSet<String> {
    entries
        .iter()
        .map(|d| d.trim().to_ascii_lowercase())
        .map(|d| d.strip_prefix("www.").map(str::to_string).unwrap_or(d))
        .filter(|d| !d.is_empty())
        .collect()
}

impl XfsConfig {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Primary domains
    pub fn domains(&self) -> &BTreeSet<String> {
        &self.domains
    }

    /// Known aliases and rebrands
    pub fn extra_domains(&self) -> &BTreeSet<String> {
        &self.extra_domains
    }

    /// `domains ∪ extra_domains`
    pub fn all_domains(&self) -> &BTreeSet<String> {
        &self.all_domains
    }

    pub fn file_id_pattern(&self) -> &Regex {
        &self.file_id_pattern
    }

    pub fn offline_markers(&self) -> &[String] {
        &self.offline_markers
    }

    pub fn is_video_hoster(&self) -> bool {
        self.is_video_hoster
    }

    pub fn needs_captcha(&self) -> bool {
        self.needs_captcha
    }

    /// First offline marker contained in `body`, in table order
    pub fn find_offline_marker(&self, body: &str) -> Option<&str> {
        self.offline_markers
            .iter()
            .find(|marker| body.contains(marker.as_str()))
            .map(String::as_str)
    }
}

/// Extracts the file id from a hoster URL
///
/// Returns `None` without any I/O when the URL's host is not one of the
/// config's domains. Otherwise applies the config's pattern to the URL path
/// (query string excluded) and returns its first capture group.
///
/// # Example
/// ```
/// use hosterkit_core::resolver::{XfsConfig, XfsConfigDef, extract_file_id};
/// let config = XfsConfig::try_from(XfsConfigDef {
///     name: "katfile".to_string(),
///     domains: vec!["katfile".to_string()],
///     ..Default::default()
/// })
/// .unwrap();
/// assert_eq!(
///     extract_file_id("https://katfile.com/abc123def456/Movie.mkv.html", &config),
///     Some("abc123def456".to_string())
/// );
/// assert_eq!(extract_file_id("https://ddownload.com/abc123def456", &config), None);
/// ```
pub fn extract_file_id(url: &str, config: &XfsConfig) -> Option<String> {
    let parsed = parse_url(url).ok()?;
    let host = normalized_host(url)?;
    if !host_in(&host, config.all_domains()) {
        return None;
    }

    config
        .file_id_pattern
        .captures(parsed.path())?
        .get(1)
        .map(|m| m.as_str().to_string())
}

/// Whether a page is the XFS "click to continue" splash that must be
/// submitted to `/dl` before the player is served
fn has_splash_form(html: &str) -> bool {
    let document = Html::parse_document(html);
    let Ok(selector) = Selector::parse("form#F1") else {
        return false;
    };

    document.select(&selector).any(|form| {
        form.value()
            .attr("action")
            .map(|action| action == "/dl" || action.ends_with("/dl"))
            .unwrap_or(false)
    })
}

/// Resolver for one XFS hoster
///
/// Cheap to clone; the config is shared and the client handle is pooled.
#[derive(Debug, Clone)]
pub struct XfsResolver {
    config: Arc<XfsConfig>,
    client: HosterClient,
}

impl XfsResolver {
    pub fn new(config: Arc<XfsConfig>, client: HosterClient) -> Self {
        Self { config, client }
    }

    pub fn config(&self) -> &XfsConfig {
        &self.config
    }

    async fn try_resolve(&self, url: &str) -> Result<ResolvedStream> {
        let file_id = extract_file_id(url, &self.config).ok_or_else(|| {
            ResolveError::InvalidUrl(format!("{url} is not a {} file URL", self.config.name))
        })?;

        if self.config.needs_captcha {
            return Err(ResolveError::Unsupported(format!(
                "{} requires a captcha",
                self.config.name
            )));
        }

        if self.config.is_video_hoster {
            let parsed = parse_url(url)?;
            self.resolve_video(&parsed, &file_id).await
        } else {
            self.resolve_download(url).await
        }
    }

    /// DDL hosters serve the file from the page URL itself; only liveness
    /// needs checking.
    async fn resolve_download(&self, url: &str) -> Result<ResolvedStream> {
        let page = self.client.get(url, &[]).await?.ensure_ok()?;
        self.check_online(&page)?;
        ResolvedStream::new(url)
    }

    async fn resolve_video(&self, url: &Url, file_id: &str) -> Result<ResolvedStream> {
        let embed_url = build_embed_url(url, file_id);
        let page = self.client.get(&embed_url, &[]).await?.ensure_ok()?;
        self.check_online(&page)?;

        let page = if has_splash_form(&page.body) {
            debug!(hoster = %self.config.name, file_id, "submitting splash form");
            self.submit_splash_form(url, file_id, &page).await?
        } else {
            page
        };

        let video_url = extract_video_url(&page.body)
            .ok_or_else(|| ResolveError::NotFound(format!("no player source on {}", page.url)))?;
        let video_url = page
            .url
            .join(&video_url)
            .map(|u| u.to_string())
            .unwrap_or(video_url);

        let referer = page.url.to_string();
        self.client.probe(&video_url, &referer).await?;

        Ok(ResolvedStream::new(video_url)?.with_referer(referer))
    }

    async fn submit_splash_form(&self, url: &Url, file_id: &str, splash: &Page) -> Result<Page> {
        let dl_url = build_origin_url(url, "/dl");
        let form = [
            ("op", "embed"),
            ("file_code", file_id),
            ("auto", "1"),
            ("referer", ""),
        ];
        let page = self
            .client
            .post_form(&dl_url, &form, &[("Referer", splash.url.as_str())])
            .await?
            .ensure_ok()?;

        if let Some(marker) = self.config.find_offline_marker(&page.body) {
            return Err(ResolveError::Offline(marker.to_string()));
        }
        Ok(page)
    }

    fn check_online(&self, page: &Page) -> Result<()> {
        if let Some(marker) = self.config.find_offline_marker(&page.body) {
            return Err(ResolveError::Offline(marker.to_string()));
        }
        if is_error_redirect(&page.url) {
            return Err(ResolveError::Offline(format!("redirected to {}", page.url)));
        }
        Ok(())
    }
}

#[async_trait]
impl HosterResolver for XfsResolver {
    fn name(&self) -> &str {
        &self.config.name
    }

    fn supported_domains(&self) -> &BTreeSet<String> {
        self.config.all_domains()
    }

    async fn resolve(&self, url: &str) -> Option<ResolvedStream> {
        match self.try_resolve(url).await {
            Ok(stream) => {
                debug!(hoster = %self.config.name, url, video_url = %stream.video_url, "resolved");
                Some(stream)
            }
            Err(e) => {
                e.log(&self.config.name, url);
                None
            }
        }
    }
}
