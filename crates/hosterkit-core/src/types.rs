//! Core data types for hoster resolution
//!
//! Contains the stream descriptor every resolver returns.

use std::collections::BTreeMap;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::{ResolveError, Result};

/// Best-effort quality hint for a resolved stream
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Quality {
    #[default]
    Unknown,
    P360,
    P480,
    P720,
    P1080,
    P1440,
    P2160,
}

impl Quality {
    /// Maps a vertical resolution to the nearest quality bucket at or below it
    pub fn from_height(height: u32) -> Self {
        match height {
            2160.. => Quality::P2160,
            1440.. => Quality::P1440,
            1080.. => Quality::P1080,
            720.. => Quality::P720,
            480.. => Quality::P480,
            1.. => Quality::P360,
            0 => Quality::Unknown,
        }
    }

    /// Parses labels like "1080p", "720", "HD 720p" or "4K"
    pub fn from_label(label: &str) -> Self {
        let Ok(re) = Regex::new(r"(\d{3,4})\s*[pP]?") else {
            return Quality::Unknown;
        };
        if let Some(caps) = re.captures(label)
            && let Some(m) = caps.get(1)
            && let Ok(height) = m.as_str().parse::<u32>()
        {
            return Quality::from_height(height);
        }
        if label.contains("4K") || label.contains("4k") {
            return Quality::P2160;
        }
        Quality::Unknown
    }
}

/// Playable stream produced by a resolver
///
/// `video_url` is never empty. [`ResolvedStream::new`] and deserialization
/// both reject an empty URL, so a resolver that finds nothing returns `None`
/// instead. The fields stay public for reading; build values through `new`
/// and the `with_*` methods, since a struct literal skips the check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "StreamFields")]
pub struct ResolvedStream {
    /// Absolute URL of the directly fetchable asset
    pub video_url: String,

    /// True if `video_url` is an HLS manifest
    pub is_hls: bool,

    /// Quality hint, `Unknown` when the hoster does not say
    pub quality: Quality,

    /// Headers the caller must send when fetching `video_url`
    pub headers: BTreeMap<String, String>,
}

/// Wire shape of [`ResolvedStream`], validated on the way in
#[derive(Deserialize)]
struct StreamFields {
    video_url: String,
    is_hls: bool,
    #[serde(default)]
    quality: Quality,
    #[serde(default)]
    headers: BTreeMap<String, String>,
}

impl TryFrom<StreamFields> for ResolvedStream {
    type Error = ResolveError;

    fn try_from(fields: StreamFields) -> Result<Self> {
        let mut stream = ResolvedStream::new(fields.video_url)?
            .with_hls(fields.is_hls)
            .with_quality(fields.quality);
        stream.headers = fields.headers;
        Ok(stream)
    }
}

impl ResolvedStream {
    /// Creates a stream descriptor, guessing `is_hls` from the URL
    ///
    /// # Errors
    /// Returns `NotFound` if `video_url` is empty or whitespace
    pub fn new(video_url: impl Into<String>) -> Result<Self> {
        let video_url = video_url.into();
        if video_url.trim().is_empty() {
            return Err(ResolveError::NotFound("empty video URL".to_string()));
        }
        let is_hls = video_url.contains(".m3u8");
        Ok(Self {
            video_url,
            is_hls,
            quality: Quality::Unknown,
            headers: BTreeMap::new(),
        })
    }

    /// Overrides the HLS flag (e.g. from a MIME type)
    pub fn with_hls(mut self, is_hls: bool) -> Self {
        self.is_hls = is_hls;
        self
    }

    pub fn with_quality(mut self, quality: Quality) -> Self {
        self.quality = quality;
        self
    }

    /// Adds a `Referer` header requirement
    pub fn with_referer(self, referer: impl Into<String>) -> Self {
        self.with_header("Referer", referer)
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    /// Returns the required `Referer`, if any
    pub fn referer(&self) -> Option<&str> {
        self.headers.get("Referer").map(String::as_str)
    }
}
