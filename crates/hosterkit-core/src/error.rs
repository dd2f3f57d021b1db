//! Error types for hoster resolution
//!
//! Resolvers never surface these to their callers: every failure path in
//! `resolve()` ends in `None` plus one log event. The enum exists so internal
//! steps can use `?` and so the log level can be chosen by failure class.

use serde::{Serialize, Serializer};
use thiserror::Error;
use tracing::{debug, info, warn};

/// Error type for all internal resolution steps
///
/// Implements Display for human-readable messages and Serialize
/// for Tauri command compatibility.
#[derive(Error, Debug)]
pub enum ResolveError {
    /// HTTP request failed (connection error, timeout, body read)
    #[error("HTTP request failed: {0}")]
    HttpError(#[from] reqwest::Error),

    /// Server answered with an unexpected status code
    #[error("Unexpected HTTP status {status} from {url}")]
    Status { status: u16, url: String },

    /// URL is malformed or not addressable by this resolver
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    /// Hoster is known to be unsupported (e.g. captcha-gated)
    #[error("Unsupported hoster: {0}")]
    Unsupported(String),

    /// File existed but has been removed
    #[error("File is offline: {0}")]
    Offline(String),

    /// Page was fetched but no media URL could be extracted
    #[error("Video not found: {0}")]
    NotFound(String),

    /// Expected field was absent from an API response
    #[error("Missing field in response: {0}")]
    MissingField(String),

    /// JSON body could not be parsed
    #[error("Invalid JSON: {0}")]
    Json(#[from] serde_json::Error),

    /// Base64url field could not be decoded
    #[error("Invalid base64: {0}")]
    Decode(#[from] base64::DecodeError),

    /// Key generation, signing or decryption failed
    #[error("Crypto failure: {0}")]
    Crypto(String),

    /// Extracted media URL did not answer the reachability probe
    #[error("Media URL unreachable: {0}")]
    Unreachable(String),

    /// Hoster definition is invalid (bad regex, empty domain set)
    #[error("Invalid hoster config: {0}")]
    Config(String),
}

impl ResolveError {
    /// Whether this failure is an ordinary, expected outcome
    /// (routing miss, dead file, nothing to extract) rather than a
    /// transport or protocol problem.
    pub fn is_expected(&self) -> bool {
        matches!(
            self,
            ResolveError::InvalidUrl(_)
                | ResolveError::Unsupported(_)
                | ResolveError::Offline(_)
                | ResolveError::NotFound(_)
                | ResolveError::MissingField(_)
                | ResolveError::Json(_)
                | ResolveError::Decode(_)
                | ResolveError::Unreachable(_)
        )
    }

    /// Emits one log event for a failed resolution at the level matching
    /// the failure class.
    pub fn log(&self, hoster: &str, url: &str) {
        match self {
            ResolveError::InvalidUrl(_) | ResolveError::Unsupported(_) => {
                debug!(hoster, url, error = %self, "not resolvable by this hoster");
            }
            ResolveError::Offline(_) => {
                info!(hoster, url, error = %self, "file is offline");
            }
            ResolveError::HttpError(_)
            | ResolveError::Status { .. }
            | ResolveError::Crypto(_)
            | ResolveError::Config(_) => {
                warn!(hoster, url, error = %self, "resolution failed");
            }
            _ => {
                info!(hoster, url, error = %self, "no playable stream found");
            }
        }
    }
}

impl Serialize for ResolveError {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

/// Result type alias for resolution steps
pub type Result<T> = std::result::Result<T, ResolveError>;
