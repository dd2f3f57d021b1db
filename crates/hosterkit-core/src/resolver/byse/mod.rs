//! Byse SPA playback protocol
//!
//! The attested API newer Filemoon deployments serve instead of plain embed
//! HTML. One resolution is one fresh handshake:
//!
//! 1. `GET {base}/api/videos/{id}/embed/details` → sources, or the CDN frame URL
//! 2. `POST {cdn}/api/videos/access/challenge` → challenge id, nonce, viewer hint
//! 3. `POST {cdn}/api/videos/access/attest` → token (signed nonce + fingerprint)
//! 4. `POST {cdn}/api/videos/{id}/embed/playback` → AES-GCM encrypted sources
//!
//! Nothing from a handshake outlives the call.

pub mod crypto;
pub mod entropy;

use std::sync::Arc;

use serde_json::{Value, json};
use tracing::debug;

use crate::client::HosterClient;
use crate::error::{ResolveError, Result};
use crate::types::{Quality, ResolvedStream};
use crate::url::{origin, parse_url};

use self::crypto::decode_b64url;
use self::entropy::{browser_fingerprint, random_hex, random_uuid};

pub use self::crypto::{AttestationKey, EncryptedPlayback, decrypt_playback};
pub use self::entropy::{EntropySource, FixedEntropy, OsEntropy};

/// Confidence score reported alongside the attestation token
const FINGERPRINT_CONFIDENCE: f64 = 0.93;

/// Per-call handshake state
struct Handshake {
    challenge_id: String,
    nonce: String,
    viewer_id: String,
    device_id: String,
}

/// Outcome of the details call
enum Details {
    /// Older API shape: sources served directly
    Sources(ResolvedStream),
    /// CDN origin hosting the attested endpoints
    Frame(String),
}

/// Client for the Byse handshake
#[derive(Debug, Clone)]
pub struct ByseApi {
    client: HosterClient,
    entropy: Arc<dyn EntropySource>,
    user_agent: String,
}

impl ByseApi {
    pub fn new(client: HosterClient, entropy: Arc<dyn EntropySource>, user_agent: &str) -> Self {
        Self {
            client,
            entropy,
            user_agent: user_agent.to_string(),
        }
    }

    /// Runs the full handshake for one video
    ///
    /// # Arguments
    /// * `base` - Hoster origin, e.g. `https://filemoon.sx`
    /// * `video_id` - Id from the embed path
    /// * `embed_url` - Normalized `/e/{id}` URL, sent as the embedding parent
    ///
    /// # Errors
    /// Any failed step; callers treat every error as "try the next method"
    pub async fn resolve(&self, base: &str, video_id: &str, embed_url: &str) -> Result<ResolvedStream> {
        let cdn = match self.fetch_details(base, video_id, embed_url).await? {
            Details::Sources(stream) => return Ok(stream.with_referer(embed_url)),
            Details::Frame(cdn) => cdn,
        };
        debug!(video_id, cdn = %cdn, "Byse details returned frame, starting handshake");

        let handshake = self.challenge(&cdn, video_id, embed_url).await?;
        let token = self.attest(&cdn, &handshake, embed_url).await?;
        let playback = self
            .playback(&cdn, video_id, &handshake, &token, embed_url)
            .await?;

        let decrypted = decrypt_playback(&playback)?;
        let stream = parse_sources(&decrypted)
            .ok_or_else(|| ResolveError::NotFound("no sources in decrypted playback".to_string()))?;
        Ok(stream.with_referer(embed_url))
    }

    async fn fetch_details(&self, base: &str, video_id: &str, embed_url: &str) -> Result<Details> {
        let url = format!("{base}/api/videos/{video_id}/embed/details");
        let details: Value = self
            .client
            .get(&url, &[("Referer", embed_url)])
            .await?
            .ensure_ok()?
            .json()?;

        if let Some(stream) = parse_sources(&details) {
            return Ok(Details::Sources(stream));
        }

        let frame = str_field(&details, "embed_frame_url")
            .ok_or_else(|| ResolveError::MissingField("embed_frame_url".to_string()))?;
        let frame = parse_url(frame)?;
        Ok(Details::Frame(origin(&frame)))
    }

    async fn challenge(&self, cdn: &str, video_id: &str, embed_url: &str) -> Result<Handshake> {
        let url = format!("{cdn}/api/videos/access/challenge");
        let response: Value = self
            .client
            .post_json(&url, &json!({ "video_id": video_id }), &[("Referer", embed_url)])
            .await?
            .ensure_ok()?
            .json()?;

        let challenge_id = str_field(&response, "challenge_id")
            .ok_or_else(|| ResolveError::MissingField("challenge_id".to_string()))?;
        let nonce = str_field(&response, "nonce")
            .ok_or_else(|| ResolveError::MissingField("nonce".to_string()))?;
        let viewer_id = str_field(&response, "viewer_hint")
            .map(str::to_string)
            .unwrap_or_else(|| random_hex(self.entropy.as_ref(), 16));

        Ok(Handshake {
            challenge_id: challenge_id.to_string(),
            nonce: nonce.to_string(),
            viewer_id,
            device_id: random_uuid(self.entropy.as_ref()),
        })
    }

    async fn attest(&self, cdn: &str, handshake: &Handshake, embed_url: &str) -> Result<String> {
        let body = self.attestation_body(handshake)?;
        let url = format!("{cdn}/api/videos/access/attest");
        let response: Value = self
            .client
            .post_json(&url, &body, &[("Referer", embed_url)])
            .await?
            .ensure_ok()?
            .json()?;

        str_field(&response, "token")
            .map(str::to_string)
            .ok_or_else(|| ResolveError::MissingField("token".to_string()))
    }

    /// Builds the attestation request: signed raw nonce bytes, public JWK,
    /// device id and a synthetic fingerprint
    fn attestation_body(&self, handshake: &Handshake) -> Result<Value> {
        let key = AttestationKey::generate(self.entropy.as_ref())?;
        let nonce = decode_b64url(&handshake.nonce)?;

        Ok(json!({
            "challenge_id": handshake.challenge_id,
            "nonce": handshake.nonce,
            "viewer_id": handshake.viewer_id,
            "device_id": handshake.device_id,
            "signature": key.sign(&nonce),
            "public_key": key.public_jwk()?,
            "client": browser_fingerprint(self.entropy.as_ref(), &self.user_agent),
        }))
    }

    async fn playback(
        &self,
        cdn: &str,
        video_id: &str,
        handshake: &Handshake,
        token: &str,
        embed_url: &str,
    ) -> Result<EncryptedPlayback> {
        let url = format!("{cdn}/api/videos/{video_id}/embed/playback");
        let body = json!({
            "fingerprint": {
                "token": token,
                "viewer_id": handshake.viewer_id,
                "device_id": handshake.device_id,
                "confidence": FINGERPRINT_CONFIDENCE,
            }
        });
        let response: Value = self
            .client
            .post_json(
                &url,
                &body,
                &[("Referer", embed_url), ("X-Embed-Parent", embed_url)],
            )
            .await?
            .ensure_ok()?
            .json()?;

        let playback = field(&response, "playback")
            .ok_or_else(|| ResolveError::MissingField("playback".to_string()))?;
        Ok(serde_json::from_value(playback.clone())?)
    }
}

/// Looks up `key` at the top level, then one level down under `data`
fn field<'a>(value: &'a Value, key: &str) -> Option<&'a Value> {
    value
        .get(key)
        .filter(|v| !v.is_null())
        .or_else(|| value.get("data")?.get(key).filter(|v| !v.is_null()))
}

fn str_field<'a>(value: &'a Value, key: &str) -> Option<&'a str> {
    field(value, key)?.as_str().filter(|s| !s.is_empty())
}

/// Picks the first playable entry of a `sources` array
///
/// An entry is playable when its `url` or `file` starts with `http`. HLS is
/// detected from a `mpegurl` MIME type or a `.m3u8` path.
pub fn parse_sources(value: &Value) -> Option<ResolvedStream> {
    let sources = field(value, "sources")?.as_array()?;

    sources.iter().find_map(|source| {
        let url = ["url", "file"]
            .iter()
            .filter_map(|key| source.get(*key)?.as_str())
            .find(|url| url.starts_with("http"))?;

        let mime = ["mimeType", "mime_type", "type"]
            .iter()
            .find_map(|key| source.get(*key)?.as_str())
            .unwrap_or_default()
            .to_ascii_lowercase();
        let path = url.split(['?', '#']).next().unwrap_or(url);
        let is_hls = mime.contains("mpegurl") || path.ends_with(".m3u8");

        let quality = source
            .get("height")
            .and_then(Value::as_u64)
            .map(|h| Quality::from_height(u32::try_from(h).unwrap_or(u32::MAX)))
            .or_else(|| {
                ["label", "quality"]
                    .iter()
                    .find_map(|key| source.get(*key)?.as_str())
                    .map(Quality::from_label)
            })
            .unwrap_or_default();

        ResolvedStream::new(url)
            .ok()
            .map(|stream| stream.with_hls(is_hls).with_quality(quality))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn api() -> ByseApi {
        ByseApi::new(
            HosterClient::new().expect("client"),
            Arc::new(FixedEntropy(0x42)),
            "UA/1.0",
        )
    }

    #[test]
    fn test_parse_sources_mp4() {
        let value = json!({
            "sources": [{ "url": "https://cdn.example/v.mp4", "mimeType": "video/mp4" }]
        });
        let stream = parse_sources(&value).unwrap();
        assert_eq!(stream.video_url, "https://cdn.example/v.mp4");
        assert!(!stream.is_hls);
    }

    #[test]
    fn test_parse_sources_hls_by_mime() {
        let value = json!({
            "data": {
                "sources": [{
                    "file": "https://cdn.example/playlist?id=1",
                    "type": "application/vnd.apple.mpegURL",
                    "label": "1080p"
                }]
            }
        });
        let stream = parse_sources(&value).unwrap();
        assert!(stream.is_hls);
        assert_eq!(stream.quality, Quality::P1080);
    }

    #[test]
    fn test_parse_sources_hls_by_extension() {
        let value = json!({
            "sources": [{ "url": "https://cdn.example/master.m3u8?t=1", "height": 720 }]
        });
        let stream = parse_sources(&value).unwrap();
        assert!(stream.is_hls);
        assert_eq!(stream.quality, Quality::P720);
    }

    #[test]
    fn test_parse_sources_skips_relative_entries() {
        let value = json!({
            "sources": [
                { "url": "/relative/v.mp4" },
                { "file": "https://cdn.example/second.mp4" }
            ]
        });
        assert_eq!(
            parse_sources(&value).unwrap().video_url,
            "https://cdn.example/second.mp4"
        );
    }

    #[test]
    fn test_parse_sources_empty_or_absent() {
        assert!(parse_sources(&json!({ "sources": [] })).is_none());
        assert!(parse_sources(&json!({ "embed_frame_url": "https://x" })).is_none());
        assert!(parse_sources(&json!({ "sources": null })).is_none());
    }

    #[test]
    fn test_field_prefers_top_level() {
        let value = json!({ "token": "top", "data": { "token": "nested" } });
        assert_eq!(str_field(&value, "token"), Some("top"));
        let value = json!({ "data": { "token": "nested" } });
        assert_eq!(str_field(&value, "token"), Some("nested"));
        let value = json!({ "token": "" });
        assert_eq!(str_field(&value, "token"), None);
    }

    #[test]
    fn test_attestation_body_is_deterministic_with_fixed_entropy() {
        let handshake = Handshake {
            challenge_id: "ch-1".to_string(),
            nonce: "bm9uY2U".to_string(),
            viewer_id: "viewer".to_string(),
            device_id: "device".to_string(),
        };
        let a = api().attestation_body(&handshake).unwrap();
        let b = api().attestation_body(&handshake).unwrap();
        assert_eq!(a, b);

        assert_eq!(a["challenge_id"], "ch-1");
        assert_eq!(a["device_id"], "device");
        assert_eq!(a["public_key"]["crv"], "P-256");
        assert_eq!(a["client"]["user_agent"], "UA/1.0");
        let signature = a["signature"].as_str().unwrap();
        assert_eq!(decode_b64url(signature).unwrap().len(), 64);
    }

    #[test]
    fn test_attestation_body_rejects_bad_nonce() {
        let handshake = Handshake {
            challenge_id: "ch-1".to_string(),
            nonce: "***".to_string(),
            viewer_id: "viewer".to_string(),
            device_id: "device".to_string(),
        };
        assert!(matches!(
            api().attestation_body(&handshake),
            Err(ResolveError::Decode(_))
        ));
    }
}
