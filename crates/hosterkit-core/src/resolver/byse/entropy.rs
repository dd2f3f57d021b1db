//! Randomness for the Byse handshake
//!
//! Key material, device ids and fingerprint hashes all draw from an
//! [`EntropySource`], so tests can pin every byte of the attestation request.

use std::fmt::Debug;

use rand::RngCore;
use serde_json::{Value, json};

/// Source of random bytes
pub trait EntropySource: Send + Sync + Debug {
    fn fill_bytes(&self, dest: &mut [u8]);
}

/// Operating system CSPRNG
#[derive(Debug, Default, Clone, Copy)]
pub struct OsEntropy;

impl EntropySource for OsEntropy {
    fn fill_bytes(&self, dest: &mut [u8]) {
        rand::rngs::OsRng.fill_bytes(dest);
    }
}

/// Deterministic source that repeats one byte; for tests only
#[derive(Debug, Clone, Copy)]
pub struct FixedEntropy(pub u8);

impl EntropySource for FixedEntropy {
    fn fill_bytes(&self, dest: &mut [u8]) {
        dest.fill(self.0);
    }
}

pub(crate) fn random_bytes<const N: usize>(entropy: &dyn EntropySource) -> [u8; N] {
    let mut bytes = [0u8; N];
    entropy.fill_bytes(&mut bytes);
    bytes
}

/// Lowercase hex string of `len` random bytes
pub(crate) fn random_hex(entropy: &dyn EntropySource, len: usize) -> String {
    let mut bytes = vec![0u8; len];
    entropy.fill_bytes(&mut bytes);
    hex::encode(bytes)
}

/// Random RFC 4122 v4 UUID, hyphenated
pub(crate) fn random_uuid(entropy: &dyn EntropySource) -> String {
    uuid::Builder::from_random_bytes(random_bytes::<16>(entropy))
        .into_uuid()
        .to_string()
}

/// Synthetic browser/device fingerprint sent with the attestation
///
/// The server only checks that the structure looks like a real browser;
/// hashes are random per call.
pub(crate) fn browser_fingerprint(entropy: &dyn EntropySource, user_agent: &str) -> Value {
    let [cores, memory, screen] = random_bytes::<3>(entropy);
    let hardware_concurrency = [4, 8, 12, 16][usize::from(cores) % 4];
    let device_memory = [4, 8, 16][usize::from(memory) % 3];
    let (width, height) = [(1920, 1080), (2560, 1440), (1536, 864), (1366, 768)][usize::from(screen) % 4];

    json!({
        "user_agent": user_agent,
        "platform": "Win32",
        "vendor": "Google Inc.",
        "language": "en-US",
        "languages": ["en-US", "en"],
        "timezone": "Europe/Berlin",
        "timezone_offset": -60,
        "screen": {
            "width": width,
            "height": height,
            "avail_width": width,
            "avail_height": height - 40,
            "color_depth": 24,
            "pixel_ratio": 1,
        },
        "hardware_concurrency": hardware_concurrency,
        "device_memory": device_memory,
        "max_touch_points": 0,
        "cookies_enabled": true,
        "do_not_track": null,
        "webdriver": false,
        "canvas_hash": random_hex(entropy, 16),
        "audio_hash": random_hex(entropy, 16),
        "fonts_hash": random_hex(entropy, 16),
        "webgl_hash": random_hex(entropy, 16),
        "webgl_vendor": "Google Inc. (NVIDIA)",
        "webgl_renderer": "ANGLE (NVIDIA, NVIDIA GeForce GTX 1650 Direct3D11 vs_5_0 ps_5_0, D3D11)",
    })
}
