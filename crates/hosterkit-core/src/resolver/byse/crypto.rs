//! Byse attestation signing and playback decryption
//!
//! - P-256 ECDSA/SHA-256 over the raw nonce bytes, signature as `r || s`
//! - AES-256-GCM, 12-byte IV, no associated data
//! - all binary fields base64url without padding

use aes_gcm::Aes256Gcm;
use aes_gcm::Nonce;
use aes_gcm::aead::{Aead, KeyInit};
use base64::Engine as _;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use p256::ecdsa::signature::Signer;
use p256::ecdsa::{Signature, SigningKey};
use p256::elliptic_curve::sec1::ToEncodedPoint;
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::trace;

use super::entropy::{EntropySource, random_bytes};
use crate::error::{ResolveError, Result};

const AES_KEY_LEN: usize = 32;
const GCM_IV_LEN: usize = 12;

/// Attempts before giving up on drawing a valid P-256 scalar
const KEYGEN_ATTEMPTS: usize = 8;

/// Encrypted `playback` object from the playback endpoint
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct EncryptedPlayback {
    pub key_parts: Vec<String>,
    pub iv: String,
    pub payload: String,
}

/// Ephemeral P-256 key pair, alive for one handshake
pub struct AttestationKey {
    signing: SigningKey,
}

impl AttestationKey {
    /// Draws a key from `entropy`
    ///
    /// # Errors
    /// Returns `Crypto` if no valid scalar was produced
    pub fn generate(entropy: &dyn EntropySource) -> Result<Self> {
        for _ in 0..KEYGEN_ATTEMPTS {
            let scalar = random_bytes::<32>(entropy);
            if let Ok(signing) = SigningKey::from_slice(&scalar) {
                return Ok(Self { signing });
            }
        }
        Err(ResolveError::Crypto(
            "could not generate a P-256 key".to_string(),
        ))
    }

    /// Signs `message` (hashed with SHA-256), returning base64url `r || s`
    pub fn sign(&self, message: &[u8]) -> String {
        let signature: Signature = self.signing.sign(message);
        encode_b64url(&signature.to_bytes())
    }

    /// Public key as a JWK with unpadded base64url coordinates
    pub fn public_jwk(&self) -> Result<Value> {
        let public = p256::PublicKey::from(self.signing.verifying_key());
        let point = public.to_encoded_point(false);
        let (Some(x), Some(y)) = (point.x(), point.y()) else {
            return Err(ResolveError::Crypto("public key is the identity".to_string()));
        };
        Ok(json!({
            "kty": "EC",
            "crv": "P-256",
            "x": encode_b64url(x),
            "y": encode_b64url(y),
        }))
    }

    #[cfg(test)]
    pub(crate) fn verifying_key(&self) -> p256::ecdsa::VerifyingKey {
        self.signing.verifying_key().clone()
    }
}

pub fn encode_b64url(bytes: &[u8]) -> String {
    URL_SAFE_NO_PAD.encode(bytes)
}

/// Decodes base64url, tolerating `=` padding and the standard alphabet
pub fn decode_b64url(text: &str) -> Result<Vec<u8>> {
    let normalized: String = text
        .trim()
        .trim_end_matches('=')
        .chars()
        .map(|c| match c {
            '+' => '-',
            '/' => '_',
            other => other,
        })
        .collect();
    Ok(URL_SAFE_NO_PAD.decode(normalized)?)
}

/// Decrypts a playback object to its plaintext bytes
///
/// The key is the in-order concatenation of the decoded `key_parts`.
///
/// # Errors
/// `Decode` for bad base64, `Crypto` for wrong key/IV sizes or a failed
/// authentication tag
pub fn decrypt_playback_bytes(playback: &EncryptedPlayback) -> Result<Vec<u8>> {
    let mut key = Vec::with_capacity(AES_KEY_LEN);
    for part in &playback.key_parts {
        key.extend(decode_b64url(part)?);
    }
    if key.len() != AES_KEY_LEN {
        return Err(ResolveError::Crypto(format!(
            "expected {AES_KEY_LEN}-byte key, got {}",
            key.len()
        )));
    }

    let iv = decode_b64url(&playback.iv)?;
    if iv.len() != GCM_IV_LEN {
        return Err(ResolveError::Crypto(format!(
            "expected {GCM_IV_LEN}-byte IV, got {}",
            iv.len()
        )));
    }

    let ciphertext = decode_b64url(&playback.payload)?;
    let cipher = Aes256Gcm::new_from_slice(&key)
        .map_err(|e| ResolveError::Crypto(format!("bad key: {e}")))?;
    let plaintext = cipher
        .decrypt(Nonce::from_slice(&iv), ciphertext.as_slice())
        .map_err(|_| ResolveError::Crypto("playback authentication failed".to_string()))?;

    trace!(
        encrypted = ciphertext.len(),
        decrypted = plaintext.len(),
        "playback decrypted"
    );
    Ok(plaintext)
}

/// Decrypts a playback object and parses the plaintext as JSON
pub fn decrypt_playback(playback: &EncryptedPlayback) -> Result<Value> {
    let plaintext = decrypt_playback_bytes(playback)?;
    Ok(serde_json::from_slice(&plaintext)?)
}

#[cfg(test)]
pub(crate) fn encrypt_playback(
    plaintext: &[u8],
    key: &[u8; AES_KEY_LEN],
    iv: &[u8; GCM_IV_LEN],
) -> EncryptedPlayback {
    let cipher = Aes256Gcm::new_from_slice(key).expect("valid key");
    let ciphertext = cipher
        .encrypt(Nonce::from_slice(iv), plaintext)
        .expect("encryption should succeed");
    EncryptedPlayback {
        key_parts: vec![encode_b64url(&key[..16]), encode_b64url(&key[16..])],
        iv: encode_b64url(iv),
        payload: encode_b64url(&ciphertext),
    }
}
