//! At-rest envelope for camera private keys.
//!
//! Format: `"enc:v1:" + base64(nonce ‖ ciphertext ‖ tag)` using AES-256-GCM
//! with a random 12-byte nonce under the relay's master key.

use aes_gcm::aead::{Aead, KeyInit};
use aes_gcm::{Aes256Gcm, Nonce};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use rand::RngCore;
use zeroize::{Zeroize, Zeroizing};

use crate::error::{Result, StoreError};

/// Prefix marking an encrypted key.
pub const ENVELOPE_PREFIX: &str = "enc:v1:";

const NONCE_LEN: usize = 12;
const TAG_LEN: usize = 16;

/// Whether a stored key string is an envelope rather than plaintext hex.
pub fn is_envelope(s: &str) -> bool {
    s.starts_with(ENVELOPE_PREFIX)
}

/// 256-bit master key protecting the key store.
#[derive(Clone)]
pub struct MasterKey([u8; 32]);

impl MasterKey {
    pub const fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Generate a new random key.
    pub fn generate() -> Self {
        let mut bytes = [0u8; 32];
        rand::thread_rng().fill_bytes(&mut bytes);
        Self(bytes)
    }

    /// Seal a plaintext secret into an envelope string.
    pub fn seal(&self, plaintext: &str) -> Result<String> {
        let cipher = Aes256Gcm::new_from_slice(&self.0)
            .map_err(|e| StoreError::KeyStoreCorrupt(e.to_string()))?;

        let mut nonce = [0u8; NONCE_LEN];
        rand::thread_rng().fill_bytes(&mut nonce);

        let ciphertext = cipher
            .encrypt(Nonce::from_slice(&nonce), plaintext.trim().as_bytes())
            .map_err(|e| StoreError::KeyStoreCorrupt(format!("seal: {e}")))?;

        let mut raw = Vec::with_capacity(NONCE_LEN + ciphertext.len());
        raw.extend_from_slice(&nonce);
        raw.extend_from_slice(&ciphertext);
        Ok(format!("{ENVELOPE_PREFIX}{}", BASE64.encode(raw)))
    }

    /// Open an envelope string. The recovered text is whitespace-trimmed.
    ///
    /// Any failure, including authentication, is [`StoreError::KeyStoreCorrupt`].
    pub fn open(&self, envelope: &str) -> Result<Zeroizing<String>> {
        let body = envelope
            .strip_prefix(ENVELOPE_PREFIX)
            .ok_or_else(|| StoreError::KeyStoreCorrupt("missing envelope prefix".into()))?;
        let raw = BASE64
            .decode(body.trim())
            .map_err(|e| StoreError::KeyStoreCorrupt(format!("envelope base64: {e}")))?;
        if raw.len() < NONCE_LEN + TAG_LEN {
            return Err(StoreError::KeyStoreCorrupt(format!(
                "envelope too short: {} bytes",
                raw.len()
            )));
        }

        let (nonce, ciphertext) = raw.split_at(NONCE_LEN);
        let cipher = Aes256Gcm::new_from_slice(&self.0)
            .map_err(|e| StoreError::KeyStoreCorrupt(e.to_string()))?;
        let plain = Zeroizing::new(
            cipher
                .decrypt(Nonce::from_slice(nonce), ciphertext)
                .map_err(|_| StoreError::KeyStoreCorrupt("envelope authentication failed".into()))?,
        );
        let text = std::str::from_utf8(&plain)
            .map_err(|_| StoreError::KeyStoreCorrupt("envelope is not utf-8".into()))?;
        Ok(Zeroizing::new(text.trim().to_string()))
    }
}

impl Drop for MasterKey {
    fn drop(&mut self) {
        self.0.zeroize();
    }
}

impl std::fmt::Debug for MasterKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("MasterKey([REDACTED])")
    }
}
