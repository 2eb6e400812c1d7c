//! Fixed-width values that travel between the relay and the ledger.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;

use crate::error::{CoreError, Result};
use crate::identity::strip_hex_prefix;

/// SHA-256 digest of a decrypted photo.
///
/// Stored locally as bare lowercase hex; sent to the ledger `0x`-prefixed.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PhotoDigest(pub [u8; 32]);

impl PhotoDigest {
    /// Hash the plaintext photo bytes.
    pub fn compute(data: &[u8]) -> Self {
        Self(Sha256::digest(data).into())
    }

    /// Create from raw bytes.
    pub const fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Create from a slice, which must be exactly 32 bytes.
    pub fn from_slice(bytes: &[u8]) -> Result<Self> {
        let arr: [u8; 32] = bytes
            .try_into()
            .map_err(|_| CoreError::DigestSizeInvalid(bytes.len()))?;
        Ok(Self(arr))
    }

    /// Get the raw bytes.
    pub const fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Evidence-file form.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Ledger form.
    pub fn to_prefixed_hex(&self) -> String {
        format!("0x{}", self.to_hex())
    }

    /// Parse from hex with or without `0x`.
    pub fn from_hex(s: &str) -> Result<Self> {
        let bytes = hex::decode(strip_hex_prefix(s.trim()))
            .map_err(|e| CoreError::MalformedEvent(format!("digest hex: {e}")))?;
        Self::from_slice(&bytes)
    }
}

impl fmt::Debug for PhotoDigest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PhotoDigest({})", &self.to_hex()[..16])
    }
}

impl fmt::Display for PhotoDigest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

impl AsRef<[u8]> for PhotoDigest {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

/// Ledger-owned replay counter for a submitting wallet.
///
/// The relay only ever reads it; the ledger advances it on each accepted
/// submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ReplayCounter(pub u64);

impl ReplayCounter {
    /// 32-byte big-endian encoding (`uint256` in packed form).
    pub fn to_be_bytes32(self) -> [u8; 32] {
        let mut out = [0u8; 32];
        out[24..].copy_from_slice(&self.0.to_be_bytes());
        out
    }

    pub const fn value(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ReplayCounter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for ReplayCounter {
    fn from(value: u64) -> Self {
        Self(value)
    }
}

/// Recoverable secp256k1 signature, `r ‖ s ‖ v` with `v` in {27, 28}.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct RecordSignature(pub [u8; 65]);

impl RecordSignature {
    pub const fn as_bytes(&self) -> &[u8; 65] {
        &self.0
    }

    /// Recovery byte.
    pub const fn v(&self) -> u8 {
        self.0[64]
    }

    /// Wire form: lowercase hex, no prefix.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Parse from hex with or without `0x`.
    pub fn from_hex(s: &str) -> Result<Self> {
        let bytes = hex::decode(strip_hex_prefix(s.trim()))
            .map_err(|e| CoreError::InvalidSignature(e.to_string()))?;
        let arr: [u8; 65] = bytes
            .as_slice()
            .try_into()
            .map_err(|_| CoreError::InvalidSignature(format!("expected 65 bytes, got {}", bytes.len())))?;
        Ok(Self(arr))
    }
}

impl fmt::Debug for RecordSignature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "RecordSignature({}...)", &self.to_hex()[..16])
    }
}

impl fmt::Display for RecordSignature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}
