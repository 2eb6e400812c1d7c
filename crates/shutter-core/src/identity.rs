//! Camera identity derivation.
//!
//! A camera is known to the ledger by `keccak256(mac ‖ efuse)`, where both
//! inputs are the raw UTF-8 bytes of the strings the device reports (not
//! hex-decoded), concatenated with no separator. The ledger contract computes
//! the same value with `abi.encodePacked(string, string)`.
//!
//! **This derivation is frozen.** Changing the hash or the byte order breaks
//! every existing registration.

use alloy_primitives::keccak256;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A 32-byte camera identifier bound to the device's hardware fields.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CameraIdentity(pub [u8; 32]);

impl CameraIdentity {
    /// Derive the identity from the device MAC address and eFuse/serial id.
    pub fn derive(mac: &str, efuse: &str) -> Self {
        let mut packed = Vec::with_capacity(mac.len() + efuse.len());
        packed.extend_from_slice(mac.as_bytes());
        packed.extend_from_slice(efuse.as_bytes());
        Self(keccak256(&packed).0)
    }

    /// Create from raw bytes.
    pub const fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Get the raw bytes.
    pub const fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Lowercase hex without prefix.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Ledger form: `0x` followed by 64 lowercase hex chars.
    pub fn to_prefixed_hex(&self) -> String {
        format!("0x{}", self.to_hex())
    }

    /// Parse from hex, with or without a `0x` prefix, in any case.
    pub fn from_hex(s: &str) -> Result<Self, hex::FromHexError> {
        let bytes = hex::decode(strip_hex_prefix(s))?;
        let arr: [u8; 32] = bytes
            .try_into()
            .map_err(|_| hex::FromHexError::InvalidStringLength)?;
        Ok(Self(arr))
    }

    /// Whether a key-file entry name refers to this identity.
    ///
    /// Comparison ignores an optional `0x` prefix and letter case.
    pub fn matches_key(&self, key: &str) -> bool {
        strip_hex_prefix(key.trim()).eq_ignore_ascii_case(&self.to_hex())
    }
}

/// Derive a camera identity. See [`CameraIdentity::derive`].
pub fn derive_identity(mac: &str, efuse: &str) -> CameraIdentity {
    CameraIdentity::derive(mac, efuse)
}

/// Strip a leading `0x`/`0X` if present.
pub fn strip_hex_prefix(s: &str) -> &str {
    s.strip_prefix("0x")
        .or_else(|| s.strip_prefix("0X"))
        .unwrap_or(s)
}

impl fmt::Debug for CameraIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CameraIdentity({})", &self.to_hex()[..16])
    }
}

impl fmt::Display for CameraIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_prefixed_hex())
    }
}

impl AsRef<[u8]> for CameraIdentity {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl From<[u8; 32]> for CameraIdentity {
    fn from(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_derive_is_deterministic() {
        let a = CameraIdentity::derive("AA:BB:CC:DD:EE:FF", "01234");
        let b = CameraIdentity::derive("AA:BB:CC:DD:EE:FF", "01234");
        assert_eq!(a, b);
    }

    #[test]
    fn test_derive_changes_with_either_input() {
        let base = CameraIdentity::derive("AA:BB:CC:DD:EE:FF", "01234");
        assert_ne!(base, CameraIdentity::derive("AA:BB:CC:DD:EE:FE", "01234"));
        assert_ne!(base, CameraIdentity::derive("AA:BB:CC:DD:EE:FF", "01235"));
    }

    #[test]
    fn test_derive_uses_raw_string_bytes() {
        // Hex-looking inputs are hashed as text, never decoded.
        let id = CameraIdentity::derive("1C:DB:D4:98:F9:D8", "D8F998D4DB1C");
        assert_eq!(
            id.to_hex(),
            "fb571cf53f9f53003f51e13f55690684bcb9b7cff241ba6514417c6edc31c665"
        );
    }

    #[test]
    fn test_matches_key_ignores_prefix_and_case() {
        let id = CameraIdentity::derive("AA:BB:CC:DD:EE:FF", "01234");
        let upper = id.to_hex().to_uppercase();

        assert!(id.matches_key(&id.to_hex()));
        assert!(id.matches_key(&id.to_prefixed_hex()));
        assert!(id.matches_key(&format!("0X{upper}")));
        assert!(!id.matches_key("0xdeadbeef"));
    }

    #[test]
    fn test_hex_roundtrip() {
        let id = CameraIdentity::from_bytes([0x42; 32]);
        assert_eq!(CameraIdentity::from_hex(&id.to_prefixed_hex()).unwrap(), id);
        assert!(CameraIdentity::from_hex("0x1234").is_err());
    }
}
