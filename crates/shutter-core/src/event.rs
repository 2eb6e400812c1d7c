//! Capture event decoding.
//!
//! The capture device publishes one JSON object per photo:
//!
//! ```json
//! {"cam":"cam1","location":"Building A","mac":"AA:BB:..","efuse":"01234",
//!  "iv":"<32 hex chars>","cipher":"<base64 AES-CBC ciphertext>"}
//! ```
//!
//! Decoding is all-or-nothing: a [`CaptureEvent`] only exists once every
//! field the identity and the signed message depend on has been checked.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use serde::Deserialize;

use crate::error::{CoreError, Result};
use crate::identity::CameraIdentity;

/// IV length in bytes (AES block size).
pub const IV_LEN: usize = 16;

/// Wire shape. Every field is optional so that missing fields surface as
/// typed errors instead of generic JSON errors.
#[derive(Debug, Default, Deserialize)]
struct RawEvent {
    #[serde(default)]
    cam: String,
    #[serde(default)]
    location: String,
    #[serde(default)]
    mac: String,
    #[serde(default)]
    efuse: String,
    #[serde(default)]
    iv: String,
    #[serde(default)]
    cipher: String,
}

/// A validated capture event.
#[derive(Clone, PartialEq, Eq)]
pub struct CaptureEvent {
    /// Free-form camera label, used in logs only.
    pub cam: String,
    /// Declared location, bound into the signed message verbatim.
    pub location: String,
    /// Hardware MAC as reported by the device.
    pub mac: String,
    /// Hardware eFuse/serial identifier as reported by the device.
    pub efuse: String,
    /// CBC initialization vector.
    pub iv: [u8; IV_LEN],
    /// Encrypted photo bytes.
    pub cipher: Vec<u8>,
}

impl CaptureEvent {
    /// Decode and validate an inbound event payload.
    ///
    /// Check order: JSON shape, identity fields, location, then IV and
    /// ciphertext encodings.
    pub fn decode(payload: &[u8]) -> Result<Self> {
        let raw: RawEvent = serde_json::from_slice(payload)
            .map_err(|e| CoreError::MalformedEvent(format!("invalid json: {e}")))?;

        if raw.mac.is_empty() || raw.efuse.is_empty() {
            return Err(CoreError::MissingIdentity {
                mac: raw.mac,
                efuse: raw.efuse,
            });
        }
        if raw.location.trim().is_empty() {
            return Err(CoreError::MissingLocation { cam: raw.cam });
        }

        let iv = decode_iv(&raw.iv)?;
        let cipher = BASE64
            .decode(raw.cipher.trim())
            .map_err(|e| CoreError::MalformedEvent(format!("cipher is not base64: {e}")))?;

        Ok(Self {
            cam: raw.cam,
            location: raw.location,
            mac: raw.mac,
            efuse: raw.efuse,
            iv,
            cipher,
        })
    }

    /// Identity derived from this event's hardware fields.
    pub fn identity(&self) -> CameraIdentity {
        CameraIdentity::derive(&self.mac, &self.efuse)
    }

    /// IV as lowercase hex, the form recorded in evidence files.
    pub fn iv_hex(&self) -> String {
        hex::encode(self.iv)
    }
}

impl std::fmt::Debug for CaptureEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CaptureEvent")
            .field("cam", &self.cam)
            .field("location", &self.location)
            .field("mac", &self.mac)
            .field("efuse", &self.efuse)
            .field("iv", &self.iv_hex())
            .field("cipher_len", &self.cipher.len())
            .finish()
    }
}

fn decode_iv(s: &str) -> Result<[u8; IV_LEN]> {
    let s = s.trim();
    if s.len() != IV_LEN * 2 {
        return Err(CoreError::MalformedEvent(format!(
            "iv must be {} hex chars, got {}",
            IV_LEN * 2,
            s.len()
        )));
    }
    let bytes = hex::decode(s).map_err(|e| CoreError::MalformedEvent(format!("iv hex: {e}")))?;
    bytes
        .try_into()
        .map_err(|v: Vec<u8>| CoreError::InvalidIv {
            expected: IV_LEN,
            got: v.len(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn payload(overrides: serde_json::Value) -> Vec<u8> {
        let mut base = json!({
            "cam": "cam1",
            "location": "Building A - Entrance",
            "mac": "AA:BB:CC:DD:EE:FF",
            "efuse": "01234",
            "iv": "000102030405060708090a0b0c0d0e0f",
            "cipher": BASE64.encode([0u8; 32]),
        });
        if let (Some(base), Some(over)) = (base.as_object_mut(), overrides.as_object()) {
            for (k, v) in over {
                base.insert(k.clone(), v.clone());
            }
        }
        serde_json::to_vec(&base).unwrap()
    }

    #[test]
    fn test_decode_valid_event() {
        let event = CaptureEvent::decode(&payload(json!({}))).unwrap();
        assert_eq!(event.cam, "cam1");
        assert_eq!(event.iv[15], 0x0f);
        assert_eq!(event.cipher.len(), 32);
        assert_eq!(
            event.identity(),
            CameraIdentity::derive("AA:BB:CC:DD:EE:FF", "01234")
        );
    }

    #[test]
    fn test_invalid_json_is_malformed() {
        assert!(matches!(
            CaptureEvent::decode(b"{not json"),
            Err(CoreError::MalformedEvent(_))
        ));
    }

    #[test]
    fn test_missing_mac_or_efuse() {
        let err = CaptureEvent::decode(&payload(json!({ "mac": "" }))).unwrap_err();
        assert!(matches!(err, CoreError::MissingIdentity { .. }));

        let mut v: serde_json::Value = serde_json::from_slice(&payload(json!({}))).unwrap();
        v.as_object_mut().unwrap().remove("efuse");
        let err = CaptureEvent::decode(&serde_json::to_vec(&v).unwrap()).unwrap_err();
        assert!(matches!(err, CoreError::MissingIdentity { .. }));
    }

    #[test]
    fn test_blank_location() {
        let err = CaptureEvent::decode(&payload(json!({ "location": "   " }))).unwrap_err();
        assert!(matches!(err, CoreError::MissingLocation { cam } if cam == "cam1"));
    }

    #[test]
    fn test_identity_checked_before_location() {
        let err = CaptureEvent::decode(&payload(json!({ "mac": "", "location": "" }))).unwrap_err();
        assert!(matches!(err, CoreError::MissingIdentity { .. }));
    }

    #[test]
    fn test_bad_iv_and_cipher() {
        let err = CaptureEvent::decode(&payload(json!({ "iv": "abcd" }))).unwrap_err();
        assert!(matches!(err, CoreError::MalformedEvent(_)));

        let err = CaptureEvent::decode(&payload(json!({ "iv": "zz".repeat(16) }))).unwrap_err();
        assert!(matches!(err, CoreError::MalformedEvent(_)));

        let err = CaptureEvent::decode(&payload(json!({ "cipher": "***" }))).unwrap_err();
        assert!(matches!(err, CoreError::MalformedEvent(_)));
    }
}
