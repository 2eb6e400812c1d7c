//! Golden capture-event vectors.
//!
//! Each vector is a complete event as the reference firmware emits it,
//! encrypted with [`DEVICE_KEY`](crate::fixtures::DEVICE_KEY), with the
//! identity and digest the relay must derive from it. The ciphertexts were
//! produced by an independent AES-CBC implementation.

use base64::{engine::general_purpose::STANDARD, Engine};
use shutter_core::{decrypt_and_digest, CaptureEvent, CoreError, PayloadKey};

use crate::fixtures::{event_json, DEVICE_KEY, FIXED_IV};

/// A golden event vector.
#[derive(Debug, Clone)]
pub struct EventVector {
    pub name: &'static str,
    pub mac: &'static str,
    pub efuse: &'static str,
    pub iv_hex: &'static str,
    pub cipher_b64: &'static str,
    pub plaintext: &'static [u8],
    pub identity: &'static str,
    pub digest: &'static str,
}

impl EventVector {
    /// The event payload as it arrives from the broker.
    pub fn payload(&self) -> Vec<u8> {
        let cipher = STANDARD
            .decode(self.cipher_b64)
            .expect("vector ciphertext is valid base64");
        let iv = hex::decode(self.iv_hex).expect("vector iv is valid hex");
        event_json("cam-vector", "Building A - Entrance", self.mac, self.efuse, &iv, &cipher)
    }
}

/// All event vectors.
pub fn all_vectors() -> Vec<EventVector> {
    vec![
        EventVector {
            name: "jpeg_18_bytes",
            mac: "AA:BB:CC:DD:EE:FF",
            efuse: "01234",
            iv_hex: "000102030405060708090a0b0c0d0e0f",
            cipher_b64: "4BFNUVQnYaYh21HxxYNR7cPlJkQ3hkYhyuAgI8CWoM0=",
            plaintext: b"\xff\xd8\xff\xe0 test photo \xff\xd9",
            identity: "0xeaf063dec3ca905e73c6cf4b3d4804dd31a3a22dda1b2d5e251e2f9ef0565088",
            digest: "a5e90f9406e7e8065ddc46ae919933eec9d568cfabf092a679001236e94e016c",
        },
        EventVector {
            name: "block_aligned",
            mac: "1C:DB:D4:98:F9:D8",
            efuse: "D8F998D4DB1C",
            iv_hex: "000102030405060708090a0b0c0d0e0f",
            cipher_b64: "Dim1oircQqJfs/6Gt/O9Kf/XPhG6w8lI/sFakyhe2Zs=",
            plaintext: b"AAAAAAAAAAAAAAAA",
            identity: "0xfb571cf53f9f53003f51e13f55690684bcb9b7cff241ba6514417c6edc31c665",
            digest: "991204fba2b6216d476282d375ab88d20e6108d109aecded97ef424ddd114706",
        },
    ]
}

/// Decode and decrypt one vector, checking every derived value.
pub fn verify_vector(vector: &EventVector) -> Result<(), String> {
    let event = CaptureEvent::decode(&vector.payload()).map_err(|e| e.to_string())?;
    if event.iv != FIXED_IV {
        return Err(format!("{}: iv mismatch", vector.name));
    }

    let identity = event.identity().to_prefixed_hex();
    if identity != vector.identity {
        return Err(format!("{}: identity {identity} != {}", vector.name, vector.identity));
    }

    let key = PayloadKey::from_bytes(DEVICE_KEY);
    let (plain, digest) = decrypt_and_digest(&key, &event.iv, &event.cipher)
        .map_err(|e: CoreError| format!("{}: {e}", vector.name))?;
    if plain != vector.plaintext {
        return Err(format!("{}: plaintext mismatch", vector.name));
    }
    if digest.to_hex() != vector.digest {
        return Err(format!("{}: digest {} != {}", vector.name, digest, vector.digest));
    }
    Ok(())
}

/// Verify all vectors.
pub fn verify_all_vectors() -> Result<(), String> {
    all_vectors().iter().try_for_each(verify_vector)
}

#[cfg(test)]
mod tests {
    use super::*;
    use shutter_core::encrypt_payload;

    #[test]
    fn test_all_vectors() {
        verify_all_vectors().unwrap();
    }

    #[test]
    fn test_encryption_matches_vectors() {
        let key = PayloadKey::from_bytes(DEVICE_KEY);
        for vector in all_vectors() {
            let cipher = encrypt_payload(&key, &FIXED_IV, vector.plaintext);
            assert_eq!(STANDARD.encode(cipher), vector.cipher_b64, "{}", vector.name);
        }
    }

    #[test]
    fn test_wrong_key_never_yields_vector_digest() {
        let key = PayloadKey::from_bytes(*b"FEDCBA9876543210");
        for vector in all_vectors() {
            let event = CaptureEvent::decode(&vector.payload()).unwrap();
            if let Ok((_, digest)) = decrypt_and_digest(&key, &event.iv, &event.cipher) {
                assert_ne!(digest.to_hex(), vector.digest);
            }
        }
    }
}
