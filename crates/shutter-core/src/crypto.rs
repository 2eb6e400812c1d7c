//! Camera signing keys and signature recovery.
//!
//! Records are signed with the camera's secp256k1 key over the
//! personal-message hash of the packed message (see [`crate::packed`]). The
//! ledger recovers the signer from the same two-stage hash, so the recovery
//! byte is normalized to 27/28 as the verifier expects.

use alloy_primitives::{Address, B256};
use alloy_signer::SignerSync;
use alloy_signer_local::PrivateKeySigner;
use std::str::FromStr;
use zeroize::Zeroizing;

use crate::error::{CoreError, Result};
use crate::identity::strip_hex_prefix;
use crate::packed::signing_hash;
use crate::types::{PhotoDigest, RecordSignature, ReplayCounter};

/// A camera's secp256k1 signing key.
#[derive(Clone)]
pub struct CameraSigner {
    inner: PrivateKeySigner,
}

impl CameraSigner {
    /// Generate a fresh random key. Administrative provisioning only.
    pub fn random() -> Self {
        Self {
            inner: PrivateKeySigner::random(),
        }
    }

    /// Create from 32 raw secret bytes.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        if bytes.len() != 32 {
            return Err(CoreError::InvalidSigningKey(format!(
                "expected 32 bytes, got {}",
                bytes.len()
            )));
        }
        let inner = PrivateKeySigner::from_slice(bytes)
            .map_err(|e| CoreError::InvalidSigningKey(e.to_string()))?;
        Ok(Self { inner })
    }

    /// Parse a hex private key, with or without `0x`.
    pub fn from_hex(s: &str) -> Result<Self> {
        let bytes = Zeroizing::new(
            hex::decode(strip_hex_prefix(s.trim()))
                .map_err(|e| CoreError::InvalidSigningKey(e.to_string()))?,
        );
        Self::from_bytes(&bytes)
    }

    /// Wallet address controlled by this key.
    pub fn address(&self) -> Address {
        self.inner.address()
    }

    /// Private key as bare lowercase hex. Handle with care.
    pub fn to_hex(&self) -> Zeroizing<String> {
        Zeroizing::new(hex::encode(self.inner.to_bytes()))
    }

    /// Sign a 32-byte prehash, returning `r ‖ s ‖ v` with `v` in {27, 28}.
    pub fn sign_prehash(&self, hash: &B256) -> Result<RecordSignature> {
        let sig = self
            .inner
            .sign_hash_sync(hash)
            .map_err(|e| CoreError::InvalidSigningKey(e.to_string()))?;

        let mut out = [0u8; 65];
        out[..32].copy_from_slice(&sig.r().to_be_bytes::<32>());
        out[32..64].copy_from_slice(&sig.s().to_be_bytes::<32>());
        out[64] = 27 + u8::from(sig.v());
        Ok(RecordSignature(out))
    }

    /// Sign a notarization record.
    pub fn sign_record(
        &self,
        digest: &PhotoDigest,
        location: &str,
        metadata: &str,
        counter: ReplayCounter,
    ) -> Result<RecordSignature> {
        self.sign_prehash(&signing_hash(digest, location, metadata, counter))
    }
}

impl std::fmt::Debug for CameraSigner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "CameraSigner({})", self.address())
    }
}

/// Recover the address that produced `signature` over `hash`.
pub fn recover_prehash(hash: &B256, signature: &RecordSignature) -> Result<Address> {
    let sig = alloy_primitives::Signature::from_raw(signature.as_bytes())
        .map_err(|e| CoreError::InvalidSignature(e.to_string()))?;
    sig.recover_address_from_prehash(hash)
        .map_err(|e| CoreError::InvalidSignature(e.to_string()))
}

/// Recover the signer of a notarization record.
pub fn recover_record_signer(
    digest: &PhotoDigest,
    location: &str,
    metadata: &str,
    counter: ReplayCounter,
    signature: &RecordSignature,
) -> Result<Address> {
    recover_prehash(&signing_hash(digest, location, metadata, counter), signature)
}

/// Parse a wallet address. Case is not checked.
pub fn parse_address(s: &str) -> Result<Address> {
    Address::from_str(s.trim()).map_err(|e| CoreError::InvalidAddress(format!("{s:?}: {e}")))
}

/// Case-insensitive comparison of a textual address against a parsed one.
pub fn address_matches(text: &str, address: &Address) -> bool {
    parse_address(text).map(|a| &a == address).unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    const WELL_KNOWN_KEY: &str = "0x4c0883a69102937d6231471b5dbb6204fe5129617082792ae468d01a3f362318";

    #[test]
    fn test_address_from_known_key() {
        let signer = CameraSigner::from_hex(WELL_KNOWN_KEY).unwrap();
        assert!(address_matches(
            "0x2c7536e3605d9c16a7a3d7b1898e529396a65c23",
            &signer.address()
        ));
    }

    #[test]
    fn test_invalid_key_material() {
        assert!(matches!(
            CameraSigner::from_hex("0x1234"),
            Err(CoreError::InvalidSigningKey(_))
        ));
        assert!(matches!(
            CameraSigner::from_hex("zz"),
            Err(CoreError::InvalidSigningKey(_))
        ));
        // Zero is not a valid scalar.
        assert!(CameraSigner::from_bytes(&[0u8; 32]).is_err());
    }

    #[test]
    fn test_sign_and_recover() {
        let signer = CameraSigner::random();
        let digest = PhotoDigest::compute(b"photo");
        let sig = signer
            .sign_record(&digest, "Building A", "camera=x", ReplayCounter(3))
            .unwrap();

        assert!(sig.v() == 27 || sig.v() == 28);
        let recovered =
            recover_record_signer(&digest, "Building A", "camera=x", ReplayCounter(3), &sig).unwrap();
        assert_eq!(recovered, signer.address());
    }

    #[test]
    fn test_different_counter_recovers_different_address() {
        let signer = CameraSigner::random();
        let digest = PhotoDigest::compute(b"photo");
        let sig = signer
            .sign_record(&digest, "loc", "meta", ReplayCounter(3))
            .unwrap();
        let recovered = recover_record_signer(&digest, "loc", "meta", ReplayCounter(4), &sig).unwrap();
        assert_ne!(recovered, signer.address());
    }

    #[test]
    fn test_hex_roundtrip_preserves_address() {
        let signer = CameraSigner::random();
        let again = CameraSigner::from_hex(&signer.to_hex()).unwrap();
        assert_eq!(signer.address(), again.address());
    }

    #[test]
    fn test_address_matching_is_case_insensitive() {
        let signer = CameraSigner::from_hex(WELL_KNOWN_KEY).unwrap();
        assert!(address_matches(
            "0x2C7536E3605D9C16A7A3D7B1898E529396A65C23",
            &signer.address()
        ));
        assert!(!address_matches("not an address", &signer.address()));
    }
}
