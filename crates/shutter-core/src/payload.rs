//! Device payload decryption.
//!
//! Cameras encrypt each photo with AES-128-CBC under a key shared with the
//! relay, PKCS#7-padded, with a fresh 16-byte IV carried in the event.
//! Padding is checked by hand after a raw block decrypt so that every
//! rejection is reported as a distinct [`CoreError`].

use aes::cipher::generic_array::GenericArray;
use aes::cipher::{block_padding::NoPadding, block_padding::Pkcs7, BlockDecryptMut, BlockEncryptMut, KeyIvInit};
use aes::Aes128;
use zeroize::Zeroize;

use crate::error::{CoreError, Result};
use crate::event::IV_LEN;
use crate::types::PhotoDigest;

/// AES block size in bytes.
pub const BLOCK_SIZE: usize = 16;

type Aes128CbcDec = cbc::Decryptor<Aes128>;
type Aes128CbcEnc = cbc::Encryptor<Aes128>;

/// Symmetric key shared between the cameras and the relay.
#[derive(Clone)]
pub struct PayloadKey([u8; 16]);

impl PayloadKey {
    pub const fn from_bytes(bytes: [u8; 16]) -> Self {
        Self(bytes)
    }

    pub fn from_slice(bytes: &[u8]) -> Result<Self> {
        let arr: [u8; 16] = bytes.try_into().map_err(|_| CoreError::InvalidKeyLength {
            expected: 16,
            got: bytes.len(),
        })?;
        Ok(Self(arr))
    }

    pub fn as_bytes(&self) -> &[u8; 16] {
        &self.0
    }
}

impl Drop for PayloadKey {
    fn drop(&mut self) {
        self.0.zeroize();
    }
}

impl std::fmt::Debug for PayloadKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("PayloadKey([REDACTED])")
    }
}

/// Decrypt a device payload and strip its padding.
///
/// Nothing is returned unless the whole ciphertext decrypted and the padding
/// validated, so callers never hash partially-decrypted data.
pub fn decrypt_payload(key: &PayloadKey, iv: &[u8; IV_LEN], cipher: &[u8]) -> Result<Vec<u8>> {
    if cipher.is_empty() || cipher.len() % BLOCK_SIZE != 0 {
        return Err(CoreError::CiphertextNotAligned(cipher.len()));
    }

    let mut buf = cipher.to_vec();
    let len = Aes128CbcDec::new(GenericArray::from_slice(&key.0), GenericArray::from_slice(iv))
        .decrypt_padded_mut::<NoPadding>(&mut buf)
        .map_err(|_| CoreError::CiphertextNotAligned(cipher.len()))?
        .len();
    buf.truncate(len);

    let plain_len = pkcs7_unpadded_len(&buf)?;
    buf.truncate(plain_len);
    if buf.is_empty() {
        return Err(CoreError::EmptyPayload);
    }
    Ok(buf)
}

/// Encrypt a photo the way a camera does. Used by fixtures and tooling.
pub fn encrypt_payload(key: &PayloadKey, iv: &[u8; IV_LEN], plaintext: &[u8]) -> Vec<u8> {
    Aes128CbcEnc::new(GenericArray::from_slice(&key.0), GenericArray::from_slice(iv))
        .encrypt_padded_vec_mut::<Pkcs7>(plaintext)
}

/// Decrypt and hash in one step.
pub fn decrypt_and_digest(
    key: &PayloadKey,
    iv: &[u8; IV_LEN],
    cipher: &[u8],
) -> Result<(Vec<u8>, PhotoDigest)> {
    let plain = decrypt_payload(key, iv, cipher)?;
    let digest = PhotoDigest::compute(&plain);
    Ok((plain, digest))
}

/// Length of `data` once its PKCS#7 padding is removed.
///
/// The pad length must be in `1..=BLOCK_SIZE`, no longer than the buffer, and
/// every padding byte must equal it.
pub fn pkcs7_unpadded_len(data: &[u8]) -> Result<usize> {
    let Some(&last) = data.last() else {
        return Err(CoreError::BadPadding);
    };
    let pad = last as usize;
    if pad == 0 || pad > BLOCK_SIZE || pad > data.len() {
        return Err(CoreError::BadPadding);
    }
    if data[data.len() - pad..].iter().any(|&b| b != last) {
        return Err(CoreError::BadPadding);
    }
    Ok(data.len() - pad)
}

#[cfg(test)]
mod tests {
    use super::*;

    const KEY: [u8; 16] = *b"0123456789ABCDEF";
    const IV: [u8; 16] = [7u8; 16];

    #[test]
    fn test_roundtrip() {
        let key = PayloadKey::from_bytes(KEY);
        let photo = b"\xff\xd8\xff\xe0 not really a jpeg".to_vec();
        let cipher = encrypt_payload(&key, &IV, &photo);
        assert_eq!(cipher.len() % BLOCK_SIZE, 0);
        assert_eq!(decrypt_payload(&key, &IV, &cipher).unwrap(), photo);
    }

    #[test]
    fn test_unaligned_ciphertext() {
        let key = PayloadKey::from_bytes(KEY);
        assert!(matches!(
            decrypt_payload(&key, &IV, &[0u8; 17]),
            Err(CoreError::CiphertextNotAligned(17))
        ));
        assert!(matches!(
            decrypt_payload(&key, &IV, &[]),
            Err(CoreError::CiphertextNotAligned(0))
        ));
    }

    #[test]
    fn test_unpad_rejects_inconsistent_padding() {
        // Last byte claims 5 but the preceding 4 are not all 5.
        let mut block = [0u8; 16];
        block[11..].copy_from_slice(&[5, 5, 4, 5, 5]);
        assert!(matches!(pkcs7_unpadded_len(&block), Err(CoreError::BadPadding)));

        block[11..].copy_from_slice(&[5, 5, 5, 5, 5]);
        assert_eq!(pkcs7_unpadded_len(&block).unwrap(), 11);
    }

    #[test]
    fn test_unpad_rejects_zero_and_oversized() {
        let mut block = [1u8; 16];
        block[15] = 0;
        assert!(pkcs7_unpadded_len(&block).is_err());
        block[15] = 17;
        assert!(pkcs7_unpadded_len(&block).is_err());
        assert!(pkcs7_unpadded_len(&[]).is_err());
    }

    #[test]
    fn test_wrong_key_fails_padding() {
        let cipher = encrypt_payload(&PayloadKey::from_bytes(KEY), &IV, b"photo bytes");
        let other = PayloadKey::from_bytes(*b"FEDCBA9876543210");
        // A wrong key yields garbage; valid-looking padding is possible but rare.
        if let Ok(plain) = decrypt_payload(&other, &IV, &cipher) {
            assert_ne!(plain, b"photo bytes");
        }
    }

    #[test]
    fn test_full_padding_block_is_empty_payload() {
        let key = PayloadKey::from_bytes(KEY);
        let cipher = encrypt_payload(&key, &IV, b"");
        assert_eq!(cipher.len(), BLOCK_SIZE);
        assert!(matches!(decrypt_payload(&key, &IV, &cipher), Err(CoreError::EmptyPayload)));
    }

    #[test]
    fn test_digest_matches_plaintext_hash() {
        let key = PayloadKey::from_bytes(KEY);
        let cipher = encrypt_payload(&key, &IV, b"hello");
        let (plain, digest) = decrypt_and_digest(&key, &IV, &cipher).unwrap();
        assert_eq!(plain, b"hello");
        assert_eq!(digest, PhotoDigest::compute(b"hello"));
    }
}
