//! Proptest generators for property-based testing.

use proptest::prelude::*;

use shutter_core::{CameraIdentity, CameraSigner, PhotoDigest, ReplayCounter};

/// Generate a MAC address string.
pub fn mac() -> impl Strategy<Value = String> {
    "[0-9A-F]{2}(:[0-9A-F]{2}){5}".prop_map(String::from)
}

/// Generate a fuse/serial identifier.
pub fn efuse() -> impl Strategy<Value = String> {
    "[0-9A-Z]{1,16}".prop_map(String::from)
}

/// Generate a printable location.
pub fn location() -> impl Strategy<Value = String> {
    "[A-Za-z0-9 ,.-]{1,40}".prop_map(String::from)
}

/// Generate a metadata string.
pub fn metadata() -> impl Strategy<Value = String> {
    "[a-z_]{1,8}=[A-Za-z0-9]{0,16}(;[a-z_]{1,8}=[A-Za-z0-9]{0,16}){0,4}".prop_map(String::from)
}

/// Generate a random digest.
pub fn digest() -> impl Strategy<Value = PhotoDigest> {
    any::<[u8; 32]>().prop_map(PhotoDigest::from_bytes)
}

/// Generate a replay counter.
pub fn counter() -> impl Strategy<Value = ReplayCounter> {
    any::<u64>().prop_map(ReplayCounter)
}

/// Generate a valid signing key.
pub fn signer() -> impl Strategy<Value = CameraSigner> {
    any::<[u8; 32]>().prop_filter_map("not a valid secp256k1 scalar", |bytes| {
        CameraSigner::from_bytes(&bytes).ok()
    })
}

/// Generate photo bytes of at most `max_len`, never empty.
pub fn photo(max_len: usize) -> impl Strategy<Value = Vec<u8>> {
    prop::collection::vec(any::<u8>(), 1..=max_len.max(1))
}

/// Parameters for one signed record.
#[derive(Debug, Clone)]
pub struct RecordParams {
    pub mac: String,
    pub efuse: String,
    pub digest: PhotoDigest,
    pub location: String,
    pub metadata: String,
    pub counter: ReplayCounter,
    pub signer: CameraSigner,
}

impl RecordParams {
    pub fn identity(&self) -> CameraIdentity {
        CameraIdentity::derive(&self.mac, &self.efuse)
    }
}

impl Arbitrary for RecordParams {
    type Parameters = ();
    type Strategy = BoxedStrategy<Self>;

    fn arbitrary_with(_: Self::Parameters) -> Self::Strategy {
        (
            mac(),
            efuse(),
            digest(),
            location(),
            metadata(),
            counter(),
            signer(),
        )
            .prop_map(
                |(mac, efuse, digest, location, metadata, counter, signer)| RecordParams {
                    mac,
                    efuse,
                    digest,
                    location,
                    metadata,
                    counter,
                    signer,
                },
            )
            .boxed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shutter_core::{
        build_message, decrypt_payload, encrypt_payload, recover_record_signer, CoreError,
        PayloadKey, SignedRecordBuilder,
    };

    proptest! {
        #[test]
        fn test_identity_deterministic(mac in mac(), efuse in efuse()) {
            prop_assert_eq!(
                CameraIdentity::derive(&mac, &efuse),
                CameraIdentity::derive(&mac, &efuse)
            );
        }

        #[test]
        fn test_identity_changes_with_either_field(
            mac in mac(),
            efuse in efuse(),
            other_mac in mac(),
            other_efuse in efuse(),
        ) {
            prop_assume!(mac != other_mac && efuse != other_efuse);
            let base = CameraIdentity::derive(&mac, &efuse);
            prop_assert_ne!(base, CameraIdentity::derive(&other_mac, &efuse));
            prop_assert_ne!(base, CameraIdentity::derive(&mac, &other_efuse));
        }

        #[test]
        fn test_counter_changes_message_and_signature(
            params: RecordParams,
            other in counter(),
        ) {
            prop_assume!(other != params.counter);

            let a = build_message(params.digest.as_bytes(), &params.location, &params.metadata, params.counter).unwrap();
            let b = build_message(params.digest.as_bytes(), &params.location, &params.metadata, other).unwrap();
            prop_assert_ne!(&a, &b);

            let first = SignedRecordBuilder::new(params.digest)
                .location(params.location.clone())
                .metadata(params.metadata.clone())
                .counter(params.counter)
                .sign(&params.signer)
                .unwrap();
            let second = first.resign(&params.signer, other).unwrap();
            prop_assert_ne!(first.signature, second.signature);
        }

        #[test]
        fn test_signature_recovers_signer(params: RecordParams) {
            let record = SignedRecordBuilder::new(params.digest)
                .location(params.location.clone())
                .metadata(params.metadata.clone())
                .counter(params.counter)
                .sign(&params.signer)
                .unwrap();

            let recovered = recover_record_signer(
                &params.digest,
                &params.location,
                &params.metadata,
                params.counter,
                &record.signature,
            ).unwrap();
            prop_assert_eq!(recovered, params.signer.address());
            prop_assert!(record.signature.v() == 27 || record.signature.v() == 28);
        }

        #[test]
        fn test_cbc_roundtrip(
            key in any::<[u8; 16]>(),
            iv in any::<[u8; 16]>(),
            plain in photo(2048),
        ) {
            let key = PayloadKey::from_bytes(key);
            let cipher = encrypt_payload(&key, &iv, &plain);
            prop_assert_eq!(cipher.len() % 16, 0);
            prop_assert_eq!(decrypt_payload(&key, &iv, &cipher).unwrap(), plain);
        }

        #[test]
        fn test_inconsistent_padding_rejected(
            key in any::<[u8; 16]>(),
            iv in any::<[u8; 16]>(),
            blocks in 1usize..8,
            fill in any::<u8>(),
            claimed in 2u8..=16,
        ) {
            // Block-aligned plaintext gets a full block of 0x10 padding.
            // Flipping the matching byte of the previous ciphertext block
            // makes the final byte claim `claimed` while the rest stay 0x10.
            prop_assume!(claimed != 0x10);
            let key = PayloadKey::from_bytes(key);
            let plain = vec![fill; blocks * 16];
            let mut cipher = encrypt_payload(&key, &iv, &plain);

            let target = cipher.len() - 16 - 1;
            cipher[target] ^= 0x10 ^ claimed;

            prop_assert!(matches!(
                decrypt_payload(&key, &iv, &cipher),
                Err(CoreError::BadPadding)
            ));
        }
    }
}
