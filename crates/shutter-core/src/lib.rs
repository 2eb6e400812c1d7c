//! # Shutter Core
//!
//! Pure primitives for the shutter relay: capture events, camera identity,
//! payload decryption, and the packed message that cameras sign for the
//! notarization ledger.
//!
//! This crate contains no I/O, no storage, no networking.
//!
//! ## Key Types
//!
//! - [`CaptureEvent`] - A validated inbound photo event
//! - [`CameraIdentity`] - Keccak-256 of the device's MAC and eFuse id
//! - [`PhotoDigest`] - SHA-256 of the decrypted photo
//! - [`SignedRecord`] - A record signed for a specific replay counter
//!
//! ## Packed encoding
//!
//! The signed message layout must match the ledger's own reconstruction
//! byte for byte. See [`packed`].

pub mod crypto;
pub mod error;
pub mod event;
pub mod identity;
pub mod packed;
pub mod payload;
pub mod record;
pub mod types;

pub use alloy_primitives::Address;
pub use crypto::{address_matches, parse_address, recover_record_signer, CameraSigner};
pub use error::{CoreError, Result};
pub use event::CaptureEvent;
pub use identity::{derive_identity, CameraIdentity};
pub use packed::{build_message, prefixed_hash, signing_hash};
pub use payload::{decrypt_and_digest, decrypt_payload, encrypt_payload, PayloadKey};
pub use record::{PhotoMetadata, SignedRecord, SignedRecordBuilder};
pub use types::{PhotoDigest, RecordSignature, ReplayCounter};
