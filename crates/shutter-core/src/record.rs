//! Signed notarization records.
//!
//! A [`SignedRecord`] is everything the ledger needs to notarize a photo:
//! the digest, the declared location, the metadata string, and the
//! signature. The replay counter is carried alongside for diagnostics but is
//! never sent; the ledger supplies its own when it verifies.

use alloy_primitives::Address;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::crypto::{recover_record_signer, CameraSigner};
use crate::error::Result;
use crate::identity::CameraIdentity;
use crate::packed::pack;
use crate::types::{PhotoDigest, RecordSignature, ReplayCounter};

/// A record signed by a camera key for a given replay counter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedRecord {
    pub digest: PhotoDigest,
    pub location: String,
    pub metadata: String,
    pub counter: ReplayCounter,
    pub signature: RecordSignature,
}

impl SignedRecord {
    /// The packed bytes that were hashed and signed.
    pub fn message(&self) -> Vec<u8> {
        pack(&self.digest, &self.location, &self.metadata, self.counter)
    }

    /// Recover the signing address.
    pub fn recover_signer(&self) -> Result<Address> {
        recover_record_signer(
            &self.digest,
            &self.location,
            &self.metadata,
            self.counter,
            &self.signature,
        )
    }

    /// Whether this record was signed by `address`.
    pub fn verify(&self, address: &Address) -> bool {
        self.recover_signer().map(|a| &a == address).unwrap_or(false)
    }

    /// Re-sign the same content under a different counter.
    pub fn resign(&self, signer: &CameraSigner, counter: ReplayCounter) -> Result<Self> {
        SignedRecordBuilder::new(self.digest)
            .location(self.location.clone())
            .metadata(self.metadata.clone())
            .counter(counter)
            .sign(signer)
    }
}

/// Builder for [`SignedRecord`].
pub struct SignedRecordBuilder {
    digest: PhotoDigest,
    location: String,
    metadata: String,
    counter: ReplayCounter,
}

impl SignedRecordBuilder {
    pub fn new(digest: PhotoDigest) -> Self {
        Self {
            digest,
            location: String::new(),
            metadata: String::new(),
            counter: ReplayCounter(0),
        }
    }

    pub fn location(mut self, location: impl Into<String>) -> Self {
        self.location = location.into();
        self
    }

    pub fn metadata(mut self, metadata: impl Into<String>) -> Self {
        self.metadata = metadata.into();
        self
    }

    pub fn counter(mut self, counter: ReplayCounter) -> Self {
        self.counter = counter;
        self
    }

    /// Sign and build the record.
    pub fn sign(self, signer: &CameraSigner) -> Result<SignedRecord> {
        let signature = signer.sign_record(&self.digest, &self.location, &self.metadata, self.counter)?;
        Ok(SignedRecord {
            digest: self.digest,
            location: self.location,
            metadata: self.metadata,
            counter: self.counter,
            signature,
        })
    }
}

/// Descriptive metadata bound into every signature.
///
/// Rendered as `key=value` pairs joined by `;` in a fixed order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhotoMetadata {
    pub camera: CameraIdentity,
    pub topic: String,
    pub event_id: String,
    /// RFC 3339 timestamp of processing.
    pub timestamp: String,
    /// Plaintext size in bytes.
    pub size: usize,
    pub digest: PhotoDigest,
    pub cid: String,
    pub dir_cid: String,
}

impl PhotoMetadata {
    pub fn photo_file_name(&self) -> String {
        format!("{}.jpg", self.event_id)
    }

    pub fn encrypted_file_name(&self) -> String {
        format!("{}.enc", self.event_id)
    }
}

impl fmt::Display for PhotoMetadata {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "camera={};topic={};file={};ts={};size={};sha256={};cid={};dir_cid={};enc_name={}",
            self.camera,
            self.topic,
            self.photo_file_name(),
            self.timestamp,
            self.size,
            self.digest.to_hex(),
            self.cid,
            self.dir_cid,
            self.encrypted_file_name(),
        )
    }
}
