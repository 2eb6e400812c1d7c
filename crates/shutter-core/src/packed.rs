//! Packed encoding of the notarization message.
//!
//! The ledger contract recomputes
//! `keccak256(abi.encodePacked(bytes32 photoHash, string location, string metadata, uint256 nonce))`
//! from the call arguments plus its own stored nonce, then applies the
//! personal-message prefix before recovering the signer. This module is the
//! only place that layout is produced:
//!
//! ```text
//! digest (32 bytes) ‖ location (raw bytes) ‖ metadata (raw bytes) ‖ counter (32-byte big-endian)
//! ```
//!
//! There are no length prefixes and no separators. Field boundaries are
//! implicit, so both sides must agree on field order exactly; any change here
//! silently invalidates every future signature.

use alloy_primitives::{keccak256, B256};

use crate::error::Result;
use crate::types::{PhotoDigest, ReplayCounter};

/// Domain-separation prefix for personal-message signatures.
pub const PERSONAL_MESSAGE_PREFIX: &str = "\x19Ethereum Signed Message:\n";

/// Build the packed message bytes.
///
/// `digest` must be exactly 32 bytes.
pub fn build_message(
    digest: &[u8],
    location: &str,
    metadata: &str,
    counter: ReplayCounter,
) -> Result<Vec<u8>> {
    let digest = PhotoDigest::from_slice(digest)?;
    Ok(pack(&digest, location, metadata, counter))
}

/// Infallible variant for an already-typed digest.
pub fn pack(digest: &PhotoDigest, location: &str, metadata: &str, counter: ReplayCounter) -> Vec<u8> {
    let mut buf = Vec::with_capacity(32 + location.len() + metadata.len() + 32);
    buf.extend_from_slice(digest.as_bytes());
    buf.extend_from_slice(location.as_bytes());
    buf.extend_from_slice(metadata.as_bytes());
    buf.extend_from_slice(&counter.to_be_bytes32());
    buf
}

/// First-stage hash: `keccak256(message)`.
pub fn message_hash(message: &[u8]) -> B256 {
    keccak256(message)
}

/// Second-stage hash: `keccak256(prefix ‖ "32" ‖ inner)`.
pub fn prefixed_hash(inner: &B256) -> B256 {
    let len = inner.len().to_string();
    let mut buf = Vec::with_capacity(PERSONAL_MESSAGE_PREFIX.len() + len.len() + inner.len());
    buf.extend_from_slice(PERSONAL_MESSAGE_PREFIX.as_bytes());
    buf.extend_from_slice(len.as_bytes());
    buf.extend_from_slice(inner.as_slice());
    keccak256(&buf)
}

/// The hash that is actually signed for a record.
pub fn signing_hash(
    digest: &PhotoDigest,
    location: &str,
    metadata: &str,
    counter: ReplayCounter,
) -> B256 {
    prefixed_hash(&message_hash(&pack(digest, location, metadata, counter)))
}
