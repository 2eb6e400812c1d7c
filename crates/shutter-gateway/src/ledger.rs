//! Ledger abstraction.
//!
//! The notarization ledger owns three pieces of state the relay depends on:
//! camera authorization, the set of registered digests, and one replay
//! counter per submitting wallet. The relay only reads them, plus submits
//! signed records.

use async_trait::async_trait;
use shutter_core::{Address, CameraIdentity, PhotoDigest, ReplayCounter, SignedRecord};

use crate::error::Result;
use crate::messages::AuthorizationState;

/// Ledger operations used by the relay.
///
/// Implementations must be thread-safe (Send + Sync).
#[async_trait]
pub trait Ledger: Send + Sync {
    /// Whether a camera is authorized, and which wallet it is bound to.
    ///
    /// An unknown or revoked camera is `Ok` with `authorized = false`.
    async fn check_authorization(&self, camera: &CameraIdentity) -> Result<AuthorizationState>;

    /// Whether a digest has already been notarized.
    async fn is_notarized(&self, digest: &PhotoDigest) -> Result<bool>;

    /// Current replay counter for a submitting wallet.
    async fn replay_counter(&self, submitter: &Address) -> Result<ReplayCounter>;

    /// Submit a signed record and wait for confirmation.
    async fn submit(&self, record: &SignedRecord) -> Result<()>;
}

/// Lowercase `0x` form of an address, as the ledger API expects it.
pub fn address_param(address: &Address) -> String {
    format!("0x{}", hex::encode(address.as_slice()))
}
