//! KeyStore trait: the abstract interface for camera key persistence.
//!
//! Implementations include a JSON file (primary) and in-memory (for tests).
//!
//! # Design Notes
//!
//! - **No silent provisioning**: [`KeyStore::load`] fails with
//!   `IdentityUnknown` when no record exists. Keys are only ever created
//!   through [`KeyStoreExt`], which the event path never calls.
//! - **Sealed at rest**: [`KeyStore::store`] seals plaintext keys before
//!   they are persisted.
//! - **Concurrent reads**: reads may interleave freely; writes are
//!   administrative and replace the whole store atomically.

use async_trait::async_trait;
use shutter_core::{address_matches, Address, CameraIdentity, CameraSigner};

use crate::error::{Result, StoreError};
use crate::record::{KeyRecord, LoadedKey};

#[async_trait]
pub trait KeyStore: Send + Sync {
    // ─────────────────────────────────────────────────────────────────────────
    // Event path
    // ─────────────────────────────────────────────────────────────────────────

    /// Load and open the signing key for an identity.
    ///
    /// # Errors
    /// - `IdentityUnknown` if there is no record.
    /// - `KeyStoreCorrupt` if the record exists but cannot be opened.
    async fn load(&self, identity: &CameraIdentity) -> Result<LoadedKey>;

    // ─────────────────────────────────────────────────────────────────────────
    // Administrative
    // ─────────────────────────────────────────────────────────────────────────

    /// Raw record for an identity, still sealed.
    async fn get(&self, identity: &CameraIdentity) -> Result<Option<KeyRecord>>;

    /// Seal (if needed) and persist a record. Returns what was written.
    async fn store(&self, identity: &CameraIdentity, record: KeyRecord) -> Result<KeyRecord>;

    /// Find a record by its entry name or stored wallet address.
    async fn find_by_address(&self, address: &Address) -> Result<Option<(String, KeyRecord)>>;

    /// Seal every plaintext record in place. Returns how many changed.
    async fn migrate_plaintext(&self) -> Result<usize>;
}

/// Provisioning helpers layered on [`KeyStore`].
pub trait KeyStoreExt: KeyStore {
    /// Generate and store a new key for an identity that has none.
    fn generate_key(
        &self,
        identity: &CameraIdentity,
    ) -> impl std::future::Future<Output = Result<KeyRecord>> + Send;

    /// Import an existing key, optionally checking it controls `expected_wallet`.
    fn import_key(
        &self,
        identity: &CameraIdentity,
        key_hex: &str,
        expected_wallet: Option<&str>,
    ) -> impl std::future::Future<Output = Result<KeyRecord>> + Send;
}

impl<S: KeyStore + ?Sized> KeyStoreExt for S {
    async fn generate_key(&self, identity: &CameraIdentity) -> Result<KeyRecord> {
        if self.get(identity).await?.is_some() {
            return Err(StoreError::AlreadyExists(identity.to_prefixed_hex()));
        }
        let signer = CameraSigner::random();
        let record = self.store(identity, KeyRecord::plaintext(&signer)).await?;
        tracing::info!(camera_id = %identity, address = %record.address, "generated camera key");
        Ok(record)
    }

    async fn import_key(
        &self,
        identity: &CameraIdentity,
        key_hex: &str,
        expected_wallet: Option<&str>,
    ) -> Result<KeyRecord> {
        let signer = CameraSigner::from_hex(key_hex)?;
        if let Some(expected) = expected_wallet {
            if !address_matches(expected, &signer.address()) {
                return Err(StoreError::WalletMismatch {
                    expected: expected.to_string(),
                    derived: signer.address().to_checksum(None),
                });
            }
        }
        let record = self.store(identity, KeyRecord::plaintext(&signer)).await?;
        tracing::info!(camera_id = %identity, address = %record.address, "imported camera key");
        Ok(record)
    }
}
