//! In-memory implementation of the KeyStore trait.
//!
//! Same semantics as [`crate::JsonKeyStore`] with no persistence.

use async_trait::async_trait;
use shutter_core::{Address, CameraIdentity};
use tokio::sync::RwLock;

use crate::envelope::MasterKey;
use crate::error::{Result, StoreError};
use crate::record::{KeyBook, KeyRecord, LoadedKey};
use crate::traits::KeyStore;

pub struct MemoryKeyStore {
    book: RwLock<KeyBook>,
    master: MasterKey,
}

impl MemoryKeyStore {
    pub fn new(master: MasterKey) -> Self {
        Self {
            book: RwLock::new(KeyBook::new()),
            master,
        }
    }

    /// Start from an existing book, e.g. one holding plaintext records.
    pub fn with_book(master: MasterKey, book: KeyBook) -> Self {
        Self {
            book: RwLock::new(book),
            master,
        }
    }

    pub async fn snapshot(&self) -> KeyBook {
        self.book.read().await.clone()
    }
}

#[async_trait]
impl KeyStore for MemoryKeyStore {
    async fn load(&self, identity: &CameraIdentity) -> Result<LoadedKey> {
        let book = self.book.read().await;
        let (_, record) = book
            .lookup(identity)
            .ok_or_else(|| StoreError::IdentityUnknown(identity.to_prefixed_hex()))?;
        Ok(LoadedKey {
            signer: record.open(&self.master)?,
            declared_address: record.address.clone(),
        })
    }

    async fn get(&self, identity: &CameraIdentity) -> Result<Option<KeyRecord>> {
        Ok(self.book.read().await.lookup(identity).map(|(_, r)| r.clone()))
    }

    async fn store(&self, identity: &CameraIdentity, record: KeyRecord) -> Result<KeyRecord> {
        let record = record.sealed(&self.master)?;
        self.book.write().await.upsert(identity, record.clone());
        Ok(record)
    }

    async fn find_by_address(&self, address: &Address) -> Result<Option<(String, KeyRecord)>> {
        Ok(self
            .book
            .read()
            .await
            .find_by_address(address)
            .map(|(name, r)| (name.to_string(), r.clone())))
    }

    async fn migrate_plaintext(&self) -> Result<usize> {
        self.book.write().await.seal_plaintext(&self.master)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::traits::KeyStoreExt;

    #[tokio::test]
    async fn test_unknown_identity_is_hard_stop() {
        let store = MemoryKeyStore::new(MasterKey::generate());
        let id = CameraIdentity::derive("AA:BB:CC:DD:EE:FF", "01234");
        assert!(matches!(store.load(&id).await, Err(StoreError::IdentityUnknown(_))));
        // Loading never provisions.
        assert!(store.snapshot().await.is_empty());
    }

    #[tokio::test]
    async fn test_store_seals_plaintext() {
        let store = MemoryKeyStore::new(MasterKey::generate());
        let id = CameraIdentity::derive("AA:BB:CC:DD:EE:FF", "01234");
        let record = store.generate_key(&id).await.unwrap();
        assert!(record.is_encrypted());
        let loaded = store.load(&id).await.unwrap();
        assert_eq!(loaded.declared_address, record.address);
    }
}
