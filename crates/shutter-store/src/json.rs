//! JSON file implementation of the KeyStore trait.
//!
//! The whole file is read on every lookup and rewritten on every change.
//! Rewrites go through a temporary file in the same directory followed by
//! a rename, so readers never observe a half-written store.

use std::io::Write;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use shutter_core::{Address, CameraIdentity};
use tracing::debug;

use crate::envelope::MasterKey;
use crate::error::{Result, StoreError};
use crate::record::{KeyBook, KeyRecord, LoadedKey};
use crate::traits::KeyStore;

/// Key store backed by a single JSON file.
pub struct JsonKeyStore {
    path: PathBuf,
    master: MasterKey,
}

impl JsonKeyStore {
    /// Open a key store at `path`. The file need not exist yet.
    pub fn open(path: impl Into<PathBuf>, master: MasterKey) -> Self {
        Self {
            path: path.into(),
            master,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn read_book(&self) -> Result<KeyBook> {
        match tokio::fs::read(&self.path).await {
            Ok(bytes) => KeyBook::from_json(&bytes),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(KeyBook::new()),
            Err(e) => Err(StoreError::Io(e)),
        }
    }

    async fn write_book(&self, book: &KeyBook) -> Result<()> {
        let bytes = book.to_json()?;
        let path = self.path.clone();
        tokio::task::spawn_blocking(move || write_atomic(&path, &bytes))
            .await
            .map_err(|e| StoreError::Io(std::io::Error::other(e)))??;
        debug!(path = %self.path.display(), entries = book.len(), "key store written");
        Ok(())
    }
}

fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    let dir = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
        _ => PathBuf::from("."),
    };
    let mut tmp = tempfile::NamedTempFile::new_in(&dir)?;
    tmp.write_all(bytes)?;
    tmp.as_file().sync_all()?;
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        tmp.as_file()
            .set_permissions(std::fs::Permissions::from_mode(0o600))?;
    }
    tmp.persist(path).map_err(|e| StoreError::Io(e.error))?;
    Ok(())
}

#[async_trait]
impl KeyStore for JsonKeyStore {
    async fn load(&self, identity: &CameraIdentity) -> Result<LoadedKey> {
        let book = self.read_book().await?;
        let (_, record) = book
            .lookup(identity)
            .ok_or_else(|| StoreError::IdentityUnknown(identity.to_prefixed_hex()))?;
        let signer = record.open(&self.master)?;
        Ok(LoadedKey {
            signer,
            declared_address: record.address.clone(),
        })
    }

    async fn get(&self, identity: &CameraIdentity) -> Result<Option<KeyRecord>> {
        let book = self.read_book().await?;
        Ok(book.lookup(identity).map(|(_, r)| r.clone()))
    }

    async fn store(&self, identity: &CameraIdentity, record: KeyRecord) -> Result<KeyRecord> {
        let record = record.sealed(&self.master)?;
        let mut book = self.read_book().await?;
        book.upsert(identity, record.clone());
        self.write_book(&book).await?;
        Ok(record)
    }

    async fn find_by_address(&self, address: &Address) -> Result<Option<(String, KeyRecord)>> {
        let book = self.read_book().await?;
        Ok(book
            .find_by_address(address)
            .map(|(name, r)| (name.to_string(), r.clone())))
    }

    async fn migrate_plaintext(&self) -> Result<usize> {
        let mut book = self.read_book().await?;
        let migrated = book.seal_plaintext(&self.master)?;
        if migrated > 0 {
            self.write_book(&book).await?;
        }
        Ok(migrated)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::traits::KeyStoreExt;
    use shutter_core::CameraSigner;
    use tempfile::TempDir;

    fn identity() -> CameraIdentity {
        CameraIdentity::derive("AA:BB:CC:DD:EE:FF", "01234")
    }

    fn store_in(dir: &TempDir) -> JsonKeyStore {
        JsonKeyStore::open(dir.path().join("camera_keys.json"), MasterKey::from_bytes([9; 32]))
    }

    #[tokio::test]
    async fn test_missing_file_is_identity_unknown() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);
        let err = store.load(&identity()).await.unwrap_err();
        assert!(matches!(err, StoreError::IdentityUnknown(_)));
        // Lookup never creates the file.
        assert!(!store.path().exists());
    }

    #[tokio::test]
    async fn test_generate_then_load() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);

        let record = store.generate_key(&identity()).await.unwrap();
        assert!(record.is_encrypted());

        let loaded = store.load(&identity()).await.unwrap();
        assert!(shutter_core::address_matches(
            &loaded.declared_address,
            &loaded.signer.address()
        ));

        let raw = std::fs::read_to_string(store.path()).unwrap();
        assert!(raw.contains("enc:v1:"));
        assert!(raw.contains("privateKey"));
    }

    #[tokio::test]
    async fn test_generate_refuses_existing() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);
        store.generate_key(&identity()).await.unwrap();
        assert!(matches!(
            store.generate_key(&identity()).await,
            Err(StoreError::AlreadyExists(_))
        ));
    }

    #[tokio::test]
    async fn test_wrong_master_key_is_corrupt() {
        let dir = TempDir::new().unwrap();
        store_in(&dir).generate_key(&identity()).await.unwrap();

        let other = JsonKeyStore::open(
            dir.path().join("camera_keys.json"),
            MasterKey::from_bytes([8; 32]),
        );
        assert!(matches!(
            other.load(&identity()).await,
            Err(StoreError::KeyStoreCorrupt(_))
        ));
    }

    #[tokio::test]
    async fn test_import_checks_wallet() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);
        let signer = CameraSigner::random();
        let key = signer.to_hex();

        let err = store
            .import_key(&identity(), &key, Some("0x0000000000000000000000000000000000000001"))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::WalletMismatch { .. }));

        let wallet = signer.address().to_string().to_lowercase();
        store.import_key(&identity(), &key, Some(&wallet)).await.unwrap();
        let loaded = store.load(&identity()).await.unwrap();
        assert_eq!(loaded.signer.address(), signer.address());
    }

    #[tokio::test]
    async fn test_migrate_plaintext_file() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);
        let signer = CameraSigner::random();
        let plain = format!(
            r#"{{"{}": {{"address": "{}", "privateKey": "{}", "mnemonic": "", "createdAt": ""}}}}"#,
            identity().to_hex().to_uppercase(),
            signer.address(),
            signer.to_hex().as_str()
        );
        std::fs::write(store.path(), plain).unwrap();

        assert_eq!(store.migrate_plaintext().await.unwrap(), 1);
        let raw = std::fs::read_to_string(store.path()).unwrap();
        assert!(!raw.contains(signer.to_hex().as_str()));
        assert_eq!(store.load(&identity()).await.unwrap().signer.address(), signer.address());
    }

    #[tokio::test]
    async fn test_find_by_address() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);
        let record = store.generate_key(&identity()).await.unwrap();
        let address = shutter_core::parse_address(&record.address).unwrap();

        let (name, found) = store.find_by_address(&address).await.unwrap().unwrap();
        assert_eq!(name, identity().to_prefixed_hex());
        assert_eq!(found, record);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_file_mode_is_private() {
        use std::os::unix::fs::PermissionsExt;
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);
        store.generate_key(&identity()).await.unwrap();
        let mode = std::fs::metadata(store.path()).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }

    #[tokio::test]
    async fn test_garbage_file_is_corrupt() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);
        std::fs::write(store.path(), b"not json").unwrap();
        assert!(matches!(
            store.load(&identity()).await,
            Err(StoreError::KeyStoreCorrupt(_))
        ));
    }
}
