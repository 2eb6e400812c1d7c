//! Key-file entries and the in-memory book they are kept in.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use shutter_core::{address_matches, Address, CameraIdentity, CameraSigner};

use crate::envelope::{is_envelope, MasterKey};
use crate::error::{Result, StoreError};

/// One key-file entry.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyRecord {
    /// Wallet address the key controls, as written at provisioning.
    #[serde(default)]
    pub address: String,

    /// Plaintext hex (with or without `0x`) or an `enc:v1:` envelope.
    #[serde(rename = "privateKey", default)]
    pub private_key: String,

    #[serde(default)]
    pub mnemonic: String,

    /// RFC 3339 creation time.
    #[serde(rename = "createdAt", default)]
    pub created_at: String,
}

impl KeyRecord {
    /// Fresh plaintext record for a signer. Seal it before persisting.
    pub fn plaintext(signer: &CameraSigner) -> Self {
        Self {
            address: signer.address().to_checksum(None),
            private_key: format!("0x{}", signer.to_hex().as_str()),
            mnemonic: String::new(),
            created_at: chrono::Utc::now().to_rfc3339(),
        }
    }

    /// Build a sealed record for a signer.
    pub fn seal(signer: &CameraSigner, master: &MasterKey) -> Result<Self> {
        Self::plaintext(signer).sealed(master)
    }

    /// Seal the key if it is still plaintext. The key must parse.
    pub fn sealed(mut self, master: &MasterKey) -> Result<Self> {
        if self.is_encrypted() {
            return Ok(self);
        }
        let signer = CameraSigner::from_hex(&self.private_key)
            .map_err(|e| StoreError::KeyStoreCorrupt(e.to_string()))?;
        self.private_key = master.seal(&format!("0x{}", signer.to_hex().as_str()))?;
        Ok(self)
    }

    pub fn is_encrypted(&self) -> bool {
        is_envelope(&self.private_key)
    }

    /// Recover the signer, decrypting the envelope if needed.
    pub fn open(&self, master: &MasterKey) -> Result<CameraSigner> {
        if self.private_key.trim().is_empty() {
            return Err(StoreError::KeyStoreCorrupt("private key missing".into()));
        }
        let signer = if self.is_encrypted() {
            let plain = master.open(&self.private_key)?;
            CameraSigner::from_hex(&plain)
        } else {
            CameraSigner::from_hex(&self.private_key)
        };
        signer.map_err(|e| StoreError::KeyStoreCorrupt(e.to_string()))
    }
}

impl std::fmt::Debug for KeyRecord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyRecord")
            .field("address", &self.address)
            .field("encrypted", &self.is_encrypted())
            .field("created_at", &self.created_at)
            .finish_non_exhaustive()
    }
}

/// A signing key loaded for one event, plus the address its record declares.
#[derive(Debug, Clone)]
pub struct LoadedKey {
    pub signer: CameraSigner,
    pub declared_address: String,
}

/// Whole key file: entry name → record, kept sorted.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct KeyBook {
    entries: BTreeMap<String, KeyRecord>,
}

impl KeyBook {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_json(bytes: &[u8]) -> Result<Self> {
        serde_json::from_slice(bytes)
            .map_err(|e| StoreError::KeyStoreCorrupt(format!("key file: {e}")))
    }

    pub fn to_json(&self) -> Result<Vec<u8>> {
        serde_json::to_vec_pretty(self).map_err(|e| StoreError::Serialization(e.to_string()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Find the entry for an identity, ignoring `0x` and case in entry names.
    pub fn lookup(&self, identity: &CameraIdentity) -> Option<(&str, &KeyRecord)> {
        self.entries
            .iter()
            .find(|(name, _)| identity.matches_key(name))
            .map(|(name, record)| (name.as_str(), record))
    }

    /// Find an entry whose name or stored address is `address`.
    pub fn find_by_address(&self, address: &Address) -> Option<(&str, &KeyRecord)> {
        self.entries
            .iter()
            .find(|(name, record)| {
                address_matches(name, address) || address_matches(&record.address, address)
            })
            .map(|(name, record)| (name.as_str(), record))
    }

    /// Insert or replace the record for an identity, reusing an existing
    /// entry name if one matches.
    pub fn upsert(&mut self, identity: &CameraIdentity, record: KeyRecord) {
        let name = self
            .lookup(identity)
            .map(|(name, _)| name.to_string())
            .unwrap_or_else(|| identity.to_prefixed_hex());
        self.entries.insert(name, record);
    }

    /// Insert under an explicit entry name (address aliases).
    pub fn insert_named(&mut self, name: impl Into<String>, record: KeyRecord) {
        self.entries.insert(name.into(), record);
    }

    /// Seal every plaintext record. Returns how many were migrated.
    pub fn seal_plaintext(&mut self, master: &MasterKey) -> Result<usize> {
        let mut migrated = 0;
        for (name, record) in self.entries.iter_mut() {
            if record.is_encrypted() || record.private_key.trim().is_empty() {
                continue;
            }
            *record = record.clone().sealed(master).map_err(|e| {
                StoreError::KeyStoreCorrupt(format!("{name}: {e}"))
            })?;
            migrated += 1;
        }
        Ok(migrated)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &KeyRecord)> {
        self.entries.iter()
    }
}
