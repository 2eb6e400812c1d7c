//! Test fixtures and helpers.
//!
//! Common setup code for integration tests: cameras with known keys,
//! encrypted capture events, and in-memory gateways wired together.

use std::path::PathBuf;
use std::sync::Arc;

use base64::{engine::general_purpose::STANDARD, Engine};
use serde_json::json;
use shutter_core::{
    encrypt_payload, parse_address, Address, CameraIdentity, CameraSigner, PayloadKey,
};
use shutter_gateway::{MemoryContentStore, MemoryLedger};
use shutter_store::{KeyRecord, KeyStore, MasterKey, MemoryKeyStore};
use tempfile::TempDir;

/// Device key used by the reference firmware.
pub const DEVICE_KEY: [u8; 16] = *b"0123456789ABCDEF";

/// IV used by fixtures unless a test picks its own.
pub const FIXED_IV: [u8; 16] = [0, 1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11, 12, 13, 14, 15];

/// Submitting wallet of the reference deployment.
pub const RELAY_ADDRESS: &str = "0xbaecd1f353293981312b558d663e41299f3baa34";

pub fn relay_address() -> Address {
    parse_address(RELAY_ADDRESS).expect("constant address parses")
}

pub fn device_key() -> PayloadKey {
    PayloadKey::from_bytes(DEVICE_KEY)
}

/// A camera with a known signing key.
pub struct TestCamera {
    pub cam: String,
    pub location: String,
    pub mac: String,
    pub efuse: String,
    pub signer: CameraSigner,
}

impl TestCamera {
    /// A camera with a random key.
    pub fn new(mac: &str, efuse: &str) -> Self {
        Self::with_signer(mac, efuse, CameraSigner::random())
    }

    /// A camera with a deterministic key derived from `seed`.
    pub fn with_seed(mac: &str, efuse: &str, seed: u8) -> Self {
        let mut secret = [0x42u8; 32];
        secret[31] = seed;
        let signer = CameraSigner::from_bytes(&secret).expect("seeded key is valid");
        Self::with_signer(mac, efuse, signer)
    }

    fn with_signer(mac: &str, efuse: &str, signer: CameraSigner) -> Self {
        Self {
            cam: "cam-test".to_string(),
            location: "Building A - Entrance".to_string(),
            mac: mac.to_string(),
            efuse: efuse.to_string(),
            signer,
        }
    }

    /// The camera used by the reference scenario.
    pub fn reference() -> Self {
        Self::with_seed("AA:BB:CC:DD:EE:FF", "01234", 1)
    }

    pub fn at(mut self, location: &str) -> Self {
        self.location = location.to_string();
        self
    }

    pub fn identity(&self) -> CameraIdentity {
        CameraIdentity::derive(&self.mac, &self.efuse)
    }

    pub fn address(&self) -> Address {
        self.signer.address()
    }

    /// Plaintext key record, as written at provisioning.
    pub fn key_record(&self) -> KeyRecord {
        KeyRecord::plaintext(&self.signer)
    }

    /// Encrypt `photo` and wrap it in an event payload.
    pub fn event(&self, key: &PayloadKey, photo: &[u8]) -> Vec<u8> {
        self.event_with_iv(key, FIXED_IV, photo)
    }

    pub fn event_with_iv(&self, key: &PayloadKey, iv: [u8; 16], photo: &[u8]) -> Vec<u8> {
        let cipher = encrypt_payload(key, &iv, photo);
        event_json(&self.cam, &self.location, &self.mac, &self.efuse, &iv, &cipher)
    }
}

/// Build a raw event payload from its fields.
pub fn event_json(
    cam: &str,
    location: &str,
    mac: &str,
    efuse: &str,
    iv: &[u8],
    cipher: &[u8],
) -> Vec<u8> {
    serde_json::to_vec(&json!({
        "cam": cam,
        "location": location,
        "mac": mac,
        "efuse": efuse,
        "iv": hex::encode(iv),
        "cipher": STANDARD.encode(cipher),
    }))
    .expect("json value serializes")
}

/// A small JPEG-shaped photo.
pub fn sample_photo(tag: &[u8]) -> Vec<u8> {
    let mut photo = vec![0xff, 0xd8, 0xff, 0xe0];
    photo.extend_from_slice(b" test photo ");
    photo.extend_from_slice(tag);
    photo.extend_from_slice(&[0xff, 0xd9]);
    photo
}

/// In-memory key store, ledger and content store, plus an evidence
/// directory that is removed on drop.
pub struct TestGateways {
    pub master: MasterKey,
    pub keys: Arc<MemoryKeyStore>,
    pub ledger: Arc<MemoryLedger>,
    pub storage: Arc<MemoryContentStore>,
    pub evidence_dir: TempDir,
}

impl TestGateways {
    pub fn new() -> Self {
        let master = MasterKey::from_bytes([7u8; 32]);
        Self {
            keys: Arc::new(MemoryKeyStore::new(master.clone())),
            ledger: Arc::new(MemoryLedger::new(relay_address())),
            storage: Arc::new(MemoryContentStore::new()),
            evidence_dir: TempDir::new().expect("temp dir"),
            master,
        }
    }

    /// Store the camera's key and register it on the ledger.
    pub async fn enroll(&self, camera: &TestCamera) {
        self.store_key(camera).await;
        self.ledger
            .register_camera(camera.identity(), camera.address())
            .await;
    }

    /// Store the camera's key without registering it on the ledger.
    pub async fn store_key(&self, camera: &TestCamera) {
        self.keys
            .store(&camera.identity(), camera.key_record())
            .await
            .expect("memory store accepts record");
    }

    /// Evidence files written so far, sorted by name.
    pub fn evidence_files(&self) -> Vec<PathBuf> {
        let mut files: Vec<PathBuf> = std::fs::read_dir(self.evidence_dir.path())
            .map(|entries| entries.filter_map(|e| e.ok().map(|e| e.path())).collect())
            .unwrap_or_default();
        files.sort();
        files
    }
}

impl Default for TestGateways {
    fn default() -> Self {
        Self::new()
    }
}

/// Cameras with distinct hardware ids and keys.
pub fn camera_fleet(count: u8) -> Vec<TestCamera> {
    (0..count)
        .map(|i| {
            TestCamera::with_seed(
                &format!("AA:BB:CC:DD:EE:{i:02X}"),
                &format!("FUSE{i:04}"),
                i + 1,
            )
        })
        .collect()
}
