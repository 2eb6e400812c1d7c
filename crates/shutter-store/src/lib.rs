//! # Shutter Store
//!
//! Local persistence for the shutter relay: the camera key store and the
//! per-event evidence files.
//!
//! ## Key Types
//!
//! - [`KeyStore`] - The async trait for key lookup and provisioning
//! - [`JsonKeyStore`] - Key store backed by a JSON file
//! - [`MemoryKeyStore`] - In-memory key store for tests
//! - [`MasterKey`] - AES-256-GCM key sealing private keys at rest
//! - [`EvidenceWriter`] - Writes `.cid` and `.sha256` files per event
//!
//! ## Usage
//!
//! ```rust,no_run
//! use shutter_store::{JsonKeyStore, KeyStore, MasterKey};
//! use shutter_core::CameraIdentity;
//!
//! async fn example() {
//!     let store = JsonKeyStore::open("camera_keys.json", MasterKey::from_bytes([0; 32]));
//!     let id = CameraIdentity::derive("AA:BB:CC:DD:EE:FF", "01234");
//!     let key = store.load(&id).await.unwrap();
//!     println!("{}", key.signer.address());
//! }
//! ```

pub mod envelope;
pub mod error;
pub mod evidence;
pub mod json;
pub mod memory;
pub mod record;
pub mod traits;

pub use envelope::{is_envelope, MasterKey, ENVELOPE_PREFIX};
pub use error::{Result, StoreError};
pub use evidence::{EvidencePaths, EvidenceRecord, EvidenceWriter};
pub use json::JsonKeyStore;
pub use memory::MemoryKeyStore;
pub use record::{KeyBook, KeyRecord, LoadedKey};
pub use traits::{KeyStore, KeyStoreExt};
