//! Error types for the store module.

use thiserror::Error;

/// Errors that can occur during key store and evidence operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// No key record exists for this identity. Never a cue to provision.
    #[error("identity not found in key store: {0}")]
    IdentityUnknown(String),

    /// A key record exists but could not be opened or parsed.
    #[error("key store corrupt: {0}")]
    KeyStoreCorrupt(String),

    /// A record already exists where a new one was to be created.
    #[error("key record already exists: {0}")]
    AlreadyExists(String),

    /// An imported key does not control the declared wallet.
    #[error("key controls {derived}, expected {expected}")]
    WalletMismatch { expected: String, derived: String },

    /// Key material or addresses failed core validation.
    #[error(transparent)]
    Core(#[from] shutter_core::CoreError),

    /// Key file serialization/deserialization error.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;
