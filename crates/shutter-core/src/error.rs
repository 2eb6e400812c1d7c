//! Error types for the shutter core.

use thiserror::Error;

/// Errors raised by the pure protocol primitives.
#[derive(Debug, Error)]
pub enum CoreError {
    /// The event lacks the hardware fields the camera identity is derived from.
    #[error("missing camera identity: mac={mac:?} efuse={efuse:?}")]
    MissingIdentity { mac: String, efuse: String },

    /// The event has no (or a blank) declared location.
    #[error("missing location for camera {cam:?}")]
    MissingLocation { cam: String },

    /// The event could not be decoded at all.
    #[error("malformed event: {0}")]
    MalformedEvent(String),

    /// A digest did not have the hash's native output size.
    #[error("digest must be 32 bytes, got {0}")]
    DigestSizeInvalid(usize),

    /// Key material could not be turned into a secp256k1 signing key.
    #[error("invalid signing key: {0}")]
    InvalidSigningKey(String),

    /// The initialization vector has the wrong size.
    #[error("iv must be {expected} bytes, got {got}")]
    InvalidIv { expected: usize, got: usize },

    /// The ciphertext is not a whole number of cipher blocks.
    #[error("ciphertext length {0} is not a multiple of the block size")]
    CiphertextNotAligned(usize),

    /// PKCS#7 padding check failed after decryption.
    #[error("bad padding")]
    BadPadding,

    /// Decryption produced no photo bytes.
    #[error("decrypted payload is empty")]
    EmptyPayload,

    /// A symmetric key had the wrong size.
    #[error("invalid key length: expected {expected}, got {got}")]
    InvalidKeyLength { expected: usize, got: usize },

    /// A wallet address could not be parsed.
    #[error("invalid address: {0}")]
    InvalidAddress(String),

    /// A signature could not be parsed or recovered.
    #[error("invalid signature: {0}")]
    InvalidSignature(String),
}

/// Result type for core operations.
pub type Result<T> = std::result::Result<T, CoreError>;
