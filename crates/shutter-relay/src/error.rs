//! Error types for the relay.

use shutter_core::CoreError;
use shutter_gateway::GatewayError;
use shutter_store::StoreError;
use thiserror::Error;

use crate::config::ConfigError;

/// Coarse classification used to route log output.
///
/// Security rejections go to a dedicated log target so monitoring can tell
/// attack attempts from outages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorClass {
    /// The event itself was unusable.
    MalformedInput,
    /// Unknown identity, unreadable key, unauthorized camera, wallet mismatch.
    Security,
    /// A broker, storage or ledger call failed.
    Transport,
    /// The payload failed decryption checks.
    Integrity,
    /// Local faults: configuration, disk, programming errors.
    Internal,
}

impl ErrorClass {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::MalformedInput => "malformed_input",
            Self::Security => "security",
            Self::Transport => "transport",
            Self::Integrity => "integrity",
            Self::Internal => "internal",
        }
    }
}

impl std::fmt::Display for ErrorClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors that can occur while relaying an event.
#[derive(Debug, Error)]
pub enum RelayError {
    /// Decoding, crypto or encoding error.
    #[error("core error: {0}")]
    Core(#[from] CoreError),

    /// Key store or evidence error.
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    /// External service error.
    #[error("gateway error: {0}")]
    Gateway(#[from] GatewayError),

    /// An external call failed while handling a known camera and photo.
    #[error("{source} (camera {camera_id}, digest {digest})")]
    External {
        camera_id: String,
        digest: String,
        #[source]
        source: GatewayError,
    },

    /// The ledger does not authorize this camera.
    #[error("camera {camera_id} is not authorized")]
    Unauthorized { camera_id: String },

    /// The locally held key does not control the wallet the ledger declares.
    #[error("camera {camera_id}: key controls {derived}, ledger declares {expected}")]
    WalletMismatch {
        camera_id: String,
        expected: String,
        derived: String,
    },

    /// Submission failed and the single retry did not recover it.
    #[error("notarization of {digest} for camera {camera_id} failed after {attempts} attempt(s): {reason}")]
    NotarizationFailed {
        camera_id: String,
        digest: String,
        attempts: u32,
        reason: String,
    },

    /// Configuration error.
    #[error("config error: {0}")]
    Config(#[from] ConfigError),

    /// The broker could not deliver or publish a message.
    #[error("broker error: {0}")]
    Broker(String),
}

impl RelayError {
    /// Classify this error.
    pub fn class(&self) -> ErrorClass {
        match self {
            Self::Core(e) => match e {
                CoreError::MissingIdentity { .. }
                | CoreError::MissingLocation { .. }
                | CoreError::MalformedEvent(_)
                | CoreError::InvalidIv { .. } => ErrorClass::MalformedInput,
                CoreError::CiphertextNotAligned(_)
                | CoreError::BadPadding
                | CoreError::EmptyPayload
                | CoreError::DigestSizeInvalid(_) => ErrorClass::Integrity,
                CoreError::InvalidSigningKey(_) => ErrorClass::Security,
                CoreError::InvalidKeyLength { .. }
                | CoreError::InvalidAddress(_)
                | CoreError::InvalidSignature(_) => ErrorClass::Internal,
            },
            Self::Store(e) => match e {
                StoreError::IdentityUnknown(_)
                | StoreError::KeyStoreCorrupt(_)
                | StoreError::WalletMismatch { .. } => ErrorClass::Security,
                _ => ErrorClass::Internal,
            },
            Self::Gateway(GatewayError::Setup(_))
            | Self::External {
                source: GatewayError::Setup(_),
                ..
            } => ErrorClass::Internal,
            Self::External { .. } => ErrorClass::Transport,
            Self::Gateway(_) => ErrorClass::Transport,
            Self::Unauthorized { .. } | Self::WalletMismatch { .. } => ErrorClass::Security,
            Self::NotarizationFailed { .. } | Self::Broker(_) => ErrorClass::Transport,
            Self::Config(_) => ErrorClass::Internal,
        }
    }

    pub fn is_security(&self) -> bool {
        self.class() == ErrorClass::Security
    }
}

/// Result type for relay operations.
pub type Result<T> = std::result::Result<T, RelayError>;
