//! Relay configuration.
//!
//! Loaded once at startup from a TOML file and passed to the components
//! that need it. Every section has defaults except the secrets and the
//! submitter address, which must be provided.
//!
//! ```toml
//! [ledger]
//! submitter_address = "0xbaecd1f353293981312b558d663e41299f3baa34"
//!
//! [keys]
//! path = "camera_keys.json"
//! master_key = "..."   # 64 hex chars or 32 raw characters
//!
//! [device]
//! payload_key = "..."  # 32 hex chars or 16 raw characters
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use shutter_core::{parse_address, Address, PayloadKey};
use shutter_gateway::FireFlyConfig;
use shutter_store::MasterKey;
use thiserror::Error;
use zeroize::{Zeroize, Zeroizing};

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// I/O error reading the file.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// TOML parse error.
    #[error("parse error: {0}")]
    Parse(#[from] toml::de::Error),

    /// A value is present but unusable.
    #[error("validation error: {0}")]
    Validation(String),
}

/// A secret string from configuration.
///
/// Redacted in `Debug` and wiped on drop.
#[derive(Clone, Default, Deserialize)]
#[serde(transparent)]
pub struct Secret(String);

impl Secret {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl Drop for Secret {
    fn drop(&mut self) {
        self.0.zeroize();
    }
}

impl std::fmt::Debug for Secret {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.0.is_empty() {
            f.write_str("Secret(<empty>)")
        } else {
            f.write_str("Secret(<redacted>)")
        }
    }
}

/// Decode an `N`-byte secret given as `2N` hex characters or exactly `N`
/// raw characters.
pub fn decode_secret<const N: usize>(text: &str) -> Option<Zeroizing<[u8; N]>> {
    let mut out = Zeroizing::new([0u8; N]);
    if text.len() == 2 * N && hex::decode_to_slice(text, &mut out[..]).is_ok() {
        return Some(out);
    }
    if text.len() == N {
        out.copy_from_slice(text.as_bytes());
        return Some(out);
    }
    None
}

/// Top-level relay configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RelayConfig {
    #[serde(default)]
    pub ledger: LedgerConfig,

    #[serde(default)]
    pub storage: StorageConfig,

    #[serde(default)]
    pub keys: KeysConfig,

    #[serde(default)]
    pub device: DeviceConfig,

    #[serde(default)]
    pub broker: BrokerConfig,

    #[serde(default)]
    pub trigger: TriggerConfig,

    #[serde(default)]
    pub evidence: EvidenceConfig,

    #[serde(default)]
    pub relay: RelaySection,
}

impl RelayConfig {
    /// Load and validate configuration from a TOML file.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    /// Parse and validate configuration from a TOML string.
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Check every value that is parsed lazily.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.submitter()?;
        self.master_key()?;
        self.payload_key()?;
        if self.trigger.motion_token.trim().is_empty() {
            return Err(ConfigError::Validation(
                "trigger.motion_token must not be empty".to_string(),
            ));
        }
        Ok(())
    }

    /// The relay's own on-chain caller.
    pub fn submitter(&self) -> Result<Address, ConfigError> {
        if self.ledger.submitter_address.is_empty() {
            return Err(ConfigError::Validation(
                "ledger.submitter_address is required".to_string(),
            ));
        }
        parse_address(&self.ledger.submitter_address).map_err(|e| {
            ConfigError::Validation(format!("ledger.submitter_address: {e}"))
        })
    }

    pub fn master_key(&self) -> Result<MasterKey, ConfigError> {
        let bytes = decode_secret::<32>(self.keys.master_key.expose()).ok_or_else(|| {
            ConfigError::Validation(
                "keys.master_key must be 64 hex characters or 32 raw characters".to_string(),
            )
        })?;
        Ok(MasterKey::from_bytes(*bytes))
    }

    pub fn payload_key(&self) -> Result<PayloadKey, ConfigError> {
        let bytes = decode_secret::<16>(self.device.payload_key.expose()).ok_or_else(|| {
            ConfigError::Validation(
                "device.payload_key must be 32 hex characters or 16 raw characters".to_string(),
            )
        })?;
        Ok(PayloadKey::from_bytes(*bytes))
    }

    pub fn firefly(&self) -> FireFlyConfig {
        FireFlyConfig {
            api_url: self.ledger.api_url.clone(),
            namespace: self.ledger.namespace.clone(),
            api_name: self.ledger.api_name.clone(),
            query_timeout: Duration::from_secs(self.ledger.query_timeout_secs),
            submit_timeout: Duration::from_secs(self.ledger.submit_timeout_secs),
        }
    }
}

/// Ledger API settings.
#[derive(Debug, Clone, Deserialize)]
pub struct LedgerConfig {
    #[serde(default = "default_api_url")]
    pub api_url: String,

    #[serde(default = "default_namespace")]
    pub namespace: String,

    #[serde(default = "default_api_name")]
    pub api_name: String,

    /// Wallet the ledger sees as caller; its replay counter is used.
    #[serde(default)]
    pub submitter_address: String,

    #[serde(default = "default_query_timeout")]
    pub query_timeout_secs: u64,

    #[serde(default = "default_submit_timeout")]
    pub submit_timeout_secs: u64,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            api_url: default_api_url(),
            namespace: default_namespace(),
            api_name: default_api_name(),
            submitter_address: String::new(),
            query_timeout_secs: default_query_timeout(),
            submit_timeout_secs: default_submit_timeout(),
        }
    }
}

/// Content storage settings.
#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    #[serde(default = "default_add_url")]
    pub add_url: String,

    #[serde(default = "default_submit_timeout")]
    pub timeout_secs: u64,
}

impl StorageConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            add_url: default_add_url(),
            timeout_secs: default_submit_timeout(),
        }
    }
}

/// Key store settings.
#[derive(Debug, Clone, Deserialize)]
pub struct KeysConfig {
    #[serde(default = "default_keys_path")]
    pub path: PathBuf,

    #[serde(default)]
    pub master_key: Secret,
}

impl Default for KeysConfig {
    fn default() -> Self {
        Self {
            path: default_keys_path(),
            master_key: Secret::default(),
        }
    }
}

/// Settings shared with the capture devices.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct DeviceConfig {
    #[serde(default)]
    pub payload_key: Secret,
}

/// Broker topics.
#[derive(Debug, Clone, Deserialize)]
pub struct BrokerConfig {
    #[serde(default = "default_events_topic")]
    pub events_topic: String,

    #[serde(default = "default_capture_topic")]
    pub capture_topic: String,

    #[serde(default = "default_capture_payload")]
    pub capture_payload: String,
}

impl Default for BrokerConfig {
    fn default() -> Self {
        Self {
            events_topic: default_events_topic(),
            capture_topic: default_capture_topic(),
            capture_payload: default_capture_payload(),
        }
    }
}

/// Motion trigger settings.
#[derive(Debug, Clone, Deserialize)]
pub struct TriggerConfig {
    #[serde(default = "default_motion_token")]
    pub motion_token: String,

    #[serde(default = "default_cooldown")]
    pub cooldown_secs: u64,
}

impl TriggerConfig {
    pub fn cooldown(&self) -> Duration {
        Duration::from_secs(self.cooldown_secs)
    }
}

impl Default for TriggerConfig {
    fn default() -> Self {
        Self {
            motion_token: default_motion_token(),
            cooldown_secs: default_cooldown(),
        }
    }
}

/// Where evidence files are written.
#[derive(Debug, Clone, Deserialize)]
pub struct EvidenceConfig {
    #[serde(default = "default_evidence_dir")]
    pub dir: PathBuf,
}

impl Default for EvidenceConfig {
    fn default() -> Self {
        Self {
            dir: default_evidence_dir(),
        }
    }
}

/// Relay behaviour switches.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RelaySection {
    /// Hold a lock across counter fetch and submit so concurrent events
    /// from this relay never race each other for the same counter.
    #[serde(default)]
    pub serialize_submissions: bool,
}

fn default_api_url() -> String {
    "http://127.0.0.1:5000/api/v1".to_string()
}

fn default_namespace() -> String {
    "default".to_string()
}

fn default_api_name() -> String {
    "secCamv3".to_string()
}

fn default_query_timeout() -> u64 {
    30
}

fn default_submit_timeout() -> u64 {
    120
}

fn default_add_url() -> String {
    "http://127.0.0.1:5001/api/v0/add?recursive=true&wrap-with-directory=true".to_string()
}

fn default_keys_path() -> PathBuf {
    PathBuf::from("camera_keys.json")
}

fn default_events_topic() -> String {
    "camera1/alerts".to_string()
}

fn default_capture_topic() -> String {
    "camera1/capture".to_string()
}

fn default_capture_payload() -> String {
    "1".to_string()
}

fn default_motion_token() -> String {
    "MOTION".to_string()
}

fn default_cooldown() -> u64 {
    4
}

fn default_evidence_dir() -> PathBuf {
    PathBuf::from(".")
}
