//! # Shutter Relay
//!
//! Sits between capture devices and the notarization ledger. For each
//! encrypted capture event it proves which camera produced it, hashes the
//! photo, and records the digest on the ledger under the camera's own
//! signature.
//!
//! ## Key Types
//!
//! - [`Relay`] - The per-event pipeline
//! - [`Notary`] - Dedupe, sign, submit, and the single counter retry
//! - [`Trigger`] - Debounced motion sensor to capture command
//! - [`Broker`] - Where events come from and commands go to
//! - [`RelayConfig`] - Startup configuration
//!
//! ## Error handling
//!
//! Every failure is a [`RelayError`], and [`RelayError::class`] sorts it into
//! malformed input, security rejection, transport failure, integrity failure
//! or internal fault. Security rejections are logged on the
//! `shutter::security` target.

pub mod broker;
pub mod config;
pub mod error;
pub mod notary;
pub mod relay;
pub mod service;
pub mod trigger;

pub use broker::{Broker, BrokerMessage, LineBroker, MemoryBroker, StdioBroker};
pub use config::{decode_secret, ConfigError, RelayConfig, Secret};
pub use error::{ErrorClass, RelayError, Result};
pub use notary::{Notary, NotaryOutcome, NotaryRequest};
pub use relay::{log_rejection, new_event_id, HttpRelay, ProcessedEvent, Relay, RelaySettings, SECURITY_TARGET};
pub use service::{run_events, RunStats};
pub use trigger::{Debouncer, Trigger};
