//! # Shutter Gateway
//!
//! Clients for the external services the relay depends on: the notarization
//! ledger (via a FireFly REST API) and content-addressed storage (via the
//! IPFS HTTP API).
//!
//! ## Key Types
//!
//! - [`Ledger`] - Authorization, dedupe, counter and submit operations
//! - [`FireFlyLedger`] - HTTP implementation of [`Ledger`]
//! - [`ContentStore`] - Upload of encrypted payloads
//! - [`IpfsStore`] - HTTP implementation of [`ContentStore`]
//! - [`MemoryLedger`], [`MemoryContentStore`] - In-memory versions for tests
//!
//! ## Response shapes
//!
//! Ledger responses vary in shape between gateway versions. Each is handled
//! by an explicit parse function in [`messages`].

pub mod error;
pub mod firefly;
pub mod ledger;
pub mod memory;
pub mod messages;
pub mod storage;

pub use error::{GatewayError, Result};
pub use firefly::{FireFlyConfig, FireFlyLedger};
pub use ledger::Ledger;
pub use memory::{LedgerCall, MemoryContentStore, MemoryLedger, SubmitFault};
pub use messages::AuthorizationState;
pub use storage::{ContentStore, IpfsStore, StorageLocator};
