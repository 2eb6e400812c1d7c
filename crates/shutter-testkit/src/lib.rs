//! # Shutter Testkit
//!
//! Testing utilities for the Shutter relay.
//!
//! ## Overview
//!
//! This crate provides:
//!
//! - **Golden vectors**: Complete capture events with the identity and digest
//!   the relay must derive from them
//! - **Generators**: Proptest strategies for property-based testing
//! - **Fixtures**: Cameras with known keys, encrypted events, and in-memory
//!   gateways wired together
//!
//! ## Golden Vectors
//!
//! ```rust
//! use shutter_testkit::vectors::verify_all_vectors;
//!
//! verify_all_vectors().unwrap();
//! ```
//!
//! ## Property Testing
//!
//! ```rust,ignore
//! use proptest::prelude::*;
//! use shutter_testkit::generators::RecordParams;
//!
//! proptest! {
//!     #[test]
//!     fn identity_is_deterministic(params: RecordParams) {
//!         prop_assert_eq!(params.identity(), params.identity());
//!     }
//! }
//! ```
//!
//! ## Test Fixtures
//!
//! ```rust
//! use shutter_testkit::fixtures::{device_key, sample_photo, TestCamera};
//!
//! let camera = TestCamera::reference();
//! let payload = camera.event(&device_key(), &sample_photo(b"1"));
//! assert!(!payload.is_empty());
//! ```

pub mod fixtures;
pub mod generators;
pub mod vectors;

pub use fixtures::{camera_fleet, device_key, relay_address, sample_photo, TestCamera, TestGateways};
pub use generators::RecordParams;
pub use vectors::{all_vectors, verify_all_vectors, EventVector};
