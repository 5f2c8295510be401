//! Alert dispatch - credential resolution and delivery for alert outputs
//!
//! This library resolves the encrypted secrets each output destination needs,
//! caches them locally, and defines the contract every output integration
//! implements to deliver an alert.

pub mod cli;
pub mod config;
pub mod core;
pub mod credentials;
pub mod outputs;
pub mod transport;

#[cfg(feature = "aws")]
pub mod aws;
#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

// Re-export core types for convenience
pub use crate::core::*;
pub use credentials::CredentialStore;
pub use outputs::{get_output_dispatcher, OutputContext, OutputDispatcher, SecretBackends};
pub use transport::{RequestFailure, TransportHelper};
