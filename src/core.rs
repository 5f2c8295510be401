//! Core domain types and service traits for alert dispatch
//!
//! This module defines the configuration schema records every output declares,
//! the payload and credential aliases passed between components, and the
//! trait contracts for the remote secret backends.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

/// An alert payload as handed over by the alert-routing layer.
///
/// The structure is owned by the rule pipeline; outputs only serialize it or
/// pick out well-known keys such as `record`.
pub type Alert = Value;

/// The merged secret configuration for one destination.
pub type Credentials = Map<String, Value>;

/// Describes one configuration field for an output integration.
///
/// Properties are declared by each output and never mutated afterwards; use
/// [`OutputProperty::with_value`] to derive a filled-in copy.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct OutputProperty {
    /// Human-readable prompt shown to the operator.
    pub description: String,
    /// The configured or hard-coded value.
    pub value: String,
    /// Must never be written to plaintext configuration.
    pub is_secret: bool,
    /// Must be present before credentials are usable.
    pub cred_requirement: bool,
}

impl OutputProperty {
    /// A plain, non-secret field that the operator fills in.
    pub fn new(description: impl Into<String>) -> Self {
        Self {
            description: description.into(),
            ..Default::default()
        }
    }

    /// A secret field that is also required for the credentials to be usable.
    pub fn secret_requirement(description: impl Into<String>) -> Self {
        Self {
            description: description.into(),
            is_secret: true,
            cred_requirement: true,
            ..Default::default()
        }
    }

    /// A hard-coded field carrying a fixed value.
    pub fn fixed(value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            ..Default::default()
        }
    }

    pub fn with_value(&self, value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            ..self.clone()
        }
    }
}

/// An ordered set of named [`OutputProperty`] entries.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PropertySchema {
    entries: Vec<(String, OutputProperty)>,
}

impl PropertySchema {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a field, replacing any earlier field of the same name in place.
    pub fn with(mut self, name: impl Into<String>, property: OutputProperty) -> Self {
        self.insert(name, property);
        self
    }

    pub fn insert(&mut self, name: impl Into<String>, property: OutputProperty) {
        let name = name.into();
        match self.entries.iter_mut().find(|(key, _)| *key == name) {
            Some((_, existing)) => *existing = property,
            None => self.entries.push((name, property)),
        }
    }

    pub fn get(&self, name: &str) -> Option<&OutputProperty> {
        self.entries
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, property)| property)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &OutputProperty)> {
        self.entries
            .iter()
            .map(|(key, property)| (key.as_str(), property))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Flattens the schema into name/value pairs for overlaying onto credentials.
    pub fn values(&self) -> Credentials {
        self.iter()
            .map(|(key, property)| (key.to_string(), Value::String(property.value.clone())))
            .collect()
    }
}

// =============================================================================
// Service Traits
// =============================================================================

/// Errors raised by the remote secret backends.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BackendError {
    #[error("object s3://{bucket}/{key} does not exist")]
    NotFound { bucket: String, key: String },

    #[error("object store access failed: {0}")]
    Access(String),

    #[error("decryption failed: {0}")]
    Decrypt(String),
}

/// Downloads encrypted credential blobs from remote object storage.
pub trait ObjectStore: Send + Sync {
    /// Fetches the full contents of `key` in `bucket`.
    ///
    /// # Returns
    /// * `Ok(bytes)` with the raw object body
    /// * `Err(BackendError::NotFound)` if the key does not exist
    /// * `Err(BackendError::Access)` for permission or transport problems
    fn download(&self, bucket: &str, key: &str) -> Result<Vec<u8>, BackendError>;
}

/// Decrypts ciphertext through a key-management service.
pub trait KeyManager: Send + Sync {
    /// Returns the plaintext for `ciphertext`, or `BackendError::Decrypt` if the
    /// service rejects it.
    fn decrypt(&self, ciphertext: &[u8]) -> Result<Vec<u8>, BackendError>;
}
