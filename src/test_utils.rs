//! In-memory fakes for the secret backends, plus a log capture helper.

use crate::core::{BackendError, KeyManager, ObjectStore};
use serde_json::Value;
use std::collections::HashMap;
use std::io;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

const CIPHERTEXT_MARKER: &[u8] = b"fake-kms:";

/// "Encrypts" a JSON document the way [`FakeKeyManager`] expects.
pub fn encrypt(value: &Value) -> Vec<u8> {
    let mut blob = CIPHERTEXT_MARKER.to_vec();
    blob.extend(serde_json::to_vec(value).unwrap_or_default());
    blob
}

/// Fake object store holding blobs in memory.
#[derive(Debug, Default)]
pub struct FakeObjectStore {
    objects: Mutex<HashMap<(String, String), Vec<u8>>>,
    downloads: AtomicUsize,
}

impl FakeObjectStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores a blob under `bucket`/`key`.
    pub fn put(&self, bucket: &str, key: &str, blob: Vec<u8>) {
        let mut objects = self.objects.lock().unwrap();
        objects.insert((bucket.to_string(), key.to_string()), blob);
    }

    /// Number of download attempts, successful or not.
    pub fn download_count(&self) -> usize {
        self.downloads.load(Ordering::SeqCst)
    }
}

impl ObjectStore for FakeObjectStore {
    fn download(&self, bucket: &str, key: &str) -> Result<Vec<u8>, BackendError> {
        self.downloads.fetch_add(1, Ordering::SeqCst);
        let objects = self.objects.lock().unwrap();
        objects
            .get(&(bucket.to_string(), key.to_string()))
            .cloned()
            .ok_or_else(|| BackendError::NotFound {
                bucket: bucket.to_string(),
                key: key.to_string(),
            })
    }
}

/// Fake key manager that accepts blobs produced by [`encrypt`].
#[derive(Debug, Default, Clone, Copy)]
pub struct FakeKeyManager;

impl KeyManager for FakeKeyManager {
    fn decrypt(&self, ciphertext: &[u8]) -> Result<Vec<u8>, BackendError> {
        ciphertext
            .strip_prefix(CIPHERTEXT_MARKER)
            .map(<[u8]>::to_vec)
            .ok_or_else(|| BackendError::Decrypt("InvalidCiphertextException".to_string()))
    }
}

#[derive(Clone, Default)]
struct SharedBuffer(Arc<Mutex<Vec<u8>>>);

impl io::Write for SharedBuffer {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Runs `f` with a scoped subscriber and returns its result with everything logged.
pub fn capture_logs<F, R>(f: F) -> (R, String)
where
    F: FnOnce() -> R,
{
    let buffer = SharedBuffer::default();
    let writer = buffer.clone();
    let subscriber = tracing_subscriber::fmt()
        .with_ansi(false)
        .with_max_level(tracing::Level::DEBUG)
        .with_writer(move || writer.clone())
        .finish();

    let result = tracing::subscriber::with_default(subscriber, f);
    let logs = String::from_utf8_lossy(&buffer.0.lock().unwrap()).into_owned();
    (result, logs)
}
