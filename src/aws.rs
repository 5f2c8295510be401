//! S3 and KMS implementations of the secret backends.
//!
//! The SDK is async only; calls are driven to completion on a shared runtime
//! so the rest of the crate stays blocking.

use crate::config::AwsConfig;
use crate::core::{BackendError, KeyManager, ObjectStore};
use crate::outputs::SecretBackends;
use aws_config::{BehaviorVersion, Region, SdkConfig};
use aws_sdk_kms::primitives::Blob;
use once_cell::sync::Lazy;
use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::runtime::{self, Handle, Runtime};

static RUNTIME: Lazy<Runtime> = Lazy::new(|| {
    runtime::Builder::new_multi_thread()
        .enable_all()
        .thread_name("alert-dispatch-aws")
        .build()
        .expect("build aws runtime")
});

/// Runs a future to completion from synchronous code without nesting runtimes.
fn sync_await<F: Future>(fut: F) -> F::Output {
    if let Ok(handle) = Handle::try_current() {
        tokio::task::block_in_place(|| handle.block_on(fut))
    } else {
        RUNTIME.block_on(fut)
    }
}

/// Loads the shared SDK configuration for `region`.
pub fn load_sdk_config(region: &str) -> SdkConfig {
    sync_await(
        aws_config::defaults(BehaviorVersion::latest())
            .region(Region::new(region.to_string()))
            .load(),
    )
}

/// Builds S3/KMS backed [`SecretBackends`] for `region`.
pub fn build_backends(region: &str, overrides: &AwsConfig, cache_root: PathBuf) -> SecretBackends {
    let shared = load_sdk_config(region);
    SecretBackends {
        object_store: Arc::new(S3ObjectStore::new(&shared, overrides.s3_endpoint.as_deref())),
        key_manager: Arc::new(KmsKeyManager::new(&shared, overrides.kms_endpoint.as_deref())),
        cache_root,
    }
}

/// Downloads credential blobs from S3.
#[derive(Debug, Clone)]
pub struct S3ObjectStore {
    client: aws_sdk_s3::Client,
}

impl S3ObjectStore {
    pub fn new(shared: &SdkConfig, endpoint: Option<&str>) -> Self {
        let mut builder = aws_sdk_s3::config::Builder::from(shared);
        if let Some(endpoint) = endpoint.filter(|e| !e.trim().is_empty()) {
            builder = builder.endpoint_url(endpoint).force_path_style(true);
        }
        Self {
            client: aws_sdk_s3::Client::from_conf(builder.build()),
        }
    }
}

impl ObjectStore for S3ObjectStore {
    fn download(&self, bucket: &str, key: &str) -> Result<Vec<u8>, BackendError> {
        sync_await(async {
            let output = self
                .client
                .get_object()
                .bucket(bucket)
                .key(key)
                .send()
                .await
                .map_err(|err| {
                    if err.as_service_error().is_some_and(|e| e.is_no_such_key()) {
                        BackendError::NotFound {
                            bucket: bucket.to_string(),
                            key: key.to_string(),
                        }
                    } else {
                        BackendError::Access(aws_sdk_s3::error::DisplayErrorContext(&err).to_string())
                    }
                })?;
            let body = output
                .body
                .collect()
                .await
                .map_err(|err| BackendError::Access(err.to_string()))?;
            Ok(body.into_bytes().to_vec())
        })
    }
}

/// Decrypts credential blobs with KMS.
#[derive(Debug, Clone)]
pub struct KmsKeyManager {
    client: aws_sdk_kms::Client,
}

impl KmsKeyManager {
    pub fn new(shared: &SdkConfig, endpoint: Option<&str>) -> Self {
        let mut builder = aws_sdk_kms::config::Builder::from(shared);
        if let Some(endpoint) = endpoint.filter(|e| !e.trim().is_empty()) {
            builder = builder.endpoint_url(endpoint);
        }
        Self {
            client: aws_sdk_kms::Client::from_conf(builder.build()),
        }
    }
}

impl KeyManager for KmsKeyManager {
    fn decrypt(&self, ciphertext: &[u8]) -> Result<Vec<u8>, BackendError> {
        sync_await(async {
            let output = self
                .client
                .decrypt()
                .ciphertext_blob(Blob::new(ciphertext.to_vec()))
                .send()
                .await
                .map_err(|err| {
                    BackendError::Decrypt(aws_sdk_kms::error::DisplayErrorContext(&err).to_string())
                })?;
            output
                .plaintext()
                .map(|blob| blob.as_ref().to_vec())
                .ok_or_else(|| BackendError::Decrypt("response carried no plaintext".to_string()))
        })
    }
}
