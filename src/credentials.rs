//! Credential resolution for output destinations.
//!
//! Secrets for each `(service, descriptor)` pair live in the remote object store
//! as a KMS-encrypted JSON blob. Blobs are cached on local disk, keyed by their
//! credential name, and decrypted on every read. Any failure along the way is
//! logged and turns into an absent result, so a misconfigured destination never
//! stops alerts from reaching the others.

use crate::core::{BackendError, Credentials, KeyManager, ObjectStore, PropertySchema};
use serde_json::Value;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::NamedTempFile;
use thiserror::Error;
use tracing::{debug, error, warn};

/// Token appended to deployment qualifiers by the infrastructure.
pub const QUALIFIER_SUFFIX: &str = "_streamalert_alert_processor";

/// Suffix of the object store container holding the encrypted blobs.
pub const SECRETS_BUCKET_SUFFIX: &str = "streamalert.secrets";

/// Name of the cache directory created under the system temp directory.
pub const CACHE_DIR_NAME: &str = "streamalert_secrets";

/// The reasons a credential lookup can abstain.
#[derive(Error, Debug)]
pub enum CredentialError {
    #[error("local credential cache is unavailable: {0}")]
    Cache(#[from] io::Error),

    #[error("credentials could not be downloaded: {0}")]
    Download(#[source] BackendError),

    #[error("credentials could not be decrypted: {0}")]
    Decrypt(#[source] BackendError),

    #[error("decrypted credentials are not a JSON object: {0}")]
    Parse(String),
}

/// Derives the environment-scoped bucket prefix from a raw deployment qualifier.
///
/// `prod_east_streamalert_alert_processor` becomes `prod.east`.
pub fn format_qualifier(raw: &str) -> String {
    raw.replacen(QUALIFIER_SUFFIX, "", 1).replace('_', ".")
}

/// The cache and storage key for a destination: `service` or `service_descriptor`.
pub fn credential_name(service: &str, descriptor: &str) -> String {
    if descriptor.is_empty() {
        service.to_string()
    } else {
        format!("{}_{}", service, descriptor)
    }
}

/// The default process-wide cache root.
pub fn default_cache_root() -> PathBuf {
    std::env::temp_dir().join(CACHE_DIR_NAME)
}

/// Resolves, caches, and decrypts per-destination secrets.
#[derive(Clone)]
pub struct CredentialStore {
    region: String,
    prefix: String,
    cache_root: PathBuf,
    object_store: Arc<dyn ObjectStore>,
    key_manager: Arc<dyn KeyManager>,
}

impl std::fmt::Debug for CredentialStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CredentialStore")
            .field("region", &self.region)
            .field("prefix", &self.prefix)
            .field("cache_root", &self.cache_root)
            .finish_non_exhaustive()
    }
}

impl CredentialStore {
    /// Creates a new `CredentialStore`.
    ///
    /// # Arguments
    /// * `region` - Region the backends were built for, kept for diagnostics.
    /// * `qualifier` - Raw deployment qualifier, formatted with [`format_qualifier`].
    /// * `cache_root` - Directory used to cache encrypted blobs.
    pub fn new(
        region: impl Into<String>,
        qualifier: &str,
        cache_root: impl Into<PathBuf>,
        object_store: Arc<dyn ObjectStore>,
        key_manager: Arc<dyn KeyManager>,
    ) -> Self {
        Self {
            region: region.into(),
            prefix: format_qualifier(qualifier),
            cache_root: cache_root.into(),
            object_store,
            key_manager,
        }
    }

    pub fn region(&self) -> &str {
        &self.region
    }

    /// The formatted qualifier used as bucket prefix.
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Joins the stored prefix with `suffix` using a dot.
    pub fn bucket_name(&self, suffix: &str) -> String {
        format!("{}.{}", self.prefix, suffix)
    }

    pub fn secrets_bucket_name(&self) -> String {
        self.bucket_name(SECRETS_BUCKET_SUFFIX)
    }

    /// Returns the cache directory, creating it if needed.
    ///
    /// Any non-directory entry on the path, including a dangling symlink, is
    /// removed first.
    pub fn resolve_cache_dir(&self) -> io::Result<PathBuf> {
        let dir = &self.cache_root;
        match fs::symlink_metadata(dir) {
            Ok(meta) if !meta.is_dir() => {
                warn!(path = %dir.display(), "removing non-directory entry at credential cache path");
                fs::remove_file(dir)?;
            }
            Ok(_) => {}
            Err(err) if err.kind() == io::ErrorKind::NotFound => {}
            Err(err) => return Err(err),
        }
        fs::create_dir_all(dir)?;
        Ok(dir.clone())
    }

    /// Loads the usable credentials for a destination.
    ///
    /// `defaults` are the output's hard-coded properties. They are overlaid on
    /// the decrypted secrets and win on key collisions.
    ///
    /// # Returns
    /// * `Some(credentials)` when every step succeeded
    /// * `None` if the blob could not be fetched, decrypted, or parsed
    pub fn load_credentials(
        &self,
        service: &str,
        descriptor: &str,
        defaults: Option<&PropertySchema>,
    ) -> Option<Credentials> {
        let cred_name = credential_name(service, descriptor);
        match self.try_load(&cred_name, defaults) {
            Ok(credentials) => Some(credentials),
            Err(err) => {
                error!(
                    credential = %cred_name,
                    region = %self.region,
                    error = %err,
                    "failed to load credentials"
                );
                None
            }
        }
    }

    fn try_load(
        &self,
        cred_name: &str,
        defaults: Option<&PropertySchema>,
    ) -> Result<Credentials, CredentialError> {
        let local_path = self.resolve_cache_dir()?.join(cred_name);

        if !local_path.exists() {
            self.fetch_into_cache(cred_name, &local_path)?;
        } else {
            debug!(credential = %cred_name, "using cached credentials");
        }

        let encrypted = fs::read(&local_path)?;
        let plaintext = self
            .key_manager
            .decrypt(&encrypted)
            .map_err(CredentialError::Decrypt)?;

        let mut credentials = match serde_json::from_slice::<Value>(&plaintext) {
            Ok(Value::Object(map)) => map,
            Ok(other) => return Err(CredentialError::Parse(format!("found {}", kind_of(&other)))),
            Err(err) => return Err(CredentialError::Parse(err.to_string())),
        };

        if let Some(defaults) = defaults.filter(|schema| !schema.is_empty()) {
            credentials.extend(defaults.values());
        }

        Ok(credentials)
    }

    fn fetch_into_cache(&self, cred_name: &str, local_path: &Path) -> Result<(), CredentialError> {
        let bucket = self.secrets_bucket_name();
        debug!(credential = %cred_name, bucket = %bucket, "downloading credentials");
        let blob = self
            .object_store
            .download(&bucket, cred_name)
            .map_err(CredentialError::Download)?;

        // Stage next to the target so the rename stays on one filesystem.
        let dir = local_path.parent().unwrap_or_else(|| Path::new("."));
        let mut staged = NamedTempFile::new_in(dir)?;
        staged.write_all(&blob)?;
        staged.flush()?;
        staged.persist(local_path).map_err(|err| err.error)?;
        Ok(())
    }
}

fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::OutputProperty;
    use crate::test_utils::{capture_logs, encrypt, FakeKeyManager, FakeObjectStore};
    use serde_json::json;
    use tempfile::TempDir;

    fn create_store(
        cache: &TempDir,
        objects: Arc<FakeObjectStore>,
    ) -> CredentialStore {
        CredentialStore::new(
            "us-east-1",
            "prod_streamalert_alert_processor",
            cache.path().join("secrets"),
            objects,
            Arc::new(FakeKeyManager),
        )
    }

    #[test]
    fn test_format_qualifier_strips_suffix() {
        assert_eq!(format_qualifier("prod_streamalert_alert_processor"), "prod");
        assert_eq!(
            format_qualifier("prod_east_streamalert_alert_processor"),
            "prod.east"
        );
    }

    #[test]
    fn test_format_qualifier_strips_suffix_only_once() {
        assert_eq!(
            format_qualifier("a_streamalert_alert_processor_streamalert_alert_processor"),
            "a.streamalert.alert.processor"
        );
        assert_eq!(format_qualifier("no_suffix_here"), "no.suffix.here");
    }

    #[test]
    fn test_credential_name() {
        assert_eq!(credential_name("slack", ""), "slack");
        assert_eq!(credential_name("slack", "alerts"), "slack_alerts");
        assert_eq!(credential_name("pagerduty", "team_a"), "pagerduty_team_a");
    }

    #[test]
    fn test_bucket_name() {
        let cache = TempDir::new().unwrap();
        let store = create_store(&cache, Arc::new(FakeObjectStore::new()));

        assert_eq!(store.bucket_name("logs"), "prod.logs");
        assert_eq!(store.secrets_bucket_name(), "prod.streamalert.secrets");
    }

    #[test]
    fn test_resolve_cache_dir_creates_directory() {
        let cache = TempDir::new().unwrap();
        let store = create_store(&cache, Arc::new(FakeObjectStore::new()));

        let dir = store.resolve_cache_dir().unwrap();
        assert!(dir.is_dir());
        assert_eq!(dir, cache.path().join("secrets"));
    }

    #[test]
    fn test_resolve_cache_dir_replaces_regular_file() {
        let cache = TempDir::new().unwrap();
        fs::write(cache.path().join("secrets"), b"not a directory").unwrap();
        let store = create_store(&cache, Arc::new(FakeObjectStore::new()));

        let dir = store.resolve_cache_dir().unwrap();
        assert!(dir.is_dir());
    }

    #[cfg(unix)]
    #[test]
    fn test_resolve_cache_dir_replaces_dangling_symlink() {
        let cache = TempDir::new().unwrap();
        std::os::unix::fs::symlink(cache.path().join("gone"), cache.path().join("secrets")).unwrap();
        let objects = Arc::new(FakeObjectStore::new());
        objects.put(
            "prod.streamalert.secrets",
            "slack_alerts",
            encrypt(&json!({ "url": "https://hooks/x" })),
        );
        let store = create_store(&cache, objects);

        let dir = store.resolve_cache_dir().unwrap();
        assert!(dir.is_dir());
        assert!(!fs::symlink_metadata(&dir).unwrap().file_type().is_symlink());
        assert!(store.load_credentials("slack", "alerts", None).is_some());
    }

    #[test]
    fn test_cache_fill_leaves_only_complete_blob() {
        let cache = TempDir::new().unwrap();
        let objects = Arc::new(FakeObjectStore::new());
        let blob = encrypt(&json!({ "url": "https://hooks/x" }));
        objects.put("prod.streamalert.secrets", "slack_alerts", blob.clone());
        let store = create_store(&cache, objects);

        assert!(store.load_credentials("slack", "alerts", None).is_some());

        let dir = cache.path().join("secrets");
        let entries: Vec<_> = fs::read_dir(&dir)
            .unwrap()
            .map(|entry| entry.unwrap().file_name())
            .collect();
        assert_eq!(entries, vec![std::ffi::OsString::from("slack_alerts")]);
        assert_eq!(fs::read(dir.join("slack_alerts")).unwrap(), blob);
    }

    #[test]
    fn test_load_credentials_end_to_end_then_cache_hit() {
        let cache = TempDir::new().unwrap();
        let objects = Arc::new(FakeObjectStore::new());
        objects.put(
            "prod.streamalert.secrets",
            "slack_alerts",
            encrypt(&json!({ "url": "https://hooks/x" })),
        );
        let store = create_store(&cache, objects.clone());

        let first = store.load_credentials("slack", "alerts", None).unwrap();
        assert_eq!(Value::Object(first.clone()), json!({ "url": "https://hooks/x" }));
        assert!(cache.path().join("secrets").join("slack_alerts").is_file());
        assert_eq!(objects.download_count(), 1);

        let second = store.load_credentials("slack", "alerts", None).unwrap();
        assert_eq!(first, second);
        assert_eq!(objects.download_count(), 1);
    }

    #[test]
    fn test_defaults_override_secret_values() {
        let cache = TempDir::new().unwrap();
        let objects = Arc::new(FakeObjectStore::new());
        objects.put(
            "prod.streamalert.secrets",
            "pagerduty",
            encrypt(&json!({ "a": "1", "b": "2" })),
        );
        let store = create_store(&cache, objects);
        let defaults = PropertySchema::new().with("b", OutputProperty::fixed("9"));

        let credentials = store
            .load_credentials("pagerduty", "", Some(&defaults))
            .unwrap();
        assert_eq!(Value::Object(credentials), json!({ "a": "1", "b": "9" }));
    }

    #[test]
    fn test_missing_blob_abstains_and_logs_once() {
        let cache = TempDir::new().unwrap();
        let store = create_store(&cache, Arc::new(FakeObjectStore::new()));

        let (result, logs) = capture_logs(|| store.load_credentials("slack", "missing", None));

        assert!(result.is_none());
        assert_eq!(logs.matches("failed to load credentials").count(), 1);
        assert!(logs.contains("slack_missing"));
        assert!(!cache.path().join("secrets").join("slack_missing").exists());
    }

    #[test]
    fn test_decrypt_failure_abstains() {
        let cache = TempDir::new().unwrap();
        let objects = Arc::new(FakeObjectStore::new());
        objects.put("prod.streamalert.secrets", "slack_bad", b"garbage".to_vec());
        let store = create_store(&cache, objects);

        assert!(store.load_credentials("slack", "bad", None).is_none());
    }

    #[test]
    fn test_non_object_plaintext_abstains() {
        let cache = TempDir::new().unwrap();
        let objects = Arc::new(FakeObjectStore::new());
        objects.put("prod.streamalert.secrets", "slack_list", encrypt(&json!(["a"])));
        let store = create_store(&cache, objects);

        assert!(store.load_credentials("slack", "list", None).is_none());
    }
}
