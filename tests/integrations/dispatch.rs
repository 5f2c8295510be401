//! End-to-end dispatch through the registry with fake secret backends.

use alert_dispatch::config::OutputsConfig;
use alert_dispatch::core::OutputProperty;
use alert_dispatch::outputs::{get_output_dispatcher, SecretBackends};
use alert_dispatch::test_utils::{encrypt, FakeKeyManager, FakeObjectStore};
use alert_dispatch::PropertySchema;
use serde_json::json;
use std::sync::Arc;
use tempfile::TempDir;

const QUALIFIER: &str = "staging_streamalert_alert_processor";
const BUCKET: &str = "staging.streamalert.secrets";

fn backends(cache: &TempDir, objects: Arc<FakeObjectStore>) -> SecretBackends {
    SecretBackends {
        object_store: objects,
        key_manager: Arc::new(FakeKeyManager),
        cache_root: cache.path().join("streamalert_secrets"),
    }
}

#[test]
fn test_slack_dispatch_reuses_cached_credentials() {
    let mut server = mockito::Server::new();
    let hook = server
        .mock("POST", "/services/T000/B000")
        .with_status(200)
        .expect(2)
        .create();

    let cache = TempDir::new().unwrap();
    let objects = Arc::new(FakeObjectStore::new());
    objects.put(
        BUCKET,
        "slack_alerts",
        encrypt(&json!({ "url": format!("{}/services/T000/B000", server.url()) })),
    );
    let backends = backends(&cache, objects.clone());
    let dispatcher = get_output_dispatcher("slack", "us-west-2", QUALIFIER, &backends).unwrap();
    let alert = json!({ "rule_name": "s3_public", "record": { "bucket": "logs" } });

    assert!(dispatcher.dispatch("alerts", "s3_public", &alert));
    assert!(dispatcher.dispatch("alerts", "s3_public", &alert));

    hook.assert();
    assert_eq!(objects.download_count(), 1);
    assert!(cache
        .path()
        .join("streamalert_secrets")
        .join("slack_alerts")
        .is_file());
}

#[test]
fn test_unprovisioned_descriptor_does_not_block_others() {
    let mut server = mockito::Server::new();
    let hook = server.mock("POST", "/ok").with_status(200).create();

    let cache = TempDir::new().unwrap();
    let objects = Arc::new(FakeObjectStore::new());
    objects.put(
        BUCKET,
        "slack_ok",
        encrypt(&json!({ "url": format!("{}/ok", server.url()) })),
    );
    let backends = backends(&cache, objects);
    let dispatcher = get_output_dispatcher("slack", "us-west-2", QUALIFIER, &backends).unwrap();

    assert!(!dispatcher.dispatch("not_provisioned", "rule", &json!({})));
    assert!(dispatcher.dispatch("ok", "rule", &json!({})));
    hook.assert();
}

#[test]
fn test_register_flow_formats_descriptor_list() {
    let cache = TempDir::new().unwrap();
    let backends = backends(&cache, Arc::new(FakeObjectStore::new()));
    let dispatcher = get_output_dispatcher("pagerduty", "us-west-2", QUALIFIER, &backends).unwrap();

    let mut outputs: OutputsConfig =
        serde_json::from_value(json!({ "pagerduty": ["oncall"], "slack": ["ops"] })).unwrap();
    let props = PropertySchema::new().with(
        "descriptor",
        OutputProperty::new("descriptor").with_value("secops"),
    );

    let descriptors = dispatcher.format_output_config(&outputs, &props);
    assert_eq!(descriptors, vec!["oncall", "secops"]);
    assert_eq!(outputs.descriptors("pagerduty"), ["oncall".to_string()]);

    outputs.insert(dispatcher.config_service_name(), descriptors);
    assert!(outputs.contains("pagerduty", "secops"));
    assert!(outputs.contains("slack", "ops"));
}

#[test]
fn test_properties_mark_secrets() {
    let cache = TempDir::new().unwrap();
    let backends = backends(&cache, Arc::new(FakeObjectStore::new()));
    let dispatcher = get_output_dispatcher("phantom", "us-west-2", QUALIFIER, &backends).unwrap();

    let props = dispatcher.user_defined_properties();
    let secret: Vec<&str> = props
        .iter()
        .filter(|(_, p)| p.is_secret && p.cred_requirement)
        .map(|(name, _)| name)
        .collect();

    assert_eq!(secret, vec!["ph_auth_token", "url"]);
    assert!(dispatcher.default_properties().is_none());
}
