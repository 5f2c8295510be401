//! Dispatches alerts to Phantom as a container plus an artifact.
//!
//! Phantom instances commonly run with self-signed certificates, so both
//! requests skip TLS verification.

use super::{rule_message, OutputContext, OutputDispatcher};
use crate::core::{Alert, OutputProperty, PropertySchema};
use crate::transport::is_success_response;
use serde_json::{json, Value};
use tracing::{error, instrument};

const AUTH_HEADER: &str = "ph-auth-token";

pub struct PhantomOutput {
    context: OutputContext,
}

impl PhantomOutput {
    pub const SERVICE: &'static str = "phantom";

    pub fn new(context: OutputContext) -> Self {
        Self { context }
    }

    /// Creates the container for this rule and returns its id.
    fn setup_container(&self, rule_name: &str, container_url: &str, token: &str) -> Option<Value> {
        let message = rule_message(rule_name);
        let container = json!({ "name": message, "description": message });

        let response = match self.context.transport().send(
            container_url,
            container.to_string(),
            Some(&[(AUTH_HEADER, token)][..]),
            false,
        ) {
            Ok(response) if is_success_response(Some(&response)) => response,
            Ok(response) => {
                error!(status = %response.status(), "Phantom rejected container");
                return None;
            }
            Err(err) => {
                error!(error = %err, "Phantom container request failed");
                return None;
            }
        };

        match response.json::<Value>() {
            Ok(body) => body.get("id").filter(|id| !id.is_null()).cloned(),
            Err(err) => {
                error!(error = %err, "an error occurred while decoding Phantom response");
                None
            }
        }
    }
}

fn join_url(base: &str, path: &str) -> String {
    format!("{}/{}", base.trim_end_matches('/'), path)
}

impl OutputDispatcher for PhantomOutput {
    fn context(&self) -> &OutputContext {
        &self.context
    }

    fn user_defined_properties(&self) -> PropertySchema {
        PropertySchema::new()
            .with(
                "descriptor",
                OutputProperty::new("a short and unique descriptor for this Phantom integration"),
            )
            .with(
                "ph_auth_token",
                OutputProperty::secret_requirement("the auth token for this Phantom integration"),
            )
            .with(
                "url",
                OutputProperty::secret_requirement("the endpoint url for this Phantom integration"),
            )
    }

    #[instrument(skip(self, alert), fields(service = "phantom"))]
    fn dispatch(&self, descriptor: &str, rule_name: &str, alert: &Alert) -> bool {
        let Some(creds) = self.load_credentials(descriptor) else {
            self.log_dispatch_result(false);
            return false;
        };
        let (Some(token), Some(url)) = (
            creds.get("ph_auth_token").and_then(|value| value.as_str()),
            creds.get("url").and_then(|value| value.as_str()),
        ) else {
            error!("phantom credentials require both ph_auth_token and url");
            self.log_dispatch_result(false);
            return false;
        };

        let container_url = join_url(url, "rest/container/");
        let Some(container_id) = self.setup_container(rule_name, &container_url, token) else {
            self.log_dispatch_result(false);
            return false;
        };

        let artifact = json!({
            "cef": alert.get("record").cloned().unwrap_or(Value::Null),
            "container_id": container_id,
            "data": alert,
            "name": "Phantom Artifact",
            "label": "Alert",
        });
        let artifact_url = join_url(url, "rest/artifact/");
        let success = match self.context.transport().send(
            &artifact_url,
            artifact.to_string(),
            Some(&[(AUTH_HEADER, token)][..]),
            false,
        ) {
            Ok(response) => is_success_response(Some(&response)),
            Err(err) => {
                error!(error = %err, "Phantom artifact request failed");
                false
            }
        };

        self.log_dispatch_result(success);
        success
    }
}
