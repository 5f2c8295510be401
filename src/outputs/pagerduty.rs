//! Dispatches alerts to the PagerDuty generic events API.

use super::{rule_message, OutputContext, OutputDispatcher};
use crate::core::{Alert, OutputProperty, PropertySchema};
use crate::transport::is_success_response;
use serde_json::json;
use tracing::{error, instrument};

/// Events endpoint shared by every PagerDuty integration.
pub const EVENTS_URL: &str = "https://events.pagerduty.com/generic/2010-04-15/create_event.json";

/// Triggers a PagerDuty incident keyed by the rule name.
pub struct PagerDutyOutput {
    context: OutputContext,
    events_url: String,
}

impl PagerDutyOutput {
    pub const SERVICE: &'static str = "pagerduty";

    pub fn new(context: OutputContext) -> Self {
        Self::with_events_url(context, EVENTS_URL)
    }

    /// Points the integration at a different events endpoint, such as a proxy.
    pub fn with_events_url(context: OutputContext, events_url: impl Into<String>) -> Self {
        Self {
            context,
            events_url: events_url.into(),
        }
    }
}

impl OutputDispatcher for PagerDutyOutput {
    fn context(&self) -> &OutputContext {
        &self.context
    }

    fn user_defined_properties(&self) -> PropertySchema {
        PropertySchema::new()
            .with(
                "descriptor",
                OutputProperty::new("a short and unique descriptor for this PagerDuty integration"),
            )
            .with(
                "service_key",
                OutputProperty::secret_requirement("the service key for this PagerDuty integration"),
            )
    }

    fn default_properties(&self) -> Option<PropertySchema> {
        Some(PropertySchema::new().with("url", OutputProperty::fixed(self.events_url.as_str())))
    }

    #[instrument(skip(self, alert), fields(service = "pagerduty"))]
    fn dispatch(&self, descriptor: &str, rule_name: &str, alert: &Alert) -> bool {
        let Some(creds) = self.load_credentials(descriptor) else {
            self.log_dispatch_result(false);
            return false;
        };
        let (Some(url), Some(service_key)) = (
            creds.get("url").and_then(|value| value.as_str()),
            creds.get("service_key").and_then(|value| value.as_str()),
        ) else {
            error!("pagerduty credentials require both url and service_key");
            self.log_dispatch_result(false);
            return false;
        };

        let event = json!({
            "service_key": service_key,
            "event_type": "trigger",
            "incident_key": rule_name,
            "description": rule_message(rule_name),
            "details": alert,
            "client": "StreamAlert",
        });

        let success = match self.context.transport().send(url, event.to_string(), None, true) {
            Ok(response) => is_success_response(Some(&response)),
            Err(err) => {
                error!(error = %err, "PagerDuty request failed");
                false
            }
        };

        self.log_dispatch_result(success);
        success
    }
}
