//! Dispatches alerts to a Slack incoming webhook.

use super::{OutputContext, OutputDispatcher};
use crate::core::{Alert, OutputProperty, PropertySchema};
use crate::transport::is_success_response;
use serde::Serialize;
use serde_json::json;
use serde_json::ser::{PrettyFormatter, Serializer};
use tracing::{error, instrument};

/// Posts the pretty-printed alert as a code block to the descriptor's webhook.
pub struct SlackOutput {
    context: OutputContext,
}

impl SlackOutput {
    pub const SERVICE: &'static str = "slack";

    pub fn new(context: OutputContext) -> Self {
        Self { context }
    }

    fn format_message(alert: &Alert) -> String {
        json!({ "text": format!("```{}```", pretty_alert(alert)) }).to_string()
    }
}

/// Renders `alert` as JSON indented by four spaces.
fn pretty_alert(alert: &Alert) -> String {
    let mut buf = Vec::new();
    let formatter = PrettyFormatter::with_indent(b"    ");
    let mut ser = Serializer::with_formatter(&mut buf, formatter);
    match alert.serialize(&mut ser) {
        Ok(()) => String::from_utf8(buf).unwrap_or_else(|_| alert.to_string()),
        Err(_) => alert.to_string(),
    }
}

impl OutputDispatcher for SlackOutput {
    fn context(&self) -> &OutputContext {
        &self.context
    }

    fn user_defined_properties(&self) -> PropertySchema {
        PropertySchema::new()
            .with(
                "descriptor",
                OutputProperty::new(
                    "a short and unique descriptor for this Slack integration (ie: channel, group, etc)",
                ),
            )
            .with(
                "url",
                OutputProperty::secret_requirement("the full Slack webhook url, including the secret"),
            )
    }

    #[instrument(skip(self, alert), fields(service = "slack"))]
    fn dispatch(&self, descriptor: &str, rule_name: &str, alert: &Alert) -> bool {
        let Some(creds) = self.load_credentials(descriptor) else {
            self.log_dispatch_result(false);
            return false;
        };
        let Some(url) = creds.get("url").and_then(|value| value.as_str()) else {
            error!("slack credentials are missing a webhook url");
            self.log_dispatch_result(false);
            return false;
        };

        let success = match self
            .context
            .transport()
            .send(url, Self::format_message(alert), None, true)
        {
            Ok(response) => is_success_response(Some(&response)),
            Err(err) => {
                error!(error = %err, "Slack request failed");
                false
            }
        };

        self.log_dispatch_result(success);
        success
    }
}
