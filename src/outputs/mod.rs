//! Output dispatchers and the registry that selects them.
//!
//! Every destination integration implements [`OutputDispatcher`]. The trait
//! supplies the shared helpers (credential loading, config formatting, status
//! logging) on top of an [`OutputContext`] built once per dispatcher.

pub mod pagerduty;
pub mod phantom;
pub mod slack;

use crate::config::OutputsConfig;
use crate::core::{Alert, Credentials, KeyManager, ObjectStore, PropertySchema};
use crate::credentials::CredentialStore;
use crate::transport::TransportHelper;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info};

pub use pagerduty::PagerDutyOutput;
pub use phantom::PhantomOutput;
pub use slack::SlackOutput;

/// Service names understood by [`get_output_dispatcher`].
///
/// The `aws-s3` output, whose config maps descriptors to bucket ARNs, is not
/// provided; `OutputsConfig` only stores plain descriptor lists.
pub const SUPPORTED_SERVICES: &[&str] = &[
    SlackOutput::SERVICE,
    PagerDutyOutput::SERVICE,
    PhantomOutput::SERVICE,
];

/// The remote backends and cache root shared by every dispatcher.
#[derive(Clone)]
pub struct SecretBackends {
    pub object_store: Arc<dyn ObjectStore>,
    pub key_manager: Arc<dyn KeyManager>,
    pub cache_root: PathBuf,
}

/// Construction-time state of a dispatcher.
#[derive(Debug, Clone)]
pub struct OutputContext {
    service: String,
    config_service: Option<String>,
    credentials: CredentialStore,
    transport: TransportHelper,
}

impl OutputContext {
    /// Builds the context for `service` in `region`, scoping storage by `qualifier`.
    pub fn new(
        service: impl Into<String>,
        region: &str,
        qualifier: &str,
        backends: &SecretBackends,
    ) -> Self {
        Self {
            service: service.into(),
            config_service: None,
            credentials: CredentialStore::new(
                region,
                qualifier,
                backends.cache_root.clone(),
                backends.object_store.clone(),
                backends.key_manager.clone(),
            ),
            transport: TransportHelper::new(),
        }
    }

    /// Sets the name used for this service in the persisted outputs config.
    pub fn with_config_service(mut self, name: impl Into<String>) -> Self {
        self.config_service = Some(name.into());
        self
    }

    pub fn service(&self) -> &str {
        &self.service
    }

    /// The override name if one was set, else the service name.
    pub fn config_service_name(&self) -> &str {
        self.config_service.as_deref().unwrap_or(&self.service)
    }

    pub fn region(&self) -> &str {
        self.credentials.region()
    }

    pub fn credentials(&self) -> &CredentialStore {
        &self.credentials
    }

    pub fn transport(&self) -> &TransportHelper {
        &self.transport
    }
}

/// The contract every destination integration implements.
pub trait OutputDispatcher: Send + Sync {
    fn context(&self) -> &OutputContext;

    /// Fields the operator must configure, in prompt order.
    fn user_defined_properties(&self) -> PropertySchema;

    /// Fields hard-coded by the integration.
    fn default_properties(&self) -> Option<PropertySchema> {
        None
    }

    /// Sends `alert` to the destination named by `descriptor`.
    ///
    /// Integrations override this. The fallback only records that nothing was
    /// delivered and never contacts a remote system.
    fn dispatch(&self, _descriptor: &str, _rule_name: &str, _alert: &Alert) -> bool {
        error!(service = %self.service(), "unable to send alert for service");
        false
    }

    fn service(&self) -> &str {
        self.context().service()
    }

    fn config_service_name(&self) -> &str {
        self.context().config_service_name()
    }

    /// Resolves credentials for `descriptor` with this output's defaults overlaid.
    fn load_credentials(&self, descriptor: &str) -> Option<Credentials> {
        let defaults = self.default_properties();
        self.context()
            .credentials()
            .load_credentials(self.service(), descriptor, defaults.as_ref())
    }

    /// Returns the descriptor list for this service with the new descriptor appended.
    ///
    /// `config` is left untouched. A schema without a `descriptor` entry yields
    /// the existing list unchanged.
    fn format_output_config(&self, config: &OutputsConfig, props: &PropertySchema) -> Vec<String> {
        let mut descriptors = config.descriptors(self.config_service_name()).to_vec();
        if let Some(descriptor) = props.get("descriptor") {
            descriptors.push(descriptor.value.clone());
        }
        descriptors
    }

    fn log_dispatch_result(&self, success: bool) {
        if success {
            info!(service = %self.service(), "successfully sent alert");
        } else {
            error!(service = %self.service(), "failed to send alert");
        }
    }
}

/// Returns the dispatcher registered for `service`, or `None` if it is unknown.
pub fn get_output_dispatcher(
    service: &str,
    region: &str,
    qualifier: &str,
    backends: &SecretBackends,
) -> Option<Box<dyn OutputDispatcher>> {
    let context = OutputContext::new(service, region, qualifier, backends);
    match service {
        SlackOutput::SERVICE => Some(Box::new(SlackOutput::new(context))),
        PagerDutyOutput::SERVICE => Some(Box::new(PagerDutyOutput::new(context))),
        PhantomOutput::SERVICE => Some(Box::new(PhantomOutput::new(context))),
        _ => {
            error!(service = %service, "designated output service does not exist");
            None
        }
    }
}

/// The headline used by integrations that summarise a rule match.
pub(crate) fn rule_message(rule_name: &str) -> String {
    format!("StreamAlert Rule Triggered - {}", rule_name)
}
