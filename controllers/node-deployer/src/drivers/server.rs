//! Generic server driver.
//!
//! Runs a bare workload: no variants, no wiring and nothing to bootstrap.

use super::config::resolve_node_config;
use super::{BootstrapSecrets, DriverContext, ProviderDriver};
use crate::bootstrap::CertificateBundle;
use crate::error::ControllerError;
use crate::workload::{finish_pod, intent_key};
use async_trait::async_trait;
use crds::{NetworkAttachmentDefinition, NodeConfig, NodeIntent};
use device_client::Credentials;
use k8s_openapi::api::core::v1::{Container, Pod, PodSpec};

/// Provider identifier
pub const PROVIDER: &str = "x.server.com";

const DEFAULT_IMAGE: &str = "busybox:latest";

/// No-op driver for plain server workloads
#[derive(Debug)]
pub struct ServerDriver {
    context: DriverContext,
    provider: String,
}

impl ServerDriver {
    /// Driver registered under [`PROVIDER`]
    pub fn new(context: DriverContext) -> Self {
        Self::with_provider(context, PROVIDER)
    }

    /// Driver registered under another identifier
    pub fn with_provider(context: DriverContext, provider: impl Into<String>) -> Self {
        Self {
            context,
            provider: provider.into(),
        }
    }
}

#[async_trait]
impl ProviderDriver for ServerDriver {
    fn provider(&self) -> &str {
        &self.provider
    }

    async fn resolve_config(&self, intent: &NodeIntent) -> Result<NodeConfig, ControllerError> {
        resolve_node_config(
            self.context.store.as_ref(),
            self.context.config_namespace.as_deref(),
            &self.provider,
            intent,
        )
        .await
    }

    fn validate_model(&self, _config: &NodeConfig) -> Result<(), ControllerError> {
        Ok(())
    }

    fn build_network_attachments(
        &self,
        _intent: &NodeIntent,
        _config: &NodeConfig,
    ) -> Result<Vec<NetworkAttachmentDefinition>, ControllerError> {
        Ok(Vec::new())
    }

    fn build_workload_spec(
        &self,
        intent: &NodeIntent,
        config: &NodeConfig,
        _attachments: &[NetworkAttachmentDefinition],
    ) -> Result<Pod, ControllerError> {
        let (_, name) = intent_key(intent)?;
        let resources = config.spec.resource_requirements(&Default::default(), &Default::default());
        let spec = PodSpec {
            containers: vec![Container {
                name,
                image: Some(config.spec.image_or(DEFAULT_IMAGE).to_string()),
                resources: Some(resources),
                ..Default::default()
            }],
            ..Default::default()
        };
        finish_pod(intent, spec, None)
    }

    fn bootstrap_secrets(&self, _intent: &NodeIntent) -> Option<BootstrapSecrets> {
        None
    }

    async fn bootstrap(
        &self,
        _addresses: &[String],
        _credentials: &Credentials,
        _certificates: &CertificateBundle,
    ) -> Result<(), ControllerError> {
        Ok(())
    }
}
