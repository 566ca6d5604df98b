//! Provider drivers.
//!
//! A driver knows how one device family is deployed: where its parameters
//! come from, which network attachments and volumes it needs, what its pod
//! looks like and how its management plane is bootstrapped.

pub mod catalog;
pub mod config;
pub mod registry;
pub mod server;
pub mod sros;
pub mod srlinux;


pub use catalog::VariantCatalog;
pub use registry::DriverRegistry;

use crate::bootstrap::{run_bootstrap, BootstrapScript, CertificateBundle};
use crate::error::ControllerError;
use crate::nad::network_attachment;
use crate::store::ClusterStore;
use async_trait::async_trait;
use crds::{NetworkAttachmentDefinition, NodeConfig, NodeConfigSpec, NodeIntent};
use device_client::{Credentials, Platform, SessionConnector, SessionTarget};
use k8s_openapi::api::core::v1::{PersistentVolumeClaim, Pod};
use kube::ResourceExt;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::debug;

/// Handles a driver is bound to
#[derive(Clone)]
pub struct DriverContext {
    pub store: Arc<dyn ClusterStore>,
    pub sessions: Arc<dyn SessionConnector>,
    /// Where NodeConfigs live; the intent namespace when unset
    pub config_namespace: Option<String>,
    pub ssh_port: u16,
}

impl std::fmt::Debug for DriverContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DriverContext")
            .field("config_namespace", &self.config_namespace)
            .field("ssh_port", &self.ssh_port)
            .finish_non_exhaustive()
    }
}

/// Secrets, in the intent namespace, needed to bootstrap a device
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BootstrapSecrets {
    /// Secret with `username`/`password`
    pub credentials: String,
    /// Secret with `ca.crt`/`tls.crt`/`tls.key`
    pub certificates: String,
}

/// Per-family deployment of a node
#[async_trait]
pub trait ProviderDriver: Send + Sync {
    /// Provider identifier this driver serves
    fn provider(&self) -> &str;

    /// Finds the NodeConfig that applies to the intent.
    async fn resolve_config(&self, intent: &NodeIntent) -> Result<NodeConfig, ControllerError>;

    /// Checks the resolved model against the family's variant catalog.
    fn validate_model(&self, config: &NodeConfig) -> Result<(), ControllerError>;

    /// One attachment per wired interface.
    fn build_network_attachments(
        &self,
        intent: &NodeIntent,
        config: &NodeConfig,
    ) -> Result<Vec<NetworkAttachmentDefinition>, ControllerError>;

    /// Claims for the configured persistent volumes.
    fn build_volume_claims(
        &self,
        intent: &NodeIntent,
        config: &NodeConfig,
    ) -> Result<Vec<PersistentVolumeClaim>, ControllerError> {
        crate::workload::volume_claims(intent, &config.spec)
    }

    /// The node pod, with its revision hash annotation set.
    fn build_workload_spec(
        &self,
        intent: &NodeIntent,
        config: &NodeConfig,
        attachments: &[NetworkAttachmentDefinition],
    ) -> Result<Pod, ControllerError>;

    /// Secrets the engine must fetch before bootstrapping; `None` skips
    /// bootstrap entirely.
    fn bootstrap_secrets(&self, intent: &NodeIntent) -> Option<BootstrapSecrets>;

    /// Configures the device's management plane.
    async fn bootstrap(
        &self,
        addresses: &[String],
        credentials: &Credentials,
        certificates: &CertificateBundle,
    ) -> Result<(), ControllerError>;
}

/// Defaults of a network-OS family, built once when the driver is created
#[derive(Debug, Clone)]
pub struct FamilyDefaults {
    pub provider: String,
    pub image: String,
    pub model: String,
    pub command: Vec<String>,
    pub args: Vec<String>,
    pub env: Vec<(String, String)>,
    pub requests: BTreeMap<String, String>,
    pub limits: BTreeMap<String, String>,
    /// Interfaces wired with network attachments
    pub interfaces: Vec<String>,
    /// Secret holding the family's licenses
    pub license_secret: String,
    pub catalog: VariantCatalog,
    pub platform: Platform,
}

impl FamilyDefaults {
    /// Fails unless the resolved model is in the catalog.
    pub fn validate_model(&self, config: &NodeConfigSpec) -> Result<(), ControllerError> {
        let model = config.model_or(&self.model);
        let interfaces = self
            .catalog
            .interfaces(model)
            .ok_or_else(|| ControllerError::UnsupportedModel {
                provider: self.provider.clone(),
                model: model.to_string(),
            })?;
        debug!(
            "{} model {} has {} interfaces: {}",
            self.provider,
            model,
            interfaces.len(),
            interfaces
                .iter()
                .map(|i| format!("{} ({})", i.name, i.speed))
                .collect::<Vec<_>>()
                .join(", ")
        );
        Ok(())
    }

    /// Attachments for the family's wired interfaces.
    pub fn attachments(&self, intent: &NodeIntent) -> Result<Vec<NetworkAttachmentDefinition>, ControllerError> {
        self.interfaces
            .iter()
            .map(|interface| network_attachment(intent, interface))
            .collect()
    }

    /// Network-OS devices log in with the provider-named credential secret
    /// and serve the certificate issued for the node.
    pub fn bootstrap_secrets(&self, intent: &NodeIntent) -> BootstrapSecrets {
        BootstrapSecrets {
            credentials: self.provider.clone(),
            certificates: intent.name_any(),
        }
    }
}

pub(crate) fn string_map(entries: &[(&str, &str)]) -> BTreeMap<String, String> {
    entries
        .iter()
        .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
        .collect()
}

pub(crate) fn strings(values: &[&str]) -> Vec<String> {
    values.iter().map(|v| (*v).to_string()).collect()
}

/// Runs the script against the first reported address.
pub(crate) async fn bootstrap_first_address(
    context: &DriverContext,
    platform: Platform,
    addresses: &[String],
    credentials: &Credentials,
    script: &BootstrapScript,
) -> Result<(), ControllerError> {
    let address = addresses
        .first()
        .ok_or_else(|| ControllerError::NotReady("no ip provided".to_string()))?;
    let target = SessionTarget {
        address: address.clone(),
        port: context.ssh_port,
        credentials: credentials.clone(),
        platform,
    };
    run_bootstrap(context.sessions.as_ref(), &target, script).await?;
    Ok(())
}

/// Registers every built-in driver.
pub fn register_providers(registry: &mut DriverRegistry) {
    registry.register(srlinux::PROVIDER, |ctx| Arc::new(srlinux::SrlinuxDriver::new(ctx)));
    registry.register(sros::PROVIDER, |ctx| Arc::new(sros::SrosDriver::new(ctx)));
    registry.register(server::PROVIDER, |ctx| Arc::new(server::ServerDriver::new(ctx)));
}
