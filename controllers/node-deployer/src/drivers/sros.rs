//! Nokia SR OS driver.
//!
//! Same bootstrap transcript as SR Linux plus a login banner, but a much
//! heavier pod: hugepages, startup/liveness probes instead of a readiness
//! probe, and a license file rather than a license key.

use super::config::resolve_node_config;
use super::{
    bootstrap_first_address, string_map, strings, BootstrapSecrets, DriverContext, FamilyDefaults,
    ProviderDriver, VariantCatalog,
};
use crate::bootstrap::{BootstrapScript, CertificateBundle};
use crate::error::ControllerError;
use crate::nad::networks_annotation;
use crate::workload::{self, anti_affinity, env_vars, exec_probe, finish_pod, intent_key, volumes, ProbeTiming, TOPOLOGY_LABEL};
use async_trait::async_trait;
use crds::{NetworkAttachmentDefinition, NodeConfig, NodeIntent};
use device_client::{Credentials, Platform};
use k8s_openapi::api::core::v1::{Container, Pod, PodSpec, SecurityContext, Volume, VolumeMount};

/// Provider identifier
pub const PROVIDER: &str = "sros.nokia.com";

const DEFAULT_IMAGE: &str = "vrnetlab/nokia_sros:latest";
const DEFAULT_MODEL: &str = "sr-1";

const STARTUP_PROBE: &str = "/opt/nokia/bin/startup_probe";
const LIVENESS_PROBE: &str = "/opt/nokia/bin/liveness_probe";

const LICENSE_VOLUME: &str = "license";
const LICENSE_MOUNT_PATH: &str = "/nokia/license/";
const LICENSE_FILE: &str = "license.txt";
const HUGEPAGES_VOLUME: &str = "hugepages";
const HUGEPAGES_MOUNT_PATH: &str = "/dev/hugepages";

const BANNER: &str = "Welcome to Nokia SROS!";

/// SR OS family defaults served under `provider`
pub fn defaults(provider: &str) -> FamilyDefaults {
    FamilyDefaults {
        provider: provider.to_string(),
        image: DEFAULT_IMAGE.to_string(),
        model: DEFAULT_MODEL.to_string(),
        command: strings(&["bin/tini"]),
        args: Vec::new(),
        env: Vec::new(),
        requests: string_map(&[("cpu", "2"), ("memory", "8Gi")]),
        limits: string_map(&[("cpu", "2"), ("memory", "8Gi"), ("hugepages-1Gi", "8Gi")]),
        interfaces: strings(&["e1-1", "e1-2"]),
        license_secret: "licenses.sros.nokia.com".to_string(),
        catalog: VariantCatalog::sros(),
        platform: Platform::NokiaSros,
    }
}

/// Deploys SR OS nodes
#[derive(Debug)]
pub struct SrosDriver {
    context: DriverContext,
    defaults: FamilyDefaults,
}

impl SrosDriver {
    /// Driver with the stock SR OS defaults
    pub fn new(context: DriverContext) -> Self {
        Self::with_defaults(context, defaults(PROVIDER))
    }

    /// Driver with custom defaults
    pub fn with_defaults(context: DriverContext, defaults: FamilyDefaults) -> Self {
        Self { context, defaults }
    }

    fn container(&self, name: &str, config: &NodeConfig) -> Container {
        let d = &self.defaults;
        Container {
            name: name.to_string(),
            image: Some(config.spec.image_or(&d.image).to_string()),
            command: Some(d.command.clone()),
            args: Some(d.args.clone()),
            env: Some(env_vars(&d.env)),
            resources: Some(config.spec.resource_requirements(&d.requests, &d.limits)),
            image_pull_policy: Some("IfNotPresent".to_string()),
            security_context: Some(SecurityContext {
                privileged: Some(true),
                run_as_user: Some(0),
                ..Default::default()
            }),
            tty: Some(true),
            stdin: Some(true),
            volume_mounts: Some(volume_mounts(config)),
            startup_probe: Some(exec_probe(
                &[STARTUP_PROBE],
                ProbeTiming {
                    initial_delay: 15,
                    period: 5,
                    failure_threshold: 3,
                    success_threshold: Some(1),
                    timeout: Some(1),
                },
            )),
            liveness_probe: Some(exec_probe(
                &[LIVENESS_PROBE],
                ProbeTiming {
                    initial_delay: 3,
                    period: 15,
                    failure_threshold: 3,
                    success_threshold: Some(1),
                    timeout: Some(1),
                },
            )),
            ..Default::default()
        }
    }

    fn volumes(&self, intent_name: &str, config: &NodeConfig) -> Vec<Volume> {
        let mut vols = vec![volumes::empty_dir(HUGEPAGES_VOLUME, "HugePages")];
        for pv in &config.spec.persistent_volumes {
            vols.push(volumes::claim(&pv.name, &workload::claim_name(intent_name, &pv.name)));
        }
        if let Some(key) = &config.spec.license_key {
            vols.push(volumes::secret(
                LICENSE_VOLUME,
                &self.defaults.license_secret,
                vec![volumes::item(key, LICENSE_FILE)],
            ));
        }
        vols
    }
}

fn volume_mounts(config: &NodeConfig) -> Vec<VolumeMount> {
    let mut mounts = vec![volumes::mount(HUGEPAGES_VOLUME, HUGEPAGES_MOUNT_PATH)];
    for pv in &config.spec.persistent_volumes {
        mounts.push(volumes::mount(&pv.name, &pv.mount_path));
    }
    if config.spec.license_key.is_some() {
        mounts.push(volumes::mount(LICENSE_VOLUME, LICENSE_MOUNT_PATH));
    }
    mounts
}

#[async_trait]
impl ProviderDriver for SrosDriver {
    fn provider(&self) -> &str {
        &self.defaults.provider
    }

    async fn resolve_config(&self, intent: &NodeIntent) -> Result<NodeConfig, ControllerError> {
        resolve_node_config(
            self.context.store.as_ref(),
            self.context.config_namespace.as_deref(),
            &self.defaults.provider,
            intent,
        )
        .await
    }

    fn validate_model(&self, config: &NodeConfig) -> Result<(), ControllerError> {
        self.defaults.validate_model(&config.spec)
    }

    fn build_network_attachments(
        &self,
        intent: &NodeIntent,
        _config: &NodeConfig,
    ) -> Result<Vec<NetworkAttachmentDefinition>, ControllerError> {
        self.defaults.attachments(intent)
    }

    fn build_workload_spec(
        &self,
        intent: &NodeIntent,
        config: &NodeConfig,
        attachments: &[NetworkAttachmentDefinition],
    ) -> Result<Pod, ControllerError> {
        let (namespace, name) = intent_key(intent)?;
        let spec = PodSpec {
            containers: vec![self.container(&name, config)],
            node_selector: Some(Default::default()),
            affinity: Some(anti_affinity(TOPOLOGY_LABEL, &namespace)),
            volumes: Some(self.volumes(&name, config)),
            ..Default::default()
        };
        finish_pod(intent, spec, networks_annotation(attachments)?)
    }

    fn bootstrap_secrets(&self, intent: &NodeIntent) -> Option<BootstrapSecrets> {
        Some(self.defaults.bootstrap_secrets(intent))
    }

    async fn bootstrap(
        &self,
        addresses: &[String],
        credentials: &Credentials,
        certificates: &CertificateBundle,
    ) -> Result<(), ControllerError> {
        let script = BootstrapScript::management_plane(certificates).with_login_banner(BANNER);
        bootstrap_first_address(&self.context, self.defaults.platform, addresses, credentials, &script).await
    }
}
