//! Nokia SR Linux driver.

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
pub const PROVIDER: &str = "srlinux.nokia.com";

const DEFAULT_IMAGE: &str = "ghcr.io/nokia/srlinux:latest";
const DEFAULT_MODEL: &str = "ixrd3l";

const READINESS_COMMAND: &str = "cat /etc/opt/srlinux/devices/app_ephemeral.mgmt_server.ready_for_config";

const VARIANT_VOLUME: &str = "variants";
const VARIANT_MOUNT_PATH: &str = "/tmp/topo";
const VARIANT_FILE: &str = "topo-template.yml";
const TOPOMAC_VOLUME: &str = "topomac-script";
const TOPOMAC_MOUNT_PATH: &str = "/tmp/topomac";
const ENTRYPOINT_VOLUME: &str = "k8s-entrypoint";
const ENTRYPOINT_MOUNT_PATH: &str = "/k8s-entrypoint.sh";
const ENTRYPOINT_FILE: &str = "k8s-entrypoint.sh";
const ENTRYPOINT_MODE: i32 = 0o777;
const LICENSE_VOLUME: &str = "license";
const LICENSE_MOUNT_PATH: &str = "/opt/srlinux/etc/license.key";
const LICENSE_FILE: &str = "license.key";

/// SR Linux family defaults served under `provider`
pub fn defaults(provider: &str) -> FamilyDefaults {
    FamilyDefaults {
        provider: provider.to_string(),
        image: DEFAULT_IMAGE.to_string(),
        model: DEFAULT_MODEL.to_string(),
        command: strings(&["/tini", "--", "fixuid", "-q", "/k8s-entrypoint.sh"]),
        args: strings(&["sudo", "bash", "-c", "touch /.dockerenv && /opt/srlinux/bin/sr_linux"]),
        env: vec![("SRLINUX".to_string(), "1".to_string())],
        requests: string_map(&[("cpu", "0.5"), ("memory", "1Gi")]),
        limits: string_map(&[]),
        interfaces: strings(&["e1-1", "e1-2"]),
        license_secret: "licenses.srl.nokia.com".to_string(),
        catalog: VariantCatalog::srlinux(),
        platform: Platform::NokiaSrl,
    }
}

/// Deploys SR Linux nodes
#[derive(Debug)]
pub struct SrlinuxDriver {
    context: DriverContext,
    defaults: FamilyDefaults,
}

impl SrlinuxDriver {
    /// Driver with the stock SR Linux defaults
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
            readiness_probe: Some(exec_probe(
                &[READINESS_COMMAND],
                ProbeTiming {
                    initial_delay: 10,
                    period: 5,
                    failure_threshold: 10,
                    ..Default::default()
                },
            )),
            volume_mounts: Some(self.volume_mounts(config)),
            ..Default::default()
        }
    }

    fn volumes(&self, intent_name: &str, config: &NodeConfig) -> Vec<Volume> {
        let provider = &self.defaults.provider;
        let model = config.spec.model_or(&self.defaults.model);

        let mut vols = vec![
            volumes::config_map(
                VARIANT_VOLUME,
                &format!("{provider}-variants"),
                vec![volumes::item(model, VARIANT_FILE)],
                None,
            ),
            volumes::config_map(TOPOMAC_VOLUME, &format!("{provider}-topomac-script"), Vec::new(), None),
            volumes::config_map(
                ENTRYPOINT_VOLUME,
                &format!("{provider}-k8s-entrypoint"),
                Vec::new(),
                Some(ENTRYPOINT_MODE),
            ),
        ];
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

    fn volume_mounts(&self, config: &NodeConfig) -> Vec<VolumeMount> {
        let mut mounts = vec![
            volumes::mount(VARIANT_VOLUME, VARIANT_MOUNT_PATH),
            volumes::mount(TOPOMAC_VOLUME, TOPOMAC_MOUNT_PATH),
            volumes::sub_path_mount(ENTRYPOINT_VOLUME, ENTRYPOINT_MOUNT_PATH, ENTRYPOINT_FILE),
        ];
        for pv in &config.spec.persistent_volumes {
            mounts.push(volumes::mount(&pv.name, &pv.mount_path));
        }
        if config.spec.license_key.is_some() {
            mounts.push(volumes::sub_path_mount(LICENSE_VOLUME, LICENSE_MOUNT_PATH, LICENSE_FILE));
        }
        mounts
    }
}

#[async_trait]
impl ProviderDriver for SrlinuxDriver {
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
            termination_grace_period_seconds: Some(0),
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
        let script = BootstrapScript::management_plane(certificates);
        bootstrap_first_address(&self.context, self.defaults.platform, addresses, credentials, &script).await
    }
}
