//! Workload spec building blocks.
//!
//! Drivers assemble their pods from these pure helpers, then call
//! [`finish_pod`] to attach identity, wiring annotations and the revision
//! hash used for drift detection.

pub mod hash;
pub mod volumes;

use crate::error::ControllerError;
use crate::store::StoreError;
use crds::{NodeConfigSpec, NodeIntent};
use k8s_openapi::api::core::v1::{
    Affinity, EnvVar, ExecAction, PersistentVolumeClaim, PersistentVolumeClaimSpec, Pod,
    PodAffinityTerm, PodAntiAffinity, PodSpec, Probe, VolumeResourceRequirements,
    WeightedPodAffinityTerm,
};
use k8s_openapi::apimachinery::pkg::api::resource::Quantity;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::{LabelSelector, LabelSelectorRequirement, ObjectMeta};
use kube::{Resource, ResourceExt};
use std::collections::BTreeMap;

pub use hash::{revision_of, stamp_revision};

/// Label grouping the pods of one topology (the intent namespace)
pub const TOPOLOGY_LABEL: &str = "dcops.microscaler.io/topology";
/// Marks pods whose interfaces are wired by the CNI chain
pub const WIRING_ANNOTATION: &str = "dcops.microscaler.io/wiring";
/// Multus network selection annotation
pub const NETWORKS_ANNOTATION: &str = "k8s.v1.cni.cncf.io/networks";

const HOSTNAME_TOPOLOGY_KEY: &str = "kubernetes.io/hostname";
const ANTI_AFFINITY_WEIGHT: i32 = 100;

/// Namespace and name of an intent.
pub fn intent_key(intent: &NodeIntent) -> Result<(String, String), ControllerError> {
    let namespace = intent.namespace().ok_or(StoreError::MissingField("namespace"))?;
    Ok((namespace, intent.name_any()))
}

/// Metadata for an object owned (and garbage collected) through the intent.
pub fn owned_meta(intent: &NodeIntent, name: String) -> Result<ObjectMeta, ControllerError> {
    let (namespace, _) = intent_key(intent)?;
    let owner = intent
        .controller_owner_ref(&())
        .ok_or(StoreError::MissingField("uid"))?;
    Ok(ObjectMeta {
        name: Some(name),
        namespace: Some(namespace),
        owner_references: Some(vec![owner]),
        ..Default::default()
    })
}

/// Prefer scheduling away from pods carrying the same `label_key=value`.
pub fn anti_affinity(label_key: &str, value: &str) -> Affinity {
    Affinity {
        pod_anti_affinity: Some(PodAntiAffinity {
            preferred_during_scheduling_ignored_during_execution: Some(vec![WeightedPodAffinityTerm {
                weight: ANTI_AFFINITY_WEIGHT,
                pod_affinity_term: PodAffinityTerm {
                    label_selector: Some(LabelSelector {
                        match_expressions: Some(vec![LabelSelectorRequirement {
                            key: label_key.to_string(),
                            operator: "In".to_string(),
                            values: Some(vec![value.to_string()]),
                        }]),
                        ..Default::default()
                    }),
                    topology_key: HOSTNAME_TOPOLOGY_KEY.to_string(),
                    ..Default::default()
                },
            }]),
            ..Default::default()
        }),
        ..Default::default()
    }
}

/// Probe timing in seconds
#[derive(Debug, Clone, Copy, Default)]
pub struct ProbeTiming {
    pub initial_delay: i32,
    pub period: i32,
    pub failure_threshold: i32,
    pub success_threshold: Option<i32>,
    pub timeout: Option<i32>,
}

/// Exec probe running `command` in the node container
pub fn exec_probe(command: &[&str], timing: ProbeTiming) -> Probe {
    Probe {
        exec: Some(ExecAction {
            command: Some(command.iter().map(|c| (*c).to_string()).collect()),
        }),
        initial_delay_seconds: Some(timing.initial_delay),
        period_seconds: Some(timing.period),
        failure_threshold: Some(timing.failure_threshold),
        success_threshold: timing.success_threshold,
        timeout_seconds: timing.timeout,
        ..Default::default()
    }
}

/// Plain name/value environment
pub fn env_vars(env: &[(String, String)]) -> Vec<EnvVar> {
    env.iter()
        .map(|(name, value)| EnvVar {
            name: name.clone(),
            value: Some(value.clone()),
            ..Default::default()
        })
        .collect()
}

/// Name of the claim backing persistent volume `volume` of an intent
pub fn claim_name(intent_name: &str, volume: &str) -> String {
    format!("{intent_name}-{volume}")
}

/// One ReadWriteOnce claim per configured persistent volume.
pub fn volume_claims(
    intent: &NodeIntent,
    config: &NodeConfigSpec,
) -> Result<Vec<PersistentVolumeClaim>, ControllerError> {
    let intent_name = intent.name_any();
    config
        .persistent_volumes
        .iter()
        .map(|pv| {
            let requests: BTreeMap<String, Quantity> = pv
                .requests
                .iter()
                .map(|(k, v)| (k.clone(), Quantity(v.clone())))
                .collect();
            Ok(PersistentVolumeClaim {
                metadata: owned_meta(intent, claim_name(&intent_name, &pv.name))?,
                spec: Some(PersistentVolumeClaimSpec {
                    access_modes: Some(vec!["ReadWriteOnce".to_string()]),
                    resources: Some(VolumeResourceRequirements {
                        requests: Some(requests),
                        ..Default::default()
                    }),
                    ..Default::default()
                }),
                ..Default::default()
            })
        })
        .collect()
}

/// Wraps a spec into the owned pod and stamps its revision hash.
///
/// The pod is named after the intent and labelled with its topology so the
/// anti-affinity term can see its siblings.
pub fn finish_pod(
    intent: &NodeIntent,
    spec: PodSpec,
    networks: Option<String>,
) -> Result<Pod, ControllerError> {
    let (namespace, name) = intent_key(intent)?;
    let mut metadata = owned_meta(intent, name)?;
    metadata.labels = Some(BTreeMap::from([(TOPOLOGY_LABEL.to_string(), namespace)]));

    let mut annotations = BTreeMap::from([(WIRING_ANNOTATION.to_string(), "true".to_string())]);
    if let Some(networks) = networks {
        annotations.insert(NETWORKS_ANNOTATION.to_string(), networks);
    }
    metadata.annotations = Some(annotations);

    let mut pod = Pod {
        metadata,
        spec: Some(spec),
        ..Default::default()
    };
    stamp_revision(&mut pod)?;
    Ok(pod)
}
