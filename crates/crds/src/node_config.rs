//! NodeConfig CRD
//!
//! Provider-specific parameters for a node: device model, image, resource
//! constraints, license selection and persistent volumes.

use k8s_openapi::api::core::v1::ResourceRequirements;
use k8s_openapi::apimachinery::pkg::api::resource::Quantity;
use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(CustomResource, Debug, Clone, Serialize, Deserialize, JsonSchema, Default, PartialEq)]
#[kube(
    group = "dcops.microscaler.io",
    version = "v1alpha1",
    kind = "NodeConfig",
    namespaced,
    printcolumn = r#"{"name":"Provider","type":"string","jsonPath":".spec.provider"}"#,
    printcolumn = r#"{"name":"Model","type":"string","jsonPath":".spec.model"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct NodeConfigSpec {
    /// Provider this config applies to
    pub provider: String,

    /// Device model/variant name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,

    /// Container image reference
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,

    /// Resource quantities keyed by resource name (e.g. "cpu", "memory")
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub constraints: BTreeMap<String, String>,

    /// Key inside the provider license secret to mount
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub license_key: Option<String>,

    /// Persistent volumes to claim and mount
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub persistent_volumes: Vec<PersistentVolume>,
}

/// A persistent volume request
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PersistentVolume {
    /// Volume name, also the suffix of the claim name
    pub name: String,

    /// Mount path inside the node container
    pub mount_path: String,

    /// Storage requests (e.g. "storage": "1Gi")
    #[serde(default)]
    pub requests: BTreeMap<String, String>,
}

impl NodeConfigSpec {
    /// Empty config for a provider, used when no object matches.
    pub fn for_provider(provider: impl Into<String>) -> Self {
        Self {
            provider: provider.into(),
            ..Default::default()
        }
    }

    /// Model, or the given family default
    #[must_use]
    pub fn model_or<'a>(&'a self, default: &'a str) -> &'a str {
        self.model.as_deref().filter(|m| !m.is_empty()).unwrap_or(default)
    }

    /// Image, or the given family default
    #[must_use]
    pub fn image_or<'a>(&'a self, default: &'a str) -> &'a str {
        self.image.as_deref().filter(|i| !i.is_empty()).unwrap_or(default)
    }

    /// Overlays the configured constraints on family defaults.
    ///
    /// Every constraint lands in requests. Limits only take constraints for
    /// keys the family already limits.
    #[must_use]
    pub fn resource_requirements(
        &self,
        default_requests: &BTreeMap<String, String>,
        default_limits: &BTreeMap<String, String>,
    ) -> ResourceRequirements {
        let mut requests = to_quantities(default_requests);
        for (key, value) in &self.constraints {
            requests.insert(key.clone(), Quantity(value.clone()));
        }

        let mut limits = to_quantities(default_limits);
        for (key, value) in limits.iter_mut() {
            if let Some(constraint) = self.constraints.get(key) {
                *value = Quantity(constraint.clone());
            }
        }

        ResourceRequirements {
            requests: (!requests.is_empty()).then_some(requests),
            limits: (!limits.is_empty()).then_some(limits),
            ..Default::default()
        }
    }
}

fn to_quantities(values: &BTreeMap<String, String>) -> BTreeMap<String, Quantity> {
    values
        .iter()
        .map(|(k, v)| (k.clone(), Quantity(v.clone())))
        .collect()
}
