//! CNI network attachments for node interfaces.
//!
//! Each wired interface gets a `NetworkAttachmentDefinition` whose plugin
//! chain is a `wire` plugin bound to the interface followed by a `tuning`
//! plugin that lets the pod set the interface MAC.

use crate::error::ControllerError;
use crate::workload::owned_meta;
use crds::{NetworkAttachmentDefinition, NetworkAttachmentDefinitionSpec, NodeIntent};
use kube::ResourceExt;
use serde::Serialize;
use std::collections::BTreeMap;

/// CNI spec version of the generated chains
pub const CNI_VERSION: &str = "0.3.1";

/// Label recording which node interface an attachment wires
pub const INTERFACE_LABEL: &str = "dcops.microscaler.io/interface";

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct NadConfig<'a> {
    cni_version: &'a str,
    plugins: Vec<Plugin<'a>>,
}

#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
enum Plugin<'a> {
    #[serde(rename_all = "camelCase")]
    Wire { interface_name: &'a str },
    Tuning { capabilities: Capabilities },
}

/// Capability flags of the tuning plugin
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct Capabilities {
    /// Pod may request interface addresses
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub ips: bool,
    /// Pod may request the interface MAC
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub mac: bool,
}

/// CNI chain JSON for one interface.
pub fn nad_config(interface: &str, tuning: Option<Capabilities>) -> Result<String, serde_json::Error> {
    let mut plugins = vec![Plugin::Wire {
        interface_name: interface,
    }];
    if let Some(capabilities) = tuning {
        plugins.push(Plugin::Tuning { capabilities });
    }
    serde_json::to_string(&NadConfig {
        cni_version: CNI_VERSION,
        plugins,
    })
}

/// Name of the attachment for `interface` of intent `intent_name`
pub fn attachment_name(intent_name: &str, interface: &str) -> String {
    format!("{intent_name}-{interface}")
}

/// Attachment wiring `interface` of the intent's node, owned by the intent.
pub fn network_attachment(
    intent: &NodeIntent,
    interface: &str,
) -> Result<NetworkAttachmentDefinition, ControllerError> {
    let config = nad_config(
        interface,
        Some(Capabilities {
            mac: true,
            ..Default::default()
        }),
    )?;

    let mut metadata = owned_meta(intent, attachment_name(&intent.name_any(), interface))?;
    metadata.labels = Some(BTreeMap::from([(
        INTERFACE_LABEL.to_string(),
        interface.to_string(),
    )]));

    Ok(NetworkAttachmentDefinition {
        metadata,
        spec: NetworkAttachmentDefinitionSpec { config },
    })
}

#[derive(Debug, Serialize)]
struct NetworkSelection<'a> {
    name: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    interface: Option<&'a str>,
}

/// Value of the Multus networks annotation selecting the attachments.
///
/// `None` when there is nothing to attach.
pub fn networks_annotation(
    attachments: &[NetworkAttachmentDefinition],
) -> Result<Option<String>, serde_json::Error> {
    if attachments.is_empty() {
        return Ok(None);
    }
    let selections: Vec<NetworkSelection<'_>> = attachments
        .iter()
        .map(|nad| NetworkSelection {
            name: nad.metadata.name.as_deref().unwrap_or_default(),
            interface: nad.labels().get(INTERFACE_LABEL).map(String::as_str),
        })
        .collect();
    serde_json::to_string(&selections).map(Some)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::create_test_intent;

    #[test]
    fn test_wire_only_chain() {
        let config: serde_json::Value = serde_json::from_str(&nad_config("e1-1", None).unwrap()).unwrap();
        assert_eq!(
            config,
            serde_json::json!({
                "cniVersion": "0.3.1",
                "plugins": [{"type": "wire", "interfaceName": "e1-1"}]
            })
        );
    }

    #[test]
    fn test_tuning_capabilities_omit_false_flags() {
        let raw = nad_config("e1-2", Some(Capabilities { ips: false, mac: true })).unwrap();
        let config: serde_json::Value = serde_json::from_str(&raw).unwrap();
        assert_eq!(
            config["plugins"][1],
            serde_json::json!({"type": "tuning", "capabilities": {"mac": true}})
        );
    }

    #[test]
    fn test_attachment_named_after_intent_and_interface() {
        let intent = create_test_intent("node-a", "lab", "srlinux.nokia.com");
        let nad = network_attachment(&intent, "e1-1").unwrap();

        assert_eq!(nad.metadata.name.as_deref(), Some("node-a-e1-1"));
        assert_eq!(nad.metadata.namespace.as_deref(), Some("lab"));
        let owners = nad.metadata.owner_references.unwrap();
        assert_eq!(owners[0].name, "node-a");
        assert_eq!(owners[0].controller, Some(true));
    }

    #[test]
    fn test_networks_annotation() {
        let intent = create_test_intent("node-a", "lab", "srlinux.nokia.com");
        let nads = vec![
            network_attachment(&intent, "e1-1").unwrap(),
            network_attachment(&intent, "e1-2").unwrap(),
        ];
        let annotation: serde_json::Value =
            serde_json::from_str(&networks_annotation(&nads).unwrap().unwrap()).unwrap();
        assert_eq!(
            annotation,
            serde_json::json!([
                {"name": "node-a-e1-1", "interface": "e1-1"},
                {"name": "node-a-e1-2", "interface": "e1-2"}
            ])
        );
        assert_eq!(networks_annotation(&[]).unwrap(), None);
    }
}
