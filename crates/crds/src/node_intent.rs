//! NodeIntent CRD
//!
//! Declares the desired state of one network node: which provider driver
//! deploys it and where its parameters live.

use crate::condition::{Condition, ConditionType};
use crate::references::NodeConfigReference;
use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Finalizer placed on every live `NodeIntent`.
pub const NODE_INTENT_FINALIZER: &str = "nodedeployer.dcops.microscaler.io/finalizer";

#[derive(CustomResource, Debug, Clone, Serialize, Deserialize, JsonSchema, Default)]
#[kube(
    group = "dcops.microscaler.io",
    version = "v1alpha1",
    kind = "NodeIntent",
    namespaced,
    status = "NodeIntentStatus",
    printcolumn = r#"{"name":"Provider","type":"string","jsonPath":".spec.provider"}"#,
    printcolumn = r#"{"name":"Ready","type":"string","jsonPath":".status.conditions[?(@.type==\"Ready\")].status"}"#,
    printcolumn = r#"{"name":"Reason","type":"string","jsonPath":".status.conditions[?(@.type==\"Ready\")].reason"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct NodeIntentSpec {
    /// Provider identifier selecting the driver (e.g. "srlinux.nokia.com")
    pub provider: String,

    /// Explicit NodeConfig reference; name-matched and "default" configs are tried otherwise
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parameters_ref: Option<NodeConfigReference>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct NodeIntentStatus {
    /// Status conditions, at most one per type
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub conditions: Vec<Condition>,
}

impl NodeIntentStatus {
    /// Returns the condition of the given type, if present.
    #[must_use]
    pub fn condition(&self, type_: ConditionType) -> Option<&Condition> {
        self.conditions.iter().find(|c| c.type_ == type_)
    }

    /// Replaces the condition of the same type.
    ///
    /// The previous transition time is kept when the status does not change.
    /// Returns `false` when the stored condition already matched.
    pub fn set_condition(&mut self, mut condition: Condition) -> bool {
        match self.conditions.iter_mut().find(|c| c.type_ == condition.type_) {
            Some(existing) if existing.same_state(&condition) => false,
            Some(existing) => {
                if existing.status == condition.status {
                    condition.last_transition_time = existing.last_transition_time;
                }
                *existing = condition;
                true
            }
            None => {
                self.conditions.push(condition);
                true
            }
        }
    }
}

impl NodeIntent {
    /// Current Ready condition, if any pass has recorded one.
    #[must_use]
    pub fn ready_condition(&self) -> Option<&Condition> {
        self.status
            .as_ref()
            .and_then(|s| s.condition(ConditionType::Ready))
    }
}
