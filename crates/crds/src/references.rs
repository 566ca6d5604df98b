//! Object references used by node lifecycle CRDs

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Reference from a `NodeIntent` to the `NodeConfig` holding its parameters.
///
/// The namespace defaults to the controller's configured config namespace,
/// falling back to the namespace of the referencing intent.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct NodeConfigReference {
    /// Name of the referenced NodeConfig
    pub name: String,

    /// Namespace of the referenced NodeConfig
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
}

impl NodeConfigReference {
    /// Reference in the default scope
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            namespace: None,
        }
    }

    /// Reference pinned to a namespace
    pub fn with_namespace(name: impl Into<String>, namespace: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            namespace: Some(namespace.into()),
        }
    }
}
