//! Controller-specific error types.
//!
//! Every variant's display text ends up in the `Ready` condition message of
//! the intent being reconciled.

use crate::bootstrap::CertificateError;
use crate::store::StoreError;
use device_client::DeviceError;
use kube::Error as KubeError;
use thiserror::Error;

/// Errors that can occur in the Node Deployer Controller.
#[derive(Debug, Error)]
pub enum ControllerError {
    /// Kubernetes API error
    #[error("Kubernetes error: {0}")]
    Kube(#[from] KubeError),

    /// Store or workload runtime call failed
    #[error("{0}")]
    Store(#[from] StoreError),

    /// No driver registered for the provider
    #[error("provider {provider:?} is not supported. supported providers are {supported:?}")]
    NotSupported {
        /// Requested provider
        provider: String,
        /// Registered providers, sorted and comma-joined
        supported: String,
    },

    /// A referenced object does not exist
    #[error("{kind} {namespace}/{name} not found")]
    NotFound {
        /// Object kind
        kind: &'static str,
        /// Object namespace
        namespace: String,
        /// Object name
        name: String,
    },

    /// The model is missing from the provider's variant catalog
    #[error("cannot deploy pod, variant not provided in the {provider} catalog, got: {model}")]
    UnsupportedModel {
        /// Provider whose catalog was consulted
        provider: String,
        /// Model that was requested
        model: String,
    },

    /// Workload exists but is not reachable yet
    #[error("{0}")]
    NotReady(String),

    /// A device session step failed
    #[error("bootstrap failed: {0}")]
    Bootstrap(#[from] DeviceError),

    /// Certificate bundle could not be extracted
    #[error("{0}")]
    Certificate(#[from] CertificateError),

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// JSON serialization failed
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Resource watch failed
    #[error("Resource watch failed: {0}")]
    Watch(String),
}

impl ControllerError {
    /// Convenience constructor for [`ControllerError::NotFound`]
    pub fn not_found(kind: &'static str, namespace: &str, name: &str) -> Self {
        Self::NotFound {
            kind,
            namespace: namespace.to_string(),
            name: name.to_string(),
        }
    }
}
