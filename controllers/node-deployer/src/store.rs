//! Cluster store abstraction for mocking
//!
//! Groups the desired-state store, the workload runtime and the credential
//! store behind one trait. `KubeStore` talks to the API server; tests use
//! `MockStore` from `test_utils`.

use async_trait::async_trait;
use crds::{NetworkAttachmentDefinition, NodeConfig, NodeIntent};
use k8s_openapi::api::core::v1::{PersistentVolumeClaim, Pod, Secret};
use kube::api::{DeleteParams, ListParams, Patch, PatchParams, PostParams};
use kube::{Api, Client, ResourceExt};
use thiserror::Error;
use tracing::debug;

/// Field manager used for server-side apply
pub const FIELD_MANAGER: &str = "node-deployer";

/// Errors returned by a [`ClusterStore`]
#[derive(Debug, Error)]
pub enum StoreError {
    /// Kubernetes API error
    #[error("Kubernetes error: {0}")]
    Kube(#[from] kube::Error),

    /// Object is missing identity needed for the call
    #[error("object has no {0}")]
    MissingField(&'static str),

    /// Any other backend failure
    #[error("{0}")]
    Backend(String),
}

/// Store operations needed by the reconciliation engine
///
/// All async methods must be `Send` to work with Tokio's work-stealing runtime.
#[async_trait]
pub trait ClusterStore: Send + Sync {
    // Desired-state store
    async fn get_intent(&self, namespace: &str, name: &str) -> Result<Option<NodeIntent>, StoreError>;
    async fn update_intent_status(&self, intent: &NodeIntent) -> Result<(), StoreError>;
    async fn add_finalizer(&self, intent: &NodeIntent, finalizer: &str) -> Result<(), StoreError>;
    async fn remove_finalizer(&self, intent: &NodeIntent, finalizer: &str) -> Result<(), StoreError>;
    async fn get_node_config(&self, namespace: &str, name: &str) -> Result<Option<NodeConfig>, StoreError>;
    async fn list_node_configs(&self, namespace: &str) -> Result<Vec<NodeConfig>, StoreError>;
    /// Creates or updates the attachment; returns whether anything was written.
    async fn apply_network_attachment(&self, nad: &NetworkAttachmentDefinition) -> Result<bool, StoreError>;
    /// Creates the claim if missing; returns whether it was created.
    async fn apply_volume_claim(&self, pvc: &PersistentVolumeClaim) -> Result<bool, StoreError>;

    // Workload runtime
    async fn get_pod(&self, namespace: &str, name: &str) -> Result<Option<Pod>, StoreError>;
    async fn create_pod(&self, pod: &Pod) -> Result<(), StoreError>;
    async fn delete_pod(&self, namespace: &str, name: &str) -> Result<(), StoreError>;

    // Credential store
    async fn get_secret(&self, namespace: &str, name: &str) -> Result<Option<Secret>, StoreError>;
}

/// [`ClusterStore`] backed by the Kubernetes API
#[derive(Clone)]
pub struct KubeStore {
    client: Client,
}

impl std::fmt::Debug for KubeStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KubeStore").finish_non_exhaustive()
    }
}

impl KubeStore {
    /// Wraps a kube client
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    fn intents(&self, namespace: &str) -> Api<NodeIntent> {
        Api::namespaced(self.client.clone(), namespace)
    }

    async fn patch_finalizers(&self, intent: &NodeIntent, finalizers: Vec<String>) -> Result<(), StoreError> {
        let namespace = intent.namespace().ok_or(StoreError::MissingField("namespace"))?;
        let patch = serde_json::json!({
            "metadata": {
                "finalizers": finalizers
            }
        });
        self.intents(&namespace)
            .patch(&intent.name_any(), &PatchParams::default(), &Patch::Merge(&patch))
            .await?;
        Ok(())
    }
}

fn object_key<K: ResourceExt>(obj: &K) -> Result<(String, String), StoreError> {
    let namespace = obj.namespace().ok_or(StoreError::MissingField("namespace"))?;
    let name = obj.meta().name.clone().ok_or(StoreError::MissingField("name"))?;
    Ok((namespace, name))
}

#[async_trait]
impl ClusterStore for KubeStore {
    async fn get_intent(&self, namespace: &str, name: &str) -> Result<Option<NodeIntent>, StoreError> {
        Ok(self.intents(namespace).get_opt(name).await?)
    }

    async fn update_intent_status(&self, intent: &NodeIntent) -> Result<(), StoreError> {
        let (namespace, name) = object_key(intent)?;
        let patch = serde_json::json!({ "status": intent.status });
        self.intents(&namespace)
            .patch_status(&name, &PatchParams::default(), &Patch::Merge(&patch))
            .await?;
        Ok(())
    }

    async fn add_finalizer(&self, intent: &NodeIntent, finalizer: &str) -> Result<(), StoreError> {
        if intent.finalizers().iter().any(|f| f == finalizer) {
            return Ok(());
        }
        let mut finalizers = intent.finalizers().to_vec();
        finalizers.push(finalizer.to_string());
        self.patch_finalizers(intent, finalizers).await
    }

    async fn remove_finalizer(&self, intent: &NodeIntent, finalizer: &str) -> Result<(), StoreError> {
        if !intent.finalizers().iter().any(|f| f == finalizer) {
            return Ok(());
        }
        let finalizers = intent
            .finalizers()
            .iter()
            .filter(|f| f.as_str() != finalizer)
            .cloned()
            .collect();
        self.patch_finalizers(intent, finalizers).await
    }

    async fn get_node_config(&self, namespace: &str, name: &str) -> Result<Option<NodeConfig>, StoreError> {
        let api: Api<NodeConfig> = Api::namespaced(self.client.clone(), namespace);
        Ok(api.get_opt(name).await?)
    }

    async fn list_node_configs(&self, namespace: &str) -> Result<Vec<NodeConfig>, StoreError> {
        let api: Api<NodeConfig> = Api::namespaced(self.client.clone(), namespace);
        Ok(api.list(&ListParams::default()).await?.items)
    }

    async fn apply_network_attachment(&self, nad: &NetworkAttachmentDefinition) -> Result<bool, StoreError> {
        let (namespace, name) = object_key(nad)?;
        let api: Api<NetworkAttachmentDefinition> = Api::namespaced(self.client.clone(), &namespace);

        if let Some(existing) = api.get_opt(&name).await? {
            if existing.spec == nad.spec && existing.owner_references() == nad.owner_references() {
                return Ok(false);
            }
        }

        debug!("Applying NetworkAttachmentDefinition {}/{}", namespace, name);
        api.patch(&name, &PatchParams::apply(FIELD_MANAGER).force(), &Patch::Apply(nad))
            .await?;
        Ok(true)
    }

    async fn apply_volume_claim(&self, pvc: &PersistentVolumeClaim) -> Result<bool, StoreError> {
        let (namespace, name) = object_key(pvc)?;
        let api: Api<PersistentVolumeClaim> = Api::namespaced(self.client.clone(), &namespace);

        // Claim specs are immutable after binding
        if api.get_opt(&name).await?.is_some() {
            return Ok(false);
        }

        debug!("Creating PersistentVolumeClaim {}/{}", namespace, name);
        api.create(&PostParams::default(), pvc).await?;
        Ok(true)
    }

    async fn get_pod(&self, namespace: &str, name: &str) -> Result<Option<Pod>, StoreError> {
        let api: Api<Pod> = Api::namespaced(self.client.clone(), namespace);
        Ok(api.get_opt(name).await?)
    }

    async fn create_pod(&self, pod: &Pod) -> Result<(), StoreError> {
        let (namespace, _) = object_key(pod)?;
        let api: Api<Pod> = Api::namespaced(self.client.clone(), &namespace);
        api.create(&PostParams::default(), pod).await?;
        Ok(())
    }

    async fn delete_pod(&self, namespace: &str, name: &str) -> Result<(), StoreError> {
        let api: Api<Pod> = Api::namespaced(self.client.clone(), namespace);
        if api.get_opt(name).await?.is_none() {
            return Ok(());
        }
        api.delete(name, &DeleteParams::default()).await?;
        Ok(())
    }

    async fn get_secret(&self, namespace: &str, name: &str) -> Result<Option<Secret>, StoreError> {
        let api: Api<Secret> = Api::namespaced(self.client.clone(), namespace);
        Ok(api.get_opt(name).await?)
    }
}
