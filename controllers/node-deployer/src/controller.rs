//! Main controller implementation.
//!
//! Wires the Kubernetes-backed store, the SSH session connector and the
//! provider drivers into a reconciler and runs the `NodeIntent` watcher until
//! it exits or the process is asked to stop.

use crate::config::ControllerConfig;
use crate::drivers::{register_providers, DriverContext, DriverRegistry};
use crate::error::ControllerError;
use crate::reconciler::Reconciler;
use crate::store::{ClusterStore, KubeStore};
use crate::watcher::Watcher;
use crds::NodeIntent;
use device_client::{SessionConnector, SshConnector};
use k8s_openapi::api::core::v1::Pod;
use kube::{Api, Client};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::info;

/// Main controller for node lifecycle management.
pub struct Controller {
    node_intent_watcher: JoinHandle<Result<(), ControllerError>>,
}

impl Controller {
    /// Creates a new controller instance and starts watching.
    pub async fn new(config: ControllerConfig) -> Result<Self, ControllerError> {
        info!("Initializing Node Deployer Controller");

        let kube_client = Client::try_default().await?;

        let store: Arc<dyn ClusterStore> = Arc::new(KubeStore::new(kube_client.clone()));
        let sessions: Arc<dyn SessionConnector> = Arc::new(SshConnector::new(config.session_timeout));

        let mut registry = DriverRegistry::new();
        register_providers(&mut registry);
        info!("Registered providers: {}", registry.providers().join(", "));

        let context = DriverContext {
            store: store.clone(),
            sessions,
            config_namespace: config.config_namespace.clone(),
            ssh_port: config.ssh_port,
        };
        let reconciler = Arc::new(Reconciler::new(
            store,
            Arc::new(registry),
            context,
            config.enable_network_attachments,
        ));

        let (intent_api, pod_api): (Api<NodeIntent>, Api<Pod>) = match &config.watch_namespace {
            Some(ns) => (
                Api::namespaced(kube_client.clone(), ns),
                Api::namespaced(kube_client, ns),
            ),
            None => (Api::all(kube_client.clone()), Api::all(kube_client)),
        };

        let watcher = Watcher::new(reconciler, intent_api, pod_api, config.concurrency);
        let node_intent_watcher = tokio::spawn(async move { watcher.watch_node_intents().await });

        Ok(Self { node_intent_watcher })
    }

    /// Runs the controller until shutdown.
    pub async fn run(mut self) -> Result<(), ControllerError> {
        info!("Node Deployer Controller running");

        tokio::select! {
            result = &mut self.node_intent_watcher => {
                result.map_err(|e| ControllerError::Watch(format!("NodeIntent watcher panicked: {}", e)))?
                    .map_err(|e| ControllerError::Watch(format!("NodeIntent watcher error: {}", e)))?;
            }
            _ = tokio::signal::ctrl_c() => {
                info!("Shutdown signal received, stopping");
                self.node_intent_watcher.abort();
            }
        }

        Ok(())
    }
}
