//! Workload convergence and readiness.

use crate::error::ControllerError;
use crate::store::{ClusterStore, StoreError};
use crate::workload::revision_of;
use k8s_openapi::api::core::v1::Pod;
use kube::ResourceExt;
use tracing::info;

/// What converging the workload did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Convergence {
    /// Running pod already carries the desired revision
    Unchanged,
    /// No pod existed
    Created,
    /// Pod had drifted and was replaced
    Recreated,
}

/// Makes the running pod match `desired`.
///
/// Pods are immutable in the fields the drivers set, so drift is repaired by
/// deleting the old pod and creating the new one. Drift is detected purely by
/// comparing revision hash annotations.
pub async fn converge_workload(store: &dyn ClusterStore, desired: &Pod) -> Result<Convergence, ControllerError> {
    let namespace = desired.namespace().ok_or(StoreError::MissingField("namespace"))?;
    let name = desired.name_any();
    let revision = revision_of(desired).ok_or(StoreError::MissingField("revision hash"))?;

    match store.get_pod(&namespace, &name).await? {
        Some(existing) if revision_of(&existing) == Some(revision) => Ok(Convergence::Unchanged),
        Some(existing) => {
            info!(
                "Pod {}/{} drifted ({} -> {}), recreating",
                namespace,
                name,
                revision_of(&existing).unwrap_or("none"),
                revision
            );
            store.delete_pod(&namespace, &name).await?;
            store.create_pod(desired).await?;
            Ok(Convergence::Recreated)
        }
        None => {
            info!("Creating pod {}/{}", namespace, name);
            store.create_pod(desired).await?;
            Ok(Convergence::Created)
        }
    }
}

/// Addresses of a running, ready pod.
///
/// Only the first container's readiness is considered. The error is the
/// reason the pod cannot be bootstrapped yet.
pub fn workload_addresses(pod: &Pod) -> Result<Vec<String>, &'static str> {
    let status = pod.status.as_ref().ok_or("pod conditions empty")?;
    let first = status
        .container_statuses
        .as_ref()
        .and_then(|statuses| statuses.first())
        .ok_or("pod conditions empty")?;
    if !first.ready {
        return Err("pod not ready");
    }

    let mut addresses: Vec<String> = status
        .pod_ips
        .iter()
        .flatten()
        .filter_map(|pod_ip| Into::<Option<String>>::into(pod_ip.ip.clone()))
        .filter(|ip| !ip.is_empty())
        .collect();
    if addresses.is_empty() {
        addresses.extend(status.pod_ip.clone().filter(|ip| !ip.is_empty()));
    }

    if addresses.is_empty() {
        Err("no ip provided")
    } else {
        Ok(addresses)
    }
}
