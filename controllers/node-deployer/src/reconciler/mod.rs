//! Reconciliation engine.
//!
//! One pass drives a `NodeIntent` through
//! `Fetching -> Resolving -> Attaching -> Converging -> AwaitingReady ->
//! Bootstrapping -> Ready`, or through `Finalizing` once it is being deleted.
//! Every pass ends by recording the outcome in the intent's `Ready`
//! condition; the returned [`ReconcileOutcome`] tells the dispatch layer
//! when to come back.

mod workload;

#[cfg(test)]
mod reconciler_test;

use crate::bootstrap::{credentials_from_secret, CertificateBundle, CERTIFICATE_PROFILE};
use crate::drivers::{BootstrapSecrets, DriverContext, DriverRegistry, ProviderDriver};
use crate::error::ControllerError;
use crate::store::ClusterStore;
use crds::{Condition, NetworkAttachmentDefinition, NodeConfig, NodeIntent, NODE_INTENT_FINALIZER};
use kube::ResourceExt;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

pub use workload::{converge_workload, workload_addresses, Convergence};

/// How long to wait before checking on a workload that is not ready yet
pub const NOT_READY_REQUEUE: Duration = Duration::from_secs(5);

/// Engine states
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Fetching,
    Finalizing,
    Resolving,
    Attaching,
    Converging,
    AwaitingReady,
    Bootstrapping,
    Ready,
}

/// When the dispatch layer should run the key again
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Requeue {
    /// Wait for the next change
    None,
    /// Come back after a fixed delay
    After(Duration),
    /// Retry as soon as the dispatch backoff allows
    Immediate,
}

/// Where a pass stopped and what should happen next
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconcileOutcome {
    pub phase: Phase,
    pub requeue: Requeue,
}

impl ReconcileOutcome {
    fn new(phase: Phase, requeue: Requeue) -> Self {
        Self { phase, requeue }
    }
}

/// Drives node intents towards a running, bootstrapped workload.
pub struct Reconciler {
    store: Arc<dyn ClusterStore>,
    registry: Arc<DriverRegistry>,
    context: DriverContext,
    enable_network_attachments: bool,
}

impl std::fmt::Debug for Reconciler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Reconciler")
            .field("registry", &self.registry)
            .field("context", &self.context)
            .field("enable_network_attachments", &self.enable_network_attachments)
            .finish_non_exhaustive()
    }
}

impl Reconciler {
    /// Creates a reconciler. Drivers are bound to `context`.
    pub fn new(
        store: Arc<dyn ClusterStore>,
        registry: Arc<DriverRegistry>,
        context: DriverContext,
        enable_network_attachments: bool,
    ) -> Self {
        Self {
            store,
            registry,
            context,
            enable_network_attachments,
        }
    }

    /// Runs one pass for the intent `namespace/name`.
    ///
    /// Errors are only returned when the outcome could not be recorded on the
    /// intent; every other failure ends up in its `Ready` condition.
    pub async fn reconcile(&self, namespace: &str, name: &str) -> Result<ReconcileOutcome, ControllerError> {
        debug!("Reconciling NodeIntent {}/{}", namespace, name);

        let Some(mut intent) = self.store.get_intent(namespace, name).await? else {
            debug!("NodeIntent {}/{} no longer exists", namespace, name);
            return Ok(ReconcileOutcome::new(Phase::Fetching, Requeue::None));
        };

        if intent.metadata.deletion_timestamp.is_some() {
            return self.finalize(&mut intent).await;
        }

        // Resolving
        if let Err(e) = self.store.add_finalizer(&intent, NODE_INTENT_FINALIZER).await {
            return self.fail(&mut intent, Phase::Resolving, e.into()).await;
        }
        let driver = match self.registry.resolve(&intent.spec.provider, self.context.clone()) {
            Ok(driver) => driver,
            Err(e) => return self.fail(&mut intent, Phase::Resolving, e).await,
        };
        debug!("NodeIntent {}/{} handled by the {} driver", namespace, name, driver.provider());
        let config = match self.resolve_config(driver.as_ref(), &intent).await {
            Ok(config) => config,
            Err(e) => return self.fail(&mut intent, Phase::Resolving, e).await,
        };

        // Attaching
        let attachments = match self.attach(driver.as_ref(), &intent, &config).await {
            Ok(attachments) => attachments,
            Err(e) => return self.fail(&mut intent, Phase::Attaching, e).await,
        };

        // Converging
        let desired = match driver.build_workload_spec(&intent, &config, &attachments) {
            Ok(pod) => pod,
            Err(e) => return self.fail(&mut intent, Phase::Converging, e).await,
        };
        let convergence = match converge_workload(self.store.as_ref(), &desired).await {
            Ok(convergence) => convergence,
            Err(e) => return self.fail(&mut intent, Phase::Converging, e).await,
        };
        if convergence != Convergence::Unchanged {
            debug!("Workload {}/{} {:?}", namespace, name, convergence);
        }

        // AwaitingReady
        let pod = match self.store.get_pod(namespace, name).await {
            Ok(pod) => pod,
            Err(e) => return self.fail(&mut intent, Phase::AwaitingReady, e.into()).await,
        };
        let addresses = match pod.as_ref().map_or(Err("pod not found"), workload_addresses) {
            Ok(addresses) => addresses,
            Err(reason) => {
                debug!("Workload {}/{} not ready: {}", namespace, name, reason);
                self.set_condition(&mut intent, Condition::unknown(reason)).await?;
                return Ok(ReconcileOutcome::new(
                    Phase::AwaitingReady,
                    Requeue::After(NOT_READY_REQUEUE),
                ));
            }
        };

        // Bootstrapping
        // The transcript is safe to repeat; a container restarted in place
        // comes back with an empty configuration under the same pod.
        if let Some(secrets) = driver.bootstrap_secrets(&intent) {
            if let Err(e) = self.bootstrap(driver.as_ref(), namespace, &secrets, &addresses).await {
                return self.fail(&mut intent, Phase::Bootstrapping, e).await;
            }
        }

        if self.set_condition(&mut intent, Condition::ready()).await? {
            info!("NodeIntent {}/{} is ready at {}", namespace, name, addresses.join(", "));
        }
        Ok(ReconcileOutcome::new(Phase::Ready, Requeue::None))
    }

    /// Releases the intent. Owned pods, attachments and claims are garbage
    /// collected through their owner references.
    async fn finalize(&self, intent: &mut NodeIntent) -> Result<ReconcileOutcome, ControllerError> {
        info!("Finalizing NodeIntent {}/{}", intent.namespace().unwrap_or_default(), intent.name_any());
        if let Err(e) = self.store.remove_finalizer(intent, NODE_INTENT_FINALIZER).await {
            return self.fail(intent, Phase::Finalizing, e.into()).await;
        }
        Ok(ReconcileOutcome::new(Phase::Finalizing, Requeue::None))
    }

    async fn resolve_config(
        &self,
        driver: &dyn ProviderDriver,
        intent: &NodeIntent,
    ) -> Result<NodeConfig, ControllerError> {
        let config = driver.resolve_config(intent).await?;
        driver.validate_model(&config)?;
        Ok(config)
    }

    /// Ensures claims and, when enabled, network attachments exist.
    ///
    /// Returns the attachments the workload must select.
    async fn attach(
        &self,
        driver: &dyn ProviderDriver,
        intent: &NodeIntent,
        config: &NodeConfig,
    ) -> Result<Vec<NetworkAttachmentDefinition>, ControllerError> {
        for claim in driver.build_volume_claims(intent, config)? {
            if self.store.apply_volume_claim(&claim).await? {
                info!("Created PersistentVolumeClaim {}", claim.name_any());
            }
        }

        if !self.enable_network_attachments {
            return Ok(Vec::new());
        }

        let attachments = driver.build_network_attachments(intent, config)?;
        for nad in &attachments {
            if self.store.apply_network_attachment(nad).await? {
                info!("Applied NetworkAttachmentDefinition {}", nad.name_any());
            }
        }
        Ok(attachments)
    }

    async fn bootstrap(
        &self,
        driver: &dyn ProviderDriver,
        namespace: &str,
        secrets: &BootstrapSecrets,
        addresses: &[String],
    ) -> Result<(), ControllerError> {
        let credential_secret = self
            .store
            .get_secret(namespace, &secrets.credentials)
            .await?
            .ok_or_else(|| ControllerError::not_found("Secret", namespace, &secrets.credentials))?;
        let credentials = credentials_from_secret(&credential_secret).ok_or_else(|| {
            ControllerError::InvalidConfig(format!(
                "secret {namespace}/{} has no username and password",
                secrets.credentials
            ))
        })?;

        let certificate_secret = self
            .store
            .get_secret(namespace, &secrets.certificates)
            .await?
            .ok_or_else(|| ControllerError::not_found("Secret", namespace, &secrets.certificates))?;
        let certificates = CertificateBundle::from_secret(&certificate_secret, CERTIFICATE_PROFILE)?;

        driver.bootstrap(addresses, &credentials, &certificates).await
    }

    /// Records the failure and decides how soon to retry.
    ///
    /// Bootstrap and finalizer failures, and store errors anywhere, are
    /// retried. Anything else waits for the intent or its config to change.
    async fn fail(
        &self,
        intent: &mut NodeIntent,
        phase: Phase,
        error: ControllerError,
    ) -> Result<ReconcileOutcome, ControllerError> {
        warn!(
            "NodeIntent {}/{} failed while {:?}: {}",
            intent.namespace().unwrap_or_default(),
            intent.name_any(),
            phase,
            error
        );
        self.set_condition(intent, Condition::failed(error.to_string())).await?;

        let retry = matches!(phase, Phase::Bootstrapping | Phase::Finalizing)
            || matches!(error, ControllerError::Kube(_) | ControllerError::Store(_));
        let requeue = if retry { Requeue::Immediate } else { Requeue::None };
        Ok(ReconcileOutcome::new(phase, requeue))
    }

    /// Writes the `Ready` condition when it changed. Returns whether it did.
    async fn set_condition(&self, intent: &mut NodeIntent, condition: Condition) -> Result<bool, ControllerError> {
        let changed = intent
            .status
            .get_or_insert_with(Default::default)
            .set_condition(condition);
        if changed {
            self.store.update_intent_status(intent).await?;
        }
        Ok(changed)
    }
}
