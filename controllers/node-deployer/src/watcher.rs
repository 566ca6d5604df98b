//! Kubernetes resource watchers.
//!
//! Feeds `NodeIntent` keys to the reconciler through
//! `kube_runtime::Controller`. Changes to owned pods re-trigger their intent,
//! which is how readiness and IP assignment are noticed. The controller's
//! scheduler never runs the same key twice at once, so passes for one intent
//! are serialized while different intents proceed in parallel.

use crate::backoff::RetryTracker;
use crate::error::ControllerError;
use crate::reconciler::{ReconcileOutcome, Reconciler, Requeue};
use crds::NodeIntent;
use futures::StreamExt;
use k8s_openapi::api::core::v1::Pod;
use kube::{Api, ResourceExt};
use kube_runtime::{controller::{Action, Config as ControllerConfig}, watcher, Controller};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info};

/// Quiet period before a burst of events is reconciled
const DEBOUNCE: Duration = Duration::from_secs(1);

/// Shared state of the reconcile callbacks
struct Dispatch {
    reconciler: Arc<Reconciler>,
    retries: RetryTracker,
}

fn intent_key(intent: &NodeIntent) -> String {
    format!("{}/{}", intent.namespace().unwrap_or_default(), intent.name_any())
}

impl Dispatch {
    /// Translates an outcome into the controller's requeue action.
    ///
    /// Anything but an immediate retry drops the key's backoff, including a
    /// released finalizer.
    fn action_for(&self, key: &str, outcome: ReconcileOutcome) -> Action {
        match outcome.requeue {
            Requeue::None => {
                self.retries.reset(key);
                Action::await_change()
            }
            Requeue::After(delay) => {
                self.retries.reset(key);
                Action::requeue(delay)
            }
            Requeue::Immediate => Action::requeue(self.retries.next_delay(key)),
        }
    }
}

async fn reconcile(intent: Arc<NodeIntent>, ctx: Arc<Dispatch>) -> Result<Action, ControllerError> {
    let namespace = intent.namespace().unwrap_or_default();
    let name = intent.name_any();
    let key = intent_key(&intent);

    let outcome = ctx.reconciler.reconcile(&namespace, &name).await?;
    debug!("NodeIntent {} stopped at {:?}, requeue {:?}", key, outcome.phase, outcome.requeue);
    Ok(ctx.action_for(&key, outcome))
}

fn error_policy(intent: Arc<NodeIntent>, error: &ControllerError, ctx: Arc<Dispatch>) -> Action {
    let key = intent_key(&intent);
    let delay = ctx.retries.next_delay(&key);
    error!("Reconciliation error for NodeIntent {}: {} (retrying in {:?})", key, error, delay);
    Action::requeue(delay)
}

/// Watches node intents and the pods they own.
pub struct Watcher {
    reconciler: Arc<Reconciler>,
    intent_api: Api<NodeIntent>,
    pod_api: Api<Pod>,
    concurrency: u16,
}

impl Watcher {
    /// Creates a new watcher instance.
    pub fn new(reconciler: Arc<Reconciler>, intent_api: Api<NodeIntent>, pod_api: Api<Pod>, concurrency: u16) -> Self {
        Self {
            reconciler,
            intent_api,
            pod_api,
            concurrency,
        }
    }

    /// Runs until the watch stream ends.
    pub async fn watch_node_intents(&self) -> Result<(), ControllerError> {
        info!("Starting NodeIntent watcher (concurrency {})", self.concurrency);

        let dispatch = Arc::new(Dispatch {
            reconciler: self.reconciler.clone(),
            retries: RetryTracker::default(),
        });
        let controller_config = ControllerConfig::default()
            .debounce(DEBOUNCE)
            .concurrency(self.concurrency);

        Controller::new(self.intent_api.clone(), watcher::Config::default())
            .owns(self.pod_api.clone(), watcher::Config::default())
            .with_config(controller_config)
            .run(reconcile, error_policy, dispatch)
            .for_each(|res| async move {
                match res {
                    Ok((object, _)) => debug!("Reconciled NodeIntent {}", object.name),
                    Err(e) => error!("NodeIntent controller error: {}", e),
                }
            })
            .await;

        Ok(())
    }
}
