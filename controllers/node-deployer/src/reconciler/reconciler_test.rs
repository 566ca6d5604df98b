//! End-to-end passes of the engine against the in-memory store.

use super::*;
use crate::drivers::srlinux::{self, SrlinuxDriver};
use crate::drivers::{register_providers, server, VariantCatalog};
use crate::test_utils::{
    create_test_certificates, create_test_context, create_test_credentials, create_test_intent,
    create_test_node_config, pod_status, MockStore,
};
use crate::workload::revision_of;
use crds::{ConditionReason, ConditionStatus, NodeConfigReference, PersistentVolume};
use device_client::MockConnector;

const NS: &str = "lab";
const NETOS: &str = "netos-x";

fn setup(enable_network_attachments: bool) -> (Reconciler, MockStore, MockConnector) {
    let (context, store, sessions) = create_test_context();
    let mut registry = DriverRegistry::new();
    register_providers(&mut registry);
    registry.register(NETOS, |ctx| {
        let mut family = srlinux::defaults(NETOS);
        family.catalog = VariantCatalog::new().with_variant("variant-1", Vec::new());
        Arc::new(SrlinuxDriver::with_defaults(ctx, family))
    });
    let reconciler = Reconciler::new(
        Arc::new(store.clone()),
        Arc::new(registry),
        context,
        enable_network_attachments,
    );
    (reconciler, store, sessions)
}

/// node-a on netos-x, with a default config selecting variant-1 and the
/// secrets bootstrap needs
fn seed_netos(store: &MockStore) {
    store.add_intent(create_test_intent("node-a", NS, NETOS));
    store.add_node_config(create_test_node_config("default", NS, NETOS, Some("variant-1")));
    store.add_secret(create_test_credentials(NETOS, NS));
    store.add_secret(create_test_certificates("node-a", NS));
}

fn ready_condition(store: &MockStore, name: &str) -> Condition {
    store
        .intent(NS, name)
        .and_then(|i| i.ready_condition().cloned())
        .unwrap()
}

#[tokio::test]
async fn test_pod_without_ip_waits() {
    let (reconciler, store, sessions) = setup(true);
    seed_netos(&store);
    store.set_status_on_create(pod_status(true, &[]));

    let outcome = reconciler.reconcile(NS, "node-a").await.unwrap();

    assert_eq!(outcome.phase, Phase::AwaitingReady);
    assert_eq!(outcome.requeue, Requeue::After(Duration::from_secs(5)));

    let condition = ready_condition(&store, "node-a");
    assert_eq!(condition.status, ConditionStatus::False);
    assert_eq!(condition.reason, ConditionReason::Unknown);
    assert_eq!(condition.message, "no ip provided");

    let pod = store.pod(NS, "node-a").unwrap();
    assert!(revision_of(&pod).is_some());
    assert_eq!(store.attachments().len(), 2);
    assert!(sessions.opened().is_empty());

    let intent = store.intent(NS, "node-a").unwrap();
    assert!(intent.finalizers().iter().any(|f| f == NODE_INTENT_FINALIZER));
}

#[tokio::test]
async fn test_ready_after_bootstrap() {
    let (reconciler, store, sessions) = setup(true);
    seed_netos(&store);
    store.set_status_on_create(pod_status(true, &["10.0.0.5"]));

    let outcome = reconciler.reconcile(NS, "node-a").await.unwrap();

    assert_eq!(outcome, ReconcileOutcome::new(Phase::Ready, Requeue::None));
    assert_eq!(ready_condition(&store, "node-a").status, ConditionStatus::True);
    assert_eq!(sessions.opened()[0].address, "10.0.0.5");
    assert_eq!(sessions.opened()[0].credentials.username, "admin");
    assert_eq!(sessions.commands().last().map(String::as_str), Some("commit save"));
}

#[tokio::test]
async fn test_commit_failure_is_reported_and_retried() {
    let (reconciler, store, sessions) = setup(true);
    seed_netos(&store);
    store.set_status_on_create(pod_status(true, &["10.0.0.5"]));
    sessions.fail_on_command("commit save");

    let outcome = reconciler.reconcile(NS, "node-a").await.unwrap();

    assert_eq!(outcome, ReconcileOutcome::new(Phase::Bootstrapping, Requeue::Immediate));
    let condition = ready_condition(&store, "node-a");
    assert_eq!(condition.status, ConditionStatus::False);
    assert_eq!(condition.reason, ConditionReason::Failed);
    assert!(condition.message.contains("commit save"), "{}", condition.message);
    assert!(condition.message.contains("mock failure"), "{}", condition.message);
    assert_eq!(sessions.closes(), 1);
}

#[tokio::test]
async fn test_unsupported_model_creates_nothing() {
    let (reconciler, store, _) = setup(true);
    store.add_intent(create_test_intent("node-a", NS, NETOS));

    let outcome = reconciler.reconcile(NS, "node-a").await.unwrap();

    assert_eq!(outcome, ReconcileOutcome::new(Phase::Resolving, Requeue::None));
    let condition = ready_condition(&store, "node-a");
    assert_eq!(condition.reason, ConditionReason::Failed);
    assert_eq!(
        condition.message,
        "cannot deploy pod, variant not provided in the netos-x catalog, got: ixrd3l"
    );
    assert!(store.pod(NS, "node-a").is_none());
    assert!(store.attachments().is_empty());
}

#[tokio::test]
async fn test_unknown_provider_fails() {
    let (reconciler, store, _) = setup(true);
    store.add_intent(create_test_intent("node-b", NS, "junos.juniper.net"));

    let outcome = reconciler.reconcile(NS, "node-b").await.unwrap();

    assert_eq!(outcome.phase, Phase::Resolving);
    let condition = ready_condition(&store, "node-b");
    assert_eq!(condition.reason, ConditionReason::Failed);
    assert!(condition.message.starts_with("provider \"junos.juniper.net\" is not supported"));
    assert!(condition.message.contains("srlinux.nokia.com"));
}

#[tokio::test]
async fn test_missing_config_reference_fails() {
    let (reconciler, store, _) = setup(true);
    let mut intent = create_test_intent("node-a", NS, NETOS);
    intent.spec.parameters_ref = Some(NodeConfigReference::new("absent"));
    store.add_intent(intent);

    reconciler.reconcile(NS, "node-a").await.unwrap();

    assert_eq!(ready_condition(&store, "node-a").message, "NodeConfig lab/absent not found");
}

#[tokio::test]
async fn test_missing_credentials_fail_bootstrap() {
    let (reconciler, store, sessions) = setup(true);
    store.add_intent(create_test_intent("node-a", NS, NETOS));
    store.add_node_config(create_test_node_config("default", NS, NETOS, Some("variant-1")));
    store.set_status_on_create(pod_status(true, &["10.0.0.5"]));

    let outcome = reconciler.reconcile(NS, "node-a").await.unwrap();

    assert_eq!(outcome, ReconcileOutcome::new(Phase::Bootstrapping, Requeue::Immediate));
    assert_eq!(ready_condition(&store, "node-a").message, "Secret lab/netos-x not found");
    assert!(sessions.opened().is_empty());
}

#[tokio::test]
async fn test_repeated_pass_is_idempotent() {
    let (reconciler, store, sessions) = setup(true);
    seed_netos(&store);
    store.set_status_on_create(pod_status(true, &["10.0.0.5"]));

    reconciler.reconcile(NS, "node-a").await.unwrap();
    let mutations = store.mutations();
    let sessions_opened = sessions.opened().len();

    let outcome = reconciler.reconcile(NS, "node-a").await.unwrap();

    assert_eq!(outcome.phase, Phase::Ready);
    assert_eq!(store.mutations(), mutations);
    assert_eq!(store.pod_creates(), 1);
    assert_eq!(sessions.opened().len(), sessions_opened + 1);
    assert_eq!(sessions.closes(), sessions_opened + 1);
}

#[tokio::test]
async fn test_restarted_container_is_bootstrapped_again() {
    let (reconciler, store, sessions) = setup(true);
    seed_netos(&store);
    store.set_status_on_create(pod_status(true, &["10.0.0.5"]));
    reconciler.reconcile(NS, "node-a").await.unwrap();
    assert_eq!(sessions.opened().len(), 1);
    let status_writes = store.status_writes();

    let mut restarted = pod_status(true, &["10.0.0.5"]);
    restarted.container_statuses.as_mut().unwrap()[0].restart_count = 1;
    store.set_pod_status(NS, "node-a", restarted);

    let outcome = reconciler.reconcile(NS, "node-a").await.unwrap();

    assert_eq!(outcome, ReconcileOutcome::new(Phase::Ready, Requeue::None));
    assert_eq!(sessions.opened().len(), 2);
    assert_eq!(sessions.opened()[1].address, "10.0.0.5");
    assert_eq!(sessions.commands().last().map(String::as_str), Some("commit save"));
    assert_eq!(store.pod_creates(), 1);
    assert_eq!(store.pod_deletes(), 0);
    assert_eq!(store.status_writes(), status_writes);
}

#[tokio::test]
async fn test_persistent_volume_is_claimed_and_mounted() {
    let (reconciler, store, _) = setup(true);
    seed_netos(&store);
    let mut config = create_test_node_config("default", NS, NETOS, Some("variant-1"));
    config.spec.persistent_volumes.push(PersistentVolume {
        name: "flash".to_string(),
        mount_path: "/etc/opt/srlinux".to_string(),
        requests: [("storage".to_string(), "2Gi".to_string())].into(),
    });
    store.add_node_config(config);
    store.set_status_on_create(pod_status(true, &["10.0.0.5"]));

    reconciler.reconcile(NS, "node-a").await.unwrap();

    let claims = store.claims();
    assert_eq!(claims.len(), 1);
    let claim = &claims[0];
    assert_eq!(claim.name_any(), "node-a-flash");
    assert_eq!(claim.namespace().as_deref(), Some(NS));
    let owner = &claim.owner_references()[0];
    assert_eq!(owner.kind, "NodeIntent");
    assert_eq!(owner.name, "node-a");
    assert_eq!(owner.uid, "uid-lab-node-a");
    assert_eq!(owner.controller, Some(true));
    let spec = claim.spec.as_ref().unwrap();
    assert_eq!(spec.access_modes, Some(vec!["ReadWriteOnce".to_string()]));
    let requests = spec.resources.as_ref().and_then(|r| r.requests.as_ref()).unwrap();
    assert_eq!(requests["storage"].0, "2Gi");

    let pod = store.pod(NS, "node-a").unwrap();
    let pod_spec = pod.spec.as_ref().unwrap();
    let volume = pod_spec
        .volumes
        .as_ref()
        .unwrap()
        .iter()
        .find(|v| v.name == "flash")
        .unwrap();
    assert_eq!(
        volume.persistent_volume_claim.as_ref().map(|c| c.claim_name.as_str()),
        Some("node-a-flash")
    );
    let mounts = pod_spec.containers[0].volume_mounts.as_ref().unwrap();
    assert!(mounts.iter().any(|m| m.name == "flash" && m.mount_path == "/etc/opt/srlinux"));

    let mutations = store.mutations();
    reconciler.reconcile(NS, "node-a").await.unwrap();
    assert_eq!(store.claims().len(), 1);
    assert_eq!(store.mutations(), mutations);
}

#[tokio::test]
async fn test_drift_recreates_and_rebootstraps() {
    let (reconciler, store, sessions) = setup(true);
    seed_netos(&store);
    store.set_status_on_create(pod_status(true, &["10.0.0.5"]));
    reconciler.reconcile(NS, "node-a").await.unwrap();
    let before = revision_of(&store.pod(NS, "node-a").unwrap()).map(str::to_string);

    let mut config = create_test_node_config("default", NS, NETOS, Some("variant-1"));
    config.spec.image = Some("ghcr.io/nokia/srlinux:24.3.1".to_string());
    store.add_node_config(config);
    let outcome = reconciler.reconcile(NS, "node-a").await.unwrap();

    assert_eq!(outcome.phase, Phase::Ready);
    assert_eq!(store.pod_deletes(), 1);
    assert_eq!(store.pod_creates(), 2);
    let after = revision_of(&store.pod(NS, "node-a").unwrap()).map(str::to_string);
    assert_ne!(before, after);
    assert_eq!(sessions.opened().len(), 2);
}

#[tokio::test]
async fn test_disabled_attachments_leave_pod_unwired() {
    let (reconciler, store, _) = setup(false);
    seed_netos(&store);

    reconciler.reconcile(NS, "node-a").await.unwrap();

    assert!(store.attachments().is_empty());
    let pod = store.pod(NS, "node-a").unwrap();
    assert!(!pod.annotations().contains_key(crate::workload::NETWORKS_ANNOTATION));
    assert_eq!(ready_condition(&store, "node-a").message, "pod conditions empty");
}

#[tokio::test]
async fn test_server_is_ready_without_bootstrap() {
    let (reconciler, store, sessions) = setup(true);
    store.add_intent(create_test_intent("host1", NS, server::PROVIDER));
    store.set_status_on_create(pod_status(true, &["10.0.0.9"]));

    let outcome = reconciler.reconcile(NS, "host1").await.unwrap();

    assert_eq!(outcome.phase, Phase::Ready);
    assert_eq!(ready_condition(&store, "host1").status, ConditionStatus::True);
    assert!(store.attachments().is_empty());
    assert!(sessions.opened().is_empty());
}

#[tokio::test]
async fn test_missing_intent_is_a_no_op() {
    let (reconciler, store, _) = setup(true);

    let outcome = reconciler.reconcile(NS, "ghost").await.unwrap();

    assert_eq!(outcome, ReconcileOutcome::new(Phase::Fetching, Requeue::None));
    assert_eq!(store.mutations(), 0);
}

#[tokio::test]
async fn test_deletion_releases_finalizer() {
    let (reconciler, store, _) = setup(true);
    seed_netos(&store);
    reconciler.reconcile(NS, "node-a").await.unwrap();
    store.mark_deleted(NS, "node-a");

    let outcome = reconciler.reconcile(NS, "node-a").await.unwrap();

    assert_eq!(outcome, ReconcileOutcome::new(Phase::Finalizing, Requeue::None));
    assert!(store.intent(NS, "node-a").is_none());
}

#[tokio::test]
async fn test_finalizer_failure_is_retried() {
    let (reconciler, store, _) = setup(true);
    seed_netos(&store);
    reconciler.reconcile(NS, "node-a").await.unwrap();
    store.mark_deleted(NS, "node-a");
    store.fail_remove_finalizer("conflict");

    let outcome = reconciler.reconcile(NS, "node-a").await.unwrap();

    assert_eq!(outcome, ReconcileOutcome::new(Phase::Finalizing, Requeue::Immediate));
    let condition = ready_condition(&store, "node-a");
    assert_eq!(condition.reason, ConditionReason::Failed);
    assert_eq!(condition.message, "conflict");
}

#[tokio::test]
async fn test_pod_create_failure_is_retried() {
    let (reconciler, store, _) = setup(true);
    seed_netos(&store);
    store.fail_pod_create("quota exceeded");

    let outcome = reconciler.reconcile(NS, "node-a").await.unwrap();

    assert_eq!(outcome, ReconcileOutcome::new(Phase::Converging, Requeue::Immediate));
    assert_eq!(ready_condition(&store, "node-a").message, "quota exceeded");
}
